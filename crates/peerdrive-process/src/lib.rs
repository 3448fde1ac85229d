//! Peerdrive Process Framework
//!
//! Every user-facing operation of a peerdrive node (log in, log out, upload,
//! share, ...) is a tree of small units of work that runs asynchronously and
//! undoes itself in order when something goes wrong.
//!
//! # Overview
//!
//! - [`ProcessStep`]: one unit of work with an `execute` hook and an optional
//!   `rollback` compensation hook.
//! - [`ProcessComponent`]: a step wrapped with an identity and a
//!   [`ProcessState`] lifecycle. A component executes at most once.
//! - [`SequentialProcess`]: an ordered list of components run one after the
//!   other. When a child fails, the failed child and then every completed
//!   child are rolled back, last completed first, one at a time.
//! - [`ProcessContext`]: typed scratch data owned by one running process and
//!   handed to every step in turn.
//! - [`Process`]: the runnable root. [`Process::start`] never blocks; the
//!   tree runs on the tokio runtime and reports through [`ProcessListener`]s.
//!
//! # Lifecycle
//!
//! ```text
//! Unready ─┐
//!          ├─► Executing ─┬─► Succeeded
//! Ready ───┘              └─► Failed ─► RollingBack ─┬─► Rollbacked
//!                                                    └─► FailedTerminal
//! ```
//!
//! Listeners see `on_succeeded` or `on_failed`, then `on_finished`, exactly
//! once. A listener attached after the process finished gets the same
//! notifications replayed immediately. Children of a sequence are observed
//! the same way through the [`ComponentHandle`] returned by
//! [`SequentialProcess::add_step`]; they report how their execution ended.
//!
//! # Example
//!
//! ```rust,ignore
//! let process = Process::new(
//!     SequentialProcess::new("login")
//!         .with_step(GetLocationsStep::new(storage))
//!         .with_step(ContactPeersStep::new(messenger, timeout)),
//!     LoginData::default(),
//! );
//! let listener = Arc::new(RecordingListener::default());
//! process.attach_listener(listener.clone());
//! process.start()?;
//! process.wait(Waiter::from_secs(30)).await?;
//! ```

pub mod component;
pub mod composite;
pub mod context;
pub mod error;
pub mod listener;
pub mod manager;
pub mod process;
pub mod reason;
pub mod state;
pub mod step;
pub mod waiter;

pub use component::{ComponentHandle, ProcessComponent};
pub use composite::SequentialProcess;
pub use context::ProcessContext;
pub use error::{ProcessError, Result};
pub use listener::{OnFinished, ProcessListener, RecordingListener};
pub use manager::ProcessManager;
pub use process::{Process, ProcessOutcome};
pub use reason::{ComponentId, RollbackReason};
pub use state::ProcessState;
pub use step::ProcessStep;
pub use waiter::Waiter;
