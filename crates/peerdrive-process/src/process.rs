//! The runnable root of a process tree.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::context::StopSignal;
use crate::listener::Notifier;
use crate::{
    ComponentId, ProcessComponent, ProcessContext, ProcessError, ProcessListener, ProcessState,
    ProcessStep, Result, RollbackReason, Waiter,
};

/// How a process ended.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Succeeded,
    Failed {
        /// What made the process fail.
        reason: RollbackReason,
        /// First compensation that failed during rollback, if any.
        rollback_failure: Option<RollbackReason>,
    },
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Succeeded => Ok(()),
            Self::Failed {
                rollback_failure: Some(failure),
                ..
            } => Err(ProcessError::RollbackFailure(failure)),
            Self::Failed { reason, .. } => Err(ProcessError::Failed(reason)),
        }
    }

    /// What listeners are told.
    fn reported(&self) -> std::result::Result<(), RollbackReason> {
        match self {
            Self::Succeeded => Ok(()),
            Self::Failed { reason, .. } => Err(reason.clone()),
        }
    }
}

type Launch = Box<dyn FnOnce(Arc<Shared>) -> BoxFuture<'static, ()> + Send>;

struct Inner {
    state: ProcessState,
    outcome: Option<ProcessOutcome>,
    launch: Option<Launch>,
}

struct Shared {
    id: ComponentId,
    name: String,
    stop: StopSignal,
    inner: Mutex<Inner>,
    notifier: Notifier,
}

impl Shared {
    fn set_state(&self, state: ProcessState) {
        let mut inner = self.inner.lock();
        debug!(process = %self.id, name = %self.name, from = %inner.state, to = %state, "process state change");
        inner.state = state;
    }

    /// Record the terminal outcome. Returns false if one was already recorded.
    fn complete(&self, inner: &mut Inner, state: ProcessState, outcome: &ProcessOutcome) -> bool {
        if inner.outcome.is_some() {
            return false;
        }
        debug!(process = %self.id, name = %self.name, from = %inner.state, to = %state, "process finished");
        inner.state = state;
        inner.outcome = Some(outcome.clone());
        inner.launch = None;
        true
    }

    fn finish(&self, state: ProcessState, outcome: ProcessOutcome) {
        let completed = {
            let mut inner = self.inner.lock();
            self.complete(&mut inner, state, &outcome)
        };
        if completed {
            match &outcome {
                ProcessOutcome::Succeeded => info!(process = %self.id, name = %self.name, "process succeeded"),
                ProcessOutcome::Failed { reason, .. } => {
                    warn!(process = %self.id, name = %self.name, %reason, "process failed")
                }
            }
            self.notifier.complete(outcome.reported());
        }
    }
}

/// A startable process: one root component plus its exclusively owned context.
///
/// Cloning yields another handle to the same process.
#[derive(Clone)]
pub struct Process {
    shared: Arc<Shared>,
}

impl Process {
    /// Wrap `step` (often a [`SequentialProcess`](crate::SequentialProcess))
    /// with a fresh context holding `data`.
    pub fn new<C, S>(step: S, data: C) -> Self
    where
        C: Send + 'static,
        S: ProcessStep<C> + 'static,
    {
        let root = ProcessComponent::new(step);
        let id = root.id();
        let name = root.name().to_string();
        let stop = StopSignal::default();
        let ctx = ProcessContext::attached(id, stop.clone(), data);
        let launch: Launch = Box::new(move |shared| run(shared, root, ctx).boxed());

        Self {
            shared: Arc::new(Shared {
                id,
                name,
                stop,
                inner: Mutex::new(Inner {
                    state: ProcessState::Ready,
                    outcome: None,
                    launch: Some(launch),
                }),
                notifier: Notifier::default(),
            }),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> ProcessState {
        self.shared.inner.lock().state
    }

    pub fn outcome(&self) -> Option<ProcessOutcome> {
        self.shared.inner.lock().outcome.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.inner.lock().outcome.is_some()
    }

    /// Schedule the process on the current tokio runtime and return at once.
    ///
    /// Fails with [`ProcessError::InvalidState`] if the process was already
    /// started (or stopped), and with [`ProcessError::NoRuntime`] outside a
    /// runtime. Neither failure changes state or notifies anyone.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| ProcessError::NoRuntime)?;
        let launch = {
            let mut inner = self.shared.inner.lock();
            let invalid = ProcessError::InvalidState {
                expected: "Ready or Unready",
                actual: inner.state,
            };
            if !inner.state.is_startable() {
                return Err(invalid);
            }
            let launch = inner.launch.take().ok_or(invalid)?;
            inner.state = ProcessState::Executing;
            launch
        };
        debug!(process = %self.shared.id, name = %self.shared.name, "process started");
        runtime.spawn(launch(Arc::clone(&self.shared)));
        Ok(())
    }

    /// Attach a listener. If the process already finished, the listener is
    /// notified right away.
    pub fn attach_listener(&self, listener: Arc<dyn ProcessListener>) {
        self.shared.notifier.attach(listener);
    }

    /// Mark the process for rollback.
    ///
    /// Work already in flight is not interrupted; a sequence does not start
    /// its next step and rolls back instead. If the last step completes after
    /// the mark was set, the whole tree is rolled back anyway. A process that
    /// was never started finishes immediately as rolled back.
    pub fn stop(&self, reason: RollbackReason) {
        if !self.shared.stop.request(reason.clone()) {
            return;
        }
        let outcome = ProcessOutcome::Failed {
            reason,
            rollback_failure: None,
        };
        let completed = {
            let mut inner = self.shared.inner.lock();
            if !inner.state.is_startable() {
                return;
            }
            self.shared
                .complete(&mut inner, ProcessState::Rollbacked, &outcome)
        };
        if completed {
            self.shared.notifier.complete(outcome.reported());
        }
    }

    /// Poll until the process finished or the waiter runs out.
    pub async fn wait(&self, mut waiter: Waiter) -> Result<()> {
        loop {
            if let Some(outcome) = self.outcome() {
                return outcome.into_result();
            }
            waiter.tick().await?;
        }
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

async fn run<C: Send + 'static>(
    shared: Arc<Shared>,
    mut root: ProcessComponent<C>,
    mut ctx: ProcessContext<C>,
) {
    let driven = AssertUnwindSafe(drive(&shared, &mut root, &mut ctx))
        .catch_unwind()
        .await;
    if driven.is_err() {
        error!(process = %shared.id, name = %shared.name, "process panicked");
        shared.finish(
            ProcessState::FailedTerminal,
            ProcessOutcome::Failed {
                reason: RollbackReason::new(ctx.current_component(), "process panicked"),
                rollback_failure: None,
            },
        );
    }
}

async fn drive<C: Send>(shared: &Shared, root: &mut ProcessComponent<C>, ctx: &mut ProcessContext<C>) {
    let reason = match root.execute(ctx).await {
        Ok(()) => match ctx.stop_requested() {
            None => {
                shared.finish(ProcessState::Succeeded, ProcessOutcome::Succeeded);
                return;
            }
            Some(reason) => {
                info!(process = %shared.id, name = %shared.name, %reason, "stopped while finishing, rolling back");
                reason
            }
        },
        Err(reason) => {
            shared.set_state(ProcessState::Failed);
            reason
        }
    };

    shared.set_state(ProcessState::RollingBack);
    match root.rollback(ctx).await {
        Ok(()) => shared.finish(
            ProcessState::Rollbacked,
            ProcessOutcome::Failed {
                reason,
                rollback_failure: None,
            },
        ),
        Err(failure) => shared.finish(
            ProcessState::FailedTerminal,
            ProcessOutcome::Failed {
                reason,
                rollback_failure: Some(failure),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordingListener, SequentialProcess};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type StepResult = std::result::Result<(), RollbackReason>;

    fn waiter() -> Waiter {
        Waiter::from_secs(5).with_granularity(Duration::from_millis(5))
    }

    #[derive(Default)]
    struct OrderListener(Mutex<Vec<String>>);

    impl ProcessListener for OrderListener {
        fn on_succeeded(&self) {
            self.0.lock().push("succeeded".into());
        }
        fn on_failed(&self, reason: &RollbackReason) {
            self.0.lock().push(format!("failed: {}", reason.message()));
        }
        fn on_finished(&self) {
            self.0.lock().push("finished".into());
        }
    }

    struct Push(&'static str);

    #[async_trait]
    impl ProcessStep<Vec<&'static str>> for Push {
        async fn execute(&mut self, ctx: &mut ProcessContext<Vec<&'static str>>) -> StepResult {
            ctx.data_mut().push(self.0);
            Ok(())
        }
    }

    struct Fail {
        undo_fails: bool,
    }

    #[async_trait]
    impl ProcessStep<()> for Fail {
        async fn execute(&mut self, ctx: &mut ProcessContext<()>) -> StepResult {
            Err(ctx.fail("broken"))
        }

        async fn rollback(&mut self, ctx: &mut ProcessContext<()>) -> StepResult {
            if self.undo_fails {
                return Err(ctx.fail("undo broken"));
            }
            Ok(())
        }
    }

    /// Blocks until released, then records that it ran.
    struct Gate {
        release: Option<oneshot::Receiver<()>>,
        ran: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    }

    #[async_trait]
    impl ProcessStep<()> for Gate {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&mut self, _ctx: &mut ProcessContext<()>) -> StepResult {
            if let Some(release) = self.release.take() {
                let _ = release.await;
            }
            self.ran.lock().push(self.name);
            Ok(())
        }

        async fn rollback(&mut self, _ctx: &mut ProcessContext<()>) -> StepResult {
            self.ran.lock().push("rollback");
            Ok(())
        }
    }

    struct Panics;

    #[async_trait]
    impl ProcessStep<()> for Panics {
        async fn execute(&mut self, _ctx: &mut ProcessContext<()>) -> StepResult {
            panic!("step bug");
        }
    }

    #[tokio::test]
    async fn success_notifies_succeeded_then_finished() {
        let process = Process::new(Push("a"), Vec::new());
        let listener = Arc::new(OrderListener::default());
        process.attach_listener(listener.clone());

        assert_eq!(process.state(), ProcessState::Ready);
        process.start().unwrap();
        process.wait(waiter()).await.unwrap();

        assert_eq!(process.state(), ProcessState::Succeeded);
        assert_eq!(*listener.0.lock(), vec!["succeeded", "finished"]);
    }

    #[tokio::test]
    async fn start_returns_before_work_resolves() {
        let (tx, rx) = oneshot::channel();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let process = Process::new(
            Gate {
                release: Some(rx),
                ran: Arc::clone(&ran),
                name: "gate",
            },
            (),
        );

        process.start().unwrap();
        tokio::task::yield_now().await;
        assert_eq!(process.state(), ProcessState::Executing);
        assert!(!process.is_finished());

        tx.send(()).unwrap();
        process.wait(waiter()).await.unwrap();
        assert_eq!(*ran.lock(), vec!["gate"]);
    }

    #[tokio::test]
    async fn failure_rolls_back_and_reports_reason() {
        let process = Process::new(Fail { undo_fails: false }, ());
        let listener = Arc::new(OrderListener::default());
        process.attach_listener(listener.clone());

        process.start().unwrap();
        let err = process.wait(waiter()).await.unwrap_err();

        assert!(matches!(err, ProcessError::Failed(ref r) if r.message() == "broken"));
        assert_eq!(process.state(), ProcessState::Rollbacked);
        assert_eq!(*listener.0.lock(), vec!["failed: broken", "finished"]);
    }

    #[tokio::test]
    async fn failed_compensation_is_surfaced() {
        let process = Process::new(Fail { undo_fails: true }, ());
        let listener = Arc::new(RecordingListener::default());
        process.attach_listener(listener.clone());

        process.start().unwrap();
        let err = process.wait(waiter()).await.unwrap_err();

        assert!(matches!(err, ProcessError::RollbackFailure(ref r) if r.message() == "undo broken"));
        assert_eq!(process.state(), ProcessState::FailedTerminal);
        // listeners get the original reason
        assert_eq!(listener.failure_reason().unwrap().message(), "broken");
        assert_eq!(listener.finished_count(), 1);
    }

    #[tokio::test]
    async fn second_start_is_rejected_without_side_effects() {
        let process = Process::new(Push("a"), Vec::new());
        let listener = Arc::new(RecordingListener::default());
        process.attach_listener(listener.clone());

        process.start().unwrap();
        assert!(matches!(process.start(), Err(ProcessError::InvalidState { .. })));
        process.wait(waiter()).await.unwrap();

        assert!(matches!(
            process.start(),
            Err(ProcessError::InvalidState {
                actual: ProcessState::Succeeded,
                ..
            })
        ));
        assert_eq!(process.state(), ProcessState::Succeeded);
        assert_eq!(listener.succeeded_count(), 1);
        assert_eq!(listener.finished_count(), 1);
    }

    #[test]
    fn start_outside_runtime_fails_without_transition() {
        let process = Process::new(Push("a"), Vec::new());
        let listener = Arc::new(RecordingListener::default());
        process.attach_listener(listener.clone());

        assert!(matches!(process.start(), Err(ProcessError::NoRuntime)));
        assert_eq!(process.state(), ProcessState::Ready);
        assert!(!listener.has_finished());
    }

    #[tokio::test]
    async fn late_listener_gets_replay_exactly_once() {
        let process = Process::new(Fail { undo_fails: false }, ());
        process.start().unwrap();
        process.wait(waiter()).await.unwrap_err();

        let late = Arc::new(RecordingListener::default());
        process.attach_listener(late.clone());

        assert_eq!(late.failed_count(), 1);
        assert_eq!(late.finished_count(), 1);
        assert_eq!(late.succeeded_count(), 0);
        assert_eq!(late.failure_reason().unwrap().message(), "broken");
    }

    #[tokio::test]
    async fn listener_attached_while_running_is_notified() {
        let (tx, rx) = oneshot::channel();
        let process = Process::new(
            Gate {
                release: Some(rx),
                ran: Arc::default(),
                name: "gate",
            },
            (),
        );
        process.start().unwrap();

        let listener = Arc::new(RecordingListener::default());
        process.attach_listener(listener.clone());
        tx.send(()).unwrap();
        process.wait(waiter()).await.unwrap();

        assert_eq!(listener.succeeded_count(), 1);
        assert_eq!(listener.finished_count(), 1);
    }

    #[tokio::test]
    async fn stop_before_start_finishes_as_rolled_back() {
        let process = Process::new(Push("a"), Vec::new());
        let listener = Arc::new(RecordingListener::default());
        process.attach_listener(listener.clone());

        process.stop(RollbackReason::new(process.id(), "logout"));

        assert_eq!(process.state(), ProcessState::Rollbacked);
        assert_eq!(listener.failure_reason().unwrap().message(), "logout");
        assert!(matches!(process.start(), Err(ProcessError::InvalidState { .. })));
        assert_eq!(listener.finished_count(), 1);
    }

    #[tokio::test]
    async fn stop_while_running_rolls_back_completed_steps() {
        let (tx, rx) = oneshot::channel();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let seq = SequentialProcess::new("two gates")
            .with_step(Gate {
                release: Some(rx),
                ran: Arc::clone(&ran),
                name: "first",
            })
            .with_step(Gate {
                release: None,
                ran: Arc::clone(&ran),
                name: "second",
            });
        let process = Process::new(seq, ());
        process.start().unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        process.stop(RollbackReason::new(process.id(), "logout"));
        tx.send(()).unwrap();
        let err = process.wait(waiter()).await.unwrap_err();

        assert!(matches!(err, ProcessError::Failed(ref r) if r.message() == "logout"));
        assert_eq!(*ran.lock(), vec!["first", "rollback"]);
        assert_eq!(process.state(), ProcessState::Rollbacked);
    }

    #[tokio::test]
    async fn stop_during_last_step_rolls_back_everything() {
        let (tx_first, rx_first) = oneshot::channel();
        let (tx_last, rx_last) = oneshot::channel();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let seq = SequentialProcess::new("two gates")
            .with_step(Gate {
                release: Some(rx_first),
                ran: Arc::clone(&ran),
                name: "first",
            })
            .with_step(Gate {
                release: Some(rx_last),
                ran: Arc::clone(&ran),
                name: "last",
            });
        let process = Process::new(seq, ());
        let listener = Arc::new(RecordingListener::default());
        process.attach_listener(listener.clone());
        process.start().unwrap();

        tx_first.send(()).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*ran.lock(), vec!["first"]);

        process.stop(RollbackReason::new(process.id(), "logout"));
        tx_last.send(()).unwrap();
        let err = process.wait(waiter()).await.unwrap_err();

        assert!(matches!(err, ProcessError::Failed(ref r) if r.message() == "logout"));
        assert_eq!(*ran.lock(), vec!["first", "last", "rollback", "rollback"]);
        assert_eq!(process.state(), ProcessState::Rollbacked);
        assert_eq!(listener.succeeded_count(), 0);
        assert_eq!(listener.failure_reason().unwrap().message(), "logout");
        assert_eq!(listener.finished_count(), 1);
    }

    #[tokio::test]
    async fn stop_during_single_step_rolls_it_back() {
        let (tx, rx) = oneshot::channel();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let process = Process::new(
            Gate {
                release: Some(rx),
                ran: Arc::clone(&ran),
                name: "gate",
            },
            (),
        );
        process.start().unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        process.stop(RollbackReason::new(process.id(), "shutdown"));
        tx.send(()).unwrap();
        let err = process.wait(waiter()).await.unwrap_err();

        assert!(matches!(err, ProcessError::Failed(ref r) if r.message() == "shutdown"));
        assert_eq!(*ran.lock(), vec!["gate", "rollback"]);
        assert_eq!(process.state(), ProcessState::Rollbacked);
    }

    #[tokio::test]
    async fn child_listener_attached_while_running_hears_the_child() {
        let (tx, rx) = oneshot::channel();
        let mut seq = SequentialProcess::new("observed");
        let first = seq.add_step(Gate {
            release: Some(rx),
            ran: Arc::default(),
            name: "first",
        });
        let process = Process::new(seq, ());
        process.start().unwrap();

        let child = Arc::new(RecordingListener::default());
        first.attach_listener(child.clone());
        assert!(!first.is_finished());
        tx.send(()).unwrap();
        process.wait(waiter()).await.unwrap();

        assert_eq!(first.name(), "first");
        assert_eq!(child.succeeded_count(), 1);
        assert_eq!(child.finished_count(), 1);
        assert!(matches!(first.outcome(), Some(Ok(()))));
    }

    #[tokio::test]
    async fn panicking_step_fails_the_process() {
        let process = Process::new(Panics, ());
        let listener = Arc::new(RecordingListener::default());
        process.attach_listener(listener.clone());

        process.start().unwrap();
        let err = process.wait(waiter()).await.unwrap_err();

        assert!(matches!(err, ProcessError::Failed(_)));
        assert_eq!(process.state(), ProcessState::FailedTerminal);
        assert_eq!(listener.finished_count(), 1);
    }

    #[tokio::test]
    async fn wait_times_out() {
        let (_tx, rx) = oneshot::channel::<()>();
        let process = Process::new(
            Gate {
                release: Some(rx),
                ran: Arc::default(),
                name: "stuck",
            },
            (),
        );
        process.start().unwrap();

        let quick = Waiter::new(Duration::from_millis(20)).with_granularity(Duration::from_millis(5));
        assert!(matches!(process.wait(quick).await, Err(ProcessError::Timeout(_))));
    }
}
