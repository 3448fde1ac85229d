//! Error types for peerdrive-process.

use std::time::Duration;

use thiserror::Error;

use crate::{ProcessState, RollbackReason};

/// Result type for process framework operations.
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Errors surfaced by the process framework to its callers.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// The operation is not allowed in the component's current state.
    #[error("invalid process state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: ProcessState,
    },

    /// `start()` was called outside of a tokio runtime.
    #[error("no async runtime available to schedule the process")]
    NoRuntime,

    /// A blocking wait gave up before the process finished.
    #[error("process did not finish within {0:?}")]
    Timeout(Duration),

    /// The process failed and was rolled back.
    #[error("process failed: {0}")]
    Failed(RollbackReason),

    /// The process failed and at least one compensation failed too.
    /// Carries the first compensation failure.
    #[error("rollback failed: {0}")]
    RollbackFailure(RollbackReason),
}
