//! The unit-of-work contract.

use async_trait::async_trait;

use crate::{ProcessContext, RollbackReason};

/// One unit of work inside a process.
///
/// `execute` may await network or storage I/O; the step is done when the
/// returned future resolves, not when it first yields. `rollback` undoes the
/// step's effect. It runs after the step itself failed, or after it
/// succeeded and a later step in the same process failed. Steps without
/// anything to undo keep the default no-op.
#[async_trait]
pub trait ProcessStep<C: Send>: Send {
    /// Name used in logs.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    async fn execute(&mut self, ctx: &mut ProcessContext<C>) -> Result<(), RollbackReason>;

    async fn rollback(&mut self, _ctx: &mut ProcessContext<C>) -> Result<(), RollbackReason> {
        Ok(())
    }
}
