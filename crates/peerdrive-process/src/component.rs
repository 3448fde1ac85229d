//! A step with identity and lifecycle.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::listener::Notifier;
use crate::{
    ComponentId, ProcessContext, ProcessError, ProcessListener, ProcessState, ProcessStep,
    RollbackReason,
};

/// A [`ProcessStep`] wrapped with an id and a [`ProcessState`].
///
/// The component enforces the lifecycle: it executes at most once and only
/// rolls back after it either completed or failed. Listeners attached through
/// [`handle`](Self::handle) learn how its execution ended.
pub struct ProcessComponent<C: Send> {
    id: ComponentId,
    state: ProcessState,
    step: Box<dyn ProcessStep<C>>,
    notifier: Arc<Notifier>,
}

/// Observer handle to a component, usable after the component moved into a
/// running process.
#[derive(Clone)]
pub struct ComponentHandle {
    id: ComponentId,
    name: String,
    notifier: Arc<Notifier>,
}

impl ComponentHandle {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a listener. If the component already finished executing, the
    /// listener is notified right away.
    pub fn attach_listener(&self, listener: Arc<dyn ProcessListener>) {
        self.notifier.attach(listener);
    }

    pub fn is_finished(&self) -> bool {
        self.notifier.outcome().is_some()
    }

    /// How the component's execution ended, once it did.
    pub fn outcome(&self) -> Option<Result<(), RollbackReason>> {
        self.notifier.outcome()
    }
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<C: Send> ProcessComponent<C> {
    pub fn new(step: impl ProcessStep<C> + 'static) -> Self {
        Self::boxed(Box::new(step))
    }

    pub fn boxed(step: Box<dyn ProcessStep<C>>) -> Self {
        Self {
            id: ComponentId::next(),
            state: ProcessState::Ready,
            step,
            notifier: Arc::default(),
        }
    }

    /// A component that waits for its predecessors inside a sequence.
    pub(crate) fn unready(step: Box<dyn ProcessStep<C>>) -> Self {
        Self {
            state: ProcessState::Unready,
            ..Self::boxed(step)
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn name(&self) -> &str {
        self.step.name()
    }

    pub fn handle(&self) -> ComponentHandle {
        ComponentHandle {
            id: self.id,
            name: self.step.name().to_string(),
            notifier: Arc::clone(&self.notifier),
        }
    }

    pub(crate) fn set_state(&mut self, state: ProcessState) {
        debug!(
            component = %self.id,
            step = self.step.name(),
            from = %self.state,
            to = %state,
            "component state change"
        );
        self.state = state;
    }

    fn invalid(&self, expected: &'static str) -> RollbackReason {
        RollbackReason::new(self.id, format!("{} cannot do that now", self.step.name()))
            .with_cause(ProcessError::InvalidState {
                expected,
                actual: self.state,
            })
    }

    /// Run the step to completion and notify listeners of the result.
    pub async fn execute(&mut self, ctx: &mut ProcessContext<C>) -> Result<(), RollbackReason> {
        if !self.state.is_startable() {
            return Err(self.invalid("Ready or Unready"));
        }
        self.set_state(ProcessState::Executing);

        let previous = ctx.enter(self.id);
        let result = self.step.execute(ctx).await;
        ctx.enter(previous);

        match &result {
            Ok(()) => self.set_state(ProcessState::Succeeded),
            Err(reason) => {
                warn!(component = %self.id, step = self.step.name(), %reason, "step failed");
                self.set_state(ProcessState::Failed);
            }
        }
        self.notifier.complete(result.clone());
        result
    }

    /// Run the step's compensation.
    pub async fn rollback(&mut self, ctx: &mut ProcessContext<C>) -> Result<(), RollbackReason> {
        if !self.state.can_roll_back() {
            return Err(self.invalid("Succeeded or Failed"));
        }
        self.set_state(ProcessState::RollingBack);

        let previous = ctx.enter(self.id);
        let result = self.step.rollback(ctx).await;
        ctx.enter(previous);

        match &result {
            Ok(()) => self.set_state(ProcessState::Rollbacked),
            Err(_) => self.set_state(ProcessState::FailedTerminal),
        }
        result
    }
}

impl<C: Send> std::fmt::Debug for ProcessComponent<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessComponent")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingListener;
    use async_trait::async_trait;

    struct Count;

    #[async_trait]
    impl ProcessStep<u32> for Count {
        async fn execute(&mut self, ctx: &mut ProcessContext<u32>) -> Result<(), RollbackReason> {
            *ctx.data_mut() += 1;
            Ok(())
        }

        async fn rollback(&mut self, ctx: &mut ProcessContext<u32>) -> Result<(), RollbackReason> {
            *ctx.data_mut() -= 1;
            Ok(())
        }
    }

    struct Refuse;

    #[async_trait]
    impl ProcessStep<u32> for Refuse {
        async fn execute(&mut self, ctx: &mut ProcessContext<u32>) -> Result<(), RollbackReason> {
            Err(ctx.fail("refused"))
        }
    }

    #[tokio::test]
    async fn executes_once() {
        let mut ctx = ProcessContext::new(0);
        let mut component = ProcessComponent::new(Count);

        component.execute(&mut ctx).await.unwrap();
        assert_eq!(component.state(), ProcessState::Succeeded);
        assert_eq!(*ctx.data(), 1);

        let err = component.execute(&mut ctx).await.unwrap_err();
        let cause = err.cause().and_then(|c| c.downcast_ref::<ProcessError>());
        assert!(matches!(cause, Some(ProcessError::InvalidState { .. })));
        assert_eq!(*ctx.data(), 1, "second execute must not run the step");
        assert_eq!(component.state(), ProcessState::Succeeded);
    }

    #[tokio::test]
    async fn failure_reason_names_the_step() {
        let mut ctx = ProcessContext::new(0);
        let mut component = ProcessComponent::new(Refuse);

        let reason = component.execute(&mut ctx).await.unwrap_err();
        assert_eq!(reason.origin(), component.id());
        assert_eq!(component.state(), ProcessState::Failed);
        assert_eq!(ctx.current_component(), ctx.process_id());
    }

    #[tokio::test]
    async fn rollback_requires_a_finished_execution() {
        let mut ctx = ProcessContext::new(0);
        let mut component = ProcessComponent::new(Count);

        assert!(component.rollback(&mut ctx).await.is_err());
        assert_eq!(component.state(), ProcessState::Ready);

        component.execute(&mut ctx).await.unwrap();
        component.rollback(&mut ctx).await.unwrap();
        assert_eq!(component.state(), ProcessState::Rollbacked);
        assert_eq!(*ctx.data(), 0);
    }

    #[tokio::test]
    async fn default_rollback_is_a_no_op() {
        let mut ctx = ProcessContext::new(0);
        let mut component = ProcessComponent::new(Refuse);

        component.execute(&mut ctx).await.unwrap_err();
        component.rollback(&mut ctx).await.unwrap();
        assert_eq!(component.state(), ProcessState::Rollbacked);
    }

    #[tokio::test]
    async fn listeners_hear_the_execution_outcome() {
        let mut ctx = ProcessContext::new(0);
        let mut component = ProcessComponent::new(Refuse);
        let handle = component.handle();
        let early = Arc::new(RecordingListener::default());
        handle.attach_listener(early.clone());

        component.execute(&mut ctx).await.unwrap_err();
        component.rollback(&mut ctx).await.unwrap();

        let late = Arc::new(RecordingListener::default());
        handle.attach_listener(late.clone());
        for listener in [&early, &late] {
            assert_eq!(listener.failed_count(), 1);
            assert_eq!(listener.finished_count(), 1);
            assert_eq!(listener.failure_reason().unwrap().message(), "refused");
        }
        assert!(matches!(handle.outcome(), Some(Err(_))));
    }

    #[tokio::test]
    async fn rejected_second_execute_notifies_nobody() {
        let mut ctx = ProcessContext::new(0);
        let mut component = ProcessComponent::new(Count);
        let listener = Arc::new(RecordingListener::default());
        component.handle().attach_listener(listener.clone());

        component.execute(&mut ctx).await.unwrap();
        component.execute(&mut ctx).await.unwrap_err();

        assert_eq!(listener.succeeded_count(), 1);
        assert_eq!(listener.failed_count(), 0);
        assert_eq!(listener.finished_count(), 1);
    }

    #[test]
    fn default_name_is_the_type_name() {
        let component: ProcessComponent<u32> = ProcessComponent::new(Count);
        assert_eq!(component.name(), "Count");
    }
}
