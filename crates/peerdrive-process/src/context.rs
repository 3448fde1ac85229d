//! Per-process scratch data.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ComponentId, RollbackReason};

/// Shared "please roll back" mark set from outside a running process.
#[derive(Debug, Clone, Default)]
pub(crate) struct StopSignal(Arc<Mutex<Option<RollbackReason>>>);

impl StopSignal {
    /// Record the stop reason. The first request wins.
    pub(crate) fn request(&self, reason: RollbackReason) -> bool {
        let mut slot = self.0.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        true
    }

    pub(crate) fn reason(&self) -> Option<RollbackReason> {
        self.0.lock().clone()
    }
}

/// Typed scratch space threaded through every step of one process instance.
///
/// The process owns its context exclusively and drops it when it finishes.
/// Steps read what earlier steps produced from [`data`](Self::data) and
/// publish their own results through [`data_mut`](Self::data_mut).
#[derive(Debug)]
pub struct ProcessContext<C> {
    process_id: ComponentId,
    current: ComponentId,
    stop: StopSignal,
    data: C,
}

impl<C> ProcessContext<C> {
    /// Context for a process that is driven by hand (e.g. a single step in a test).
    pub fn new(data: C) -> Self {
        let id = ComponentId::next();
        Self::attached(id, StopSignal::default(), data)
    }

    pub(crate) fn attached(process_id: ComponentId, stop: StopSignal, data: C) -> Self {
        Self {
            process_id,
            current: process_id,
            stop,
            data,
        }
    }

    /// Id of the root process this context belongs to.
    pub fn process_id(&self) -> ComponentId {
        self.process_id
    }

    /// Id of the component currently executing or rolling back.
    pub fn current_component(&self) -> ComponentId {
        self.current
    }

    /// Switch the current component, returning the previous one.
    pub(crate) fn enter(&mut self, id: ComponentId) -> ComponentId {
        std::mem::replace(&mut self.current, id)
    }

    pub fn data(&self) -> &C {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut C {
        &mut self.data
    }

    pub fn into_data(self) -> C {
        self.data
    }

    /// Build a failure reason originating from the current component.
    pub fn fail(&self, message: impl Into<String>) -> RollbackReason {
        RollbackReason::new(self.current, message)
    }

    /// Set if someone asked this process to stop and roll back.
    pub fn stop_requested(&self) -> Option<RollbackReason> {
        self.stop.reason()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_uses_current_component() {
        let mut ctx = ProcessContext::new(0u32);
        let step = ComponentId::next();
        let previous = ctx.enter(step);

        assert_eq!(previous, ctx.process_id());
        assert_eq!(ctx.fail("nope").origin(), step);

        ctx.enter(previous);
        assert_eq!(ctx.fail("nope").origin(), ctx.process_id());
    }

    #[test]
    fn first_stop_request_wins() {
        let stop = StopSignal::default();
        let ctx = ProcessContext::attached(ComponentId::next(), stop.clone(), ());
        assert!(ctx.stop_requested().is_none());

        assert!(stop.request(RollbackReason::new(ctx.process_id(), "logout")));
        assert!(!stop.request(RollbackReason::new(ctx.process_id(), "again")));
        assert_eq!(ctx.stop_requested().unwrap().message(), "logout");
    }

    #[test]
    fn data_is_owned_by_the_context() {
        let mut ctx = ProcessContext::new(vec![1, 2]);
        ctx.data_mut().push(3);
        assert_eq!(ctx.data(), &vec![1, 2, 3]);
        assert_eq!(ctx.into_data(), vec![1, 2, 3]);
    }
}
