//! Completion notifications.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::RollbackReason;

/// Observer of a [`Process`](crate::Process) or of one of its components.
///
/// Exactly one of `on_succeeded`/`on_failed` is delivered, followed by
/// `on_finished`. Callbacks run on the task that finished the process and
/// should not block.
pub trait ProcessListener: Send + Sync {
    fn on_succeeded(&self) {}

    fn on_failed(&self, _reason: &RollbackReason) {}

    fn on_finished(&self) {}
}

#[derive(Default)]
struct NotifierState {
    listeners: Vec<Arc<dyn ProcessListener>>,
    outcome: Option<Result<(), RollbackReason>>,
}

/// Ordered listener list plus the terminal outcome, for replay to late listeners.
#[derive(Default)]
pub(crate) struct Notifier {
    state: Mutex<NotifierState>,
}

impl Notifier {
    /// Attach a listener, replaying the outcome at once if there is one.
    pub(crate) fn attach(&self, listener: Arc<dyn ProcessListener>) {
        let outcome = {
            let mut state = self.state.lock();
            match &state.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    state.listeners.push(listener);
                    return;
                }
            }
        };
        deliver(listener.as_ref(), &outcome);
    }

    /// Record the outcome and notify every attached listener in order.
    /// Returns false, notifying nobody, if an outcome was already recorded.
    pub(crate) fn complete(&self, outcome: Result<(), RollbackReason>) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.listeners)
        };
        for listener in &listeners {
            deliver(listener.as_ref(), &outcome);
        }
        true
    }

    pub(crate) fn outcome(&self) -> Option<Result<(), RollbackReason>> {
        self.state.lock().outcome.clone()
    }
}

fn deliver(listener: &dyn ProcessListener, outcome: &Result<(), RollbackReason>) {
    match outcome {
        Ok(()) => listener.on_succeeded(),
        Err(reason) => listener.on_failed(reason),
    }
    listener.on_finished();
}

/// Listener that counts what it was told. Used by blocking callers and tests.
#[derive(Debug, Default)]
pub struct RecordingListener {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    finished: AtomicUsize,
    reason: Mutex<Option<RollbackReason>>,
}

impl RecordingListener {
    pub fn has_succeeded(&self) -> bool {
        self.succeeded_count() > 0
    }

    pub fn has_failed(&self) -> bool {
        self.failed_count() > 0
    }

    pub fn has_finished(&self) -> bool {
        self.finished_count() > 0
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// The reason delivered with `on_failed`, if any.
    pub fn failure_reason(&self) -> Option<RollbackReason> {
        self.reason.lock().clone()
    }
}

impl ProcessListener for RecordingListener {
    fn on_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failed(&self, reason: &RollbackReason) {
        *self.reason.lock() = Some(reason.clone());
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs a closure once the process finished, whatever the outcome.
pub struct OnFinished<F>(pub F);

impl<F> ProcessListener for OnFinished<F>
where
    F: Fn() + Send + Sync,
{
    fn on_finished(&self) {
        (self.0)()
    }
}
