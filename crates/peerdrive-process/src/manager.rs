//! Registry of running processes.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::info;

use crate::{ComponentId, Process, ProcessListener, RollbackReason};

type Registry = Mutex<HashMap<ComponentId, Process>>;

/// Tracks outstanding processes so they can be stopped together (e.g. on
/// logout). Finished processes drop out automatically.
#[derive(Clone, Default)]
pub struct ProcessManager {
    processes: Arc<Registry>,
}

struct Deregister {
    id: ComponentId,
    registry: Weak<Registry>,
}

impl ProcessListener for Deregister {
    fn on_finished(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.id);
        }
    }
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a process until it finishes.
    pub fn register(&self, process: &Process) {
        self.processes.lock().insert(process.id(), process.clone());
        process.attach_listener(Arc::new(Deregister {
            id: process.id(),
            registry: Arc::downgrade(&self.processes),
        }));
    }

    pub fn get(&self, id: ComponentId) -> Option<Process> {
        self.processes.lock().get(&id).cloned()
    }

    /// Processes that have not finished yet.
    pub fn running(&self) -> Vec<Process> {
        self.processes.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.lock().is_empty()
    }

    /// Mark every tracked process for rollback. Returns how many were marked.
    pub fn stop_all(&self, message: &str) -> usize {
        let processes = self.running();
        info!(count = processes.len(), reason = message, "stopping all processes");
        for process in &processes {
            process.stop(RollbackReason::new(process.id(), message));
        }
        processes.len()
    }
}

impl std::fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessManager")
            .field("running", &self.len())
            .finish()
    }
}
