//! Ordered composition of components.

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::{ComponentHandle, ProcessComponent, ProcessContext, ProcessState, ProcessStep, RollbackReason};

/// Runs its children strictly one after another.
///
/// `cursor` counts the children that completed successfully; exactly those
/// (plus the child that failed, if any) are eligible for rollback. Rollback
/// is sequential and in reverse completion order. A failing compensation
/// does not stop the remaining ones; the first such failure is returned once
/// all of them ran.
///
/// A `SequentialProcess` is itself a [`ProcessStep`], so sequences nest.
pub struct SequentialProcess<C: Send> {
    name: String,
    children: Vec<ProcessComponent<C>>,
    cursor: usize,
    failed: Option<usize>,
}

impl<C: Send + 'static> SequentialProcess<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            cursor: 0,
            failed: None,
        }
    }

    /// Append a step (builder style).
    pub fn with_step(mut self, step: impl ProcessStep<C> + 'static) -> Self {
        self.add_step(step);
        self
    }

    /// Append a step, returning a handle to observe it once the sequence runs.
    pub fn add_step(&mut self, step: impl ProcessStep<C> + 'static) -> ComponentHandle {
        let child = ProcessComponent::unready(Box::new(step));
        let handle = child.handle();
        self.children.push(child);
        handle
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of children that completed successfully.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn children(&self) -> &[ProcessComponent<C>] {
        &self.children
    }
}

#[async_trait]
impl<C: Send + 'static> ProcessStep<C> for SequentialProcess<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, ctx: &mut ProcessContext<C>) -> Result<(), RollbackReason> {
        while self.cursor < self.children.len() {
            if let Some(reason) = ctx.stop_requested() {
                info!(process = %self.name, %reason, "stop requested, not starting further steps");
                return Err(reason);
            }

            let index = self.cursor;
            let child = &mut self.children[index];
            if child.state() == ProcessState::Unready {
                child.set_state(ProcessState::Ready);
            }
            debug!(process = %self.name, step = child.name(), index, "starting step");

            if let Err(reason) = child.execute(ctx).await {
                self.failed = Some(index);
                return Err(reason);
            }
            self.cursor = index + 1;
        }
        Ok(())
    }

    async fn rollback(&mut self, ctx: &mut ProcessContext<C>) -> Result<(), RollbackReason> {
        let order: Vec<usize> = self
            .failed
            .take()
            .into_iter()
            .chain((0..self.cursor).rev())
            .collect();
        self.cursor = 0;

        let mut first_failure = None;
        for index in order {
            let child = &mut self.children[index];
            debug!(process = %self.name, step = child.name(), index, "rolling back step");
            if let Err(reason) = child.rollback(ctx).await {
                error!(process = %self.name, step = child.name(), %reason, "compensation failed");
                first_failure.get_or_insert(reason);
            }
        }

        match first_failure {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}
