//! Task pool
//!
//! A [`TaskPool`] collects explicit tasks (closures plus dependency lists)
//! for one parallel region. Workers drain it cooperatively inside
//! `taskwait`; the `threads_complete` counter implements the all-idle
//! detection protocol that ends the drain.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::dag::{DependencyGraph, TaskUuid, TaskUuidGenerator};

/// An enqueued task body
pub type Job = Box<dyn FnOnce() + Send>;

/// Shared task state for one region.
///
/// The graph sits behind an RwLock only so `reset` can swap in a fresh
/// instance between taskwait generations; all regular traffic goes through
/// the read lock.
pub struct TaskPool {
    graph: RwLock<DependencyGraph<Job>>,
    uuids: TaskUuidGenerator,
    /// Number of workers currently finding no runnable task
    threads_complete: AtomicUsize,
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPool {
    /// Create an empty pool
    pub fn new() -> Self {
        TaskPool {
            graph: RwLock::new(DependencyGraph::new()),
            uuids: TaskUuidGenerator::new(),
            threads_complete: AtomicUsize::new(0),
        }
    }

    /// Enqueue a task that runs after all of `depends_on` have completed
    pub fn enqueue<F>(&self, action: F, depends_on: &[TaskUuid]) -> TaskUuid
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.uuids.generate();
        self.graph.read().add_item(id, Box::new(action), depends_on);
        id
    }

    /// Enqueue one taskloop slice covering `[start, end)`
    pub fn enqueue_loop_slice<F>(
        &self,
        start: i64,
        end: i64,
        action: std::sync::Arc<F>,
        depends_on: &[TaskUuid],
    ) -> TaskUuid
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.enqueue(
            move || {
                for i in start..end {
                    action(i);
                }
            },
            depends_on,
        )
    }

    /// Pop a runnable task, if any
    pub fn try_next(&self) -> Option<(TaskUuid, Job)> {
        self.graph.read().try_next()
    }

    /// Mark a previously popped task as finished
    pub fn complete(&self, id: TaskUuid) {
        self.graph.read().complete_item(id);
    }

    /// Whether the given task has finished
    pub fn is_complete(&self, id: TaskUuid) -> bool {
        self.graph.read().is_complete(id)
    }

    /// Tasks enqueued but not yet completed
    pub fn remaining(&self) -> usize {
        self.graph.read().remaining()
    }

    /// Replace the graph with a fresh one. Called by the region leader after
    /// a taskwait drain so the pool can be reused indefinitely.
    pub fn reset(&self) {
        debug!("resetting task dependency graph");
        *self.graph.write() = DependencyGraph::new();
    }

    /// Clear the idle-worker counter before a drain starts
    pub fn clear_idle(&self) {
        self.threads_complete.store(0, Ordering::SeqCst);
    }

    /// A worker found no runnable task and went idle
    pub fn mark_idle(&self) {
        self.threads_complete.fetch_add(1, Ordering::SeqCst);
    }

    /// A previously idle worker found a task again
    pub fn mark_busy(&self) {
        self.threads_complete.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of currently idle workers
    pub fn idle_count(&self) -> usize {
        self.threads_complete.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("remaining", &self.remaining())
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
