//! Dependency graph over task payloads
//!
//! The graph hands out payloads whose dependencies have all completed, in a
//! lock-split design: structural mutation (`add_item`) takes the write lock,
//! while completion (`complete_item`) runs under the read lock and only
//! touches atomic counters, so many completions proceed concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use parking_lot::{Mutex, RwLock};

use super::task_id::TaskUuid;

/// Structural bookkeeping guarded by the graph's RwLock
#[derive(Debug, Default)]
struct GraphStructure {
    /// Unsatisfied-dependency counters, one per live node
    unmet: HashMap<TaskUuid, Arc<AtomicI64>>,
    /// Forward edges: node -> nodes waiting on it
    dependents: HashMap<TaskUuid, Vec<TaskUuid>>,
}

/// A dependency graph dispensing payloads in dependency order.
///
/// A node becomes ready the moment its unmet-dependency count reaches zero,
/// at which point its id enters the ready queue exactly once. `try_next`
/// therefore hands each payload out at most once.
pub struct DependencyGraph<P> {
    structure: RwLock<GraphStructure>,
    payloads: Mutex<HashMap<TaskUuid, P>>,
    completed: RwLock<HashSet<TaskUuid>>,
    ready: SegQueue<TaskUuid>,
    remaining: AtomicI64,
}

impl<P> Default for DependencyGraph<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> DependencyGraph<P> {
    /// Create an empty graph
    pub fn new() -> Self {
        DependencyGraph {
            structure: RwLock::new(GraphStructure::default()),
            payloads: Mutex::new(HashMap::new()),
            completed: RwLock::new(HashSet::new()),
            ready: SegQueue::new(),
            remaining: AtomicI64::new(0),
        }
    }

    /// Insert a node with its payload and dependency list.
    ///
    /// Dependencies that already completed (or were never inserted) count as
    /// satisfied. A node with no unmet dependencies is immediately ready.
    pub fn add_item(&self, id: TaskUuid, payload: P, depends_on: &[TaskUuid]) {
        let mut structure = self.structure.write();
        self.remaining.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().insert(id, payload);

        let mut unmet_count = 0;
        {
            let completed = self.completed.read();
            for &dep in depends_on {
                if !completed.contains(&dep) && structure.unmet.contains_key(&dep) {
                    structure.dependents.entry(dep).or_default().push(id);
                    unmet_count += 1;
                }
            }
        }

        structure
            .unmet
            .insert(id, Arc::new(AtomicI64::new(unmet_count)));
        if unmet_count == 0 {
            self.ready.push(id);
        }
    }

    /// Pop a ready node, if any. Each node is returned at most once.
    pub fn try_next(&self) -> Option<(TaskUuid, P)> {
        let id = self.ready.pop()?;
        let payload = self.payloads.lock().remove(&id)?;
        Some((id, payload))
    }

    /// Mark a node finished, releasing any dependents whose last unmet
    /// dependency this was. Must be called exactly once per handed-out node.
    pub fn complete_item(&self, id: TaskUuid) {
        let structure = self.structure.read();
        self.remaining.fetch_sub(1, Ordering::SeqCst);

        if let Some(dependents) = structure.dependents.get(&id) {
            for &dependent in dependents {
                if let Some(count) = structure.unmet.get(&dependent) {
                    if count.fetch_sub(1, Ordering::SeqCst) == 1 {
                        self.ready.push(dependent);
                    }
                }
            }
        }

        self.completed.write().insert(id);
    }

    /// Whether the given node has completed
    pub fn is_complete(&self, id: TaskUuid) -> bool {
        self.completed.read().contains(&id)
    }

    /// Nodes inserted but not yet completed
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst).max(0) as usize
    }
}

impl<P> std::fmt::Debug for DependencyGraph<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}
