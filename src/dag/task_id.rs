//! Task ID for the dependency graph
//!
//! Represents a unique identifier for each task submitted to the pool.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for a task in the dependency graph.
///
/// `TaskUuid` values are handed back by the task pool and used to express
/// dependencies between tasks. They are generated atomically to ensure
/// uniqueness across threads within one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskUuid(pub u64);

impl TaskUuid {
    /// Create a new TaskUuid with the given value.
    ///
    /// # Examples
    ///
    /// ```
    /// use bingxing::dag::TaskUuid;
    ///
    /// let id = TaskUuid(42);
    /// assert_eq!(id.0, 42);
    /// ```
    #[inline]
    pub fn new(value: u64) -> Self {
        TaskUuid(value)
    }

    /// Returns the inner value of the task ID.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskUuid({})", self.0)
    }
}

impl Hash for TaskUuid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Generator for creating unique task IDs.
///
/// # Examples
///
/// ```
/// use bingxing::dag::TaskUuidGenerator;
///
/// let generator = TaskUuidGenerator::new();
/// let id1 = generator.generate();
/// let id2 = generator.generate();
/// assert_ne!(id1, id2);
/// ```
#[derive(Debug)]
pub struct TaskUuidGenerator {
    next_id: AtomicU64,
}

impl TaskUuidGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
        }
    }

    /// Generate a new unique task ID.
    #[inline]
    pub fn generate(&self) -> TaskUuid {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        TaskUuid(id)
    }
}

impl Default for TaskUuidGenerator {
    fn default() -> Self {
        Self::new()
    }
}
