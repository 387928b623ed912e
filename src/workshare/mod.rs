//! Per-loop shared state
//!
//! A [`WorkShare`] is published by the region leader when a worksharing
//! loop starts and torn down at the loop's closing barrier. At most one is
//! in flight per region. The reduction slot is the single type-erased spot
//! in the runtime: arithmetic stays generic through the `Reduce` trait, and
//! the slot merely carries the typed accumulator vector from the workers to
//! the folding leader.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};
use crate::reduction::{Reduce, ReduceOp};
use crate::schedule::{LoopScheduler, ScheduleKind};

pub mod body;

pub use body::{unflatten, ForBody};

/// Shared record for one worksharing loop
pub struct WorkShare {
    /// Loop lower bound (inclusive)
    pub start: i64,
    /// Loop upper bound (exclusive)
    pub end: i64,
    /// Effective chunk size
    pub chunk_size: u64,
    /// Built-in strategy kind; None for user-supplied schedulers
    pub kind: Option<ScheduleKind>,
    /// The scheduler serving this loop
    pub scheduler: Arc<dyn LoopScheduler>,
    /// Reduction operation, if this is a reduction loop
    pub op: Option<ReduceOp>,
    /// Per-thread accumulators, collected as a typed `Vec<T>` behind `Any`
    locals: Mutex<Option<Box<dyn Any + Send>>>,
}

impl WorkShare {
    /// Create the record for one loop
    pub fn new(
        start: i64,
        end: i64,
        chunk_size: u64,
        kind: Option<ScheduleKind>,
        scheduler: Arc<dyn LoopScheduler>,
        op: Option<ReduceOp>,
    ) -> Self {
        WorkShare {
            start,
            end,
            chunk_size,
            kind,
            scheduler,
            op,
            locals: Mutex::new(None),
        }
    }

    /// Deposit one thread's accumulator into the shared slot
    pub fn push_local<T: Reduce>(&self, value: T) -> Result<()> {
        let mut slot = self.locals.lock();
        let boxed = slot.get_or_insert_with(|| Box::new(Vec::<T>::new()));
        let values = boxed
            .downcast_mut::<Vec<T>>()
            .ok_or_else(|| RuntimeError::internal("mismatched reduction accumulator type"))?;
        values.push(value);
        Ok(())
    }

    /// Take every deposited accumulator; called by the folding leader
    pub fn take_locals<T: Reduce>(&self) -> Vec<T> {
        self.locals
            .lock()
            .take()
            .and_then(|boxed| boxed.downcast::<Vec<T>>().ok())
            .map(|values| *values)
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for WorkShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkShare")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("chunk_size", &self.chunk_size)
            .field("kind", &self.kind)
            .field("op", &self.op)
            .finish_non_exhaustive()
    }
}
