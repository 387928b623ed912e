//! The user-facing runtime façade
//!
//! A [`Runtime`] value holds the settings applied to the next region it
//! forks. It is a plain value, not a global: create as many independent
//! runtimes as you like, each fully isolated from the others.
//!
//! # Example
//!
//! ```
//! use bingxing::{Runtime, Schedule};
//! use std::sync::atomic::{AtomicI64, Ordering};
//!
//! fn main() -> bingxing::Result<()> {
//!     let rt = Runtime::new();
//!     let sum = AtomicI64::new(0);
//!     rt.parallel_region(Some(4), |w| {
//!         w.for_each(0, 100, Schedule::Static, None, |i| {
//!             sum.fetch_add(i, Ordering::Relaxed);
//!         })
//!     })?;
//!     assert_eq!(sum.load(Ordering::Relaxed), 4950);
//!     Ok(())
//! }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};
use crate::reduction::{Reduce, ReduceOp};
use crate::region::{Region, Worker};
use crate::schedule::Schedule;
use crate::tasking::Job;

mod worker;

/// Wall-clock seconds since the Unix epoch, for timing region work
pub fn wtime() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Settings holder and entry point for forking parallel regions
#[derive(Debug)]
pub struct Runtime {
    /// Thread count for the next region; 0 means decide at fork time
    num_threads: AtomicUsize,
    /// Guards against opening a region from inside another one
    in_parallel: AtomicBool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with on-the-fly thread counts
    pub fn new() -> Self {
        Runtime {
            num_threads: AtomicUsize::new(0),
            in_parallel: AtomicBool::new(false),
        }
    }

    /// Number of logical processors available to this process
    pub fn num_procs() -> usize {
        std::thread::available_parallelism()
            .map(Into::into)
            .unwrap_or(1)
    }

    /// Fix the thread count used when `parallel_region` gets `None`
    pub fn set_num_threads(&self, num_threads: usize) {
        self.num_threads.store(num_threads, Ordering::SeqCst);
    }

    /// Thread count the next region will get by default
    pub fn max_threads(&self) -> usize {
        match self.num_threads.load(Ordering::SeqCst) {
            0 => Self::num_procs(),
            n => n,
        }
    }

    /// Let the runtime pick the thread count per region
    pub fn set_dynamic(&self) {
        self.num_threads.store(0, Ordering::SeqCst);
    }

    /// Whether the thread count is decided per region
    pub fn get_dynamic(&self) -> bool {
        self.num_threads.load(Ordering::SeqCst) == 0
    }

    /// Whether a region forked from this runtime is currently live
    pub fn in_parallel(&self) -> bool {
        self.in_parallel.load(Ordering::SeqCst)
    }

    /// Nested regions are never supported
    pub fn get_nested(&self) -> bool {
        false
    }

    /// Nested parallelism is deliberately unsupported
    pub fn set_nested(&self, _enabled: bool) -> Result<()> {
        Err(RuntimeError::NotImplemented {
            feature: "nested parallelism".to_string(),
        })
    }

    /// Fork a parallel region running `body` on every worker.
    ///
    /// `num_threads` of `None` uses [`max_threads`](Self::max_threads).
    /// The region ends with an implicit taskwait; the first worker failure
    /// (error or panic) is surfaced here after all workers have joined.
    pub fn parallel_region<F>(&self, num_threads: Option<usize>, body: F) -> Result<()>
    where
        F: Fn(&Worker) -> Result<()> + Send + Sync,
    {
        let num_threads = match num_threads {
            Some(0) => return Err(RuntimeError::invalid_args("thread count must be positive")),
            Some(n) => n,
            None => self.max_threads(),
        };
        if self.in_parallel.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::NestedParallelism);
        }

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            Region::fork(num_threads, &body)
        }));
        self.in_parallel.store(false, Ordering::SeqCst);
        match outcome {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Region wrapping a single worksharing loop
    pub fn parallel_for<F>(
        &self,
        start: i64,
        end: i64,
        num_threads: Option<usize>,
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        F: Fn(i64) + Send + Sync,
    {
        self.parallel_region(num_threads, |w| {
            w.for_each(start, end, schedule.clone(), chunk_size, &body)
        })
    }

    /// Region wrapping a single reduction loop
    #[allow(clippy::too_many_arguments)]
    pub fn parallel_for_reduction<T, F>(
        &self,
        start: i64,
        end: i64,
        op: ReduceOp,
        reduce_to: &mut T,
        num_threads: Option<usize>,
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        T: Reduce,
        F: Fn(&mut T, i64) + Send + Sync,
    {
        let shared = Mutex::new(*reduce_to);
        self.parallel_region(num_threads, |w| {
            let mut local = *shared.lock();
            w.for_reduction(start, end, op, &mut local, schedule.clone(), chunk_size, &body)?;
            if w.thread_num() == 0 {
                *shared.lock() = local;
            }
            Ok(())
        })?;
        *reduce_to = *shared.lock();
        Ok(())
    }

    /// Region wrapping a single `sections` construct.
    ///
    /// With `num_threads` of `None` the region gets one worker per section,
    /// capped at [`max_threads`](Self::max_threads).
    pub fn parallel_sections(&self, num_threads: Option<usize>, actions: Vec<Job>) -> Result<()> {
        let num_threads =
            num_threads.unwrap_or_else(|| self.max_threads().min(actions.len()).max(1));
        let slot = Mutex::new(Some(actions));
        self.parallel_region(Some(num_threads), |w| {
            let mine = if w.thread_num() == 0 {
                slot.lock().take().unwrap_or_default()
            } else {
                Vec::new()
            };
            w.sections(mine)
        })
    }

    /// Region whose body runs on the master thread only; the other workers
    /// still participate in the implicit taskwait
    pub fn parallel_master<F>(&self, num_threads: Option<usize>, body: F) -> Result<()>
    where
        F: Fn(&Worker) -> Result<()> + Send + Sync,
    {
        self.parallel_region(num_threads, |w| match w.master(|| body(w))? {
            Some(result) => result,
            None => Ok(()),
        })
    }

    /// Region where the master enqueues a taskloop and every worker helps
    /// drain it
    #[allow(clippy::too_many_arguments)]
    pub fn parallel_master_taskloop<F>(
        &self,
        start: i64,
        end: i64,
        num_threads: Option<usize>,
        grainsize: Option<u64>,
        num_tasks: Option<u64>,
        only_if: bool,
        body: F,
    ) -> Result<()>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        let action = Arc::new(body);
        self.parallel_region(num_threads, |w| {
            let action = Arc::clone(&action);
            w.master_taskloop(start, end, grainsize, num_tasks, only_if, &[], move |i| {
                action(i)
            })
        })
    }
}

#[cfg(test)]
mod tests;
