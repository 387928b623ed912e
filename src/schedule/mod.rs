//! Loop scheduling
//!
//! A worksharing loop hands its iteration space `[start, end)` to a
//! [`LoopScheduler`], which partitions it into chunks on demand:
//!
//! - [`StaticScheduler`](strategies::StaticScheduler) - round-robin chunks,
//!   fixed at init time
//! - [`DynamicScheduler`](strategies::DynamicScheduler) - shared atomic
//!   cursor, first come first served
//! - [`GuidedScheduler`](strategies::GuidedScheduler) - shrinking chunks
//!   proportional to the remaining work
//! - [`WorkStealingScheduler`](strategies::WorkStealingScheduler) -
//!   per-thread queues with random-victim stealing
//!
//! The `Runtime` strategy defers the choice to configuration (the
//! `OMP_SCHEDULE` environment variable); user types implementing
//! [`LoopScheduler`] plug in through [`Schedule::Custom`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ScheduleSpec;
use crate::error::{Result, RuntimeError};

pub mod strategies;

pub use strategies::{DynamicScheduler, GuidedScheduler, StaticScheduler, WorkStealingScheduler};

/// Contract every loop-scheduling strategy implements.
///
/// `loop_init` is called exactly once per loop, by one thread, before any
/// worker asks for a chunk. `loop_next` may be called concurrently by all
/// workers; it returns the next chunk `[chunk_start, chunk_end)` for the
/// calling thread, or an empty range (`chunk_start == chunk_end`) once the
/// thread's work is exhausted. Errors are reserved for arithmetic overflow
/// and broken invariants.
pub trait LoopScheduler: Send + Sync {
    /// Prepare internal state for a loop over `[start, end)` shared by
    /// `num_threads` workers pulling `chunk_size` iterations at a time
    fn loop_init(&self, start: i64, end: i64, num_threads: usize, chunk_size: u64) -> Result<()>;

    /// Fetch the next chunk for `thread_id`
    fn loop_next(&self, thread_id: usize) -> Result<(i64, i64)>;
}

/// Built-in strategy names, used for configuration and introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Fixed round-robin assignment decided at loop start
    #[default]
    Static,
    /// Shared cursor, chunks are claimed first come first served
    Dynamic,
    /// Dynamic with chunks proportional to the remaining iteration count
    Guided,
    /// Per-thread queues with random-victim work stealing
    WorkStealing,
}

/// Schedule requested for a worksharing loop
#[derive(Clone)]
pub enum Schedule {
    /// Round-robin chunks fixed at loop start
    Static,
    /// First come first served chunks
    Dynamic,
    /// Shrinking chunks
    Guided,
    /// Work stealing between per-thread queues
    WorkStealing,
    /// Resolve from the `OMP_SCHEDULE` environment variable
    Runtime,
    /// A caller-supplied scheduler; requires an explicit chunk size
    Custom(Arc<dyn LoopScheduler>),
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Static => write!(f, "Static"),
            Schedule::Dynamic => write!(f, "Dynamic"),
            Schedule::Guided => write!(f, "Guided"),
            Schedule::WorkStealing => write!(f, "WorkStealing"),
            Schedule::Runtime => write!(f, "Runtime"),
            Schedule::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Default chunk size for a strategy over `n = end - start` iterations.
///
/// Static uses `ceil(n / T)` so every thread receives at most one chunk.
/// Dynamic and WorkStealing use `max(1, n / T / 32)`; Guided starts at 1 and
/// grows its chunks itself.
pub fn default_chunk(kind: ScheduleKind, start: i64, end: i64, num_threads: usize) -> u64 {
    let n = end.saturating_sub(start).max(0) as u64;
    let t = num_threads.max(1) as u64;
    match kind {
        ScheduleKind::Static => n.div_ceil(t).max(1),
        ScheduleKind::Dynamic | ScheduleKind::WorkStealing => (n / t / 32).max(1),
        ScheduleKind::Guided => 1,
    }
}

/// Resolved strategy for one loop: the scheduler instance, the effective
/// chunk size and the kind (None for user-supplied schedulers).
pub struct ResolvedSchedule {
    pub scheduler: Arc<dyn LoopScheduler>,
    pub chunk_size: u64,
    pub kind: Option<ScheduleKind>,
}

/// Turn a requested [`Schedule`] into a concrete scheduler instance.
///
/// `Runtime` consults [`ScheduleSpec::from_env`]; an explicit chunk from the
/// environment wins over the caller's. Custom schedulers must come with an
/// explicit chunk size.
pub fn resolve(
    schedule: &Schedule,
    chunk_size: Option<u64>,
    num_threads: usize,
    start: i64,
    end: i64,
) -> Result<ResolvedSchedule> {
    if let Schedule::Custom(scheduler) = schedule {
        let chunk_size = chunk_size.ok_or_else(|| {
            RuntimeError::invalid_args("custom schedulers require an explicit chunk size")
        })?;
        return Ok(ResolvedSchedule {
            scheduler: Arc::clone(scheduler),
            chunk_size,
            kind: None,
        });
    }

    let (kind, chunk_size) = match schedule {
        Schedule::Static => (ScheduleKind::Static, chunk_size),
        Schedule::Dynamic => (ScheduleKind::Dynamic, chunk_size),
        Schedule::Guided => (ScheduleKind::Guided, chunk_size),
        Schedule::WorkStealing => (ScheduleKind::WorkStealing, chunk_size),
        Schedule::Runtime => {
            let spec = ScheduleSpec::from_env();
            (spec.kind, spec.chunk.or(chunk_size))
        }
        Schedule::Custom(_) => unreachable!("handled above"),
    };

    let chunk_size =
        chunk_size.unwrap_or_else(|| default_chunk(kind, start, end, num_threads));
    if chunk_size == 0 {
        return Err(RuntimeError::invalid_args("chunk size must be positive"));
    }
    if chunk_size > i64::MAX as u64 {
        return Err(RuntimeError::invalid_args("chunk size exceeds i64 range"));
    }

    let scheduler: Arc<dyn LoopScheduler> = match kind {
        ScheduleKind::Static => Arc::new(StaticScheduler::new()),
        ScheduleKind::Dynamic => Arc::new(DynamicScheduler::new()),
        ScheduleKind::Guided => Arc::new(GuidedScheduler::new()),
        ScheduleKind::WorkStealing => Arc::new(WorkStealingScheduler::new()),
    };

    Ok(ResolvedSchedule {
        scheduler,
        chunk_size,
        kind: Some(kind),
    })
}
