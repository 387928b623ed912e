//! Built-in scheduling strategies
//!
//! Every strategy is created empty and armed by `loop_init`; a fresh
//! instance is built for each worksharing loop, so no state leaks between
//! loops. Cursors that are hammered by a single thread live in
//! `CachePadded` cells to keep them off shared cache lines.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use rand::Rng;

use crate::error::{Result, RuntimeError};
use crate::schedule::LoopScheduler;

fn overflow() -> RuntimeError {
    RuntimeError::internal("iteration cursor overflow")
}

/// Round-robin static partitioning.
///
/// Thread `t` owns chunks starting at `start + chunk * t`, advancing by
/// `chunk * num_threads` after each handout. The full assignment is
/// therefore determined at init time: iteration `i` belongs to thread
/// `((i - start) / chunk) % num_threads`.
#[derive(Debug, Default)]
pub struct StaticScheduler {
    end: AtomicI64,
    chunk: AtomicI64,
    advance: AtomicI64,
    cursors: RwLock<Vec<CachePadded<AtomicI64>>>,
}

impl StaticScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopScheduler for StaticScheduler {
    fn loop_init(&self, start: i64, end: i64, num_threads: usize, chunk_size: u64) -> Result<()> {
        let chunk = i64::try_from(chunk_size).map_err(|_| overflow())?;
        let advance = chunk
            .checked_mul(num_threads as i64)
            .ok_or_else(overflow)?;

        let mut cursors = Vec::with_capacity(num_threads);
        for t in 0..num_threads {
            let offset = chunk.checked_mul(t as i64).ok_or_else(overflow)?;
            let cursor = start.checked_add(offset).ok_or_else(overflow)?;
            cursors.push(CachePadded::new(AtomicI64::new(cursor)));
        }

        self.end.store(end, Ordering::SeqCst);
        self.chunk.store(chunk, Ordering::SeqCst);
        self.advance.store(advance, Ordering::SeqCst);
        *self.cursors.write() = cursors;
        Ok(())
    }

    fn loop_next(&self, thread_id: usize) -> Result<(i64, i64)> {
        let end = self.end.load(Ordering::SeqCst);
        let chunk = self.chunk.load(Ordering::SeqCst);
        let advance = self.advance.load(Ordering::SeqCst);

        let cursors = self.cursors.read();
        let cursor = cursors
            .get(thread_id)
            .ok_or_else(|| RuntimeError::internal("thread id out of range"))?;

        let chunk_start = cursor.load(Ordering::SeqCst);
        if chunk_start >= end {
            return Ok((end, end));
        }
        let chunk_end = chunk_start.checked_add(chunk).ok_or_else(overflow)?.min(end);
        let next = chunk_start.checked_add(advance).ok_or_else(overflow)?;
        cursor.store(next, Ordering::SeqCst);
        Ok((chunk_start, chunk_end))
    }
}

/// First-come-first-served chunks off a shared atomic cursor
#[derive(Debug, Default)]
pub struct DynamicScheduler {
    cursor: AtomicI64,
    end: AtomicI64,
    chunk: AtomicI64,
}

impl DynamicScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopScheduler for DynamicScheduler {
    fn loop_init(&self, start: i64, end: i64, _num_threads: usize, chunk_size: u64) -> Result<()> {
        let chunk = i64::try_from(chunk_size).map_err(|_| overflow())?;
        self.cursor.store(start, Ordering::SeqCst);
        self.end.store(end, Ordering::SeqCst);
        self.chunk.store(chunk, Ordering::SeqCst);
        Ok(())
    }

    fn loop_next(&self, _thread_id: usize) -> Result<(i64, i64)> {
        let end = self.end.load(Ordering::SeqCst);
        let chunk = self.chunk.load(Ordering::SeqCst);

        // Claim via compare-exchange so an overflowing advance is reported
        // instead of wrapping the cursor for later callers.
        let mut chunk_start = self.cursor.load(Ordering::SeqCst);
        loop {
            if chunk_start >= end {
                return Ok((end, end));
            }
            let next = chunk_start.checked_add(chunk).ok_or_else(overflow)?;
            match self.cursor.compare_exchange_weak(
                chunk_start,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok((chunk_start, next.min(end))),
                Err(actual) => chunk_start = actual,
            }
        }
    }
}

/// Guided scheduling: each handout takes `max(min_chunk, remaining / T)`
/// iterations, so chunks shrink as the loop drains
#[derive(Debug, Default)]
pub struct GuidedScheduler {
    cursor: Mutex<i64>,
    end: AtomicI64,
    min_chunk: AtomicI64,
    num_threads: AtomicUsize,
}

impl GuidedScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoopScheduler for GuidedScheduler {
    fn loop_init(&self, start: i64, end: i64, num_threads: usize, chunk_size: u64) -> Result<()> {
        let min_chunk = i64::try_from(chunk_size).map_err(|_| overflow())?;
        *self.cursor.lock() = start;
        self.end.store(end, Ordering::SeqCst);
        self.min_chunk.store(min_chunk, Ordering::SeqCst);
        self.num_threads.store(num_threads.max(1), Ordering::SeqCst);
        Ok(())
    }

    fn loop_next(&self, _thread_id: usize) -> Result<(i64, i64)> {
        let end = self.end.load(Ordering::SeqCst);
        let min_chunk = self.min_chunk.load(Ordering::SeqCst);
        let num_threads = self.num_threads.load(Ordering::SeqCst) as i64;

        let mut cursor = self.cursor.lock();
        let chunk_start = *cursor;
        let remaining = end - chunk_start;
        if remaining <= 0 {
            return Ok((end, end));
        }
        let chunk = (remaining / num_threads).max(min_chunk);
        *cursor = chunk_start.checked_add(chunk).ok_or_else(overflow)?;
        drop(cursor);

        Ok((chunk_start, (chunk_start + chunk).min(end)))
    }
}

/// One thread's slice of the iteration space
#[derive(Debug, Default)]
struct StealQueue {
    /// Remaining `[start, end)` owned by this thread
    range: Mutex<(i64, i64)>,
    /// Cleared by the owner once its range drains; set again after a
    /// successful steal
    has_work: AtomicBool,
}

/// Work-stealing scheduling.
///
/// The iteration space is split into contiguous per-thread queues. A thread
/// whose queue drains picks a random victim and steals half of the victim's
/// remaining range. The loop is over once no queue holds work.
#[derive(Debug, Default)]
pub struct WorkStealingScheduler {
    queues: RwLock<Vec<CachePadded<StealQueue>>>,
    chunk: AtomicI64,
    threads_with_work: AtomicUsize,
}

impl WorkStealingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move half of a random victim's remainder into `thread_id`'s queue.
    /// Returns false when no work was found at the chosen victim.
    fn steal(&self, queues: &[CachePadded<StealQueue>], thread_id: usize) -> bool {
        if queues.len() <= 1 {
            return false;
        }
        let victim = rand::rng().random_range(0..queues.len());
        if victim == thread_id {
            return false;
        }

        let stolen = {
            let mut range = queues[victim].range.lock();
            let (start, end) = *range;
            if start >= end {
                return false;
            }
            let half = (end - start + 1) / 2;
            let split = start + half;
            range.0 = split;
            (start, split)
        };

        *queues[thread_id].range.lock() = stolen;
        true
    }
}

impl LoopScheduler for WorkStealingScheduler {
    fn loop_init(&self, start: i64, end: i64, num_threads: usize, chunk_size: u64) -> Result<()> {
        let chunk = i64::try_from(chunk_size).map_err(|_| overflow())?;
        let n = end.saturating_sub(start).max(0);
        let per_thread = n / num_threads.max(1) as i64;

        let mut queues = Vec::with_capacity(num_threads);
        let mut cursor = start;
        for t in 0..num_threads {
            let queue_end = if t + 1 == num_threads {
                end
            } else {
                cursor + per_thread
            };
            let queue = StealQueue {
                range: Mutex::new((cursor, queue_end)),
                has_work: AtomicBool::new(cursor < queue_end),
            };
            queues.push(CachePadded::new(queue));
            cursor = queue_end;
        }

        let busy = queues
            .iter()
            .filter(|q| q.has_work.load(Ordering::SeqCst))
            .count();
        self.chunk.store(chunk, Ordering::SeqCst);
        self.threads_with_work.store(busy, Ordering::SeqCst);
        *self.queues.write() = queues;
        Ok(())
    }

    fn loop_next(&self, thread_id: usize) -> Result<(i64, i64)> {
        let chunk = self.chunk.load(Ordering::SeqCst);
        let queues = self.queues.read();
        if thread_id >= queues.len() {
            return Err(RuntimeError::internal("thread id out of range"));
        }

        loop {
            {
                let mut range = queues[thread_id].range.lock();
                let (start, end) = *range;
                if start < end {
                    let chunk_end = start.checked_add(chunk).ok_or_else(overflow)?.min(end);
                    range.0 = chunk_end;
                    return Ok((start, chunk_end));
                }
            }

            if queues[thread_id].has_work.swap(false, Ordering::SeqCst) {
                self.threads_with_work.fetch_sub(1, Ordering::SeqCst);
            }

            if self.steal(&queues, thread_id) {
                if !queues[thread_id].has_work.swap(true, Ordering::SeqCst) {
                    self.threads_with_work.fetch_add(1, Ordering::SeqCst);
                }
                continue;
            }

            if self.threads_with_work.load(Ordering::SeqCst) == 0 {
                return Ok((0, 0));
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }
}
