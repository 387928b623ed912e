//! Worksharing and coordination primitives on the [`Worker`] handle
//!
//! The lifecycle methods (`barrier`, `master`, `taskwait`) live with the
//! region itself; everything a region body calls to share work between
//! threads is implemented here.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::dag::TaskUuid;
use crate::error::{Result, RuntimeError};
use crate::reduction::{Reduce, ReduceOp};
use crate::region::Worker;
use crate::schedule::{self, Schedule, ScheduleKind};
use crate::tasking::Job;
use crate::workshare::{body::flatten_total, ForBody, WorkShare};

fn validate_bounds(start: i64, end: i64) -> Result<()> {
    if start < 0 || end < 0 {
        return Err(RuntimeError::invalid_args("loop bounds must be non-negative"));
    }
    if end < start {
        return Err(RuntimeError::invalid_args("loop end precedes loop start"));
    }
    Ok(())
}

fn nested(context: &str) -> RuntimeError {
    RuntimeError::NestedWorksharing {
        context: context.to_string(),
    }
}

impl Worker {
    /// Execute `action` under the mutual-exclusion lock named `id`.
    ///
    /// Critical locks are allocated lazily on first use and live for the
    /// rest of the region.
    pub fn critical<F, R>(&self, id: usize, action: F) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        self.ensure_active()?;
        let lock = Arc::clone(self.region().criticals.lock().entry(id).or_default());
        let _guard = lock.lock();
        Ok(action())
    }

    /// Run `action` on exactly one thread: the first to claim `id`.
    /// Concludes with a barrier.
    pub fn single<F>(&self, id: usize, action: F) -> Result<()>
    where
        F: FnOnce(),
    {
        self.ensure_active()?;
        let tid = self.thread_num();
        if self.region().in_for[tid].load(Ordering::SeqCst) {
            return Err(nested("single inside an active worksharing loop"));
        }
        let owner = *self.region().singles.lock().entry(id).or_insert(tid);
        if owner == tid {
            action();
        }
        self.barrier()
    }

    /// Run `action` for the current iteration once all earlier iterations
    /// have passed through the ordered section named `id`.
    ///
    /// Only meaningful inside a worksharing loop body; calling it anywhere
    /// else fails with [`RuntimeError::OrderedOutsideLoop`].
    pub fn ordered<F>(&self, id: usize, action: F) -> Result<()>
    where
        F: FnOnce(),
    {
        self.ensure_active()?;
        let region = self.region();
        let tid = self.thread_num();
        if !region.in_for[tid].load(Ordering::SeqCst) {
            return Err(RuntimeError::OrderedOutsideLoop);
        }
        let loop_start = region
            .workshare
            .read()
            .as_ref()
            .map(|ws| ws.start)
            .ok_or(RuntimeError::OrderedOutsideLoop)?;

        let counter = Arc::clone(
            region
                .ordered
                .lock()
                .entry(id)
                .or_insert_with(|| Arc::new(std::sync::atomic::AtomicI64::new(loop_start))),
        );

        let my_iter = region.working_iters[tid].load(Ordering::SeqCst);
        while counter.load(Ordering::SeqCst) != my_iter {
            if region.barrier.is_poisoned() {
                return Err(RuntimeError::RegionPoisoned);
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
        action();
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Distribute independent section bodies across the region's workers.
    ///
    /// Every worker calls this with its (identical) section list; the
    /// leader's list is the one executed, each section exactly once by
    /// whichever worker pops it. Concludes with a barrier.
    pub fn sections(&self, actions: Vec<Job>) -> Result<()> {
        self.ensure_active()?;
        let region = self.region();
        let tid = self.thread_num();
        if region.in_for[tid].load(Ordering::SeqCst) {
            return Err(nested("sections inside an active worksharing loop"));
        }

        if tid == 0 {
            let bag = Arc::new(crossbeam::queue::SegQueue::new());
            for action in actions {
                bag.push(action);
            }
            *region.sections.lock() = Some(bag);
        }
        self.barrier()?;

        let bag = region
            .sections
            .lock()
            .clone()
            .ok_or_else(|| RuntimeError::internal("section bag missing"))?;
        while let Some(job) = bag.pop() {
            job();
        }
        self.barrier()
    }

    /// Schedule kind of the loop currently in flight, if any.
    /// `None` also for custom schedulers, which have no kind.
    pub fn schedule(&self) -> Option<ScheduleKind> {
        self.region().workshare.read().as_ref().and_then(|ws| ws.kind)
    }

    /// Chunk size of the loop currently in flight, if any
    pub fn chunk_size(&self) -> Option<u64> {
        self.region().workshare.read().as_ref().map(|ws| ws.chunk_size)
    }

    /// Worksharing loop over `[start, end)`
    pub fn for_each<F>(
        &self,
        start: i64,
        end: i64,
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        F: Fn(i64),
    {
        validate_bounds(start, end)?;
        self.perform_loop::<i64>(
            start,
            end,
            schedule,
            chunk_size,
            None,
            ForBody::plain(&body),
            None,
        )
    }

    /// Worksharing reduction loop; thread 0 folds every worker's
    /// accumulator into `reduce_to` at the closing barrier
    #[allow(clippy::too_many_arguments)]
    pub fn for_reduction<T, F>(
        &self,
        start: i64,
        end: i64,
        op: ReduceOp,
        reduce_to: &mut T,
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        T: Reduce,
        F: Fn(&mut T, i64),
    {
        validate_bounds(start, end)?;
        self.perform_loop(
            start,
            end,
            schedule,
            chunk_size,
            Some(op),
            ForBody::reduction(&body),
            Some(reduce_to),
        )
    }

    /// Two collapsed loop dimensions scheduled as one linear space
    pub fn for_collapse2<F>(
        &self,
        ranges: [(i64, i64); 2],
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        F: Fn(i64, i64),
    {
        for (start, end) in ranges {
            validate_bounds(start, end)?;
        }
        let total = flatten_total(&ranges)?;
        self.perform_loop::<i64>(
            0,
            total,
            schedule,
            chunk_size,
            None,
            ForBody::collapse2(&body, ranges),
            None,
        )
    }

    /// Three collapsed loop dimensions
    pub fn for_collapse3<F>(
        &self,
        ranges: [(i64, i64); 3],
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        F: Fn(i64, i64, i64),
    {
        for (start, end) in ranges {
            validate_bounds(start, end)?;
        }
        let total = flatten_total(&ranges)?;
        self.perform_loop::<i64>(
            0,
            total,
            schedule,
            chunk_size,
            None,
            ForBody::collapse3(&body, ranges),
            None,
        )
    }

    /// Arbitrarily many collapsed loop dimensions
    pub fn for_collapse_n<F>(
        &self,
        ranges: &[(i64, i64)],
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        F: Fn(&[i64]),
    {
        if ranges.is_empty() {
            return Err(RuntimeError::invalid_args("collapse needs at least one range"));
        }
        for &(start, end) in ranges {
            validate_bounds(start, end)?;
        }
        let total = flatten_total(ranges)?;
        self.perform_loop::<i64>(
            0,
            total,
            schedule,
            chunk_size,
            None,
            ForBody::collapse_n(&body, ranges),
            None,
        )
    }

    /// Collapsed 2-D reduction loop
    #[allow(clippy::too_many_arguments)]
    pub fn for_reduction_collapse2<T, F>(
        &self,
        ranges: [(i64, i64); 2],
        op: ReduceOp,
        reduce_to: &mut T,
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        T: Reduce,
        F: Fn(&mut T, i64, i64),
    {
        for (start, end) in ranges {
            validate_bounds(start, end)?;
        }
        let total = flatten_total(&ranges)?;
        self.perform_loop(
            0,
            total,
            schedule,
            chunk_size,
            Some(op),
            ForBody::reduction_collapse2(&body, ranges),
            Some(reduce_to),
        )
    }

    /// Collapsed 3-D reduction loop
    #[allow(clippy::too_many_arguments)]
    pub fn for_reduction_collapse3<T, F>(
        &self,
        ranges: [(i64, i64); 3],
        op: ReduceOp,
        reduce_to: &mut T,
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        T: Reduce,
        F: Fn(&mut T, i64, i64, i64),
    {
        for (start, end) in ranges {
            validate_bounds(start, end)?;
        }
        let total = flatten_total(&ranges)?;
        self.perform_loop(
            0,
            total,
            schedule,
            chunk_size,
            Some(op),
            ForBody::reduction_collapse3(&body, ranges),
            Some(reduce_to),
        )
    }

    /// Collapsed N-D reduction loop
    #[allow(clippy::too_many_arguments)]
    pub fn for_reduction_collapse_n<T, F>(
        &self,
        ranges: &[(i64, i64)],
        op: ReduceOp,
        reduce_to: &mut T,
        schedule: Schedule,
        chunk_size: Option<u64>,
        body: F,
    ) -> Result<()>
    where
        T: Reduce,
        F: Fn(&mut T, &[i64]),
    {
        if ranges.is_empty() {
            return Err(RuntimeError::invalid_args("collapse needs at least one range"));
        }
        for &(start, end) in ranges {
            validate_bounds(start, end)?;
        }
        let total = flatten_total(ranges)?;
        self.perform_loop(
            0,
            total,
            schedule,
            chunk_size,
            Some(op),
            ForBody::reduction_collapse_n(&body, ranges),
            Some(reduce_to),
        )
    }

    /// Enqueue a task that runs during the next `taskwait` (or the implicit
    /// one at region end) once its dependencies have completed
    pub fn task<F>(&self, depends_on: &[TaskUuid], action: F) -> Result<TaskUuid>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_active()?;
        Ok(self.region().tasking.enqueue(action, depends_on))
    }

    /// Split `[start, end)` into task slices and enqueue them.
    ///
    /// `num_tasks` wins over `grainsize` when both are given; with neither,
    /// the grain defaults to `max(1, n / num_threads / 32)`. With
    /// `only_if == false` the loop runs inline and no handles are returned.
    #[allow(clippy::too_many_arguments)]
    pub fn taskloop<F>(
        &self,
        start: i64,
        end: i64,
        grainsize: Option<u64>,
        num_tasks: Option<u64>,
        only_if: bool,
        depends_on: &[TaskUuid],
        action: F,
    ) -> Result<Vec<TaskUuid>>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.ensure_active()?;
        validate_bounds(start, end)?;
        if grainsize == Some(0) || num_tasks == Some(0) {
            return Err(RuntimeError::invalid_args(
                "taskloop grainsize and num_tasks must be positive",
            ));
        }

        if !only_if {
            for i in start..end {
                action(i);
            }
            return Ok(Vec::new());
        }

        let n = (end - start) as u64;
        let grain = match (num_tasks, grainsize) {
            (Some(tasks), _) => (n / tasks).max(1),
            (None, Some(grain)) => grain,
            (None, None) => (n / self.num_threads() as u64 / 32).max(1),
        };
        let grain = grain.min(i64::MAX as u64) as i64;

        let action = Arc::new(action);
        let mut handles = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let slice_end = cursor.saturating_add(grain).min(end);
            handles.push(self.region().tasking.enqueue_loop_slice(
                cursor,
                slice_end,
                Arc::clone(&action),
                depends_on,
            ));
            cursor = slice_end;
        }
        Ok(handles)
    }

    /// `taskloop` gated on the master thread: only thread 0 enqueues
    pub fn master_taskloop<F>(
        &self,
        start: i64,
        end: i64,
        grainsize: Option<u64>,
        num_tasks: Option<u64>,
        only_if: bool,
        depends_on: &[TaskUuid],
        action: F,
    ) -> Result<()>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        if let Some(result) = self.master(|| {
            self.taskloop(start, end, grainsize, num_tasks, only_if, depends_on, action)
        })? {
            result?;
        }
        Ok(())
    }

    /// Common driver for every worksharing loop shape
    fn perform_loop<T: Reduce>(
        &self,
        start: i64,
        end: i64,
        schedule: Schedule,
        chunk_size: Option<u64>,
        op: Option<ReduceOp>,
        body: ForBody<'_, T>,
        mut reduce_to: Option<&mut T>,
    ) -> Result<()> {
        self.ensure_active()?;
        let region = self.region();
        let tid = self.thread_num();

        if region.in_for[tid].load(Ordering::SeqCst) {
            return Err(nested("worksharing loop inside an active loop"));
        }
        if chunk_size == Some(0) {
            return Err(RuntimeError::invalid_args("chunk size must be positive"));
        }
        if let Some(op) = op {
            if T::identity(op).is_none() {
                return Err(RuntimeError::invalid_args(
                    "reduction operation not supported for this element type",
                ));
            }
        }

        // The leader resolves the schedule, arms the scheduler, and
        // publishes the shared record; everyone else picks it up after the
        // opening barrier.
        let leader = self.master(|| -> Result<()> {
            let resolved =
                schedule::resolve(&schedule, chunk_size, region.num_threads(), start, end)?;
            resolved
                .scheduler
                .loop_init(start, end, region.num_threads(), resolved.chunk_size)?;
            *region.workshare.write() = Some(Arc::new(WorkShare::new(
                start,
                end,
                resolved.chunk_size,
                resolved.kind,
                resolved.scheduler,
                op,
            )));
            Ok(())
        })?;
        if let Some(Err(err)) = leader {
            region.barrier.poison();
            return Err(err);
        }
        self.barrier()?;

        let ws = region
            .workshare
            .read()
            .clone()
            .ok_or_else(|| RuntimeError::internal("work share missing at loop start"))?;

        region.in_for[tid].store(true, Ordering::SeqCst);
        let mut local = op.and_then(T::identity).unwrap_or_default();
        let run = (|| -> Result<()> {
            loop {
                let (chunk_start, chunk_end) = ws.scheduler.loop_next(tid)?;
                if chunk_start >= chunk_end {
                    break;
                }
                body.run_chunk(
                    &region.working_iters[tid],
                    chunk_start,
                    chunk_end,
                    &mut local,
                );
            }
            Ok(())
        })();
        region.in_for[tid].store(false, Ordering::SeqCst);

        if let Err(err) = run {
            region.barrier.poison();
            return Err(err);
        }
        if body.is_reduction() {
            if let Err(err) = ws.push_local(local) {
                region.barrier.poison();
                return Err(err);
            }
        }
        self.barrier()?;

        if tid == 0 {
            if let (Some(op), Some(target)) = (op, reduce_to.as_deref_mut()) {
                for value in ws.take_locals::<T>() {
                    *target = T::combine(op, *target, value);
                }
            }
            region.ordered.lock().clear();
            *region.workshare.write() = None;
        }
        self.barrier()?;
        Ok(())
    }
}
