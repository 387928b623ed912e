//! Parallel-region lifecycle
//!
//! [`Region::fork`] spawns one OS thread per requested worker, runs the
//! region body on each, performs the implicit taskwait, and joins. All
//! shared state hangs off an `Arc<Region>` handed to every worker; there
//! are no process-wide singletons, so independent runtimes coexist in one
//! process.
//!
//! Failure handling: a worker body that returns `Err` or panics poisons the
//! region barrier, which releases every peer currently blocked at a
//! synchronization point with [`RuntimeError::RegionPoisoned`]. The first
//! real error (or the panic payload) is re-raised on the forking thread
//! after the join.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::sync::SpinBarrier;
use crate::tasking::{Job, TaskPool};
use crate::workshare::WorkShare;

/// Shared state of one live parallel region
pub struct Region {
    num_threads: usize,
    pub(crate) barrier: SpinBarrier,
    pub(crate) tasking: TaskPool,
    /// The in-flight worksharing loop, if any (at most one per region)
    pub(crate) workshare: RwLock<Option<Arc<WorkShare>>>,
    /// Named critical sections, allocated lazily and reused for the
    /// region's lifetime
    pub(crate) criticals: Mutex<HashMap<usize, Arc<Mutex<()>>>>,
    /// Single sections: id -> thread that claimed it first
    pub(crate) singles: Mutex<HashMap<usize, usize>>,
    /// Ordered sections: id -> next iteration allowed to run
    pub(crate) ordered: Mutex<HashMap<usize, Arc<AtomicI64>>>,
    /// Section bag published by the leader of a `sections` construct
    pub(crate) sections: Mutex<Option<Arc<SegQueue<Job>>>>,
    /// Per-thread flag: inside a worksharing loop body
    pub(crate) in_for: Vec<AtomicBool>,
    /// Per-thread current iteration, read by `ordered`
    pub(crate) working_iters: Vec<CachePadded<AtomicI64>>,
    active: AtomicBool,
    first_error: Mutex<Option<RuntimeError>>,
    panic_payload: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Region {
    fn new(num_threads: usize) -> Self {
        Region {
            num_threads,
            barrier: SpinBarrier::new(num_threads),
            tasking: TaskPool::new(),
            workshare: RwLock::new(None),
            criticals: Mutex::new(HashMap::new()),
            singles: Mutex::new(HashMap::new()),
            ordered: Mutex::new(HashMap::new()),
            sections: Mutex::new(None),
            in_for: (0..num_threads).map(|_| AtomicBool::new(false)).collect(),
            working_iters: (0..num_threads)
                .map(|_| CachePadded::new(AtomicI64::new(0)))
                .collect(),
            active: AtomicBool::new(false),
            first_error: Mutex::new(None),
            panic_payload: Mutex::new(None),
        }
    }

    /// Number of workers in this region
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Whether the region is still running
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Keep the first real error; `RegionPoisoned` never displaces it
    pub(crate) fn record_error(&self, err: RuntimeError) {
        let mut slot = self.first_error.lock();
        let replace = match slot.as_ref() {
            None => true,
            Some(RuntimeError::RegionPoisoned) => err != RuntimeError::RegionPoisoned,
            Some(_) => false,
        };
        if replace {
            *slot = Some(err);
        }
    }

    fn record_panic(&self, payload: Box<dyn Any + Send>) {
        let mut slot = self.panic_payload.lock();
        if slot.is_none() {
            *slot = Some(payload);
        }
    }

    /// Spawn `num_threads` workers running `body`, join them, and surface
    /// the first failure.
    pub(crate) fn fork<F>(num_threads: usize, body: &F) -> Result<()>
    where
        F: Fn(&Worker) -> Result<()> + Send + Sync,
    {
        let region = Arc::new(Region::new(num_threads));
        debug!("forking parallel region with {} threads", num_threads);
        region.active.store(true, Ordering::SeqCst);

        std::thread::scope(|scope| {
            for thread_num in 0..num_threads {
                let region = Arc::clone(&region);
                std::thread::Builder::new()
                    .name(format!("bingxing-worker-{thread_num}"))
                    .spawn_scoped(scope, move || worker_main(region, thread_num, body))
                    .expect("Failed to spawn worker thread");
            }
        });

        region.active.store(false, Ordering::SeqCst);
        debug!("joined parallel region");

        if let Some(payload) = region.panic_payload.lock().take() {
            std::panic::resume_unwind(payload);
        }
        // Taken out of the guard before the match so the lock is released
        // before `region` drops.
        let first_error = region.first_error.lock().take();
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("num_threads", &self.num_threads)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn worker_main<F>(region: Arc<Region>, thread_num: usize, body: &F)
where
    F: Fn(&Worker) -> Result<()> + Send + Sync,
{
    let worker = Worker {
        region: Arc::clone(&region),
        thread_num,
    };
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        body(&worker)?;
        // Implicit taskwait: the region does not end until the task graph
        // has drained.
        worker.taskwait()
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            region.record_error(err);
            region.barrier.poison();
        }
        Err(payload) => {
            region.record_panic(payload);
            region.barrier.poison();
        }
    }
}

/// Per-thread context handed to a region body.
///
/// All coordination primitives live on this handle; cloning it is cheap. A
/// clone that outlives its region reports
/// [`RuntimeError::NotInParallelRegion`] from every coordination primitive;
/// the plain [`thread_num`](Self::thread_num) and
/// [`num_threads`](Self::num_threads) queries keep answering from the
/// region's recorded values.
#[derive(Debug, Clone)]
pub struct Worker {
    pub(crate) region: Arc<Region>,
    pub(crate) thread_num: usize,
}

impl Worker {
    /// This worker's id, `0..num_threads`
    #[inline]
    pub fn thread_num(&self) -> usize {
        self.thread_num
    }

    /// Number of workers in the surrounding region
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.region.num_threads()
    }

    pub(crate) fn region(&self) -> &Region {
        &self.region
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.region.is_active() {
            Ok(())
        } else {
            Err(RuntimeError::NotInParallelRegion)
        }
    }

    /// Block until every worker in the region has arrived
    pub fn barrier(&self) -> Result<()> {
        self.ensure_active()?;
        self.region.barrier.wait()
    }

    /// Run `action` on thread 0 only. No implied synchronization.
    pub fn master<F, R>(&self, action: F) -> Result<Option<R>>
    where
        F: FnOnce() -> R,
    {
        self.ensure_active()?;
        if self.thread_num == 0 {
            Ok(Some(action()))
        } else {
            Ok(None)
        }
    }

    /// Cooperatively drain the task graph.
    ///
    /// Every worker pulls and executes ready tasks until all workers are
    /// simultaneously idle; the leader then resets the graph so the pool
    /// can be reused, and a closing barrier lines everyone up.
    pub fn taskwait(&self) -> Result<()> {
        self.ensure_active()?;
        let region = self.region();

        self.master(|| region.tasking.clear_idle())?;
        self.barrier()?;

        let mut idle = false;
        loop {
            if let Some((id, job)) = region.tasking.try_next() {
                if idle {
                    idle = false;
                    region.tasking.mark_busy();
                }
                job();
                region.tasking.complete(id);
            } else if !idle {
                idle = true;
                region.tasking.mark_idle();
            }

            if region.tasking.idle_count() >= region.num_threads() {
                break;
            }
            if region.barrier.is_poisoned() {
                return Err(RuntimeError::RegionPoisoned);
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }

        self.barrier()?;
        self.master(|| region.tasking.reset())?;
        self.barrier()?;
        Ok(())
    }
}
