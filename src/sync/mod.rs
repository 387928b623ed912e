//! Low-level synchronization primitives
//!
//! This module provides the two spin-based primitives the rest of the
//! runtime is built on:
//!
//! - [`SpinLock`] - a busy-waiting mutual-exclusion flag without ownership
//!   tracking
//! - [`SpinBarrier`] - a generation-counting barrier that can be poisoned
//!   so a failing worker releases its peers instead of deadlocking them

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Result, RuntimeError};

/// A spin lock over a single atomic flag.
///
/// There is no ownership tracking: any thread may call [`unset`](Self::unset)
/// regardless of which thread acquired the lock. Callers are responsible for
/// pairing acquisitions and releases.
///
/// ```
/// use bingxing::sync::SpinLock;
///
/// let lock = SpinLock::new();
/// lock.set();
/// assert!(!lock.test());
/// lock.unset();
/// assert!(lock.test());
/// lock.unset();
/// ```
#[derive(Debug, Default)]
pub struct SpinLock {
    flag: AtomicBool,
}

impl SpinLock {
    /// Create an unlocked lock
    pub fn new() -> Self {
        SpinLock {
            flag: AtomicBool::new(false),
        }
    }

    /// Acquire the lock, busy-waiting until it becomes free
    pub fn set(&self) {
        while self
            .flag
            .compare_exchange_weak(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    /// Release the lock unconditionally
    pub fn unset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Try to acquire the lock without blocking.
    ///
    /// Returns `true` if the lock was acquired by this call.
    pub fn test(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// A reusable spin barrier with poison support.
///
/// Workers call [`wait`](Self::wait) at synchronization points. When a worker
/// fails it calls [`poison`](Self::poison), which releases every thread
/// currently spinning at the barrier and makes all future waits fail with
/// [`RuntimeError::RegionPoisoned`].
#[derive(Debug)]
pub struct SpinBarrier {
    num_threads: usize,
    arrived: AtomicUsize,
    generation: AtomicUsize,
    poisoned: AtomicBool,
}

impl SpinBarrier {
    /// Create a barrier for `num_threads` participants
    pub fn new(num_threads: usize) -> Self {
        SpinBarrier {
            num_threads,
            arrived: AtomicUsize::new(0),
            generation: AtomicUsize::new(0),
            poisoned: AtomicBool::new(false),
        }
    }

    /// Number of participants
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Whether the barrier has been poisoned
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Poison the barrier, releasing all current and future waiters with an
    /// error. Idempotent.
    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
        // Bump the generation so spinning waiters wake up and observe the flag.
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Block until all participants have arrived.
    ///
    /// Returns an error if the barrier was poisoned before or during the wait.
    pub fn wait(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(RuntimeError::RegionPoisoned);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let arrived = self.arrived.fetch_add(1, Ordering::SeqCst) + 1;

        if arrived == self.num_threads {
            self.arrived.store(0, Ordering::SeqCst);
            self.generation.fetch_add(1, Ordering::SeqCst);
        } else {
            while self.generation.load(Ordering::SeqCst) == generation {
                if self.is_poisoned() {
                    return Err(RuntimeError::RegionPoisoned);
                }
                std::hint::spin_loop();
                std::thread::yield_now();
            }
        }

        if self.is_poisoned() {
            return Err(RuntimeError::RegionPoisoned);
        }
        Ok(())
    }
}
