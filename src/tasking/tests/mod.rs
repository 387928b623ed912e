//! Tasking 模块单元测试

use crate::tasking::TaskPool;

#[cfg(test)]
mod pool_tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Drain the pool on the current thread
    fn drain(pool: &TaskPool) {
        while let Some((id, job)) = pool.try_next() {
            job();
            pool.complete(id);
        }
    }

    #[test]
    fn test_enqueue_and_drain() {
        let pool = TaskPool::new();
        let counter = Arc::new(AtomicI64::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.enqueue(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                &[],
            );
        }
        assert_eq!(pool.remaining(), 5);
        drain(&pool);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn test_dependencies_order_execution() {
        let pool = TaskPool::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = {
            let log = Arc::clone(&log);
            pool.enqueue(move || log.lock().push("first"), &[])
        };
        let _second = {
            let log = Arc::clone(&log);
            pool.enqueue(move || log.lock().push("second"), &[first])
        };

        drain(&pool);
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(pool.is_complete(first));
    }

    #[test]
    fn test_loop_slice() {
        let pool = TaskPool::new();
        let sum = Arc::new(AtomicI64::new(0));
        let action = {
            let sum = Arc::clone(&sum);
            Arc::new(move |i: i64| {
                sum.fetch_add(i, Ordering::SeqCst);
            })
        };
        pool.enqueue_loop_slice(0, 10, Arc::clone(&action), &[]);
        pool.enqueue_loop_slice(10, 20, action, &[]);

        drain(&pool);
        assert_eq!(sum.load(Ordering::SeqCst), (0..20).sum::<i64>());
    }

    #[test]
    fn test_reset_allows_reuse() {
        let pool = TaskPool::new();
        pool.enqueue(|| {}, &[]);
        drain(&pool);
        pool.reset();

        let counter = Arc::new(AtomicI64::new(0));
        {
            let counter = Arc::clone(&counter);
            pool.enqueue(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                &[],
            );
        }
        drain(&pool);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_idle_counter_protocol() {
        let pool = TaskPool::new();
        pool.clear_idle();
        assert_eq!(pool.idle_count(), 0);
        pool.mark_idle();
        pool.mark_idle();
        assert_eq!(pool.idle_count(), 2);
        pool.mark_busy();
        assert_eq!(pool.idle_count(), 1);
        pool.clear_idle();
        assert_eq!(pool.idle_count(), 0);
    }
}
