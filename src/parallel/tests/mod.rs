//! Parallel façade单元测试

use crate::error::RuntimeError;
use crate::parallel::{wtime, Runtime};
use crate::schedule::Schedule;

#[cfg(test)]
mod runtime_settings_tests {
    use super::*;

    #[test]
    fn test_defaults_are_dynamic() {
        let rt = Runtime::new();
        assert!(rt.get_dynamic());
        assert_eq!(rt.max_threads(), Runtime::num_procs());
    }

    #[test]
    fn test_set_num_threads() {
        let rt = Runtime::new();
        rt.set_num_threads(3);
        assert!(!rt.get_dynamic());
        assert_eq!(rt.max_threads(), 3);
        rt.set_dynamic();
        assert!(rt.get_dynamic());
    }

    #[test]
    fn test_num_procs_positive() {
        assert!(Runtime::num_procs() >= 1);
    }

    #[test]
    fn test_nested_toggles() {
        let rt = Runtime::new();
        assert!(!rt.get_nested());
        assert_eq!(
            rt.set_nested(true),
            Err(RuntimeError::NotImplemented {
                feature: "nested parallelism".to_string()
            })
        );
    }

    #[test]
    fn test_wtime_advances() {
        let before = wtime();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let after = wtime();
        assert!(after > before);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let rt = Runtime::new();
        let result = rt.parallel_region(Some(0), |_w| Ok(()));
        assert!(matches!(result, Err(RuntimeError::InvalidArguments { .. })));
    }
}

#[cfg(test)]
mod region_tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn test_in_parallel_flag() {
        let rt = Runtime::new();
        assert!(!rt.in_parallel());
        rt.parallel_region(Some(2), |_w| {
            assert!(rt.in_parallel());
            Ok(())
        })
        .unwrap();
        assert!(!rt.in_parallel());
    }

    #[test]
    fn test_nested_region_rejected() {
        let rt = Runtime::new();
        let inner = parking_lot::Mutex::new(None);
        rt.parallel_region(Some(2), |w| {
            if w.thread_num() == 0 {
                *inner.lock() = Some(rt.parallel_region(Some(2), |_w| Ok(())));
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(
            inner.lock().take().unwrap(),
            Err(RuntimeError::NestedParallelism)
        );
    }

    #[test]
    fn test_regions_run_sequentially() {
        let rt = Runtime::new();
        let counter = AtomicI64::new(0);
        for _ in 0..3 {
            rt.parallel_region(Some(2), |_w| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_independent_runtimes_coexist() {
        let a = Runtime::new();
        let b = Runtime::new();
        a.parallel_region(Some(2), |w| {
            if w.thread_num() == 0 {
                b.parallel_region(Some(2), |_w| Ok(()))?;
            }
            Ok(())
        })
        .unwrap();
    }
}

#[cfg(test)]
mod wrapper_tests {
    use super::*;
    use crate::reduction::ReduceOp;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parallel_for() {
        let rt = Runtime::new();
        let sum = AtomicI64::new(0);
        rt.parallel_for(0, 100, Some(4), Schedule::Dynamic, Some(3), |i| {
            sum.fetch_add(i, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(sum.load(Ordering::SeqCst), 4950);
    }

    #[test]
    fn test_parallel_for_reduction_keeps_seed() {
        let rt = Runtime::new();
        let mut sum = 1000i64;
        rt.parallel_for_reduction(
            0,
            10,
            ReduceOp::Add,
            &mut sum,
            Some(4),
            Schedule::Static,
            None,
            |acc, i| *acc += i,
        )
        .unwrap();
        assert_eq!(sum, 1000 + 45);
    }

    #[test]
    fn test_parallel_sections_all_run() {
        let rt = Runtime::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let actions: Vec<crate::tasking::Job> = (0..6)
            .map(|_| {
                let hits = Arc::clone(&hits);
                Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }) as crate::tasking::Job
            })
            .collect();
        rt.parallel_sections(Some(3), actions).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_parallel_master_body_runs_once() {
        let rt = Runtime::new();
        let hits = AtomicUsize::new(0);
        rt.parallel_master(Some(4), |w| {
            assert_eq!(w.thread_num(), 0);
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parallel_master_taskloop() {
        let rt = Runtime::new();
        let sum = Arc::new(AtomicI64::new(0));
        {
            let sum = Arc::clone(&sum);
            rt.parallel_master_taskloop(0, 100, Some(4), Some(10), None, true, move |i| {
                sum.fetch_add(i, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(sum.load(Ordering::SeqCst), 4950);
    }
}
