//! Worksharing loops and coordination primitives, end to end

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use bingxing::{Runtime, Schedule, ScheduleKind};

fn coverage_loop(schedule: Schedule, chunk: Option<u64>) {
    let rt = Runtime::new();
    let counts: Vec<AtomicU32> = (0..1000).map(|_| AtomicU32::new(0)).collect();
    rt.parallel_region(Some(4), |w| {
        w.for_each(0, 1000, schedule.clone(), chunk, |i| {
            counts[i as usize].fetch_add(1, Ordering::SeqCst);
        })
    })
    .unwrap();
    assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
}

#[test]
fn every_schedule_covers_the_iteration_space_exactly_once() {
    coverage_loop(Schedule::Static, None);
    coverage_loop(Schedule::Static, Some(7));
    coverage_loop(Schedule::Dynamic, None);
    coverage_loop(Schedule::Dynamic, Some(3));
    coverage_loop(Schedule::Guided, Some(2));
    coverage_loop(Schedule::WorkStealing, Some(5));
}

#[test]
fn consecutive_loops_in_one_region() {
    let rt = Runtime::new();
    let sum = AtomicI64::new(0);
    rt.parallel_region(Some(4), |w| {
        w.for_each(0, 100, Schedule::Static, None, |i| {
            sum.fetch_add(i, Ordering::SeqCst);
        })?;
        w.for_each(0, 100, Schedule::Dynamic, Some(4), |i| {
            sum.fetch_add(i, Ordering::SeqCst);
        })
    })
    .unwrap();
    assert_eq!(sum.load(Ordering::SeqCst), 2 * 4950);
}

#[test]
fn collapse2_covers_a_rectangle_exactly_once() {
    let ranges = [(258i64, 512i64), (512i64, 600i64)];
    let rows = (ranges[0].1 - ranges[0].0) as usize;
    let cols = (ranges[1].1 - ranges[1].0) as usize;
    let grid: Arc<Vec<AtomicU32>> =
        Arc::new((0..rows * cols).map(|_| AtomicU32::new(0)).collect());

    let rt = Runtime::new();
    rt.parallel_region(Some(4), |w| {
        let grid = Arc::clone(&grid);
        w.for_collapse2(ranges, Schedule::Dynamic, None, move |i, j| {
            let row = (i - 258) as usize;
            let col = (j - 512) as usize;
            grid[row * cols + col].fetch_add(1, Ordering::SeqCst);
        })
    })
    .unwrap();

    assert!(grid.iter().all(|c| c.load(Ordering::SeqCst) == 1));
}

#[test]
fn collapse3_matches_nested_loops() {
    let rt = Runtime::new();
    let sum = AtomicI64::new(0);
    rt.parallel_region(Some(3), |w| {
        w.for_collapse3(
            [(0, 4), (1, 5), (2, 6)],
            Schedule::Static,
            None,
            |i, j, k| {
                sum.fetch_add(i * 100 + j * 10 + k, Ordering::SeqCst);
            },
        )
    })
    .unwrap();

    let mut expected = 0i64;
    for i in 0..4 {
        for j in 1..5 {
            for k in 2..6 {
                expected += i * 100 + j * 10 + k;
            }
        }
    }
    assert_eq!(sum.load(Ordering::SeqCst), expected);
}

#[test]
fn collapse_n_covers_four_dimensions() {
    let rt = Runtime::new();
    let count = AtomicUsize::new(0);
    rt.parallel_region(Some(4), |w| {
        w.for_collapse_n(
            &[(0, 3), (0, 4), (0, 5), (0, 2)],
            Schedule::Dynamic,
            Some(4),
            |indices| {
                assert_eq!(indices.len(), 4);
                count.fetch_add(1, Ordering::SeqCst);
            },
        )
    })
    .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3 * 4 * 5 * 2);
}

#[test]
fn ordered_sections_run_in_iteration_order() {
    let rt = Runtime::new();
    let log = parking_lot::Mutex::new(Vec::new());
    rt.parallel_region(Some(4), |w| {
        w.for_each(0, 100, Schedule::Dynamic, Some(1), |i| {
            w.ordered(0, || log.lock().push(i)).unwrap();
        })
    })
    .unwrap();
    assert_eq!(*log.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn single_runs_exactly_once() {
    let rt = Runtime::new();
    let hits = AtomicUsize::new(0);
    rt.parallel_region(Some(4), |w| {
        w.single(0, || {
            hits.fetch_add(1, Ordering::SeqCst);
        })?;
        w.single(1, || {
            hits.fetch_add(10, Ordering::SeqCst);
        })
    })
    .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 11);
}

#[test]
fn critical_sections_are_mutually_exclusive() {
    let rt = Runtime::new();
    let counter = AtomicI64::new(0);
    rt.parallel_region(Some(4), |w| {
        for _ in 0..250 {
            w.critical(0, || {
                // Split read-modify-write; only correct under mutual exclusion.
                let value = counter.load(Ordering::Relaxed);
                std::hint::spin_loop();
                counter.store(value + 1, Ordering::Relaxed);
            })?;
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
}

#[test]
fn sections_each_run_once() {
    let rt = Runtime::new();
    let hits: Arc<Vec<AtomicU32>> = Arc::new((0..8).map(|_| AtomicU32::new(0)).collect());
    rt.parallel_region(Some(4), |w| {
        let actions: Vec<bingxing::tasking::Job> = (0..8)
            .map(|section| {
                let hits = Arc::clone(&hits);
                Box::new(move || {
                    hits[section].fetch_add(1, Ordering::SeqCst);
                }) as bingxing::tasking::Job
            })
            .collect();
        w.sections(actions)
    })
    .unwrap();
    assert!(hits.iter().all(|c| c.load(Ordering::SeqCst) == 1));
}

#[test]
fn schedule_introspection_inside_a_loop() {
    let rt = Runtime::new();
    rt.parallel_region(Some(2), |w| {
        assert_eq!(w.schedule(), None);
        // Without this barrier the leader may publish the work share while
        // a peer is still at the assertion above.
        w.barrier()?;
        w.for_each(0, 64, Schedule::Dynamic, Some(4), |_i| {
            assert_eq!(w.schedule(), Some(ScheduleKind::Dynamic));
            assert_eq!(w.chunk_size(), Some(4));
        })?;
        assert_eq!(w.schedule(), None);
        Ok(())
    })
    .unwrap();
}

#[test]
fn runtime_schedule_reads_environment() {
    // Env mutation is process-global; this is the only test touching it.
    std::env::set_var("OMP_SCHEDULE", "guided,2");
    let rt = Runtime::new();
    let count = AtomicUsize::new(0);
    let result = rt.parallel_region(Some(2), |w| {
        w.for_each(0, 100, Schedule::Runtime, None, |_i| {
            count.fetch_add(1, Ordering::SeqCst);
            assert_eq!(w.schedule(), Some(ScheduleKind::Guided));
            assert_eq!(w.chunk_size(), Some(2));
        })
    });
    std::env::remove_var("OMP_SCHEDULE");
    result.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 100);
}
