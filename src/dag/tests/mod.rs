//! DAG 模块单元测试
//!
//! Dependency ordering, at-most-once hand-out, and the completed-dependency
//! edge cases.

use crate::dag::{DependencyGraph, TaskUuid, TaskUuidGenerator};

#[cfg(test)]
mod task_id_tests {
    use super::*;

    #[test]
    fn test_task_uuid_new() {
        let id = TaskUuid(1);
        assert_eq!(id.value(), 1);
    }

    #[test]
    fn test_task_uuid_partial_eq() {
        assert_eq!(TaskUuid(1), TaskUuid(1));
        assert_ne!(TaskUuid(1), TaskUuid(2));
    }

    #[test]
    fn test_generator_unique() {
        let generator = TaskUuidGenerator::new();
        let a = generator.generate();
        let b = generator.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generator_concurrent_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let generator = Arc::new(TaskUuidGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let generator = Arc::clone(&generator);
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| generator.generate()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}

#[cfg(test)]
mod graph_tests {
    use super::*;

    fn ids(n: u64) -> Vec<TaskUuid> {
        (0..n).map(TaskUuid).collect()
    }

    #[test]
    fn test_no_deps_immediately_ready() {
        let graph: DependencyGraph<&str> = DependencyGraph::new();
        graph.add_item(TaskUuid(0), "a", &[]);
        let (id, payload) = graph.try_next().unwrap();
        assert_eq!(id, TaskUuid(0));
        assert_eq!(payload, "a");
    }

    #[test]
    fn test_dependent_held_back_until_complete() {
        let graph: DependencyGraph<&str> = DependencyGraph::new();
        let ids = ids(2);
        graph.add_item(ids[0], "first", &[]);
        graph.add_item(ids[1], "second", &[ids[0]]);

        let (first, _) = graph.try_next().unwrap();
        assert_eq!(first, ids[0]);
        assert!(graph.try_next().is_none());

        graph.complete_item(ids[0]);
        let (second, _) = graph.try_next().unwrap();
        assert_eq!(second, ids[1]);
    }

    #[test]
    fn test_diamond_dependency() {
        // 0 -> {1, 2} -> 3
        let graph: DependencyGraph<u32> = DependencyGraph::new();
        let ids = ids(4);
        graph.add_item(ids[0], 0, &[]);
        graph.add_item(ids[1], 1, &[ids[0]]);
        graph.add_item(ids[2], 2, &[ids[0]]);
        graph.add_item(ids[3], 3, &[ids[1], ids[2]]);

        let (root, _) = graph.try_next().unwrap();
        assert_eq!(root, ids[0]);
        graph.complete_item(root);

        let mut order = Vec::new();
        while let Some((id, _)) = graph.try_next() {
            order.push(id);
            graph.complete_item(id);
        }
        // The sink may only surface after both middle nodes completed.
        assert_eq!(order[2], ids[3]);
        order.sort();
        assert_eq!(order, vec![ids[1], ids[2], ids[3]]);
    }

    #[test]
    fn test_completed_dependency_counts_as_satisfied() {
        let graph: DependencyGraph<&str> = DependencyGraph::new();
        let ids = ids(2);
        graph.add_item(ids[0], "done", &[]);
        let (id, _) = graph.try_next().unwrap();
        graph.complete_item(id);

        graph.add_item(ids[1], "late", &[ids[0]]);
        assert!(graph.try_next().is_some());
    }

    #[test]
    fn test_unknown_dependency_counts_as_satisfied() {
        let graph: DependencyGraph<&str> = DependencyGraph::new();
        graph.add_item(TaskUuid(7), "orphan", &[TaskUuid(999)]);
        assert!(graph.try_next().is_some());
    }

    #[test]
    fn test_at_most_once_hand_out() {
        let graph: DependencyGraph<u32> = DependencyGraph::new();
        for i in 0..10 {
            graph.add_item(TaskUuid(i), i as u32, &[]);
        }
        let mut seen = Vec::new();
        while let Some((id, _)) = graph.try_next() {
            seen.push(id);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_remaining_and_is_complete() {
        let graph: DependencyGraph<&str> = DependencyGraph::new();
        let ids = ids(2);
        graph.add_item(ids[0], "a", &[]);
        graph.add_item(ids[1], "b", &[ids[0]]);
        assert_eq!(graph.remaining(), 2);
        assert!(!graph.is_complete(ids[0]));

        let (id, _) = graph.try_next().unwrap();
        graph.complete_item(id);
        assert_eq!(graph.remaining(), 1);
        assert!(graph.is_complete(ids[0]));

        let (id, _) = graph.try_next().unwrap();
        graph.complete_item(id);
        assert_eq!(graph.remaining(), 0);
    }
}
