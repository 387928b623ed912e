//! Dependency DAG for task execution
//!
//! This module provides the data structures used to order tasks by their
//! declared dependencies.
//!
//! # Architecture
//!
//! - [`TaskUuid`](task_id::TaskUuid) - Unique identifier for a task
//! - [`TaskUuidGenerator`](task_id::TaskUuidGenerator) - Thread-safe ID generator
//! - [`DependencyGraph`](graph::DependencyGraph) - The dependency graph itself,
//!   generic over its payload type

pub mod graph;
pub mod task_id;

pub use graph::DependencyGraph;
pub use task_id::{TaskUuid, TaskUuidGenerator};

#[cfg(test)]
mod tests;
