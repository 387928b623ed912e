//! Bingxing Parallel Runtime
//!
//! OpenMP-style structured parallelism over plain OS threads: parallel
//! regions, worksharing loops with pluggable schedulers, generic
//! reductions, dependency-ordered tasks, and the classic coordination
//! primitives (barrier, critical, master, single, ordered, sections).
//!
//! # Example
//!
//! ```
//! use bingxing::{ReduceOp, Runtime, Schedule};
//!
//! fn main() -> bingxing::Result<()> {
//!     let rt = Runtime::new();
//!     let mut sum = 0i64;
//!     rt.parallel_for_reduction(
//!         0,
//!         1024,
//!         ReduceOp::Add,
//!         &mut sum,
//!         Some(4),
//!         Schedule::Static,
//!         None,
//!         |acc, i| *acc += i,
//!     )?;
//!     assert_eq!(sum, 1024 * 1023 / 2);
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/bingxing")]
#![warn(rust_2018_idioms)]
#![allow(dead_code)]

// Public modules
pub mod config;
pub mod dag;
pub mod error;
pub mod parallel;
pub mod reduction;
pub mod region;
pub mod schedule;
pub mod sync;
pub mod tasking;
pub mod workshare;

// Utility modules
pub mod logger;

// Re-exports
pub use dag::TaskUuid;
pub use error::{Result, RuntimeError};
pub use parallel::{wtime, Runtime};
pub use reduction::{Reduce, ReduceOp};
pub use region::Worker;
pub use schedule::{LoopScheduler, Schedule, ScheduleKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "Bingxing (并行)";
