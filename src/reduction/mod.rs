//! Generic reductions
//!
//! A reduction loop runs with a per-thread accumulator seeded from the
//! operation's identity element; at the barrier ending the loop, thread 0
//! folds every accumulator into the caller's target. Which operations a
//! type supports is expressed statically through the [`Reduce`] trait, so
//! an unsupported op/type pair is rejected before the loop starts instead
//! of failing mid-flight.

use serde::{Deserialize, Serialize};

/// Operation applied when folding reduction accumulators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReduceOp {
    /// `+`
    Add,
    /// `-` (accumulators are still combined by addition; each thread's
    /// subtractions happen inside its own accumulator)
    Subtract,
    /// `*`
    Multiply,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&&`
    LogicalAnd,
    /// `||`
    LogicalOr,
    /// element-wise minimum
    Min,
    /// element-wise maximum
    Max,
}

/// Types usable as reduction accumulators.
///
/// `identity` returns `None` for unsupported operations, which surfaces as
/// an invalid-arguments error at loop setup. `combine` is only ever called
/// with operations for which `identity` returned `Some`.
pub trait Reduce: Copy + Default + Send + 'static {
    /// Identity element for `op`, or `None` when the op is unsupported
    fn identity(op: ReduceOp) -> Option<Self>;

    /// Fold two accumulators
    fn combine(op: ReduceOp, a: Self, b: Self) -> Self;
}

macro_rules! impl_reduce_int {
    ($($t:ty),* $(,)?) => {$(
        impl Reduce for $t {
            fn identity(op: ReduceOp) -> Option<Self> {
                match op {
                    ReduceOp::Add | ReduceOp::Subtract => Some(0),
                    ReduceOp::Multiply => Some(1),
                    ReduceOp::BitAnd => Some(!0),
                    ReduceOp::BitOr | ReduceOp::BitXor => Some(0),
                    ReduceOp::Min => Some(<$t>::MAX),
                    ReduceOp::Max => Some(<$t>::MIN),
                    ReduceOp::LogicalAnd | ReduceOp::LogicalOr => None,
                }
            }

            fn combine(op: ReduceOp, a: Self, b: Self) -> Self {
                match op {
                    ReduceOp::Add | ReduceOp::Subtract => a.wrapping_add(b),
                    ReduceOp::Multiply => a.wrapping_mul(b),
                    ReduceOp::BitAnd => a & b,
                    ReduceOp::BitOr => a | b,
                    ReduceOp::BitXor => a ^ b,
                    ReduceOp::Min => a.min(b),
                    ReduceOp::Max => a.max(b),
                    // Rejected at setup; never reached through the loop API.
                    ReduceOp::LogicalAnd | ReduceOp::LogicalOr => a,
                }
            }
        }
    )*};
}

impl_reduce_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_reduce_float {
    ($($t:ty),* $(,)?) => {$(
        impl Reduce for $t {
            fn identity(op: ReduceOp) -> Option<Self> {
                match op {
                    ReduceOp::Add | ReduceOp::Subtract => Some(0.0),
                    ReduceOp::Multiply => Some(1.0),
                    ReduceOp::Min => Some(<$t>::INFINITY),
                    ReduceOp::Max => Some(<$t>::NEG_INFINITY),
                    _ => None,
                }
            }

            fn combine(op: ReduceOp, a: Self, b: Self) -> Self {
                match op {
                    ReduceOp::Add | ReduceOp::Subtract => a + b,
                    ReduceOp::Multiply => a * b,
                    ReduceOp::Min => a.min(b),
                    ReduceOp::Max => a.max(b),
                    _ => a,
                }
            }
        }
    )*};
}

impl_reduce_float!(f32, f64);

impl Reduce for bool {
    fn identity(op: ReduceOp) -> Option<Self> {
        match op {
            ReduceOp::LogicalAnd | ReduceOp::BitAnd => Some(true),
            ReduceOp::LogicalOr | ReduceOp::BitOr | ReduceOp::BitXor => Some(false),
            _ => None,
        }
    }

    fn combine(op: ReduceOp, a: Self, b: Self) -> Self {
        match op {
            ReduceOp::LogicalAnd | ReduceOp::BitAnd => a && b,
            ReduceOp::LogicalOr | ReduceOp::BitOr => a || b,
            ReduceOp::BitXor => a ^ b,
            _ => a,
        }
    }
}
