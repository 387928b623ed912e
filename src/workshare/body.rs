//! Loop body shapes and collapsed-index arithmetic
//!
//! Collapsed loops are scheduled over a single linear index space and each
//! iteration is unflattened back into its N-dimensional indices by
//! mixed-radix decomposition, preserving row-major order (the last
//! dimension varies fastest).

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{Result, RuntimeError};
use crate::reduction::Reduce;

/// Total number of iterations in a collapsed space, with overflow detection
pub fn flatten_total(ranges: &[(i64, i64)]) -> Result<i64> {
    let mut total: i64 = 1;
    for &(start, end) in ranges {
        let extent = end - start;
        total = total
            .checked_mul(extent)
            .ok_or_else(|| RuntimeError::internal("collapsed iteration space overflows i64"))?;
    }
    Ok(total)
}

/// Decompose a linear index into per-dimension indices.
///
/// `starts[k]` and `extents[k]` describe dimension `k`; `out` receives the
/// absolute index for each dimension.
///
/// ```
/// use bingxing::workshare::unflatten;
///
/// let mut out = [0i64; 2];
/// unflatten(7, &[0, 10], &[3, 5], &mut out);
/// assert_eq!(out, [1, 12]);
/// ```
pub fn unflatten(linear: i64, starts: &[i64], extents: &[i64], out: &mut [i64]) {
    let mut rest = linear;
    for k in (1..extents.len()).rev() {
        out[k] = starts[k] + rest % extents[k];
        rest /= extents[k];
    }
    if !extents.is_empty() {
        out[0] = starts[0] + rest;
    }
}

/// The caller-visible shape of a loop body
enum BodyKind<'a, T> {
    Plain(&'a dyn Fn(i64)),
    Reduction(&'a dyn Fn(&mut T, i64)),
    Collapse2(&'a dyn Fn(i64, i64)),
    Collapse3(&'a dyn Fn(i64, i64, i64)),
    CollapseN(&'a dyn Fn(&[i64])),
    ReductionCollapse2(&'a dyn Fn(&mut T, i64, i64)),
    ReductionCollapse3(&'a dyn Fn(&mut T, i64, i64, i64)),
    ReductionCollapseN(&'a dyn Fn(&mut T, &[i64])),
}

/// A loop body plus the index geometry needed to drive it.
///
/// For 1-D bodies the scheduler's indices are passed through unchanged; for
/// collapsed bodies they are linear indices into the flattened space and
/// each one is decomposed before the call.
pub struct ForBody<'a, T: Reduce> {
    kind: BodyKind<'a, T>,
    starts: Vec<i64>,
    extents: Vec<i64>,
}

impl<'a, T: Reduce> ForBody<'a, T> {
    pub fn plain(body: &'a dyn Fn(i64)) -> Self {
        ForBody {
            kind: BodyKind::Plain(body),
            starts: Vec::new(),
            extents: Vec::new(),
        }
    }

    pub fn reduction(body: &'a dyn Fn(&mut T, i64)) -> Self {
        ForBody {
            kind: BodyKind::Reduction(body),
            starts: Vec::new(),
            extents: Vec::new(),
        }
    }

    pub fn collapse2(body: &'a dyn Fn(i64, i64), ranges: [(i64, i64); 2]) -> Self {
        ForBody {
            kind: BodyKind::Collapse2(body),
            starts: ranges.iter().map(|r| r.0).collect(),
            extents: ranges.iter().map(|r| r.1 - r.0).collect(),
        }
    }

    pub fn collapse3(body: &'a dyn Fn(i64, i64, i64), ranges: [(i64, i64); 3]) -> Self {
        ForBody {
            kind: BodyKind::Collapse3(body),
            starts: ranges.iter().map(|r| r.0).collect(),
            extents: ranges.iter().map(|r| r.1 - r.0).collect(),
        }
    }

    pub fn collapse_n(body: &'a dyn Fn(&[i64]), ranges: &[(i64, i64)]) -> Self {
        ForBody {
            kind: BodyKind::CollapseN(body),
            starts: ranges.iter().map(|r| r.0).collect(),
            extents: ranges.iter().map(|r| r.1 - r.0).collect(),
        }
    }

    pub fn reduction_collapse2(
        body: &'a dyn Fn(&mut T, i64, i64),
        ranges: [(i64, i64); 2],
    ) -> Self {
        ForBody {
            kind: BodyKind::ReductionCollapse2(body),
            starts: ranges.iter().map(|r| r.0).collect(),
            extents: ranges.iter().map(|r| r.1 - r.0).collect(),
        }
    }

    pub fn reduction_collapse3(
        body: &'a dyn Fn(&mut T, i64, i64, i64),
        ranges: [(i64, i64); 3],
    ) -> Self {
        ForBody {
            kind: BodyKind::ReductionCollapse3(body),
            starts: ranges.iter().map(|r| r.0).collect(),
            extents: ranges.iter().map(|r| r.1 - r.0).collect(),
        }
    }

    pub fn reduction_collapse_n(body: &'a dyn Fn(&mut T, &[i64]), ranges: &[(i64, i64)]) -> Self {
        ForBody {
            kind: BodyKind::ReductionCollapseN(body),
            starts: ranges.iter().map(|r| r.0).collect(),
            extents: ranges.iter().map(|r| r.1 - r.0).collect(),
        }
    }

    /// Whether this body accumulates into a reduction target
    pub fn is_reduction(&self) -> bool {
        matches!(
            self.kind,
            BodyKind::Reduction(_)
                | BodyKind::ReductionCollapse2(_)
                | BodyKind::ReductionCollapse3(_)
                | BodyKind::ReductionCollapseN(_)
        )
    }

    /// Run the body for every iteration in `[chunk_start, chunk_end)`,
    /// publishing the current index through `working_iter` so `ordered`
    /// sections can line up behind it.
    pub fn run_chunk(
        &self,
        working_iter: &AtomicI64,
        chunk_start: i64,
        chunk_end: i64,
        local: &mut T,
    ) {
        let mut indices = vec![0i64; self.extents.len()];
        for i in chunk_start..chunk_end {
            working_iter.store(i, Ordering::SeqCst);
            match self.kind {
                BodyKind::Plain(body) => body(i),
                BodyKind::Reduction(body) => body(local, i),
                BodyKind::Collapse2(body) => {
                    unflatten(i, &self.starts, &self.extents, &mut indices);
                    body(indices[0], indices[1]);
                }
                BodyKind::Collapse3(body) => {
                    unflatten(i, &self.starts, &self.extents, &mut indices);
                    body(indices[0], indices[1], indices[2]);
                }
                BodyKind::CollapseN(body) => {
                    unflatten(i, &self.starts, &self.extents, &mut indices);
                    body(&indices);
                }
                BodyKind::ReductionCollapse2(body) => {
                    unflatten(i, &self.starts, &self.extents, &mut indices);
                    body(local, indices[0], indices[1]);
                }
                BodyKind::ReductionCollapse3(body) => {
                    unflatten(i, &self.starts, &self.extents, &mut indices);
                    body(local, indices[0], indices[1], indices[2]);
                }
                BodyKind::ReductionCollapseN(body) => {
                    unflatten(i, &self.starts, &self.extents, &mut indices);
                    body(local, &indices);
                }
            }
        }
    }
}
