//! Span-tree construction from regular descriptors and point lists.

use super::{SharedSpanList, SpanListBuilder};
use crate::hyperslab_error::HyperslabError;
use crate::regular::RegularDim;

/// Build the span tree of one regular hyperslab.
///
/// Levels are built from the fastest dimension to the slowest; the `count`
/// siblings of a level all share the single list built for the level below.
/// Every dimension must be validated and non-zero-sized.
///
/// # Errors
/// - `InvalidArgument` for rank 0 or a zero-sized dimension.
/// - `AllocationFailure` if the siblings of a level cannot be reserved. The
///   levels built so far are released before returning.
pub fn make(dims: &[RegularDim]) -> Result<SharedSpanList, HyperslabError> {
    let mut down: Option<SharedSpanList> = None;
    for (d, dim) in dims.iter().enumerate().rev() {
        if dim.is_zero_sized() {
            return Err(HyperslabError::invalid(format!(
                "cannot build spans for zero-sized dimension {d}"
            )));
        }
        let mut level = SpanListBuilder::try_with_capacity(dim.count)?;
        for k in 0..dim.count {
            let low = dim.block_start(k);
            level.append(low, low + dim.block - 1, down.clone())?;
        }
        down = level.finish();
    }
    down.ok_or_else(|| HyperslabError::invalid("cannot build spans for rank 0"))
}

/// Build a span tree selecting exactly the given points.
///
/// `points` must be sorted lexicographically, free of duplicates, and all of
/// length `rank`. Returns `None` for an empty point list.
pub fn from_sorted_points(
    points: &[Vec<u64>],
    rank: usize,
) -> Result<Option<SharedSpanList>, HyperslabError> {
    if rank == 0 {
        return Err(HyperslabError::invalid("point selection of rank 0"));
    }
    if let Some(p) = points.iter().find(|p| p.len() != rank) {
        return Err(HyperslabError::invalid(format!(
            "point {p:?} does not have rank {rank}"
        )));
    }
    points_level(points, 0, rank)
}

fn points_level(
    points: &[Vec<u64>],
    dim: usize,
    rank: usize,
) -> Result<Option<SharedSpanList>, HyperslabError> {
    let mut level = SpanListBuilder::new();
    for group in points.chunk_by(|a, b| a[dim] == b[dim]) {
        let x = group[0][dim];
        let down = if dim + 1 < rank {
            points_level(group, dim + 1, rank)?
        } else {
            None
        };
        level.append(x, x, down)?;
    }
    Ok(level.finish())
}

/// Build a span tree selecting the given runs of linear element indices in
/// a dataset of shape `dims`.
///
/// `ranges` are inclusive `(first, last)` pairs, sorted, disjoint and inside
/// the dataset. Coordinates covered in full share one list per level.
/// Returns `None` for an empty range list.
///
/// # Errors
/// `InvalidArgument` for rank 0 or ranges that are unsorted or overlap.
pub fn from_sorted_ranges(
    ranges: &[(u64, u64)],
    dims: &[u64],
) -> Result<Option<SharedSpanList>, HyperslabError> {
    if dims.is_empty() {
        return Err(HyperslabError::invalid("range selection of rank 0"));
    }
    // full[d] selects every coordinate of dims[d..]
    let mut full: Vec<Option<SharedSpanList>> = vec![None; dims.len() + 1];
    for d in (0..dims.len()).rev() {
        let mut level = SpanListBuilder::new();
        level.append(0, dims[d] - 1, full[d + 1].clone())?;
        full[d] = level.finish();
    }
    ranges_level(ranges, dims, &full, 0, 0)
}

fn ranges_level(
    ranges: &[(u64, u64)],
    dims: &[u64],
    full: &[Option<SharedSpanList>],
    d: usize,
    base: u64,
) -> Result<Option<SharedSpanList>, HyperslabError> {
    let stride: u64 = dims[d + 1..].iter().product();
    let mut level = SpanListBuilder::new();
    let mut rest = ranges.iter().copied().peekable();
    let mut carry: Option<(u64, u64)> = None;
    while let Some((lo, hi)) = carry.take().or_else(|| rest.next()) {
        let c = (lo - base) / stride;
        let first = base + c * stride;
        let last = first + (stride - 1);

        if lo == first && hi >= last {
            // whole coordinates c..=cf
            let cf = (hi - base + 1) / stride - 1;
            level.append(c, cf, full[d + 1].clone())?;
            let next = base + (cf + 1) * stride;
            if hi >= next {
                carry = Some((next, hi));
            }
            continue;
        }

        let mut pieces = vec![(lo, hi.min(last))];
        if hi > last {
            carry = Some((last + 1, hi));
        } else {
            while let Some(&(l, h)) = rest.peek() {
                if l > last {
                    break;
                }
                rest.next();
                pieces.push((l, h.min(last)));
                if h > last {
                    carry = Some((last + 1, h));
                    break;
                }
            }
        }
        let down = ranges_level(&pieces, dims, full, d + 1, first)?;
        level.append(c, c, down)?;
    }
    Ok(level.finish())
}
