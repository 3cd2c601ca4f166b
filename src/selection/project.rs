//! Rank changes and projections of a selection onto another.
//!
//! Projections map selected elements by their position in row-major order,
//! so two selections with the same element count correspond one to one.

use super::{Layout, SelectOp, Selection};
use crate::config::IoConfig;
use crate::extent::Extent;
use crate::hyperslab_error::HyperslabError;
use crate::iter::{Run, SelectionIter};
use crate::regular::{RegularDescriptor, RegularDim};
use crate::span::{SpanList, from_sorted_ranges};

impl Selection {
    /// Linear index, offset applied, of the first selected element in
    /// row-major order.
    ///
    /// # Errors
    /// - `UnsupportedOperation` for an empty selection.
    /// - `OutOfBounds` if the offset moves the selection outside the extent.
    pub fn first_element_offset(&self) -> Result<u64, HyperslabError> {
        let (first, _) = self
            .iter_blocks()?
            .block()
            .ok_or(HyperslabError::UnsupportedOperation(
                "first element of an empty selection",
            ))?;
        Ok(self.extent.linear_index(&first))
    }

    /// Linear index of the only selected element, for projecting onto a
    /// scalar.
    ///
    /// # Errors
    /// `InvalidArgument` unless exactly one element is selected; otherwise as
    /// for [`first_element_offset`](Self::first_element_offset).
    pub fn project_scalar(&self) -> Result<u64, HyperslabError> {
        if self.num_elements != 1 {
            return Err(HyperslabError::invalid(format!(
                "scalar projection of {} elements",
                self.num_elements
            )));
        }
        self.first_element_offset()
    }

    /// The same selection in a dataset of rank `new_rank`.
    ///
    /// Raising the rank prepends dimensions of size 1. Lowering it drops the
    /// slowest dimensions, each of which must have a single selected
    /// coordinate; the linear index of those coordinates in this extent is
    /// returned alongside, so that an element's index here equals that value
    /// plus its index in the projection. Raising returns 0.
    ///
    /// # Errors
    /// - `InvalidArgument` if `new_rank` is 0 or above the maximum rank.
    /// - `UnsupportedOperation` if a dropped dimension selects more than one
    ///   coordinate.
    /// - `OutOfBounds` if the offset moves a dropped coordinate outside the
    ///   extent.
    pub fn project(&self, new_rank: usize) -> Result<(Selection, u64), HyperslabError> {
        let rank = self.rank();
        if new_rank == rank {
            return Ok((self.clone(), 0));
        }
        if new_rank > rank {
            let levels = new_rank - rank;
            let mut dims = vec![1; levels];
            dims.extend_from_slice(self.extent.dims());
            let mut sel = Selection::none(Extent::new(&dims)?);
            sel.offset[levels..].copy_from_slice(&self.offset);
            let layout = match &self.layout {
                Layout::Empty => Layout::Empty,
                Layout::Regular { desc, .. } => {
                    let mut app = vec![RegularDim::block(0, 1); levels];
                    app.extend_from_slice(desc.app());
                    Layout::regular(RegularDescriptor::new(app)?)
                }
                Layout::General { tree } => {
                    Layout::from_tree(Some(SpanList::with_unit_levels(tree, levels)), new_rank)?
                }
            };
            sel.install(layout);
            return Ok((sel, 0));
        }

        if new_rank == 0 {
            return Err(HyperslabError::invalid("projection to rank 0"));
        }
        let dropped = rank - new_rank;
        let mut sel = Selection::none(Extent::new(&self.extent.dims()[dropped..])?);
        sel.offset.copy_from_slice(&self.offset[dropped..]);
        let Some(raw) = self.raw_bounds() else {
            return Ok((sel, 0));
        };
        let strides = self.extent.strides();
        let mut base = 0u64;
        for (dim, &(lo, hi)) in raw[..dropped].iter().enumerate() {
            if lo != hi {
                return Err(HyperslabError::UnsupportedOperation(
                    "dropped dimension selects more than one coordinate",
                ));
            }
            // below the extent size, which fits in u64
            base += self.place(dim, lo)? * strides[dim];
        }
        let layout = match &self.layout {
            Layout::Empty => Layout::Empty,
            Layout::Regular { desc, .. } => {
                Layout::regular(RegularDescriptor::new(desc.app()[dropped..].to_vec())?)
            }
            Layout::General { tree } => {
                let mut tree = tree.clone();
                for _ in 0..dropped {
                    tree = tree
                        .spans()
                        .first()
                        .and_then(|s| s.down())
                        .cloned()
                        .ok_or_else(|| {
                            HyperslabError::InvariantViolation(
                                "span tree shallower than its rank".into(),
                            )
                        })?;
                }
                Layout::from_tree(Some(tree), new_rank)?
            }
        };
        sel.install(layout);
        log::trace!("project: rank {rank} -> {new_rank}, base offset {base}");
        Ok((sel, base))
    }

    /// Carry `intersect` over from `self` to `dst`.
    ///
    /// Pairs the n-th selected element of `self` with the n-th of `dst`, both
    /// in row-major order with offsets applied, and selects in `dst`'s extent
    /// the partners of the elements `self` shares with `intersect`. The
    /// intersection is taken on stored coordinates, so `intersect`'s offset
    /// is ignored. The result has a zero offset.
    ///
    /// # Errors
    /// - `InvalidArgument` if `self` and `dst` select different numbers of
    ///   elements.
    /// - `ExtentMismatch` if `intersect` lives in another extent than `self`.
    /// - `OutOfBounds` if an offset moves `self` or `dst` outside its extent.
    pub fn project_intersection(
        &self,
        dst: &Selection,
        intersect: &Selection,
    ) -> Result<Selection, HyperslabError> {
        if self.num_elements != dst.num_elements {
            return Err(HyperslabError::invalid(format!(
                "source selects {} elements, destination {}",
                self.num_elements, dst.num_elements
            )));
        }
        let mut inter = self.clone();
        inter.combine(intersect, SelectOp::And)?;
        let mut out = Selection::none(dst.extent.clone());
        if inter.num_elements == 0 {
            return Ok(out);
        }

        let ordinals = ordinal_ranges(self, &inter)?;
        let ranges = linear_ranges(dst, &ordinals)?;
        log::trace!(
            "project_intersection: {} elements in {} ranges",
            inter.num_elements,
            ranges.len()
        );
        let tree = from_sorted_ranges(&ranges, dst.extent.dims())?;
        out.install(Layout::from_tree(tree, dst.rank())?);
        Ok(out)
    }
}

/// Element runs of a selection, fetched in batches.
struct Runs {
    it: SelectionIter,
    cfg: IoConfig,
    batch: Vec<Run>,
    next: usize,
}

impl Runs {
    fn new(sel: &Selection) -> Result<Self, HyperslabError> {
        Ok(Self {
            it: sel.iter(1)?,
            cfg: IoConfig::default(),
            batch: Vec::new(),
            next: 0,
        })
    }
}

impl Iterator for Runs {
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        if self.next == self.batch.len() {
            self.it
                .next_runs_into(self.cfg.max_runs, self.cfg.max_elements, &mut self.batch);
            self.next = 0;
        }
        let run = self.batch.get(self.next).copied()?;
        self.next += 1;
        Some(run)
    }
}

/// Append `(start, len)`, merging with the last range when adjacent.
fn push_range(out: &mut Vec<(u64, u64)>, start: u64, len: u64) {
    match out.last_mut() {
        Some(last) if last.0 + last.1 == start => last.1 += len,
        _ => out.push((start, len)),
    }
}

fn not_covered() -> HyperslabError {
    HyperslabError::InvariantViolation("run not covered by the enclosing selection".into())
}

/// Row-major positions within `outer` of the elements of `inner`, a subset
/// of it, as `(start, len)` ranges.
fn ordinal_ranges(outer: &Selection, inner: &Selection) -> Result<Vec<(u64, u64)>, HyperslabError> {
    let mut runs = Runs::new(outer)?;
    let mut cur = runs.next();
    let mut base = 0u64;
    let mut out = Vec::new();
    for run in Runs::new(inner)? {
        let (mut lo, hi) = (run.offset, run.offset + run.len);
        while lo < hi {
            let s = cur.ok_or_else(not_covered)?;
            if s.offset + s.len <= lo {
                base += s.len;
                cur = runs.next();
                continue;
            }
            if s.offset > lo {
                return Err(not_covered());
            }
            let end = hi.min(s.offset + s.len);
            push_range(&mut out, base + (lo - s.offset), end - lo);
            lo = end;
        }
    }
    Ok(out)
}

/// Inclusive linear ranges of the elements of `sel` at the given row-major
/// positions.
fn linear_ranges(sel: &Selection, ordinals: &[(u64, u64)]) -> Result<Vec<(u64, u64)>, HyperslabError> {
    let mut runs = Runs::new(sel)?;
    let mut cur = runs.next();
    let mut base = 0u64;
    let mut out = Vec::new();
    for &(start, len) in ordinals {
        let (mut lo, hi) = (start, start + len);
        while lo < hi {
            let r = cur.ok_or_else(not_covered)?;
            if base + r.len <= lo {
                base += r.len;
                cur = runs.next();
                continue;
            }
            let end = hi.min(base + r.len);
            push_range(&mut out, r.offset + (lo - base), end - lo);
            lo = end;
        }
    }
    Ok(out.into_iter().map(|(s, n)| (s, s + n - 1)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(dims: &[u64]) -> Extent {
        Extent::new(dims).unwrap()
    }

    fn block(extent: &[u64], start: &[u64], size: &[u64]) -> Selection {
        let ones = vec![1; start.len()];
        Selection::hyperslab(ext(extent), start, None, &ones, Some(size)).unwrap()
    }

    fn linear_elements(sel: &Selection) -> Vec<u64> {
        let mut it = sel.iter(1).unwrap();
        let (runs, _) = it.next_runs(usize::MAX, u64::MAX);
        runs.iter().flat_map(|r| r.offset..r.offset + r.len).collect()
    }

    #[test]
    fn first_element_and_scalar_offsets() {
        let mut point = Selection::from_points(ext(&[4, 5]), &[vec![2, 3]]).unwrap();
        assert_eq!(point.first_element_offset().unwrap(), 13);
        assert_eq!(point.project_scalar().unwrap(), 13);
        point.set_offset(&[1, -1]).unwrap();
        assert_eq!(point.project_scalar().unwrap(), 17);

        let two = Selection::from_points(ext(&[4, 5]), &[vec![3, 0], vec![1, 4]]).unwrap();
        assert_eq!(two.first_element_offset().unwrap(), 9);
        assert!(matches!(
            two.project_scalar(),
            Err(HyperslabError::InvalidArgument(_))
        ));
        assert!(matches!(
            Selection::none(ext(&[3])).first_element_offset(),
            Err(HyperslabError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn lowering_rank_drops_single_coordinate_dims() {
        let mut sel = block(&[3, 4, 5], &[1, 0, 1], &[1, 2, 3]);
        let (low, base) = sel.project(2).unwrap();
        assert_eq!(base, 20);
        assert_eq!(low.extent().dims(), &[4, 5]);
        assert!(low.is_regular());
        assert_eq!(low.blocks(), vec![(vec![0, 1], vec![1, 3])]);
        let orig = linear_elements(&sel);
        let projected: Vec<u64> = linear_elements(&low).iter().map(|&x| x + base).collect();
        assert_eq!(orig, projected);

        sel.set_offset(&[1, 0, 0]).unwrap();
        assert_eq!(sel.project(2).unwrap().1, 40);
        assert!(matches!(
            sel.project(1),
            Err(HyperslabError::UnsupportedOperation(_))
        ));
        assert!(matches!(sel.project(0), Err(HyperslabError::InvalidArgument(_))));

        let (same, base) = sel.project(3).unwrap();
        assert_eq!(base, 0);
        assert_eq!(same.blocks(), sel.blocks());
    }

    #[test]
    fn lowering_a_general_selection() {
        let sel =
            Selection::from_points(ext(&[3, 6]), &[vec![2, 0], vec![2, 1], vec![2, 4]]).unwrap();
        assert!(!sel.is_regular());
        let (low, base) = sel.project(1).unwrap();
        assert_eq!(base, 12);
        assert_eq!(low.num_elements(), 3);
        assert_eq!(linear_elements(&low), vec![0, 1, 4]);
        assert!(!low.is_regular());
    }

    #[test]
    fn raising_rank_prepends_unit_dims() {
        let mut sel = block(&[6], &[1], &[3]);
        sel.set_offset(&[2]).unwrap();
        let (high, base) = sel.project(3).unwrap();
        assert_eq!(base, 0);
        assert_eq!(high.extent().dims(), &[1, 1, 6]);
        assert_eq!(high.offset(), &[0, 0, 2]);
        assert!(high.is_regular());
        assert_eq!(high.blocks(), vec![(vec![0, 0, 1], vec![0, 0, 3])]);
        assert_eq!(linear_elements(&high), vec![3, 4, 5]);

        let pts = Selection::from_points(ext(&[5]), &[vec![0], vec![2], vec![3]]).unwrap();
        let (high, _) = pts.project(2).unwrap();
        assert_eq!(high.num_elements(), 3);
        assert!(high.contains(&[0, 2]));
        assert!(!high.contains(&[0, 1]));
        assert!(!high.is_regular());

        let (empty, _) = Selection::none(ext(&[4])).project(2).unwrap();
        assert_eq!(empty.num_elements(), 0);
        assert_eq!(empty.extent().dims(), &[1, 4]);
    }

    #[test]
    fn intersection_follows_element_order() {
        let src = block(&[10], &[2], &[4]);
        let dst = block(&[4, 4], &[1, 1], &[2, 2]);
        let intersect = block(&[10], &[3], &[2]);
        let out = src.project_intersection(&dst, &intersect).unwrap();
        assert_eq!(out.extent(), dst.extent());
        assert_eq!(out.num_elements(), 2);
        assert!(out.contains(&[1, 2]));
        assert!(out.contains(&[2, 1]));
        assert_eq!(out.offset(), &[0, 0]);
    }

    #[test]
    fn intersection_uses_destination_offset() {
        let src = block(&[8], &[0], &[4]);
        let mut dst = block(&[8], &[0], &[4]);
        dst.set_offset(&[3]).unwrap();
        let intersect = block(&[8], &[1], &[2]);
        let out = src.project_intersection(&dst, &intersect).unwrap();
        assert_eq!(linear_elements(&out), vec![4, 5]);

        let disjoint = block(&[8], &[6], &[2]);
        assert_eq!(src.project_intersection(&dst, &disjoint).unwrap().num_elements(), 0);
    }

    #[test]
    fn intersection_rejects_mismatched_inputs() {
        let src = block(&[8], &[0], &[4]);
        let dst = block(&[8], &[0], &[3]);
        assert!(matches!(
            src.project_intersection(&dst, &src),
            Err(HyperslabError::InvalidArgument(_))
        ));
        let other = block(&[9], &[0], &[4]);
        assert!(matches!(
            src.project_intersection(&src, &other),
            Err(HyperslabError::ExtentMismatch { .. })
        ));
    }
}
