//! `Selection`: a set of elements of an N-dimensional dataset, built up from
//! hyperslabs with set operators.
//!
//! A selection is held in one of three forms:
//!
//! - empty: nothing selected.
//! - regular: one grid of equally sized blocks, kept as a
//!   [`RegularDescriptor`]. The span tree for it is only built when an
//!   operation needs it, and is then cached.
//! - general: an arbitrary span tree.
//!
//! Every non-`SET` operation works on span trees and then tries to recover the
//! regular form, so a selection that happens to be a regular grid is always
//! stored as one.
//!
//! # Invariants
//!
//! - `offset.len()` equals the extent's rank, and so does the depth of any
//!   span tree or descriptor.
//! - `num_elements` equals the element count of the current layout.
//! - A cached tree of a regular layout selects exactly the descriptor's
//!   elements.
//!
//! Checked after every mutation in debug builds and with the
//! `check-invariants` feature.

mod project;
mod query;

use crate::debug_invariants::DebugInvariants;
use crate::extent::Extent;
use crate::hyperslab_error::HyperslabError;
use crate::regular::{RegularDescriptor, RegularDim};
use crate::span::{
    ClipWant, SharedSpanList, SpanCopy, SpanList, clip, from_sorted_points, make, merge, rebuild,
};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Set operator applied by [`Selection::select_hyperslab`] and
/// [`Selection::combine`]. "A" is the current selection, "B" the operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SelectOp {
    /// Replace A with B.
    Set,
    /// A ∪ B.
    Or,
    /// A ∩ B.
    And,
    /// A ⊕ B.
    Xor,
    /// A \ B.
    NotB,
    /// B \ A.
    NotA,
}

/// Storage form of a selection.
#[derive(Clone, Debug)]
pub(crate) enum Layout {
    Empty,
    Regular {
        desc: RegularDescriptor,
        tree: OnceCell<SharedSpanList>,
    },
    General {
        tree: SharedSpanList,
    },
}

impl Layout {
    fn regular(desc: RegularDescriptor) -> Self {
        Layout::Regular {
            desc,
            tree: OnceCell::new(),
        }
    }

    /// Classify a freshly computed tree, recovering the regular form when
    /// possible.
    ///
    /// # Errors
    /// `InvalidArgument` if the tree selects more than `u64::MAX` elements.
    fn from_tree(tree: Option<SharedSpanList>, rank: usize) -> Result<Self, HyperslabError> {
        let Some(tree) = tree else {
            return Ok(Layout::Empty);
        };
        if tree.checked_num_elements().is_none() {
            return Err(HyperslabError::invalid(
                "selection element count overflows u64",
            ));
        }
        Ok(match rebuild(&tree, rank) {
            Some(dims) => Layout::Regular {
                desc: RegularDescriptor::new(dims)?,
                tree: OnceCell::with_value(tree),
            },
            None => Layout::General { tree },
        })
    }

    /// Span tree of this layout, building and caching it for a regular one.
    pub(crate) fn tree(&self) -> Result<Option<SharedSpanList>, HyperslabError> {
        match self {
            Layout::Empty => Ok(None),
            Layout::Regular { desc, tree } => {
                let t = tree.get_or_try_init(|| make(desc.opt()))?;
                Ok(Some(Arc::clone(t)))
            }
            Layout::General { tree } => Ok(Some(Arc::clone(tree))),
        }
    }

    fn num_elements(&self) -> u64 {
        match self {
            Layout::Empty => 0,
            Layout::Regular { desc, .. } => desc.num_elements(),
            Layout::General { tree } => tree.num_elements(),
        }
    }
}

/// A hyperslab selection over a dataset of fixed [`Extent`].
///
/// Stored coordinates are translated by a per-dimension `offset` whenever the
/// selection is used for I/O ([`bounds`](Self::bounds),
/// [`iter`](Self::iter)); set operations work on the stored coordinates.
///
/// Cloning is cheap: span trees are shared, and never modified in place.
///
/// # Example
/// ```rust
/// # fn try_main() -> Result<(), hyperslab::HyperslabError> {
/// use hyperslab::{Extent, SelectOp, Selection};
/// let mut sel = Selection::none(Extent::new(&[10, 10])?);
/// sel.select_hyperslab(SelectOp::Set, &[0, 0], None, &[1, 1], Some(&[4, 4]))?;
/// sel.select_hyperslab(SelectOp::Or, &[2, 2], None, &[1, 1], Some(&[4, 4]))?;
/// assert_eq!(sel.num_elements(), 28);
/// assert!(!sel.is_single_block());
/// # Ok(())
/// # }
/// # try_main().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Selection {
    extent: Extent,
    offset: Vec<i64>,
    layout: Layout,
    num_elements: u64,
}

impl Selection {
    /// A selection of nothing.
    pub fn none(extent: Extent) -> Self {
        let offset = vec![0; extent.rank()];
        Self {
            extent,
            offset,
            layout: Layout::Empty,
            num_elements: 0,
        }
    }

    /// A selection of every element of `extent`, stored as one block.
    pub fn all(extent: Extent) -> Self {
        let desc = RegularDescriptor::full(extent.dims());
        let mut sel = Self::none(extent);
        sel.install(Layout::regular(desc));
        sel
    }

    /// Shorthand for [`none`](Self::none) followed by a `SET` hyperslab.
    ///
    /// # Errors
    /// As for [`select_hyperslab`](Self::select_hyperslab).
    pub fn hyperslab(
        extent: Extent,
        start: &[u64],
        stride: Option<&[u64]>,
        count: &[u64],
        block: Option<&[u64]>,
    ) -> Result<Self, HyperslabError> {
        let mut sel = Self::none(extent);
        sel.select_hyperslab(SelectOp::Set, start, stride, count, block)?;
        Ok(sel)
    }

    /// Select exactly the listed points. Duplicates are ignored and the order
    /// of `points` does not matter.
    ///
    /// # Errors
    /// - `InvalidArgument` if a point does not have the extent's rank.
    /// - `OutOfBounds` if a point lies outside the extent.
    pub fn from_points(extent: Extent, points: &[Vec<u64>]) -> Result<Self, HyperslabError> {
        let rank = extent.rank();
        for p in points {
            if p.len() != rank {
                return Err(HyperslabError::invalid(format!(
                    "point {p:?} does not have rank {rank}"
                )));
            }
            if let Some((dim, (&x, &n))) = p
                .iter()
                .zip(extent.dims())
                .enumerate()
                .find(|(_, (x, n))| x >= n)
            {
                return Err(HyperslabError::OutOfBounds {
                    dim,
                    coord: i128::from(x),
                    extent: n,
                });
            }
        }
        let mut sorted = points.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let tree = from_sorted_points(&sorted, rank)?;
        let mut sel = Self::none(extent);
        sel.install(Layout::from_tree(tree, rank)?);
        Ok(sel)
    }

    /// Combine the selection with the hyperslab `(start, stride, count,
    /// block)` using `op`. `stride` and `block` default to all ones.
    ///
    /// A zero-sized hyperslab (`count` or `block` zero in some dimension)
    /// selects nothing: `SET`, `AND` and `NOTA` leave an empty selection,
    /// `OR`, `XOR` and `NOTB` leave the selection unchanged.
    ///
    /// # Errors
    /// - `InvalidArgument` if an array does not have the selection's rank, a
    ///   stride is zero, or a coordinate or the element count overflows.
    /// - `OverlapError` if `count > 1` and `stride < block` in a dimension.
    /// - `AllocationFailure` if span storage cannot be reserved.
    ///
    /// All arguments are validated before anything is changed, and the
    /// selection is left as it was on any error.
    pub fn select_hyperslab(
        &mut self,
        op: SelectOp,
        start: &[u64],
        stride: Option<&[u64]>,
        count: &[u64],
        block: Option<&[u64]>,
    ) -> Result<(), HyperslabError> {
        let rank = self.rank();
        let check = |name: &str, len: usize| {
            if len == rank {
                Ok(())
            } else {
                Err(HyperslabError::invalid(format!(
                    "{name} has {len} entries, selection rank is {rank}"
                )))
            }
        };
        check("start", start.len())?;
        check("count", count.len())?;
        if let Some(s) = stride {
            check("stride", s.len())?;
        }
        if let Some(b) = block {
            check("block", b.len())?;
        }

        let dims: Vec<RegularDim> = (0..rank)
            .map(|d| {
                RegularDim::new(
                    start[d],
                    stride.map_or(1, |s| s[d]),
                    count[d],
                    block.map_or(1, |b| b[d]),
                )
            })
            .collect();
        for (d, dim) in dims.iter().enumerate() {
            dim.validate(d)?;
        }

        if dims.iter().any(RegularDim::is_zero_sized) {
            log::trace!("select_hyperslab {op:?}: zero-sized hyperslab");
            if matches!(op, SelectOp::Set | SelectOp::And | SelectOp::NotA) {
                self.install(Layout::Empty);
            }
            return Ok(());
        }

        let operand = Layout::regular(RegularDescriptor::new(dims)?);
        let layout = self.combined(op, &operand)?;
        log::trace!(
            "select_hyperslab {op:?}: {} -> {} elements",
            self.num_elements,
            layout.num_elements()
        );
        self.install(layout);
        Ok(())
    }

    /// Combine with another whole selection of the same extent. Offsets are
    /// ignored: the stored coordinates of both sides are combined.
    ///
    /// # Errors
    /// - `ExtentMismatch` if the extents differ.
    /// - `AllocationFailure` if span storage cannot be reserved.
    pub fn combine(&mut self, other: &Selection, op: SelectOp) -> Result<(), HyperslabError> {
        if self.extent != other.extent {
            return Err(HyperslabError::ExtentMismatch {
                left: self.extent.dims().to_vec(),
                right: other.extent.dims().to_vec(),
            });
        }
        let layout = self.combined(op, &other.layout)?;
        self.install(layout);
        Ok(())
    }

    /// Remove the elements of `other`: `combine(other, NotB)`.
    ///
    /// # Errors
    /// As for [`combine`](Self::combine).
    pub fn subtract(&mut self, other: &Selection) -> Result<(), HyperslabError> {
        self.combine(other, SelectOp::NotB)
    }

    /// Materialise the span tree and store the canonical form: regular if the
    /// tree is a regular grid, general otherwise.
    ///
    /// # Errors
    /// `AllocationFailure` if the tree cannot be built.
    pub fn normalize(&mut self) -> Result<(), HyperslabError> {
        match &self.layout {
            Layout::Empty => {}
            Layout::Regular { .. } => {
                self.layout.tree()?;
            }
            Layout::General { tree } => {
                let layout = Layout::from_tree(Some(Arc::clone(tree)), self.rank())?;
                self.install(layout);
            }
        }
        Ok(())
    }

    /// Copy that shares no span lists with `self`.
    pub fn deep_clone(&self) -> Self {
        let layout = match &self.layout {
            Layout::Empty => Layout::Empty,
            Layout::Regular { desc, tree } => Layout::Regular {
                desc: desc.clone(),
                tree: tree
                    .get()
                    .map_or_else(OnceCell::new, |t| OnceCell::with_value(SpanList::deep_copy(t))),
            },
            Layout::General { tree } => Layout::General {
                tree: SpanList::deep_copy(tree),
            },
        };
        Self {
            extent: self.extent.clone(),
            offset: self.offset.clone(),
            layout,
            num_elements: self.num_elements,
        }
    }

    /// Span tree of the selection (`None` when empty). Builds and caches the
    /// tree of a regular selection.
    ///
    /// # Errors
    /// `AllocationFailure` if the tree cannot be built.
    pub fn span_tree(&self) -> Result<Option<SharedSpanList>, HyperslabError> {
        self.layout.tree()
    }

    #[inline]
    pub(crate) fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Result of `self.layout op other`, computed without touching `self`.
    fn combined(&self, op: SelectOp, other: &Layout) -> Result<Layout, HyperslabError> {
        use SelectOp::*;
        match (&self.layout, other, op) {
            (_, _, Set) => return Ok(other.clone()),
            (Layout::Empty, _, Or | Xor | NotA) => return Ok(other.clone()),
            (Layout::Empty, _, And | NotB) => return Ok(Layout::Empty),
            (_, Layout::Empty, Or | Xor | NotB) => return Ok(self.layout.clone()),
            (_, Layout::Empty, And | NotA) => return Ok(Layout::Empty),
            _ => {}
        }

        let a = self.layout.tree()?;
        let b = other.tree()?;
        let want = match op {
            Or | NotA => ClipWant {
                b_not_a: true,
                ..ClipWant::default()
            },
            And => ClipWant {
                a_and_b: true,
                ..ClipWant::default()
            },
            Xor => ClipWant {
                a_not_b: true,
                b_not_a: true,
                ..ClipWant::default()
            },
            NotB => ClipWant {
                a_not_b: true,
                ..ClipWant::default()
            },
            Set => ClipWant::default(),
        };
        let parts = clip(a.as_ref(), b.as_ref(), want)?;
        let tree = match op {
            Or => merge(a.as_ref(), parts.b_not_a.as_ref(), SpanCopy::Share)?,
            And => parts.a_and_b,
            Xor => merge(parts.a_not_b.as_ref(), parts.b_not_a.as_ref(), SpanCopy::Share)?,
            NotB => parts.a_not_b,
            NotA | Set => parts.b_not_a,
        };
        Layout::from_tree(tree, self.rank())
    }

    fn install(&mut self, layout: Layout) {
        self.num_elements = layout.num_elements();
        self.layout = layout;
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        self.debug_assert_invariants();
    }
}

impl DebugInvariants for Selection {
    fn validate_invariants(&self) -> Result<(), HyperslabError> {
        let rank = self.extent.rank();
        if self.offset.len() != rank {
            return Err(HyperslabError::InvariantViolation(format!(
                "offset has {} entries, rank is {rank}",
                self.offset.len()
            )));
        }
        if self.layout.num_elements() != self.num_elements {
            return Err(HyperslabError::InvariantViolation(format!(
                "cached element count {} != {}",
                self.num_elements,
                self.layout.num_elements()
            )));
        }
        let check_tree = |tree: &SpanList| -> Result<(), HyperslabError> {
            if tree.depth() != rank {
                return Err(HyperslabError::InvariantViolation(format!(
                    "span tree depth {} != rank {rank}",
                    tree.depth()
                )));
            }
            if tree.num_elements() != self.num_elements {
                return Err(HyperslabError::InvariantViolation(format!(
                    "span tree selects {} elements, selection {}",
                    tree.num_elements(),
                    self.num_elements
                )));
            }
            tree.validate_invariants()
        };
        match &self.layout {
            Layout::Empty => Ok(()),
            Layout::Regular { desc, tree } => {
                if desc.rank() != rank {
                    return Err(HyperslabError::InvariantViolation(format!(
                        "descriptor rank {} != rank {rank}",
                        desc.rank()
                    )));
                }
                for (d, dim) in desc.app().iter().enumerate() {
                    dim.validate(d)
                        .map_err(|e| HyperslabError::InvariantViolation(e.to_string()))?;
                }
                match tree.get() {
                    Some(t) => check_tree(t),
                    None => Ok(()),
                }
            }
            Layout::General { tree } => check_tree(tree),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(dims: &[u64]) -> Extent {
        Extent::new(dims).unwrap()
    }

    fn square(op: SelectOp, sel: &mut Selection, r: u64, c: u64, n: u64) {
        sel.select_hyperslab(op, &[r, c], None, &[1, 1], Some(&[n, n]))
            .unwrap();
    }

    #[test]
    fn set_stores_regular_without_tree() {
        let mut sel = Selection::none(ext(&[10, 10]));
        square(SelectOp::Set, &mut sel, 1, 1, 3);
        assert_eq!(sel.num_elements(), 9);
        match sel.layout() {
            Layout::Regular { tree, .. } => assert!(tree.get().is_none()),
            other => panic!("unexpected layout {other:?}"),
        }
    }

    #[test]
    fn or_and_xor_notb_nota_counts() {
        let cases = [
            (SelectOp::Or, 28),
            (SelectOp::And, 4),
            (SelectOp::Xor, 24),
            (SelectOp::NotB, 12),
            (SelectOp::NotA, 12),
        ];
        for (op, expected) in cases {
            let mut sel = Selection::none(ext(&[10, 10]));
            square(SelectOp::Set, &mut sel, 0, 0, 4);
            square(op, &mut sel, 2, 2, 4);
            assert_eq!(sel.num_elements(), expected, "{op:?}");
            sel.validate_invariants().unwrap();
        }
    }

    #[test]
    fn union_of_aligned_blocks_recovers_regular_form() {
        let mut sel = Selection::none(ext(&[10, 10]));
        sel.select_hyperslab(SelectOp::Set, &[0, 0], None, &[1, 1], Some(&[2, 10]))
            .unwrap();
        sel.select_hyperslab(SelectOp::Or, &[5, 0], None, &[1, 1], Some(&[2, 10]))
            .unwrap();
        assert!(sel.is_regular());
        let desc = sel.regular_hyperslab().unwrap();
        assert_eq!(desc.app()[0], RegularDim::new(0, 5, 2, 2));
    }

    #[test]
    fn zero_sized_hyperslab_per_operator() {
        for op in [
            SelectOp::Set,
            SelectOp::Or,
            SelectOp::And,
            SelectOp::Xor,
            SelectOp::NotB,
            SelectOp::NotA,
        ] {
            let mut sel = Selection::none(ext(&[8, 8]));
            square(SelectOp::Set, &mut sel, 0, 0, 2);
            sel.select_hyperslab(op, &[0, 0], None, &[0, 1], None).unwrap();
            let expected = match op {
                SelectOp::Or | SelectOp::Xor | SelectOp::NotB => 4,
                _ => 0,
            };
            assert_eq!(sel.num_elements(), expected, "{op:?}");
        }
    }

    #[test]
    fn failed_operation_leaves_selection_untouched() {
        let mut sel = Selection::none(ext(&[8, 8]));
        square(SelectOp::Set, &mut sel, 0, 0, 2);
        let err = sel
            .select_hyperslab(SelectOp::Or, &[0, 0], Some(&[1, 1]), &[2, 2], Some(&[2, 2]))
            .unwrap_err();
        assert!(matches!(err, HyperslabError::OverlapError { dim: 0, .. }));
        assert!(sel
            .select_hyperslab(SelectOp::Or, &[0], None, &[1], None)
            .is_err());
        assert!(sel
            .select_hyperslab(SelectOp::Or, &[0, 0], Some(&[0, 1]), &[1, 1], None)
            .is_err());
        assert_eq!(sel.num_elements(), 4);
        assert!(sel.is_regular());
    }

    #[test]
    fn combination_overflowing_u64_is_rejected() {
        let e = ext(&[1 << 40, 1 << 20]);
        let block = [1u64 << 32, (1u64 << 32) - 1];
        let mut sel = Selection::hyperslab(e.clone(), &[0, 0], None, &[1, 1], Some(&block)).unwrap();
        let before = sel.num_elements();
        assert_eq!(before, u64::MAX - (1 << 32) + 1);

        let err = sel
            .select_hyperslab(SelectOp::Or, &[1 << 32, 0], None, &[1, 1], Some(&block))
            .unwrap_err();
        assert!(matches!(err, HyperslabError::InvalidArgument(_)));
        assert_eq!(sel.num_elements(), before);
        assert!(sel.is_regular());
        sel.validate_invariants().unwrap();

        let other = Selection::hyperslab(e, &[1 << 32, 0], None, &[1, 1], Some(&block)).unwrap();
        assert!(sel.combine(&other, SelectOp::Xor).is_err());
        assert_eq!(sel.num_elements(), before);
        sel.combine(&other, SelectOp::And).unwrap();
        assert_eq!(sel.num_elements(), 0);
    }

    #[test]
    fn empty_operand_shortcuts() {
        let e = ext(&[6, 6]);
        let empty = Selection::none(e.clone());
        let mut sel = Selection::all(e);
        sel.combine(&empty, SelectOp::Or).unwrap();
        assert_eq!(sel.num_elements(), 36);
        sel.combine(&empty, SelectOp::And).unwrap();
        assert_eq!(sel.num_elements(), 0);
    }

    #[test]
    fn combine_rejects_other_extent() {
        let mut a = Selection::all(ext(&[4, 4]));
        let b = Selection::all(ext(&[4, 5]));
        assert!(matches!(
            a.combine(&b, SelectOp::Or),
            Err(HyperslabError::ExtentMismatch { .. })
        ));
    }

    #[test]
    fn from_points_dedups_and_checks_bounds() {
        let e = ext(&[5, 5]);
        let sel = Selection::from_points(e.clone(), &[vec![3, 1], vec![0, 0], vec![3, 1]]).unwrap();
        assert_eq!(sel.num_elements(), 2);
        assert!(!sel.is_regular());
        assert_eq!(sel.num_blocks(), 2);
        assert!(matches!(
            Selection::from_points(e.clone(), &[vec![5, 0]]),
            Err(HyperslabError::OutOfBounds { dim: 0, .. })
        ));
        assert!(Selection::from_points(e, &[vec![1]]).is_err());
    }

    #[test]
    fn deep_clone_shares_nothing() {
        let mut sel = Selection::none(ext(&[10, 10]));
        square(SelectOp::Set, &mut sel, 0, 0, 4);
        square(SelectOp::Or, &mut sel, 2, 2, 4);
        let copy = sel.deep_clone();
        let (a, b) = (sel.span_tree().unwrap().unwrap(), copy.span_tree().unwrap().unwrap());
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(SpanList::structurally_eq(&a, &b));
    }

    #[test]
    fn normalize_materialises_tree() {
        let mut sel = Selection::all(ext(&[3, 3]));
        sel.normalize().unwrap();
        match sel.layout() {
            Layout::Regular { tree, .. } => assert!(tree.get().is_some()),
            other => panic!("unexpected layout {other:?}"),
        }
        sel.validate_invariants().unwrap();
    }

    #[test]
    fn selection_is_send_and_sync() {
        static_assertions::assert_impl_all!(Selection: Send, Sync);
    }
}
