//! Span trees: the general representation of a hyperslab selection.
//!
//! A selection of rank `N` is a tree with one level per dimension, slowest
//! dimension at the root. Each level is a [`SpanList`]: sorted, disjoint
//! intervals `[low, high]` of that dimension, each pointing at the list that
//! describes the selection in the next-faster dimension for every coordinate
//! of the interval. Identical sub-selections are stored once and shared
//! through [`SharedSpanList`] handles.
//!
//! # Ownership
//!
//! Lists are immutable once published. The `Arc` strong count is the
//! reference count of a list: one for every span whose `down` points at it,
//! plus one for every selection or iterator holding it as a root. Dropping
//! the last handle frees the list and releases its children recursively.
//!
//! # Canonical form
//!
//! Within a list, spans are strictly ordered by `low`, never overlap, and two
//! spans that touch (`prev.high + 1 == next.low`) always have structurally
//! different `down` lists: touching spans with equal children are coalesced
//! by [`SpanListBuilder::append`]. The set algebra relies on this to keep
//! trees small and to let [`rebuild`] recognise regular grids.

mod clip;
mod make;
mod merge;
mod rebuild;

pub use clip::{ClipOutput, ClipWant, clip};
pub use make::{from_sorted_points, from_sorted_ranges, make};
pub use merge::{SpanCopy, merge};
pub use rebuild::rebuild;

use crate::debug_invariants::DebugInvariants;
use crate::hyperslab_error::HyperslabError;
use crate::perf::{NodeMemo, Visited, node_key};
use std::sync::Arc;

/// Reference-counted handle on a span list.
pub type SharedSpanList = Arc<SpanList>;

/// A contiguous interval of one dimension plus the selection below it.
#[derive(Clone, Debug)]
pub struct Span {
    low: u64,
    high: u64,
    down: Option<SharedSpanList>,
}

impl Span {
    /// First coordinate of the interval.
    #[inline]
    pub fn low(&self) -> u64 {
        self.low
    }

    /// Last coordinate of the interval (inclusive).
    #[inline]
    pub fn high(&self) -> u64 {
        self.high
    }

    /// Number of coordinates in the interval, saturating at `u64::MAX`.
    #[inline]
    pub fn nelem(&self) -> u64 {
        (self.high - self.low).saturating_add(1)
    }

    #[inline]
    fn checked_nelem(&self) -> Option<u64> {
        (self.high - self.low).checked_add(1)
    }

    /// Selection in the next-faster dimension, `None` at the fastest one.
    #[inline]
    pub fn down(&self) -> Option<&SharedSpanList> {
        self.down.as_ref()
    }

    /// Number of elements selected under this span (all dimensions),
    /// saturating at `u64::MAX`.
    #[inline]
    pub fn subtree_elements(&self) -> u64 {
        self.checked_subtree_elements().unwrap_or(u64::MAX)
    }

    /// [`subtree_elements`](Self::subtree_elements), `None` on overflow.
    pub fn checked_subtree_elements(&self) -> Option<u64> {
        let n = self.checked_nelem()?;
        match &self.down {
            Some(down) => n.checked_mul(down.nelem?),
            None => Some(n),
        }
    }
}

/// Ordered sibling spans sharing one parent context.
#[derive(Debug)]
pub struct SpanList {
    spans: Vec<Span>,
    /// `None` when the count does not fit in `u64`.
    nelem: Option<u64>,
}

/// Two optional children are the same selection.
pub(crate) fn same_down(a: Option<&SharedSpanList>, b: Option<&SharedSpanList>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Arc::ptr_eq(x, y) || SpanList::structurally_eq(x, y),
        _ => false,
    }
}

impl SpanList {
    fn from_spans(spans: Vec<Span>) -> Self {
        let nelem = spans
            .iter()
            .try_fold(0u64, |acc, s| acc.checked_add(s.checked_subtree_elements()?));
        Self { spans, nelem }
    }

    /// The sibling spans, sorted by `low`.
    #[inline]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Number of sibling spans.
    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Published lists are never empty; this exists for completeness.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Number of elements selected by this subtree, saturating at
    /// `u64::MAX`.
    #[inline]
    pub fn num_elements(&self) -> u64 {
        self.nelem.unwrap_or(u64::MAX)
    }

    /// Number of elements selected by this subtree, `None` if it does not
    /// fit in `u64`.
    #[inline]
    pub fn checked_num_elements(&self) -> Option<u64> {
        self.nelem
    }

    /// Number of levels (dimensions) below and including this list.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut cur = self.spans.first().and_then(|s| s.down.as_deref());
        while let Some(list) = cur {
            depth += 1;
            cur = list.spans.first().and_then(|s| s.down.as_deref());
        }
        depth
    }

    /// Recursive structural equality, short-circuited by pointer equality.
    pub fn structurally_eq(a: &SpanList, b: &SpanList) -> bool {
        if std::ptr::eq(a, b) {
            return true;
        }
        a.nelem == b.nelem
            && a.spans.len() == b.spans.len()
            && a.spans.iter().zip(&b.spans).all(|(x, y)| {
                x.low == y.low && x.high == y.high && same_down(x.down(), y.down())
            })
    }

    /// Deep copy of a tree. Sharing inside the source is preserved: a list
    /// reached through several parents is copied once.
    pub fn deep_copy(list: &SharedSpanList) -> SharedSpanList {
        let mut copied = NodeMemo::default();
        Self::copy_rec(list, &mut copied)
    }

    fn copy_rec(
        list: &SharedSpanList,
        copied: &mut NodeMemo<SharedSpanList>,
    ) -> SharedSpanList {
        let key = node_key(&**list);
        if let Some(done) = copied.get(&key) {
            return Arc::clone(done);
        }
        let spans = list
            .spans
            .iter()
            .map(|s| Span {
                low: s.low,
                high: s.high,
                down: s.down.as_ref().map(|d| Self::copy_rec(d, copied)),
            })
            .collect();
        let out = Arc::new(SpanList {
            spans,
            nelem: list.nelem,
        });
        copied.insert(key, Arc::clone(&out));
        out
    }

    /// Number of distinct list nodes reachable from this one.
    pub fn node_count(&self) -> usize {
        let mut seen = Visited::default();
        self.count_rec(&mut seen);
        seen.len()
    }

    fn count_rec(&self, seen: &mut Visited) {
        if !seen.insert(node_key(self)) {
            return;
        }
        for down in self.spans.iter().filter_map(Span::down) {
            down.count_rec(seen);
        }
    }

    /// Inclusive per-dimension `(low, high)` bounding box of the subtree.
    pub fn bounds(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::with_capacity(self.depth());
        let mut seen = Visited::default();
        self.bounds_rec(0, &mut out, &mut seen);
        out
    }

    fn bounds_rec(&self, d: usize, out: &mut Vec<(u64, u64)>, seen: &mut Visited) {
        if !seen.insert(node_key(self)) {
            return;
        }
        let (Some(first), Some(last)) = (self.spans.first(), self.spans.last()) else {
            return;
        };
        if out.len() == d {
            out.push((first.low, last.high));
        } else {
            out[d].0 = out[d].0.min(first.low);
            out[d].1 = out[d].1.max(last.high);
        }
        for down in self.spans.iter().filter_map(Span::down) {
            down.bounds_rec(d + 1, out, seen);
        }
    }

    /// Whether the element at `coords` is selected. `coords` must have one
    /// entry per level.
    pub fn contains(&self, coords: &[u64]) -> bool {
        let Some((&x, rest)) = coords.split_first() else {
            return false;
        };
        let i = self.spans.partition_point(|s| s.high < x);
        match self.spans.get(i) {
            Some(s) if s.low <= x => match &s.down {
                Some(down) => down.contains(rest),
                None => rest.is_empty(),
            },
            _ => false,
        }
    }

    /// Whether every level holds exactly one span.
    pub fn is_single_block(&self) -> bool {
        let mut cur = Some(self);
        while let Some(list) = cur {
            if list.spans.len() != 1 {
                return false;
            }
            cur = list.spans[0].down.as_deref();
        }
        true
    }

    /// Every N-dimensional block of the tree as inclusive `(start, end)`
    /// corners, ordered by their start coordinates.
    pub fn blocks(&self) -> Vec<(Vec<u64>, Vec<u64>)> {
        let mut out = Vec::new();
        let mut lo = Vec::new();
        let mut hi = Vec::new();
        self.blocks_rec(&mut lo, &mut hi, &mut out);
        out
    }

    fn blocks_rec(
        &self,
        lo: &mut Vec<u64>,
        hi: &mut Vec<u64>,
        out: &mut Vec<(Vec<u64>, Vec<u64>)>,
    ) {
        for s in &self.spans {
            lo.push(s.low);
            hi.push(s.high);
            match &s.down {
                Some(down) => down.blocks_rec(lo, hi, out),
                None => out.push((lo.clone(), hi.clone())),
            }
            lo.pop();
            hi.pop();
        }
    }

    /// Number of N-dimensional blocks, counting shared subtrees once per
    /// parent span.
    pub fn num_blocks(&self) -> u64 {
        let mut memo = NodeMemo::default();
        self.num_blocks_rec(&mut memo)
    }

    fn num_blocks_rec(&self, memo: &mut NodeMemo<u64>) -> u64 {
        if let Some(&n) = memo.get(&node_key(self)) {
            return n;
        }
        let n = self
            .spans
            .iter()
            .map(|s| match &s.down {
                Some(down) => down.num_blocks_rec(memo),
                None => 1,
            })
            .fold(0u64, u64::saturating_add);
        memo.insert(node_key(self), n);
        n
    }

    /// `list` below `levels` new leading levels that each select
    /// coordinate 0 only. The subtree is shared, not copied.
    pub(crate) fn with_unit_levels(list: &SharedSpanList, levels: usize) -> SharedSpanList {
        (0..levels).fold(Arc::clone(list), |down, _| {
            Arc::new(SpanList::from_spans(vec![Span {
                low: 0,
                high: 0,
                down: Some(down),
            }]))
        })
    }

    /// Copy of the tree with every coordinate of level `d` decreased by
    /// `shift[d]`. Callers guarantee no coordinate underflows.
    pub(crate) fn shifted_down(list: &SharedSpanList, shift: &[u64]) -> SharedSpanList {
        let mut done = NodeMemo::default();
        Self::shift_rec(list, shift, &mut done)
    }

    fn shift_rec(
        list: &SharedSpanList,
        shift: &[u64],
        done: &mut NodeMemo<SharedSpanList>,
    ) -> SharedSpanList {
        let key = node_key(&**list);
        if let Some(out) = done.get(&key) {
            return Arc::clone(out);
        }
        let (s0, rest) = shift.split_first().map_or((0, &[][..]), |(s, r)| (*s, r));
        let spans = list
            .spans
            .iter()
            .map(|s| Span {
                low: s.low - s0,
                high: s.high - s0,
                down: s.down.as_ref().map(|d| Self::shift_rec(d, rest, done)),
            })
            .collect();
        let out = Arc::new(SpanList {
            spans,
            nelem: list.nelem,
        });
        done.insert(key, Arc::clone(&out));
        out
    }

    fn validate_rec(&self, depth: usize, seen: &mut Visited) -> Result<(), HyperslabError> {
        if !seen.insert(node_key(self)) {
            return Ok(());
        }
        if self.spans.is_empty() {
            return Err(HyperslabError::InvariantViolation(
                "published span list is empty".into(),
            ));
        }
        for (i, s) in self.spans.iter().enumerate() {
            if s.low > s.high {
                return Err(HyperslabError::InvariantViolation(format!(
                    "span [{}, {}] has low > high",
                    s.low, s.high
                )));
            }
            if s.down.is_some() != (depth > 1) {
                return Err(HyperslabError::InvariantViolation(format!(
                    "span [{}, {}] has inconsistent depth",
                    s.low, s.high
                )));
            }
            if i > 0 {
                let prev = &self.spans[i - 1];
                if prev.high >= s.low {
                    return Err(HyperslabError::InvariantViolation(format!(
                        "spans [{}, {}] and [{}, {}] overlap or are unordered",
                        prev.low, prev.high, s.low, s.high
                    )));
                }
                if prev.high + 1 == s.low && same_down(prev.down(), s.down()) {
                    return Err(HyperslabError::InvariantViolation(format!(
                        "spans [{}, {}] and [{}, {}] should be coalesced",
                        prev.low, prev.high, s.low, s.high
                    )));
                }
            }
            if let Some(down) = &s.down {
                down.validate_rec(depth - 1, seen)?;
            }
        }
        let expected = Self::from_spans(self.spans.clone()).nelem;
        if expected != self.nelem {
            return Err(HyperslabError::InvariantViolation(format!(
                "cached element count {:?} != {:?}",
                self.nelem, expected
            )));
        }
        Ok(())
    }
}

impl DebugInvariants for SpanList {
    fn validate_invariants(&self) -> Result<(), HyperslabError> {
        let mut seen = Visited::default();
        self.validate_rec(self.depth(), &mut seen)
    }
}

/// A span list under construction.
///
/// Spans must be appended in increasing order; touching spans whose children
/// are the same selection are merged on the fly.
#[derive(Debug, Default)]
pub struct SpanListBuilder {
    spans: Vec<Span>,
}

impl SpanListBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with room for `n` spans.
    ///
    /// # Errors
    /// `AllocationFailure` if the storage cannot be reserved.
    pub fn try_with_capacity(n: u64) -> Result<Self, HyperslabError> {
        let fail = || HyperslabError::AllocationFailure { requested: n };
        let n = usize::try_from(n).map_err(|_| fail())?;
        let mut spans = Vec::new();
        spans.try_reserve_exact(n).map_err(|_| fail())?;
        Ok(Self { spans })
    }

    /// Append `[low, high]` with child `down`, coalescing with the previous
    /// span when they touch and their children are structurally identical.
    ///
    /// # Errors
    /// `InvalidArgument` if `low > high` or the interval does not start
    /// after the last appended one.
    pub fn append(
        &mut self,
        low: u64,
        high: u64,
        down: Option<SharedSpanList>,
    ) -> Result<(), HyperslabError> {
        if low > high {
            return Err(HyperslabError::invalid(format!(
                "span [{low}, {high}] has low > high"
            )));
        }
        if let Some(last) = self.spans.last_mut() {
            if last.high >= low {
                return Err(HyperslabError::invalid(format!(
                    "span [{low}, {high}] appended after [{}, {}]",
                    last.low, last.high
                )));
            }
            if last.high + 1 == low && same_down(last.down(), down.as_ref()) {
                last.high = high;
                return Ok(());
            }
        }
        self.spans.push(Span { low, high, down });
        Ok(())
    }

    /// Whether nothing has been appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Publish the list; an empty builder yields `None`.
    pub fn finish(self) -> Option<SharedSpanList> {
        if self.spans.is_empty() {
            None
        } else {
            Some(Arc::new(SpanList::from_spans(self.spans)))
        }
    }
}
