//! Iteration over the elements of a [`Selection`] in row-major order.
//!
//! A [`SelectionIter`] snapshots what it needs from the selection (the span
//! tree handle, or the flattened regular descriptor) and never writes back,
//! so any number of iterators can walk one selection at the same time. The
//! main consumer is [`SelectionIter::next_runs`], which turns the next batch
//! of elements into `(byte offset, byte length)` runs for I/O.

mod block;
mod sequence;

use crate::extent::Extent;
use crate::hyperslab_error::HyperslabError;
use crate::regular::RegularDim;
use crate::selection::{Layout, Selection};
use crate::span::SharedSpanList;
use sequence::RunSink;

pub use block::{Block, BlockIter};

/// A contiguous run of bytes in the linearised dataset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Run {
    /// Byte offset of the first element.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

/// Which sequence generator an iterator uses. Chosen once, when the iterator
/// is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SeqPath {
    /// Nothing to iterate.
    Empty,
    /// Walk of a general span tree.
    General,
    /// Arithmetic over a regular grid of blocks.
    Regular,
    /// One N-dimensional block.
    SingleBlock,
}

/// Cursor over the flattened, offset-applied dimensions of a regular
/// selection.
///
/// Trailing dimensions selected in full are folded into the next slower
/// dimension, so the fastest remaining dimension has blocks as long as
/// possible.
#[derive(Clone, Debug)]
pub(crate) struct RegularCursor {
    dims: Vec<RegularDim>,
    strides: Vec<u64>,
    /// Block index per dimension.
    blk: Vec<u64>,
    /// Position inside the current block per dimension.
    pos: Vec<u64>,
}

impl RegularCursor {
    fn new(dims: &[RegularDim], offset: &[i64], extent: &Extent) -> Self {
        let mut dims: Vec<RegularDim> = dims
            .iter()
            .zip(offset)
            .map(|(d, &off)| RegularDim {
                start: d.start.saturating_add_signed(off),
                ..*d
            })
            .collect();
        let mut sizes = extent.dims().to_vec();

        while dims.len() > 1 {
            let last = dims[dims.len() - 1];
            let n = sizes[sizes.len() - 1];
            if !(last.count == 1 && last.start == 0 && last.block == n) {
                break;
            }
            dims.pop();
            sizes.pop();
            let (d, s) = (dims.len() - 1, sizes.len() - 1);
            let prev = dims[d];
            dims[d] = RegularDim::new(prev.start * n, prev.stride * n, prev.count, prev.block * n);
            sizes[s] *= n;
        }

        let mut strides = vec![1u64; sizes.len()];
        for d in (0..sizes.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * sizes[d + 1];
        }
        let rank = dims.len();
        Self {
            dims,
            strides,
            blk: vec![0; rank],
            pos: vec![0; rank],
        }
    }

    #[inline]
    fn fast(&self) -> usize {
        self.dims.len() - 1
    }

    pub(crate) fn is_single_block(&self) -> bool {
        self.dims.iter().all(|d| d.count == 1)
    }

    /// Linear element index of the current element.
    pub(crate) fn linear(&self) -> u64 {
        self.dims
            .iter()
            .zip(&self.strides)
            .enumerate()
            .map(|(d, (dim, s))| (dim.block_start(self.blk[d]) + self.pos[d]) * s)
            .sum()
    }

    /// Length of the fastest dimension's blocks.
    #[inline]
    pub(crate) fn row_block(&self) -> u64 {
        self.dims[self.fast()].block
    }

    /// Position inside the current fastest-dimension block.
    #[inline]
    pub(crate) fn row_pos(&self) -> u64 {
        self.pos[self.fast()]
    }

    /// Elements left in the current fastest-dimension block.
    #[inline]
    pub(crate) fn row_left(&self) -> u64 {
        self.row_block() - self.row_pos()
    }

    /// Move `n <= row_left()` elements forward, carrying into slower
    /// dimensions when the row ends.
    pub(crate) fn step(&mut self, n: u64) {
        let f = self.fast();
        self.pos[f] += n;
        if self.pos[f] < self.dims[f].block {
            return;
        }
        self.pos[f] = 0;
        self.blk[f] += 1;
        if self.blk[f] < self.dims[f].count {
            return;
        }
        self.blk[f] = 0;
        for d in (0..f).rev() {
            self.pos[d] += 1;
            if self.pos[d] < self.dims[d].block {
                return;
            }
            self.pos[d] = 0;
            self.blk[d] += 1;
            if self.blk[d] < self.dims[d].count {
                return;
            }
            self.blk[d] = 0;
        }
    }

    /// [`step`](Self::step) for a single block: no block counters to carry.
    pub(crate) fn step_in_block(&mut self, n: u64) {
        let f = self.fast();
        self.pos[f] += n;
        if self.pos[f] < self.dims[f].block {
            return;
        }
        self.pos[f] = 0;
        for d in (0..f).rev() {
            self.pos[d] += 1;
            if self.pos[d] < self.dims[d].block {
                return;
            }
            self.pos[d] = 0;
        }
    }
}

/// Cursor over a span tree: the current span and coordinate at every level.
#[derive(Clone, Debug)]
pub(crate) struct SpanCursor {
    lists: Vec<SharedSpanList>,
    idx: Vec<usize>,
    coord: Vec<u64>,
    strides: Vec<u64>,
    /// Linear distance added by the selection offset, modulo 2^64.
    base: u64,
}

impl SpanCursor {
    fn new(root: SharedSpanList, offset: &[i64], extent: &Extent) -> Self {
        let strides = extent.strides();
        // wrapping: every offset-applied coordinate was validated in range
        let base = offset
            .iter()
            .zip(&strides)
            .fold(0u64, |acc, (&o, &s)| acc.wrapping_add((o as u64).wrapping_mul(s)));
        let rank = extent.rank();
        let mut cur = Self {
            lists: Vec::with_capacity(rank),
            idx: Vec::with_capacity(rank),
            coord: Vec::with_capacity(rank),
            strides,
            base,
        };
        cur.descend_from(root);
        cur
    }

    /// Push the first span of `list` and of every list below it.
    fn descend_from(&mut self, list: SharedSpanList) {
        let mut next = Some(list);
        while let Some(list) = next {
            let first = &list.spans()[0];
            self.coord.push(first.low());
            self.idx.push(0);
            next = first.down().cloned();
            self.lists.push(list);
        }
    }

    #[inline]
    fn fast(&self) -> usize {
        self.lists.len() - 1
    }

    pub(crate) fn linear(&self) -> u64 {
        self.coord
            .iter()
            .zip(&self.strides)
            .map(|(&c, &s)| c * s)
            .fold(self.base, u64::wrapping_add)
    }

    /// Elements left in the current fastest-level span.
    pub(crate) fn row_left(&self) -> u64 {
        let f = self.fast();
        self.lists[f].spans()[self.idx[f]].high() - self.coord[f] + 1
    }

    /// Move `n <= row_left()` elements forward. Past the last element the
    /// cursor stays put.
    pub(crate) fn step(&mut self, n: u64) {
        let f = self.fast();
        self.coord[f] += n;
        let mut d = f;
        loop {
            let spans = self.lists[d].spans();
            if self.coord[d] <= spans[self.idx[d]].high() {
                break;
            }
            if self.idx[d] + 1 < spans.len() {
                self.idx[d] += 1;
                self.coord[d] = spans[self.idx[d]].low();
                break;
            }
            if d == 0 {
                return;
            }
            d -= 1;
            self.coord[d] += 1;
        }
        if d == f {
            return;
        }
        // reset the faster levels under the span now current at level d
        let down = self.lists[d].spans()[self.idx[d]].down().cloned();
        self.lists.truncate(d + 1);
        self.idx.truncate(d + 1);
        self.coord.truncate(d + 1);
        if let Some(down) = down {
            self.descend_from(down);
        }
    }
}

#[derive(Clone, Debug)]
enum Cursor {
    Empty,
    Regular(RegularCursor),
    SingleBlock(RegularCursor),
    Span(SpanCursor),
}

/// Resumable cursor producing the elements of a selection in row-major
/// order.
#[derive(Clone, Debug)]
pub struct SelectionIter {
    extent: Extent,
    elmt_size: u64,
    elements_left: u64,
    cursor: Cursor,
}

impl Selection {
    /// Start iterating, with each element `elmt_size` bytes long.
    ///
    /// # Errors
    /// - `InvalidArgument` if `elmt_size` is zero or the dataset size in bytes
    ///   overflows `u64`.
    /// - `OutOfBounds` if the offset moves the selection outside the extent.
    /// - `AllocationFailure` if a regular selection's tree must be built and
    ///   cannot be.
    pub fn iter(&self, elmt_size: u64) -> Result<SelectionIter, HyperslabError> {
        if elmt_size == 0 {
            return Err(HyperslabError::invalid("element size is zero"));
        }
        self.extent()
            .num_elements()
            .checked_mul(elmt_size)
            .ok_or_else(|| HyperslabError::invalid("dataset size in bytes overflows u64"))?;
        self.validate_against_extent()?;

        let extent = self.extent().clone();
        let cursor = match self.layout() {
            Layout::Empty => Cursor::Empty,
            Layout::Regular { desc, .. } => {
                let cur = RegularCursor::new(desc.opt(), self.offset(), &extent);
                if cur.is_single_block() {
                    Cursor::SingleBlock(cur)
                } else {
                    Cursor::Regular(cur)
                }
            }
            Layout::General { tree } => {
                Cursor::Span(SpanCursor::new(tree.clone(), self.offset(), &extent))
            }
        };
        let it = SelectionIter {
            extent,
            elmt_size,
            elements_left: self.num_elements(),
            cursor,
        };
        log::trace!("iter: {:?} path over {} elements", it.path(), it.elements_left);
        Ok(it)
    }
}

impl SelectionIter {
    /// Elements not yet produced.
    #[inline]
    pub fn elements_left(&self) -> u64 {
        self.elements_left
    }

    /// Element size in bytes.
    #[inline]
    pub fn element_size(&self) -> u64 {
        self.elmt_size
    }

    /// The sequence generator in use.
    pub fn path(&self) -> SeqPath {
        match self.cursor {
            Cursor::Empty => SeqPath::Empty,
            Cursor::Regular(_) => SeqPath::Regular,
            Cursor::SingleBlock(_) => SeqPath::SingleBlock,
            Cursor::Span(_) => SeqPath::General,
        }
    }

    /// Coordinates of the next element (offset applied), `None` once done.
    pub fn coords(&self) -> Option<Vec<u64>> {
        if self.elements_left == 0 {
            return None;
        }
        let linear = match &self.cursor {
            Cursor::Empty => return None,
            Cursor::Regular(c) | Cursor::SingleBlock(c) => c.linear(),
            Cursor::Span(c) => c.linear(),
        };
        Some(self.extent.coords_of(linear))
    }

    /// Skip up to `n` elements; returns how many were skipped.
    pub fn advance(&mut self, n: u64) -> u64 {
        let n = n.min(self.elements_left);
        let mut left = n;
        while left > 0 {
            let take = match &mut self.cursor {
                Cursor::Empty => break,
                Cursor::Regular(c) => {
                    let t = c.row_left().min(left);
                    c.step(t);
                    t
                }
                Cursor::SingleBlock(c) => {
                    let t = c.row_left().min(left);
                    c.step_in_block(t);
                    t
                }
                Cursor::Span(c) => {
                    let t = c.row_left().min(left);
                    c.step(t);
                    t
                }
            };
            left -= take;
        }
        self.elements_left -= n - left;
        n - left
    }

    /// Produce runs for the next elements: at most `max_runs` runs covering
    /// at most `max_elements` elements. Returns the runs and the number of
    /// elements they cover; both are empty / zero once the iterator is done.
    pub fn next_runs(&mut self, max_runs: usize, max_elements: u64) -> (Vec<Run>, u64) {
        let mut out = Vec::new();
        let n = self.next_runs_into(max_runs, max_elements, &mut out);
        (out, n)
    }

    /// [`next_runs`](Self::next_runs) into a caller-owned buffer, which is
    /// cleared first.
    pub fn next_runs_into(&mut self, max_runs: usize, max_elements: u64, out: &mut Vec<Run>) -> u64 {
        out.clear();
        let budget = max_elements.min(self.elements_left);
        if budget == 0 || max_runs == 0 {
            return 0;
        }
        let mut sink = RunSink::new(out, max_runs, self.elmt_size);
        let done = match &mut self.cursor {
            Cursor::Empty => 0,
            Cursor::Regular(c) => sequence::regular_runs(c, &mut sink, budget),
            Cursor::SingleBlock(c) => sequence::single_block_runs(c, &mut sink, budget),
            Cursor::Span(c) => sequence::span_runs(c, &mut sink, budget),
        };
        self.elements_left -= done;
        done
    }
}
