//! Block-wise walk over a selection.
//!
//! A [`BlockIter`] visits the N-dimensional blocks of a selection in the
//! order [`Selection::blocks`] lists them, one at a time and without
//! materialising the list: the grid blocks of a regular selection, or one
//! block per root-to-leaf path of a span tree. Corners are reported with the
//! selection offset applied.

use crate::hyperslab_error::HyperslabError;
use crate::regular::RegularDim;
use crate::selection::{Layout, Selection};
use crate::span::SharedSpanList;

/// Inclusive `(start, end)` corners of one block.
pub type Block = (Vec<u64>, Vec<u64>);

#[derive(Clone, Debug)]
enum BlockCursor {
    Done,
    Regular {
        dims: Vec<RegularDim>,
        /// Block index per dimension.
        k: Vec<u64>,
    },
    Span {
        lists: Vec<SharedSpanList>,
        idx: Vec<usize>,
    },
}

/// Resumable cursor over the blocks of a selection.
#[derive(Clone, Debug)]
pub struct BlockIter {
    offset: Vec<i64>,
    cursor: BlockCursor,
}

impl Selection {
    /// Walk the blocks of the selection, offset applied.
    ///
    /// # Errors
    /// `OutOfBounds` if the offset moves the selection outside the extent.
    pub fn iter_blocks(&self) -> Result<BlockIter, HyperslabError> {
        self.validate_against_extent()?;
        let cursor = match self.layout() {
            Layout::Empty => BlockCursor::Done,
            Layout::Regular { desc, .. } => BlockCursor::Regular {
                dims: desc.opt().to_vec(),
                k: vec![0; desc.rank()],
            },
            Layout::General { tree } => {
                let mut lists = Vec::with_capacity(self.rank());
                let mut idx = Vec::with_capacity(self.rank());
                descend(&mut lists, &mut idx, Some(tree.clone()));
                BlockCursor::Span { lists, idx }
            }
        };
        Ok(BlockIter {
            offset: self.offset().to_vec(),
            cursor,
        })
    }
}

/// Push the first span of `list` and of every list below it.
fn descend(lists: &mut Vec<SharedSpanList>, idx: &mut Vec<usize>, list: Option<SharedSpanList>) {
    let mut next = list;
    while let Some(list) = next {
        next = list.spans().first().and_then(|s| s.down().cloned());
        lists.push(list);
        idx.push(0);
    }
}

impl BlockIter {
    /// The current block, `None` once every block was visited.
    pub fn block(&self) -> Option<Block> {
        let (lo, hi): (Vec<u64>, Vec<u64>) = match &self.cursor {
            BlockCursor::Done => return None,
            BlockCursor::Regular { dims, k } => dims
                .iter()
                .zip(k)
                .map(|(d, &k)| {
                    let start = d.block_start(k);
                    (start, start + d.block - 1)
                })
                .unzip(),
            BlockCursor::Span { lists, idx } => lists
                .iter()
                .zip(idx)
                .map(|(list, &i)| {
                    let s = &list.spans()[i];
                    (s.low(), s.high())
                })
                .unzip(),
        };
        let place = |v: Vec<u64>| -> Vec<u64> {
            // in range: checked against the extent when the walk started
            v.iter()
                .zip(&self.offset)
                .map(|(&x, &o)| x.saturating_add_signed(o))
                .collect()
        };
        Some((place(lo), place(hi)))
    }

    /// Whether another block follows the current one.
    pub fn has_next_block(&self) -> bool {
        match &self.cursor {
            BlockCursor::Done => false,
            BlockCursor::Regular { dims, k } => dims.iter().zip(k).any(|(d, &k)| k + 1 < d.count),
            BlockCursor::Span { lists, idx } => {
                lists.iter().zip(idx).any(|(list, &i)| i + 1 < list.len())
            }
        }
    }

    /// Move to the next block. Returns `false`, leaving the walk finished,
    /// when there is none.
    pub fn next_block(&mut self) -> bool {
        let moved = match &mut self.cursor {
            BlockCursor::Done => false,
            BlockCursor::Regular { dims, k } => {
                let mut moved = false;
                for d in (0..dims.len()).rev() {
                    k[d] += 1;
                    if k[d] < dims[d].count {
                        moved = true;
                        break;
                    }
                    k[d] = 0;
                }
                moved
            }
            BlockCursor::Span { lists, idx } => {
                match (0..lists.len()).rev().find(|&d| idx[d] + 1 < lists[d].len()) {
                    Some(d) => {
                        idx[d] += 1;
                        let down = lists[d].spans()[idx[d]].down().cloned();
                        lists.truncate(d + 1);
                        idx.truncate(d + 1);
                        descend(lists, idx, down);
                        true
                    }
                    None => false,
                }
            }
        };
        if !moved {
            self.cursor = BlockCursor::Done;
        }
        moved
    }
}

impl Iterator for BlockIter {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let block = self.block()?;
        self.next_block();
        Some(block)
    }
}
