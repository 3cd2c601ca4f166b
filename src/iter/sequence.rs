//! The three sequence generators behind [`SelectionIter::next_runs`].
//!
//! Each one turns up to `budget` elements into runs, pushing them through a
//! [`RunSink`] that merges byte-adjacent runs and refuses new runs once the
//! caller's cap is reached. When the sink refuses, the generator stops with
//! the cursor on the first element not emitted.
//!
//! [`SelectionIter::next_runs`]: super::SelectionIter::next_runs

use super::{RegularCursor, Run, SpanCursor};

/// Bounded run buffer that coalesces adjacent runs.
pub(super) struct RunSink<'a> {
    out: &'a mut Vec<Run>,
    max_runs: usize,
    elmt_size: u64,
}

impl<'a> RunSink<'a> {
    pub(super) fn new(out: &'a mut Vec<Run>, max_runs: usize, elmt_size: u64) -> Self {
        Self {
            out,
            max_runs,
            elmt_size,
        }
    }

    /// Record `nelem` elements starting at linear element `start`. Returns
    /// `false`, recording nothing, when that needs a new run and the buffer
    /// is full.
    fn push(&mut self, start: u64, nelem: u64) -> bool {
        let offset = start * self.elmt_size;
        let len = nelem * self.elmt_size;
        if let Some(last) = self.out.last_mut() {
            if last.offset + last.len == offset {
                last.len += len;
                return true;
            }
        }
        if self.out.len() >= self.max_runs {
            return false;
        }
        self.out.push(Run { offset, len });
        true
    }
}

/// General path: walk the span tree one fastest-level span segment at a
/// time.
pub(super) fn span_runs(cur: &mut SpanCursor, sink: &mut RunSink<'_>, budget: u64) -> u64 {
    let mut done = 0;
    while done < budget {
        let take = cur.row_left().min(budget - done);
        if !sink.push(cur.linear(), take) {
            break;
        }
        cur.step(take);
        done += take;
    }
    done
}

/// Regular path: finish a block left partially consumed by the previous
/// call, then emit whole fastest-dimension blocks.
pub(super) fn regular_runs(cur: &mut RegularCursor, sink: &mut RunSink<'_>, budget: u64) -> u64 {
    let mut done = 0;
    if cur.row_pos() != 0 {
        let take = cur.row_left().min(budget);
        if !sink.push(cur.linear(), take) {
            return 0;
        }
        cur.step(take);
        done = take;
    }
    let block = cur.row_block();
    while done < budget {
        let take = block.min(budget - done);
        if !sink.push(cur.linear(), take) {
            break;
        }
        cur.step(take);
        done += take;
    }
    done
}

/// Single-block path: rows of one block, no block counters involved.
pub(super) fn single_block_runs(cur: &mut RegularCursor, sink: &mut RunSink<'_>, budget: u64) -> u64 {
    let mut done = 0;
    while done < budget {
        let take = cur.row_left().min(budget - done);
        if !sink.push(cur.linear(), take) {
            break;
        }
        cur.step_in_block(take);
        done += take;
    }
    done
}
