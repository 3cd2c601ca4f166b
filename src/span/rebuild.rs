//! `rebuild`: recognise span trees that are a single regular grid.

use super::{SharedSpanList, Span, same_down};
use crate::regular::RegularDim;
use itertools::Itertools;

/// Recover the regular descriptor of `tree`, if it has one.
///
/// Succeeds when every level consists of equally long spans at equally
/// spaced lows, all pointing at the same child selection, and the tree has
/// exactly `rank` levels. A level with a single span reports `stride = 1`.
/// Returns `None` otherwise; the tree is left untouched either way.
pub fn rebuild(tree: &SharedSpanList, rank: usize) -> Option<Vec<RegularDim>> {
    let mut dims = Vec::with_capacity(rank);
    let mut cur = Some(tree);
    while let Some(list) = cur {
        if dims.len() == rank {
            log::debug!("rebuild: tree deeper than rank {rank}");
            return None;
        }
        let spans = list.spans();
        let first = spans.first()?;
        let block = first.nelem();

        if spans.iter().any(|s| s.nelem() != block) {
            log::debug!("rebuild: unequal block lengths at level {}", dims.len());
            return None;
        }
        let stride = match spans {
            [_] => 1,
            [a, b, ..] => b.low() - a.low(),
            [] => return None,
        };
        let evenly_spaced = spans
            .iter()
            .map(Span::low)
            .tuple_windows()
            .all(|(x, y)| y - x == stride);
        if !evenly_spaced {
            log::debug!("rebuild: irregular stride at level {}", dims.len());
            return None;
        }
        if !spans.iter().all(|s| same_down(s.down(), first.down())) {
            log::debug!("rebuild: children differ at level {}", dims.len());
            return None;
        }

        dims.push(RegularDim::new(first.low(), stride, spans.len() as u64, block));
        cur = first.down();
    }
    (dims.len() == rank).then_some(dims)
}
