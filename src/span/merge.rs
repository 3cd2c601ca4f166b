//! `merge`: union of two span trees.

use super::{SharedSpanList, Span, SpanList, SpanListBuilder};
use crate::hyperslab_error::HyperslabError;
use crate::perf::{PairMemo, pair_key};
use std::sync::Arc;

/// How subtrees of the `new` operand of [`merge`] enter the result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SpanCopy {
    /// Reference `new`'s lists directly (the caller gives up ownership).
    #[default]
    Share,
    /// Deep-copy `new` first so the result shares nothing with it.
    Deep,
}

/// Union of `existing` and `new`.
///
/// The operands may overlap; overlapping intervals are split and their
/// children merged recursively. Pieces that come from `existing` alone are
/// always shared with it.
///
/// # Errors
/// `InvalidArgument` if the trees have different depths.
pub fn merge(
    existing: Option<&SharedSpanList>,
    new: Option<&SharedSpanList>,
    copy: SpanCopy,
) -> Result<Option<SharedSpanList>, HyperslabError> {
    let new = match (new, copy) {
        (Some(n), SpanCopy::Deep) => Some(SpanList::deep_copy(n)),
        (n, _) => n.cloned(),
    };
    match (existing, new) {
        (None, None) => Ok(None),
        (Some(e), None) => Ok(Some(Arc::clone(e))),
        (None, Some(n)) => Ok(Some(n)),
        (Some(e), Some(n)) => {
            let mut memo = PairMemo::default();
            union(e, &n, &mut memo).map(Some)
        }
    }
}

fn union(
    a: &SharedSpanList,
    b: &SharedSpanList,
    memo: &mut PairMemo<SharedSpanList>,
) -> Result<SharedSpanList, HyperslabError> {
    if Arc::ptr_eq(a, b) {
        return Ok(Arc::clone(a));
    }
    let key = pair_key(a, b);
    if let Some(done) = memo.get(&key) {
        return Ok(Arc::clone(done));
    }

    let (sa, sb) = (a.spans(), b.spans());
    let mut out = SpanListBuilder::new();
    let (mut ia, mut ib) = (0usize, 0usize);
    // current low of the (possibly trimmed) head span on each side
    let mut la = sa.first().map(Span::low);
    let mut lb = sb.first().map(Span::low);

    loop {
        match (la, lb) {
            (None, None) => break,
            (Some(lo), None) => {
                let s = &sa[ia];
                out.append(lo, s.high, s.down.clone())?;
                ia += 1;
                la = sa.get(ia).map(Span::low);
            }
            (None, Some(lo)) => {
                let s = &sb[ib];
                out.append(lo, s.high, s.down.clone())?;
                ib += 1;
                lb = sb.get(ib).map(Span::low);
            }
            (Some(alo), Some(blo)) => {
                let (x, y) = (&sa[ia], &sb[ib]);
                if x.high < blo {
                    out.append(alo, x.high, x.down.clone())?;
                    ia += 1;
                    la = sa.get(ia).map(Span::low);
                } else if y.high < alo {
                    out.append(blo, y.high, y.down.clone())?;
                    ib += 1;
                    lb = sb.get(ib).map(Span::low);
                } else if alo < blo {
                    out.append(alo, blo - 1, x.down.clone())?;
                    la = Some(blo);
                } else if blo < alo {
                    out.append(blo, alo - 1, y.down.clone())?;
                    lb = Some(alo);
                } else {
                    let high = x.high.min(y.high);
                    let down = match (&x.down, &y.down) {
                        (None, None) => None,
                        (Some(dx), Some(dy)) => Some(union(dx, dy, memo)?),
                        _ => {
                            return Err(HyperslabError::invalid(
                                "cannot merge span trees of different depth",
                            ));
                        }
                    };
                    out.append(alo, high, down)?;
                    if high == x.high {
                        ia += 1;
                        la = sa.get(ia).map(Span::low);
                    } else {
                        la = Some(high + 1);
                    }
                    if high == y.high {
                        ib += 1;
                        lb = sb.get(ib).map(Span::low);
                    } else {
                        lb = Some(high + 1);
                    }
                }
            }
        }
    }

    // both inputs are non-empty, so the union is too
    let merged = out
        .finish()
        .ok_or_else(|| HyperslabError::InvariantViolation("union of non-empty lists is empty".into()))?;
    memo.insert(key, Arc::clone(&merged));
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;
    use crate::regular::RegularDim;
    use crate::span::make;

    #[test]
    fn union_of_overlapping_squares() {
        let a = make(&[RegularDim::block(0, 4), RegularDim::block(0, 4)]).unwrap();
        let b = make(&[RegularDim::block(2, 4), RegularDim::block(2, 4)]).unwrap();
        let u = merge(Some(&a), Some(&b), SpanCopy::Share).unwrap().unwrap();
        assert_eq!(u.num_elements(), 16 + 16 - 4);
        assert_eq!(u.bounds(), vec![(0, 5), (0, 5)]);
        assert!(u.contains(&[5, 5]) && u.contains(&[0, 0]) && !u.contains(&[0, 5]));
        u.validate_invariants().unwrap();
    }

    #[test]
    fn union_of_adjacent_blocks_coalesces() {
        let a = make(&[RegularDim::block(0, 2), RegularDim::block(0, 3)]).unwrap();
        let b = make(&[RegularDim::block(2, 2), RegularDim::block(0, 3)]).unwrap();
        let u = merge(Some(&a), Some(&b), SpanCopy::Share).unwrap().unwrap();
        assert_eq!(u.len(), 1);
        assert!(u.is_single_block());
        assert_eq!(u.num_elements(), 12);
    }

    #[test]
    fn share_and_deep_copy() {
        let a = make(&[RegularDim::block(0, 2)]).unwrap();
        let shared = merge(None, Some(&a), SpanCopy::Share).unwrap().unwrap();
        assert!(Arc::ptr_eq(&shared, &a));
        let copied = merge(None, Some(&a), SpanCopy::Deep).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&copied, &a));
        assert!(SpanList::structurally_eq(&copied, &a));
        assert!(merge(None, None, SpanCopy::Share).unwrap().is_none());
    }

    #[test]
    fn self_union_is_identity() {
        let a = make(&[RegularDim::new(0, 3, 3, 1), RegularDim::block(1, 2)]).unwrap();
        let u = merge(Some(&a), Some(&a), SpanCopy::Share).unwrap().unwrap();
        assert!(SpanList::structurally_eq(&u, &a));
    }
}
