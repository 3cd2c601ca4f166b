//! `clip`: partition two span trees into "only A", "both", and "only B".

use super::{SharedSpanList, Span, SpanListBuilder};
use crate::hyperslab_error::HyperslabError;
use crate::perf::{PairMemo, pair_key};
use std::sync::Arc;

/// Which outputs of [`clip`] the caller needs. Unrequested outputs are not
/// built and come back as `None`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipWant {
    /// Build `a_not_b`.
    pub a_not_b: bool,
    /// Build `a_and_b`.
    pub a_and_b: bool,
    /// Build `b_not_a`.
    pub b_not_a: bool,
}

impl ClipWant {
    /// All three outputs.
    pub const ALL: ClipWant = ClipWant {
        a_not_b: true,
        a_and_b: true,
        b_not_a: true,
    };
}

/// The three disjoint parts of `a ∪ b`. `None` means "no elements".
#[derive(Clone, Debug, Default)]
pub struct ClipOutput {
    /// Elements only in `a`.
    pub a_not_b: Option<SharedSpanList>,
    /// Elements in both.
    pub a_and_b: Option<SharedSpanList>,
    /// Elements only in `b`.
    pub b_not_a: Option<SharedSpanList>,
}

/// Partition `a ∪ b` into `a \ b`, `a ∩ b` and `b \ a`.
///
/// An absent input selects nothing: the other input is shared into its
/// "only" output and the intersection is empty. Both trees must have the
/// same depth.
///
/// # Errors
/// `InvalidArgument` if the trees have different depths.
pub fn clip(
    a: Option<&SharedSpanList>,
    b: Option<&SharedSpanList>,
    want: ClipWant,
) -> Result<ClipOutput, HyperslabError> {
    match (a, b) {
        (None, None) => Ok(ClipOutput::default()),
        (Some(a), None) => Ok(ClipOutput {
            a_not_b: want.a_not_b.then(|| Arc::clone(a)),
            ..ClipOutput::default()
        }),
        (None, Some(b)) => Ok(ClipOutput {
            b_not_a: want.b_not_a.then(|| Arc::clone(b)),
            ..ClipOutput::default()
        }),
        (Some(a), Some(b)) => {
            let mut memo = PairMemo::default();
            Clipper { want, memo: &mut memo }.lists(a, b)
        }
    }
}

struct Clipper<'m> {
    want: ClipWant,
    memo: &'m mut PairMemo<ClipOutput>,
}

/// Current, possibly already trimmed, piece of a span during the sweep.
#[derive(Copy, Clone)]
struct Piece<'s> {
    low: u64,
    span: &'s Span,
}

impl<'s> Piece<'s> {
    fn at(spans: &'s [Span], i: usize) -> Option<Self> {
        spans.get(i).map(|span| Piece {
            low: span.low,
            span,
        })
    }

    #[inline]
    fn high(&self) -> u64 {
        self.span.high
    }

    #[inline]
    fn down(&self) -> Option<SharedSpanList> {
        self.span.down.clone()
    }
}

#[derive(Default)]
struct Outputs {
    a_not_b: SpanListBuilder,
    a_and_b: SpanListBuilder,
    b_not_a: SpanListBuilder,
}

impl Clipper<'_> {
    fn lists(&mut self, a: &SharedSpanList, b: &SharedSpanList) -> Result<ClipOutput, HyperslabError> {
        let key = pair_key(a, b);
        if let Some(done) = self.memo.get(&key) {
            return Ok(done.clone());
        }
        let out = if Arc::ptr_eq(a, b) {
            ClipOutput {
                a_and_b: self.want.a_and_b.then(|| Arc::clone(a)),
                ..ClipOutput::default()
            }
        } else {
            self.sweep(a.spans(), b.spans())?
        };
        self.memo.insert(key, out.clone());
        Ok(out)
    }

    fn sweep(&mut self, sa: &[Span], sb: &[Span]) -> Result<ClipOutput, HyperslabError> {
        let want = self.want;
        let mut out = Outputs::default();
        let (mut ia, mut ib) = (0usize, 0usize);
        let mut cur_a = Piece::at(sa, ia);
        let mut cur_b = Piece::at(sb, ib);

        loop {
            match (cur_a, cur_b) {
                (None, None) => break,
                (Some(pa), None) => {
                    if want.a_not_b {
                        out.a_not_b.append(pa.low, pa.high(), pa.down())?;
                    }
                    ia += 1;
                    cur_a = Piece::at(sa, ia);
                }
                (None, Some(pb)) => {
                    if want.b_not_a {
                        out.b_not_a.append(pb.low, pb.high(), pb.down())?;
                    }
                    ib += 1;
                    cur_b = Piece::at(sb, ib);
                }
                // disjoint, a entirely before b
                (Some(pa), Some(pb)) if pa.high() < pb.low => {
                    if want.a_not_b {
                        out.a_not_b.append(pa.low, pa.high(), pa.down())?;
                    }
                    ia += 1;
                    cur_a = Piece::at(sa, ia);
                }
                // disjoint, b entirely before a
                (Some(pa), Some(pb)) if pb.high() < pa.low => {
                    if want.b_not_a {
                        out.b_not_a.append(pb.low, pb.high(), pb.down())?;
                    }
                    ib += 1;
                    cur_b = Piece::at(sb, ib);
                }
                // overlapping, a starts first: split off a's leading part
                (Some(pa), Some(pb)) if pa.low < pb.low => {
                    if want.a_not_b {
                        out.a_not_b.append(pa.low, pb.low - 1, pa.down())?;
                    }
                    cur_a = Some(Piece { low: pb.low, ..pa });
                }
                // overlapping, b starts first: split off b's leading part
                (Some(pa), Some(pb)) if pb.low < pa.low => {
                    if want.b_not_a {
                        out.b_not_a.append(pb.low, pa.low - 1, pb.down())?;
                    }
                    cur_b = Some(Piece { low: pa.low, ..pb });
                }
                // common start: the overlap runs to the nearer high
                (Some(pa), Some(pb)) => {
                    let low = pa.low;
                    let high = pa.high().min(pb.high());
                    self.overlap(&mut out, low, high, pa.span, pb.span)?;

                    if high == pa.high() {
                        ia += 1;
                        cur_a = Piece::at(sa, ia);
                    } else {
                        cur_a = Some(Piece { low: high + 1, ..pa });
                    }
                    if high == pb.high() {
                        ib += 1;
                        cur_b = Piece::at(sb, ib);
                    } else {
                        cur_b = Some(Piece { low: high + 1, ..pb });
                    }
                }
            }
        }

        Ok(ClipOutput {
            a_not_b: out.a_not_b.finish(),
            a_and_b: out.a_and_b.finish(),
            b_not_a: out.b_not_a.finish(),
        })
    }

    fn overlap(
        &mut self,
        out: &mut Outputs,
        low: u64,
        high: u64,
        a: &Span,
        b: &Span,
    ) -> Result<(), HyperslabError> {
        match (&a.down, &b.down) {
            (None, None) => {
                if self.want.a_and_b {
                    out.a_and_b.append(low, high, None)?;
                }
            }
            (Some(da), Some(db)) => {
                let sub = self.lists(da, db)?;
                if let Some(x) = sub.a_not_b {
                    out.a_not_b.append(low, high, Some(x))?;
                }
                if let Some(x) = sub.a_and_b {
                    out.a_and_b.append(low, high, Some(x))?;
                }
                if let Some(x) = sub.b_not_a {
                    out.b_not_a.append(low, high, Some(x))?;
                }
            }
            _ => {
                return Err(HyperslabError::invalid(
                    "cannot clip span trees of different depth",
                ));
            }
        }
        Ok(())
    }
}
