//! Read-only queries and offset handling for [`Selection`].

use super::{Layout, Selection};
use crate::extent::Extent;
use crate::hyperslab_error::HyperslabError;
use crate::regular::RegularDescriptor;
use crate::span::SpanList;
use once_cell::sync::OnceCell;

impl Selection {
    /// Number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.extent.rank()
    }

    /// Shape of the dataset the selection lives in.
    #[inline]
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// Number of selected elements.
    #[inline]
    pub fn num_elements(&self) -> u64 {
        self.num_elements
    }

    /// Translation applied to stored coordinates at use time.
    #[inline]
    pub fn offset(&self) -> &[i64] {
        &self.offset
    }

    /// Replace the translation. Bounds are not checked here; see
    /// [`validate_against_extent`](Self::validate_against_extent).
    ///
    /// # Errors
    /// `InvalidArgument` if `offset` does not have the selection's rank.
    pub fn set_offset(&mut self, offset: &[i64]) -> Result<(), HyperslabError> {
        if offset.len() != self.rank() {
            return Err(HyperslabError::invalid(format!(
                "offset has {} entries, selection rank is {}",
                offset.len(),
                self.rank()
            )));
        }
        self.offset.copy_from_slice(offset);
        Ok(())
    }

    /// Whether the selection is stored as one regular grid of blocks.
    #[inline]
    pub fn is_regular(&self) -> bool {
        matches!(self.layout, Layout::Regular { .. })
    }

    /// The regular descriptor of the selection.
    ///
    /// # Errors
    /// `UnsupportedOperation` if the selection is empty or not regular.
    pub fn regular_hyperslab(&self) -> Result<&RegularDescriptor, HyperslabError> {
        match &self.layout {
            Layout::Regular { desc, .. } => Ok(desc),
            _ => Err(HyperslabError::UnsupportedOperation(
                "selection is not a regular hyperslab",
            )),
        }
    }

    /// Every dimension has exactly one selected interval. An empty selection
    /// is not a single block.
    pub fn is_single_block(&self) -> bool {
        match &self.layout {
            Layout::Empty => false,
            Layout::Regular { desc, .. } => desc.is_single_block(),
            Layout::General { tree } => tree.is_single_block(),
        }
    }

    /// Whether the selected elements form one run in row-major order.
    ///
    /// That is the case for a single block whose dimensions, scanned from the
    /// slowest, are `1` wide up to some dimension and then cover the full
    /// extent after it.
    pub fn is_contiguous(&self) -> bool {
        let Layout::Regular { desc, .. } = &self.layout else {
            // a general tree is never a single block once rebuilt
            return false;
        };
        if !desc.is_single_block() {
            return false;
        }
        let dims = desc.opt();
        let Some(k) = dims.iter().position(|d| d.block > 1) else {
            return true;
        };
        dims[k + 1..]
            .iter()
            .zip(&self.extent.dims()[k + 1..])
            .all(|(d, &n)| d.block == n)
    }

    /// Bounds of the stored coordinates, offset not applied.
    pub(crate) fn raw_bounds(&self) -> Option<Vec<(u64, u64)>> {
        match &self.layout {
            Layout::Empty => None,
            Layout::Regular { desc, .. } => Some(desc.bounds()),
            Layout::General { tree } => Some(tree.bounds()),
        }
    }

    /// Smallest box containing the selection, offset applied, as inclusive
    /// `(low, high)` per dimension.
    ///
    /// # Errors
    /// - `UnsupportedOperation` for an empty selection.
    /// - `OutOfBounds` if the offset moves a bound outside `[0, extent)`.
    pub fn bounds(&self) -> Result<Vec<(u64, u64)>, HyperslabError> {
        let raw = self.raw_bounds().ok_or(HyperslabError::UnsupportedOperation(
            "bounds of an empty selection",
        ))?;
        raw.iter()
            .enumerate()
            .map(|(dim, &(lo, hi))| Ok((self.place(dim, lo)?, self.place(dim, hi)?)))
            .collect()
    }

    /// Stored coordinate `x` of dimension `dim` with the offset applied.
    ///
    /// # Errors
    /// `OutOfBounds` if the result falls outside `[0, extent)`.
    pub(crate) fn place(&self, dim: usize, x: u64) -> Result<u64, HyperslabError> {
        let n = self.extent.dims()[dim];
        let coord = i128::from(x) + i128::from(self.offset[dim]);
        if coord < 0 || coord >= i128::from(n) {
            return Err(HyperslabError::OutOfBounds {
                dim,
                coord,
                extent: n,
            });
        }
        Ok(coord as u64)
    }

    /// Check that every selected element, offset applied, lies inside the
    /// extent. Always succeeds for an empty selection.
    ///
    /// # Errors
    /// `OutOfBounds` naming the first offending dimension.
    pub fn validate_against_extent(&self) -> Result<(), HyperslabError> {
        if matches!(self.layout, Layout::Empty) {
            return Ok(());
        }
        self.bounds().map(|_| ())
    }

    /// Whether `coords` (stored coordinates, offset not applied) is selected.
    pub fn contains(&self, coords: &[u64]) -> bool {
        if coords.len() != self.rank() {
            return false;
        }
        match &self.layout {
            Layout::Empty => false,
            Layout::Regular { desc, .. } => desc.contains(coords),
            Layout::General { tree } => tree.contains(coords),
        }
    }

    /// Number of N-dimensional blocks making up the selection.
    pub fn num_blocks(&self) -> u64 {
        match &self.layout {
            Layout::Empty => 0,
            Layout::Regular { desc, .. } => desc.num_blocks(),
            Layout::General { tree } => tree.num_blocks(),
        }
    }

    /// The blocks as inclusive `(start, end)` corners in row-major order,
    /// stored coordinates.
    pub fn blocks(&self) -> Vec<(Vec<u64>, Vec<u64>)> {
        match &self.layout {
            Layout::Empty => Vec::new(),
            Layout::Regular { desc, .. } => desc.blocks(),
            Layout::General { tree } => tree.blocks(),
        }
    }

    /// Whether `other` selects the same pattern of blocks, possibly
    /// translated. Extents may differ; ranks must not.
    pub fn shape_same(&self, other: &Selection) -> bool {
        if self.rank() != other.rank() || self.num_elements != other.num_elements {
            return false;
        }
        match (&self.layout, &other.layout) {
            (Layout::Empty, Layout::Empty) => true,
            (Layout::Regular { desc: a, .. }, Layout::Regular { desc: b, .. }) => {
                a.opt().iter().zip(b.opt()).all(|(x, y)| {
                    x.count == y.count && x.block == y.block && (x.count == 1 || x.stride == y.stride)
                })
            }
            (Layout::Empty, _) | (_, Layout::Empty) => false,
            _ => {
                let (a, b) = (self.blocks(), other.blocks());
                if a.len() != b.len() {
                    return false;
                }
                let Some((first_a, first_b)) = a.first().zip(b.first()) else {
                    return true;
                };
                let shift: Vec<i128> = first_a
                    .0
                    .iter()
                    .zip(&first_b.0)
                    .map(|(&x, &y)| i128::from(y) - i128::from(x))
                    .collect();
                a.iter().zip(&b).all(|((sa, ea), (sb, eb))| {
                    (0..sa.len()).all(|d| {
                        i128::from(sb[d]) - i128::from(sa[d]) == shift[d]
                            && ea[d] - sa[d] == eb[d] - sb[d]
                    })
                })
            }
        }
    }

    /// Move the stored coordinates toward the origin by `shift`. The offset
    /// is left as it is.
    ///
    /// # Errors
    /// - `InvalidArgument` if `shift` does not have the selection's rank.
    /// - `OutOfBounds` if a stored coordinate would become negative.
    pub fn adjust(&mut self, shift: &[u64]) -> Result<(), HyperslabError> {
        if shift.len() != self.rank() {
            return Err(HyperslabError::invalid(format!(
                "shift has {} entries, selection rank is {}",
                shift.len(),
                self.rank()
            )));
        }
        let Some(raw) = self.raw_bounds() else {
            return Ok(());
        };
        for (dim, (&(lo, _), &s)) in raw.iter().zip(shift).enumerate() {
            if lo < s {
                return Err(HyperslabError::OutOfBounds {
                    dim,
                    coord: i128::from(lo) - i128::from(s),
                    extent: self.extent.dims()[dim],
                });
            }
        }
        let layout = match &self.layout {
            Layout::Empty => Layout::Empty,
            Layout::Regular { desc, tree } => Layout::Regular {
                desc: desc.shifted_down(shift),
                tree: tree.get().map_or_else(OnceCell::new, |t| {
                    OnceCell::with_value(SpanList::shifted_down(t, shift))
                }),
            },
            Layout::General { tree } => Layout::General {
                tree: SpanList::shifted_down(tree, shift),
            },
        };
        self.install(layout);
        Ok(())
    }
}
