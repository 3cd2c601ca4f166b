//! Regular descriptors: the compact `(start, stride, count, block)` form.
//!
//! A selection is *regular* when it is one N-dimensional grid of equally
//! sized blocks. The descriptor keeps two views of the same element set:
//!
//! - the **application** view, exactly as the caller passed it, and
//! - the **optimized** view, where trivially contiguous dimensions are
//!   collapsed (`stride == block` with `count > 1` becomes a single block)
//!   and `count == 1` dimensions carry `stride = 1`.
//!
//! Iteration and encoding use the optimized view; queries that report the
//! caller's own parameters use the application view.

use crate::hyperslab_error::HyperslabError;

/// One dimension of a regular hyperslab.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RegularDim {
    /// First selected coordinate.
    pub start: u64,
    /// Distance between the starts of consecutive blocks.
    pub stride: u64,
    /// Number of blocks.
    pub count: u64,
    /// Number of consecutive coordinates per block.
    pub block: u64,
}

impl RegularDim {
    /// Construct a dimension descriptor without validation.
    #[inline]
    pub const fn new(start: u64, stride: u64, count: u64, block: u64) -> Self {
        Self {
            start,
            stride,
            count,
            block,
        }
    }

    /// A single block `[start, start + block)`.
    #[inline]
    pub const fn block(start: u64, block: u64) -> Self {
        Self::new(start, 1, 1, block)
    }

    /// `count == 0` or `block == 0`: selects nothing.
    #[inline]
    pub fn is_zero_sized(&self) -> bool {
        self.count == 0 || self.block == 0
    }

    /// Number of coordinates selected in this dimension.
    #[inline]
    pub fn num_elements(&self) -> u64 {
        self.count * self.block
    }

    /// Last selected coordinate (inclusive). Requires a validated,
    /// non-zero-sized dimension.
    #[inline]
    pub fn end(&self) -> u64 {
        self.start + (self.count - 1) * self.stride + self.block - 1
    }

    /// Start of the `k`-th block.
    #[inline]
    pub fn block_start(&self, k: u64) -> u64 {
        self.start + k * self.stride
    }

    /// Whether coordinate `x` is selected in this dimension.
    pub fn contains(&self, x: u64) -> bool {
        if self.is_zero_sized() || x < self.start || x > self.end() {
            return false;
        }
        (x - self.start) % self.stride < self.block
    }

    /// Check the structural preconditions for dimension `dim`.
    ///
    /// Zero-sized dimensions are accepted here; callers decide what an empty
    /// hyperslab means for their operator.
    pub fn validate(&self, dim: usize) -> Result<(), HyperslabError> {
        if self.stride == 0 {
            return Err(HyperslabError::invalid(format!(
                "stride is zero in dimension {dim}"
            )));
        }
        if self.count > 1 && self.stride < self.block {
            return Err(HyperslabError::OverlapError {
                dim,
                stride: self.stride,
                block: self.block,
            });
        }
        if self.is_zero_sized() {
            return Ok(());
        }
        self.count
            .checked_mul(self.block)
            .and_then(|_| (self.count - 1).checked_mul(self.stride))
            .and_then(|span| span.checked_add(self.start))
            .and_then(|first| first.checked_add(self.block - 1))
            .ok_or_else(|| {
                HyperslabError::invalid(format!(
                    "hyperslab in dimension {dim} extends past u64::MAX"
                ))
            })?;
        Ok(())
    }

    /// Optimized form of this dimension (same coordinate set).
    pub fn optimized(&self) -> Self {
        if self.count > 1 && self.stride == self.block {
            Self::new(self.start, 1, 1, self.count * self.block)
        } else if self.count == 1 {
            Self::new(self.start, 1, 1, self.block)
        } else {
            *self
        }
    }
}

/// Compact description of a selection that is a single regular grid.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RegularDescriptor {
    app: Vec<RegularDim>,
    opt: Vec<RegularDim>,
}

#[derive(serde::Deserialize)]
struct RawDescriptor {
    app: Vec<RegularDim>,
    opt: Vec<RegularDim>,
}

impl<'de> serde::Deserialize<'de> for RegularDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let raw = RawDescriptor::deserialize(deserializer)?;
        let desc = RegularDescriptor::new(raw.app).map_err(D::Error::custom)?;
        if desc.opt != raw.opt {
            return Err(D::Error::custom(
                "optimized view does not match the application view",
            ));
        }
        Ok(desc)
    }
}

impl RegularDescriptor {
    /// Validate `dims` and build both views.
    ///
    /// # Errors
    /// - `InvalidArgument` for a zero stride, a zero-sized dimension, or
    ///   coordinates / element counts that overflow `u64`.
    /// - `OverlapError` when `count > 1` and `stride < block`.
    pub fn new(dims: Vec<RegularDim>) -> Result<Self, HyperslabError> {
        if dims.is_empty() {
            return Err(HyperslabError::invalid("regular descriptor of rank 0"));
        }
        for (d, dim) in dims.iter().enumerate() {
            dim.validate(d)?;
            if dim.is_zero_sized() {
                return Err(HyperslabError::invalid(format!(
                    "zero-sized regular dimension {d}"
                )));
            }
        }
        dims.iter()
            .try_fold(1u64, |acc, dim| acc.checked_mul(dim.num_elements()))
            .ok_or_else(|| HyperslabError::invalid("hyperslab element count overflows u64"))?;
        Ok(Self::from_valid(dims))
    }

    /// One block covering every coordinate of `dims` (all non-zero).
    pub(crate) fn full(dims: &[u64]) -> Self {
        let app: Vec<RegularDim> = dims.iter().map(|&n| RegularDim::block(0, n)).collect();
        Self {
            opt: app.clone(),
            app,
        }
    }

    /// Build from dimensions already known to be valid and non-zero-sized.
    fn from_valid(dims: Vec<RegularDim>) -> Self {
        let opt = dims.iter().map(RegularDim::optimized).collect();
        Self { app: dims, opt }
    }

    /// Rank of the descriptor.
    #[inline]
    pub fn rank(&self) -> usize {
        self.app.len()
    }

    /// The view exactly as specified by the caller.
    #[inline]
    pub fn app(&self) -> &[RegularDim] {
        &self.app
    }

    /// The view with trivially contiguous dimensions collapsed.
    #[inline]
    pub fn opt(&self) -> &[RegularDim] {
        &self.opt
    }

    /// Number of selected elements.
    pub fn num_elements(&self) -> u64 {
        // overflow rejected in `new`
        self.opt.iter().map(RegularDim::num_elements).product()
    }

    /// Number of (maximal) blocks in the optimized view.
    pub fn num_blocks(&self) -> u64 {
        self.opt.iter().map(|d| d.count).product()
    }

    /// Exactly one block per dimension.
    pub fn is_single_block(&self) -> bool {
        self.opt.iter().all(|d| d.count == 1)
    }

    /// Inclusive per-dimension `(low, high)` bounds (no offset applied).
    pub fn bounds(&self) -> Vec<(u64, u64)> {
        self.opt.iter().map(|d| (d.start, d.end())).collect()
    }

    /// Whether `coords` is a selected element.
    pub fn contains(&self, coords: &[u64]) -> bool {
        coords.len() == self.rank()
            && self.opt.iter().zip(coords).all(|(d, &x)| d.contains(x))
    }

    /// All blocks of the optimized view as inclusive `(start, end)` corner
    /// pairs, in row-major order.
    pub fn blocks(&self) -> Vec<(Vec<u64>, Vec<u64>)> {
        let rank = self.rank();
        let mut out = Vec::new();
        let mut k = vec![0u64; rank];
        loop {
            let start: Vec<u64> = (0..rank).map(|d| self.opt[d].block_start(k[d])).collect();
            let end: Vec<u64> = (0..rank)
                .map(|d| start[d] + self.opt[d].block - 1)
                .collect();
            out.push((start, end));
            // odometer over block indices
            let mut d = rank;
            loop {
                if d == 0 {
                    return out;
                }
                d -= 1;
                k[d] += 1;
                if k[d] < self.opt[d].count {
                    break;
                }
                k[d] = 0;
            }
        }
    }

    /// Return a copy with every dimension's start shifted down by `shift[d]`.
    pub(crate) fn shifted_down(&self, shift: &[u64]) -> Self {
        let mv = |dims: &[RegularDim]| -> Vec<RegularDim> {
            dims.iter()
                .zip(shift)
                .map(|(d, &s)| RegularDim { start: d.start - s, ..*d })
                .collect()
        };
        Self {
            app: mv(&self.app),
            opt: mv(&self.opt),
        }
    }
}
