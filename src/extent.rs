//! `Extent`: the logical shape of the dataset a selection lives in.
//!
//! Dimensions are ordered slowest-changing first (row-major / C order), so
//! the last dimension is the one whose neighbouring elements are adjacent in
//! the linear element stream.

use crate::hyperslab_error::HyperslabError;
use std::fmt;

/// Largest rank a selection may have.
pub const MAX_RANK: usize = 32;

/// Per-dimension sizes of an N-dimensional dataset.
#[derive(Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Extent {
    dims: Vec<u64>,
}

impl Extent {
    /// Build an extent from dimension sizes.
    ///
    /// # Errors
    /// `InvalidArgument` if the rank is 0 or above [`MAX_RANK`], if any
    /// dimension is zero, or if the total element count overflows `u64`.
    pub fn new(dims: &[u64]) -> Result<Self, HyperslabError> {
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(HyperslabError::invalid(format!(
                "rank {} outside 1..={MAX_RANK}",
                dims.len()
            )));
        }
        if let Some(d) = dims.iter().position(|&n| n == 0) {
            return Err(HyperslabError::invalid(format!(
                "dimension {d} has zero size"
            )));
        }
        dims.iter()
            .try_fold(1u64, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| HyperslabError::invalid("extent element count overflows u64"))?;
        Ok(Self {
            dims: dims.to_vec(),
        })
    }

    /// Number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Dimension sizes, slowest first.
    #[inline]
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// Total number of elements in the dataset.
    #[inline]
    pub fn num_elements(&self) -> u64 {
        // overflow rejected in `new`
        self.dims.iter().product()
    }

    /// Row-major element strides: `strides[d]` is the linear distance between
    /// neighbours along dimension `d`.
    pub fn strides(&self) -> Vec<u64> {
        let mut strides = vec![1u64; self.rank()];
        for d in (0..self.rank().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * self.dims[d + 1];
        }
        strides
    }

    /// Linear element index of `coords` (no bounds check).
    pub fn linear_index(&self, coords: &[u64]) -> u64 {
        coords
            .iter()
            .zip(self.strides())
            .map(|(&c, s)| c * s)
            .sum()
    }

    /// Inverse of [`linear_index`](Self::linear_index).
    pub fn coords_of(&self, mut index: u64) -> Vec<u64> {
        let mut coords = vec![0u64; self.rank()];
        for d in (0..self.rank()).rev() {
            coords[d] = index % self.dims[d];
            index /= self.dims[d];
        }
        coords
    }
}

#[derive(serde::Deserialize)]
struct RawExtent {
    dims: Vec<u64>,
}

impl<'de> serde::Deserialize<'de> for Extent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawExtent::deserialize(deserializer)?;
        Extent::new(&raw.dims).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Extent").field(&self.dims).finish()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.dims.iter().map(u64::to_string).collect();
        write!(f, "[{}]", parts.join("x"))
    }
}
