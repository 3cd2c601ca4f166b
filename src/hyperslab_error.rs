//! HyperslabError: Unified error type for hyperslab public APIs
//!
//! Every fallible operation in this crate reports through this type. Errors
//! are terminal for the requested operation: a failed call leaves the
//! selection it was applied to exactly as it was before the call.

use thiserror::Error;

/// Unified error type for hyperslab operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HyperslabError {
    /// Storage for span-tree nodes could not be reserved.
    #[error("Allocation failure: cannot reserve {requested} span nodes")]
    AllocationFailure {
        /// Number of spans that were being reserved.
        requested: u64,
    },
    /// Bad rank, zero stride, malformed start/stride/count/block, ...
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A hyperslab with `count > 1` whose blocks would overlap (`stride < block`).
    #[error("Overlapping blocks in dimension {dim}: stride {stride} < block {block}")]
    OverlapError {
        /// Offending dimension.
        dim: usize,
        /// Stride given for that dimension.
        stride: u64,
        /// Block given for that dimension.
        block: u64,
    },
    /// A selected coordinate, after applying the selection offset, lies
    /// outside `[0, extent)`.
    #[error("Selection out of bounds in dimension {dim}: coordinate {coord} not in [0, {extent})")]
    OutOfBounds {
        /// Offending dimension.
        dim: usize,
        /// Coordinate with the offset applied (may be negative).
        coord: i128,
        /// Extent of the dataset in that dimension.
        extent: u64,
    },
    /// The operation is not available for the current selection shape or kind.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    /// A persisted selection is truncated, has a bad header, or does not
    /// match the target dataset.
    #[error("Corrupt selection encoding: {0}")]
    CorruptEncoding(String),
    /// The two selections were defined over different dataset extents.
    #[error("Extent mismatch: {left:?} vs {right:?}")]
    ExtentMismatch {
        /// Extent of the receiving selection.
        left: Vec<u64>,
        /// Extent of the other selection.
        right: Vec<u64>,
    },
    /// A buffer passed to a buffer algorithm has the wrong number of elements.
    #[error("Buffer length mismatch: expected {expected}, found {found}")]
    BufferLengthMismatch {
        /// Elements the buffer must hold.
        expected: u64,
        /// Elements it holds.
        found: u64,
    },
    /// A data structure invariant does not hold (reported by
    /// [`DebugInvariants::validate_invariants`](crate::DebugInvariants)).
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl HyperslabError {
    /// Shorthand for [`HyperslabError::InvalidArgument`].
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        HyperslabError::InvalidArgument(msg.into())
    }

    /// Shorthand for [`HyperslabError::CorruptEncoding`].
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        HyperslabError::CorruptEncoding(msg.into())
    }
}
