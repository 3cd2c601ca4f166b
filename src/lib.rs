#![cfg_attr(docsrs, feature(doc_cfg))]
//! # hyperslab
//!
//! hyperslab represents, combines and iterates selections of elements in
//! N-dimensional datasets. A selection is built from *hyperslabs*, axis
//! aligned regular patterns described per dimension by `(start, stride,
//! count, block)`, joined with set operators.
//!
//! ## Features
//! - Two representations: a compact [`RegularDescriptor`] for selections that
//!   are one regular grid of blocks, and reference-counted span trees
//!   ([`span`]) for everything else, with subtrees shared between parents.
//! - Set algebra on span trees: union, intersection, symmetric difference and
//!   both differences, with automatic recovery of the regular form.
//! - Row-major iteration producing `(byte offset, byte length)` runs for I/O,
//!   through three generators specialised for general trees, regular grids
//!   and single blocks.
//! - Block-wise walks, rank-changing projections and projection of an
//!   intersection from one selection onto another.
//! - Buffer helpers (fill, gather, scatter), storage offset resolution and a
//!   versioned little-endian persisted form.
//!
//! ## Determinism
//!
//! Every algorithm is deterministic. Memo tables are keyed by node address
//! and never iterated; enable `deterministic-order` to use ordered maps
//! anyway, or `fast-hash` for `ahash`.
//!
//! ## Invariant checking
//!
//! Structural invariants are validated after every mutation in debug builds
//! and when the `check-invariants` (or `strict-invariants`) feature is
//! enabled. See [`DebugInvariants`].
//!
//! ```rust
//! # fn try_main() -> Result<(), hyperslab::HyperslabError> {
//! use hyperslab::prelude::*;
//! let extent = Extent::new(&[10, 10])?;
//! let sel = Selection::hyperslab(extent, &[0, 0], None, &[1, 1], Some(&[10, 10]))?;
//! assert!(sel.is_contiguous());
//! let mut it = sel.iter(4)?;
//! let (runs, n) = it.next_runs(16, u64::MAX);
//! assert_eq!(runs, vec![Run { offset: 0, len: 400 }]);
//! assert_eq!(n, 100);
//! # Ok(())
//! # }
//! # try_main().unwrap();
//! ```

pub mod algs;
pub mod config;
pub mod debug_invariants;
pub mod extent;
pub mod hyperslab_error;
pub mod iter;
pub mod regular;
pub mod selection;
pub mod span;
pub mod storage;
pub mod wire;

pub(crate) mod perf;

pub use config::IoConfig;
pub use debug_invariants::DebugInvariants;
pub use extent::{Extent, MAX_RANK};
pub use hyperslab_error::HyperslabError;
pub use iter::{Block, BlockIter, Run, SelectionIter, SeqPath};
pub use regular::{RegularDescriptor, RegularDim};
pub use selection::{SelectOp, Selection};

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::{fill, for_each_element, gather, scatter};
    pub use crate::config::IoConfig;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::extent::Extent;
    pub use crate::hyperslab_error::HyperslabError;
    pub use crate::iter::{Block, BlockIter, Run, SelectionIter, SeqPath};
    pub use crate::regular::{RegularDescriptor, RegularDim};
    pub use crate::selection::{SelectOp, Selection};
    pub use crate::storage::{OffsetResolver, PageLocation, PagedLayout, resolve_runs};
    pub use crate::wire::{decode_selection, encode_selection, serial_size};
}
