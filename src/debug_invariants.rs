//! Structural self-checks for span trees and selections.
//!
//! Mutating operations call [`DebugInvariants::debug_assert_invariants`] on
//! their result. The check runs in debug builds and whenever the
//! `check-invariants` or `strict-invariants` feature is on; otherwise it
//! compiles to nothing. [`DebugInvariants::validate_invariants`] is always
//! available for tests and callers that want the error instead of a panic.

use crate::hyperslab_error::HyperslabError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Validate invariants and return the first error encountered.
    ///
    /// # Errors
    /// `InvariantViolation` describing the first broken invariant.
    fn validate_invariants(&self) -> Result<(), HyperslabError>;

    /// Panic on the first broken invariant when invariant checking is
    /// enabled; no-op otherwise.
    #[inline]
    fn debug_assert_invariants(&self) {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = self.validate_invariants() {
            panic!("[invariants] {} invalid: {e}", std::any::type_name::<Self>());
        }
    }
}

impl<T: DebugInvariants + ?Sized> DebugInvariants for std::sync::Arc<T> {
    fn validate_invariants(&self) -> Result<(), HyperslabError> {
        (**self).validate_invariants()
    }
}
