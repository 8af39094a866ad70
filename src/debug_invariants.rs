//! Invariant checking for maps and communication plans.
//!
//! Checks are cheap relative to plan construction (one pass over each
//! array) but still run only when `debug_assertions` or one of the
//! `strict-invariants` / `check-invariants` features is enabled, except
//! when a caller invokes [`DebugInvariants::validate_invariants`] directly.

use crate::import_error::ImportError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), ImportError>;

    /// Panic on the first violated invariant when checking is enabled.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "debug_assert_invariants");
    }
}

/// Run a fallible check and panic on error when invariant checking is
/// enabled; a no-op otherwise.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
