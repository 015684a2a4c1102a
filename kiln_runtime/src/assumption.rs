//! Invalidate-once validity flags.
//!
//! An assumption is shared between the artifact it describes (a method
//! version, a method's leaf property) and every cache entry that relies on
//! it. It starts valid and transitions to invalid exactly once; there is no
//! way back.
//!
//! # Memory Ordering
//!
//! `invalidate` uses `AcqRel` and `is_valid` uses `Acquire`, so anything the
//! invalidating thread wrote before the invalidation (a removal flag, for
//! example) is visible to every reader that observes the assumption as
//! invalid.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Assumption
// =============================================================================

struct AssumptionCell {
    name: Arc<str>,
    valid: AtomicBool,
}

/// A shared, one-way invalidatable validity flag.
///
/// Cloning shares the underlying cell.
#[derive(Clone)]
pub struct Assumption {
    cell: Arc<AssumptionCell>,
}

impl Assumption {
    /// Create a new valid assumption.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            cell: Arc::new(AssumptionCell {
                name: name.into(),
                valid: AtomicBool::new(true),
            }),
        }
    }

    /// Check whether the assumption still holds.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.cell.valid.load(Ordering::Acquire)
    }

    /// Invalidate the assumption.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// assumption was already invalid.
    pub fn invalidate(&self) -> bool {
        self.cell.valid.swap(false, Ordering::AcqRel)
    }

    /// Diagnostic name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Check whether two handles share the same cell.
    #[inline]
    pub fn ptr_eq(&self, other: &Assumption) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assumption")
            .field("name", &self.name())
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assumption_is_valid() {
        let a = Assumption::new("A.m leaf");
        assert!(a.is_valid());
        assert_eq!(a.name(), "A.m leaf");
    }

    #[test]
    fn test_invalidate_is_one_way() {
        let a = Assumption::new("x");
        assert!(a.invalidate());
        assert!(!a.is_valid());
        // Second invalidation is a no-op.
        assert!(!a.invalidate());
        assert!(!a.is_valid());
    }

    #[test]
    fn test_clones_share_state() {
        let a = Assumption::new("x");
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        b.invalidate();
        assert!(!a.is_valid());
        assert!(!a.ptr_eq(&Assumption::new("x")));
    }

    #[test]
    fn test_invalidation_visible_across_threads() {
        let a = Assumption::new("x");
        let remote = a.clone();
        std::thread::spawn(move || {
            remote.invalidate();
        })
        .join()
        .unwrap();
        assert!(!a.is_valid());
    }
}
