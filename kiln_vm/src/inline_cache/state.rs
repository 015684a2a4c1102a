//! Call-site specialization state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Specialization state of a call site, ordered from least to most
/// specialized-away.
///
/// The numeric order is the transition order; a site only ever moves to a
/// higher value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CallSiteState {
    /// Never executed.
    Uninitialized = 0,
    /// Calls the seed's own version, guarded by its leaf assumption.
    LeafDirect = 1,
    /// One cached entry.
    Monomorphic = 2,
    /// Several cached entries, up to the site's limit.
    Polymorphic = 3,
    /// Resolves on every call; permanent.
    Megamorphic = 4,
}

impl CallSiteState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => CallSiteState::Uninitialized,
            1 => CallSiteState::LeafDirect,
            2 => CallSiteState::Monomorphic,
            3 => CallSiteState::Polymorphic,
            _ => CallSiteState::Megamorphic,
        }
    }

    #[inline]
    pub fn is_megamorphic(self) -> bool {
        self == CallSiteState::Megamorphic
    }

    /// State of a site whose entries cover `keys` distinct guard keys.
    ///
    /// Duplicate entries for one key leave a site monomorphic.
    #[inline]
    pub fn for_key_count(keys: usize) -> Self {
        if keys <= 1 {
            CallSiteState::Monomorphic
        } else {
            CallSiteState::Polymorphic
        }
    }
}

/// Atomic cell holding a [`CallSiteState`] that only moves forward.
#[derive(Debug)]
pub struct AtomicCallSiteState(AtomicU8);

impl AtomicCallSiteState {
    pub const fn new() -> Self {
        Self(AtomicU8::new(CallSiteState::Uninitialized as u8))
    }

    #[inline(always)]
    pub fn load(&self) -> CallSiteState {
        CallSiteState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` unless already further along. Returns the prior state.
    #[inline]
    pub fn advance(&self, to: CallSiteState) -> CallSiteState {
        CallSiteState::from_u8(self.0.fetch_max(to as u8, Ordering::AcqRel))
    }
}

impl Default for AtomicCallSiteState {
    fn default() -> Self {
        Self::new()
    }
}
