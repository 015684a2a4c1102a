//! Per-call-site counters.
//!
//! Relaxed atomics: the numbers are for profiling and tests, never for
//! dispatch decisions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one call site.
#[derive(Debug, Default)]
pub struct CallSiteStats {
    hits: AtomicU64,
    misses: AtomicU64,
    reresolutions: AtomicU64,
    megamorphic_calls: AtomicU64,
}

impl CallSiteStats {
    #[inline(always)]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A cached entry was found invalidated and resolved again.
    #[inline]
    pub fn record_reresolution(&self) {
        self.reresolutions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_megamorphic(&self) {
        self.megamorphic_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CallSiteStatsSnapshot {
        CallSiteStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reresolutions: self.reresolutions.load(Ordering::Relaxed),
            megamorphic_calls: self.megamorphic_calls.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CallSiteStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallSiteStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub reresolutions: u64,
    pub megamorphic_calls: u64,
}

impl CallSiteStatsSnapshot {
    /// Total dispatches counted.
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.reresolutions + self.megamorphic_calls
    }

    /// Cache hit rate as a percentage (0.0-100.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
