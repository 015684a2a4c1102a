//! The per-call-site inline cache.

use std::fmt;
use std::sync::Arc;

use kiln_runtime::Value;

use super::entry::CacheEntry;
use super::state::{AtomicCallSiteState, CallSiteState};
use super::stats::CallSiteStats;
use super::table::{EntryTable, Probe};
use crate::error::{DispatchError, DispatchResult};
use crate::resolution::{Resolved, invoke_indirect};

/// Bounded cache of resolutions keyed by `K`.
///
/// `K` is `KlassId` for virtual sites and `MethodId` for special sites.
pub struct InlineCache<K> {
    table: EntryTable<CacheEntry<K>>,
    state: AtomicCallSiteState,
    stats: CallSiteStats,
}

impl<K: Copy + Eq + fmt::Debug> InlineCache<K> {
    /// Create an empty cache holding at most `limit` entries.
    pub fn new(limit: usize) -> Self {
        Self {
            table: EntryTable::with_capacity(limit.max(1)),
            state: AtomicCallSiteState::new(),
            stats: CallSiteStats::default(),
        }
    }

    #[inline(always)]
    pub fn state(&self) -> CallSiteState {
        self.state.load()
    }

    /// Advance the state; used by wrappers with states of their own.
    #[inline]
    pub(crate) fn advance(&self, to: CallSiteState) -> CallSiteState {
        self.state.advance(to)
    }

    #[inline]
    pub fn stats(&self) -> &CallSiteStats {
        &self.stats
    }

    /// Installed entries, duplicates included.
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn entries(&self) -> Vec<Arc<CacheEntry<K>>> {
        self.table.entries()
    }

    /// Dispatch through the cache.
    ///
    /// `resolve` performs full resolution for the current receiver; it is
    /// called on a miss, when a matching entry was invalidated, and on
    /// every call once the site is megamorphic.
    pub fn dispatch<R>(&self, key: K, args: &[Value], mut resolve: R) -> DispatchResult<Value>
    where
        R: FnMut() -> DispatchResult<Resolved>,
    {
        loop {
            if self.state.load().is_megamorphic() {
                self.stats.record_megamorphic();
                return invoke_indirect(args, &mut resolve);
            }

            let entry = match self.table.probe(key) {
                Probe::Hit(entry) => {
                    self.stats.record_hit();
                    entry
                }
                Probe::Stale { index, entry } => {
                    self.stats.record_reresolution();
                    let fresh = CacheEntry::new(key, resolve()?);
                    let (fresh, swapped) = self.table.rearm(index, &entry, fresh);
                    tracing::trace!(?key, index, swapped, "re-armed invalidated cache entry");
                    fresh
                }
                Probe::Miss => {
                    self.stats.record_miss();
                    let fresh = CacheEntry::new(key, resolve()?);
                    match self.table.install(fresh) {
                        Ok((entry, count)) => {
                            let keys = if count == 1 { 1 } else { self.table.distinct_keys() };
                            self.state.advance(CallSiteState::for_key_count(keys));
                            tracing::trace!(?key, count, "installed cache entry");
                            entry
                        }
                        Err(rejected) => {
                            self.go_megamorphic(key);
                            match rejected.try_invoke(args) {
                                Some(result) => return result.map_err(DispatchError::from),
                                None => continue,
                            }
                        }
                    }
                }
            };

            // Validity is checked again right before the call.
            if let Some(result) = entry.try_invoke(args) {
                return result.map_err(DispatchError::from);
            }
        }
    }

    #[cold]
    #[inline(never)]
    fn go_megamorphic(&self, key: K) {
        let prior = self.state.advance(CallSiteState::Megamorphic);
        if !prior.is_megamorphic() {
            tracing::debug!(
                ?key,
                limit = self.table.capacity(),
                "call site went megamorphic"
            );
        }
    }
}

impl<K: Copy + Eq + fmt::Debug> fmt::Debug for InlineCache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineCache")
            .field("state", &self.state())
            .field("entries", &self.table)
            .finish()
    }
}
