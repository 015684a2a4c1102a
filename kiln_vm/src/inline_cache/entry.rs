//! Cache entries.

use std::fmt;

use kiln_runtime::{GuestException, Value};

use crate::resolution::Resolved;

/// Something stored in an [`EntryTable`](super::table::EntryTable): it has
/// a guard key and may become invalid.
pub trait Guarded {
    type Key: Copy + Eq + fmt::Debug;

    /// Key compared against the dispatch context.
    fn guard_key(&self) -> Self::Key;

    /// Whether the entry may still be used.
    fn is_valid(&self) -> bool;
}

/// A (guard key, method version, call target, assumption) tuple.
///
/// The key is a klass for virtual sites and a method for special sites.
pub struct CacheEntry<K> {
    key: K,
    resolved: Resolved,
}

impl<K: Copy + Eq + fmt::Debug> CacheEntry<K> {
    pub fn new(key: K, resolved: Resolved) -> Self {
        Self { key, resolved }
    }

    #[inline]
    pub fn resolved(&self) -> &Resolved {
        &self.resolved
    }

    /// Invoke the cached target directly unless its assumption fell.
    #[inline(always)]
    pub fn try_invoke(&self, args: &[Value]) -> Option<Result<Value, GuestException>> {
        self.resolved.try_call(args)
    }
}

impl<K: Copy + Eq + fmt::Debug> Guarded for CacheEntry<K> {
    type Key = K;

    #[inline(always)]
    fn guard_key(&self) -> K {
        self.key
    }

    #[inline(always)]
    fn is_valid(&self) -> bool {
        self.resolved.is_valid()
    }
}

impl<K: fmt::Debug> fmt::Debug for CacheEntry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("version", self.resolved.version())
            .finish()
    }
}
