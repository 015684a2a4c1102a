//! Virtual call sites.
//!
//! A virtual site starts Uninitialized. If the seed is a leaf (nothing
//! loaded overrides it) the first call installs a Leaf-Direct entry that
//! calls the seed's own version without any vtable lookup. Otherwise, and
//! once that entry is invalidated, dispatch goes through a klass-keyed
//! [`InlineCache`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use kiln_runtime::{GuestException, KlassId, Method, ObjectRef, Value};

use crate::config::DispatchConfig;
use crate::env::DispatchEnv;
use crate::error::{DispatchError, DispatchResult};
use crate::inline_cache::{CallSiteState, CallSiteStats, InlineCache};
use crate::null_guard::null_check;
use crate::resolution::{Resolved, resolve_special, resolve_virtual};

/// The seed's own version, guarded by the seed's leaf assumption.
struct LeafEntry {
    resolved: Resolved,
}

impl LeafEntry {
    #[inline(always)]
    fn try_invoke(&self, seed: &Method, args: &[Value]) -> Option<Result<Value, GuestException>> {
        if !seed.leaf_assumption().is_valid() {
            return None;
        }
        self.resolved.try_call(args)
    }
}

/// Inline cache state for one `invokevirtual` instruction.
pub struct VirtualCallSite {
    seed: Arc<Method>,
    leaf_enabled: bool,
    leaf: ArcSwapOption<LeafEntry>,
    leaf_retired: AtomicBool,
    cache: InlineCache<KlassId>,
}

impl VirtualCallSite {
    pub fn new(seed: Arc<Method>, config: &DispatchConfig) -> Self {
        Self::with_limits(seed, config.virtual_limit, config.leaf_direct)
    }

    pub fn with_limits(seed: Arc<Method>, limit: usize, leaf_direct: bool) -> Self {
        Self {
            seed,
            leaf_enabled: leaf_direct,
            leaf: ArcSwapOption::empty(),
            leaf_retired: AtomicBool::new(false),
            cache: InlineCache::new(limit),
        }
    }

    /// The statically referenced method.
    #[inline]
    pub fn seed(&self) -> &Arc<Method> {
        &self.seed
    }

    #[inline]
    pub fn state(&self) -> CallSiteState {
        self.cache.state()
    }

    #[inline]
    pub fn stats(&self) -> &CallSiteStats {
        self.cache.stats()
    }

    /// Klass-keyed entries currently installed.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Dispatch `args` on `receiver`.
    ///
    /// `args` is the full argument list handed to the target, receiver
    /// first.
    pub fn execute(
        &self,
        env: &DispatchEnv,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        let receiver = null_check(receiver)?;
        self.execute_unchecked(env, receiver, args)
    }

    /// Dispatch on a receiver that already passed the null guard.
    pub(crate) fn execute_unchecked(
        &self,
        env: &DispatchEnv,
        receiver: &ObjectRef,
        args: &[Value],
    ) -> DispatchResult<Value> {
        if let Some(leaf) = self.leaf.load_full() {
            if let Some(result) = leaf.try_invoke(&self.seed, args) {
                self.cache.stats().record_hit();
                return result.map_err(DispatchError::from);
            }
            self.retire_leaf();
        } else if self.leaf_enabled && self.cache.state() == CallSiteState::Uninitialized {
            if let Some(value) = self.try_leaf(env, receiver, args)? {
                return Ok(value);
            }
        }

        self.cache.dispatch(receiver.klass(), args, || {
            resolve_virtual(env, &self.seed, receiver)
        })
    }

    /// Install and invoke a Leaf-Direct entry.
    ///
    /// `Ok(None)` means the site is not eligible and the caller should
    /// use the klass-keyed cache.
    fn try_leaf(
        &self,
        env: &DispatchEnv,
        receiver: &ObjectRef,
        args: &[Value],
    ) -> DispatchResult<Option<Value>> {
        let seed = &*self.seed;
        if self.leaf_retired.load(Ordering::Acquire)
            || seed.is_abstract()
            || seed.vtable_index().is_none()
            || !seed.leaf_assumption().is_valid()
            || env.redefinition().is_removed_by_redefinition(seed)
        {
            return Ok(None);
        }

        // No override is loaded, so the seed's own version is the target.
        let resolved = resolve_special(env, seed, receiver)?;
        if resolved.version().method() != seed.id() {
            return Ok(None);
        }

        let entry = Arc::new(LeafEntry { resolved });
        let empty: Option<Arc<LeafEntry>> = None;
        self.leaf.compare_and_swap(&empty, Some(Arc::clone(&entry)));
        if self.leaf_retired.load(Ordering::Acquire) {
            // Lost against a retirement; never re-enter Leaf-Direct.
            self.leaf.store(None);
        } else {
            self.cache.advance(CallSiteState::LeafDirect);
            tracing::trace!(method = seed.name(), "installed leaf-direct entry");
        }
        self.cache.stats().record_miss();

        match entry.try_invoke(seed, args) {
            Some(result) => Ok(Some(result?)),
            None => {
                self.retire_leaf();
                Ok(None)
            }
        }
    }

    #[cold]
    #[inline(never)]
    fn retire_leaf(&self) {
        if !self.leaf_retired.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                method = self.seed.name(),
                "leaf-direct entry invalidated, switching to klass-keyed entries"
            );
            self.cache.stats().record_reresolution();
        }
        self.leaf.store(None);
    }
}

impl fmt::Debug for VirtualCallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualCallSite")
            .field("seed", &self.seed.name())
            .field("state", &self.state())
            .field("leaf_retired", &self.leaf_retired.load(Ordering::Relaxed))
            .field("cache", &self.cache)
            .finish()
    }
}
