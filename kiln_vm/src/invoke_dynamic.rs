//! Call sites whose resolution seed is only known at run time.
//!
//! Reflective invocation computes the seed per call. The site keeps an
//! outer table keyed by seed identity; each entry owns a lazily created
//! [`VirtualCallSite`] for that seed. Past the seed limit the site resolves
//! and calls indirectly on every dispatch.

use std::fmt;
use std::sync::Arc;

use kiln_runtime::{Method, MethodId, Value};

use crate::config::DispatchConfig;
use crate::env::DispatchEnv;
use crate::error::DispatchResult;
use crate::inline_cache::{
    AtomicCallSiteState, CallSiteState, CallSiteStats, EntryTable, Guarded, Probe,
};
use crate::invoke_virtual::VirtualCallSite;
use crate::null_guard::null_check;
use crate::resolution::{invoke_indirect, resolve_virtual};

/// One observed seed and its per-receiver cache.
struct SeedEntry {
    seed: MethodId,
    site: VirtualCallSite,
}

impl Guarded for SeedEntry {
    type Key = MethodId;

    #[inline(always)]
    fn guard_key(&self) -> MethodId {
        self.seed
    }

    /// Seed identity never goes stale; the inner site handles invalidation.
    #[inline(always)]
    fn is_valid(&self) -> bool {
        true
    }
}

/// Inline cache state for a call whose seed is a run-time value.
pub struct DynamicCallSite {
    seeds: EntryTable<SeedEntry>,
    state: AtomicCallSiteState,
    stats: CallSiteStats,
    inner_limit: usize,
    leaf_direct: bool,
}

impl DynamicCallSite {
    pub fn new(config: &DispatchConfig) -> Self {
        Self::with_limits(
            config.dynamic_seed_limit,
            config.virtual_limit,
            config.leaf_direct,
        )
    }

    /// `seed_limit` bounds distinct seeds; `inner_limit` bounds klasses per
    /// seed.
    pub fn with_limits(seed_limit: usize, inner_limit: usize, leaf_direct: bool) -> Self {
        Self {
            seeds: EntryTable::with_capacity(seed_limit.max(1)),
            state: AtomicCallSiteState::new(),
            stats: CallSiteStats::default(),
            inner_limit,
            leaf_direct,
        }
    }

    /// State of the outer, seed-keyed layer.
    #[inline]
    pub fn state(&self) -> CallSiteState {
        self.state.load()
    }

    #[inline]
    pub fn stats(&self) -> &CallSiteStats {
        &self.stats
    }

    /// Distinct seeds cached.
    pub fn seed_count(&self) -> usize {
        self.seeds.distinct_keys()
    }

    /// State of the inner site for `seed`, if one was created.
    pub fn inner_state(&self, seed: MethodId) -> Option<CallSiteState> {
        match self.seeds.probe(seed) {
            Probe::Hit(entry) | Probe::Stale { entry, .. } => Some(entry.site.state()),
            Probe::Miss => None,
        }
    }

    /// Dispatch `seed` on `receiver`; `args` includes the receiver.
    pub fn execute(
        &self,
        env: &DispatchEnv,
        seed: &Arc<Method>,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        let receiver = null_check(receiver)?;

        if self.state.load().is_megamorphic() {
            self.stats.record_megamorphic();
            return invoke_indirect(args, || resolve_virtual(env, seed, receiver));
        }

        let entry = match self.seeds.probe(seed.id()) {
            Probe::Hit(entry) | Probe::Stale { entry, .. } => {
                self.stats.record_hit();
                entry
            }
            Probe::Miss => {
                self.stats.record_miss();
                let fresh = SeedEntry {
                    seed: seed.id(),
                    site: VirtualCallSite::with_limits(
                        Arc::clone(seed),
                        self.inner_limit,
                        self.leaf_direct,
                    ),
                };
                match self.seeds.install(fresh) {
                    Ok((entry, count)) => {
                        let keys = if count == 1 { 1 } else { self.seeds.distinct_keys() };
                        self.state.advance(CallSiteState::for_key_count(keys));
                        tracing::trace!(seed = seed.name(), count, "cached dynamic seed");
                        entry
                    }
                    Err(_) => {
                        self.go_megamorphic(seed);
                        return invoke_indirect(args, || resolve_virtual(env, seed, receiver));
                    }
                }
            }
        };
        entry.site.execute_unchecked(env, receiver, args)
    }

    #[cold]
    #[inline(never)]
    fn go_megamorphic(&self, seed: &Method) {
        let prior = self.state.advance(CallSiteState::Megamorphic);
        if !prior.is_megamorphic() {
            tracing::debug!(
                seed = seed.name(),
                limit = self.seeds.capacity(),
                "dynamic call site went megamorphic"
            );
        }
    }
}

impl fmt::Debug for DynamicCallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCallSite")
            .field("state", &self.state())
            .field("seeds", &self.seeds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::test_support::Fixture;

    fn call(site: &DynamicCallSite, fx: &Fixture, seed: &Arc<Method>, klass: &str) -> i64 {
        let receiver = fx.value(klass);
        site.execute(&fx.env, seed, &receiver, &[receiver.clone()])
            .unwrap()
            .as_int()
            .unwrap()
    }

    #[test]
    fn test_seeds_get_their_own_inner_site() {
        let fx = Fixture::hierarchy();
        let m = fx.method("A", "m");
        let other = fx.method("A", "other");
        let site = DynamicCallSite::new(fx.env.config());

        assert_eq!(call(&site, &fx, &m, "B"), 2);
        assert_eq!(site.state(), CallSiteState::Monomorphic);
        assert_eq!(call(&site, &fx, &other, "B"), 10);
        assert_eq!(site.state(), CallSiteState::Polymorphic);
        assert_eq!(site.seed_count(), 2);

        assert_eq!(call(&site, &fx, &m, "A"), 1);
        assert_eq!(site.inner_state(m.id()), Some(CallSiteState::Polymorphic));
        assert_eq!(site.inner_state(other.id()), Some(CallSiteState::LeafDirect));
    }

    #[test]
    fn test_seed_limit_goes_megamorphic() {
        let fx = Fixture::hierarchy();
        let m = fx.method("A", "m");
        let other = fx.method("A", "other");
        let site = DynamicCallSite::with_limits(1, 8, true);

        assert_eq!(call(&site, &fx, &m, "A"), 1);
        assert_eq!(call(&site, &fx, &other, "A"), 10);
        assert!(site.state().is_megamorphic());
        assert_eq!(site.seed_count(), 1);

        assert_eq!(call(&site, &fx, &m, "B"), 2);
        assert_eq!(site.stats().snapshot().megamorphic_calls, 1);
    }

    #[test]
    fn test_inner_site_goes_megamorphic() {
        let fx = Fixture::hierarchy();
        let subs = fx.overriding_subclasses("A", 9);
        let m = fx.method("A", "m");
        let site = DynamicCallSite::new(fx.env.config());

        for i in 0..subs.len() {
            assert_eq!(call(&site, &fx, &m, &format!("Sub{i}")), 100 + i as i64);
        }
        assert_eq!(site.state(), CallSiteState::Monomorphic);
        assert_eq!(site.inner_state(m.id()), Some(CallSiteState::Megamorphic));
        assert_eq!(site.seed_count(), 1);

        // Every klass still reaches its own override.
        for i in 0..subs.len() {
            assert_eq!(call(&site, &fx, &m, &format!("Sub{i}")), 100 + i as i64);
        }
        assert_eq!(call(&site, &fx, &m, "B"), 2);
    }

    #[test]
    fn test_null_receiver() {
        let fx = Fixture::hierarchy();
        let site = DynamicCallSite::new(fx.env.config());
        let err = site
            .execute(&fx.env, &fx.method("A", "m"), &Value::Null, &[])
            .unwrap_err();
        assert_eq!(err, DispatchError::NullReceiver);
        assert_eq!(site.seed_count(), 0);
    }
}
