//! Special call sites: constructors, private methods and super calls.
//!
//! The target does not depend on the receiver's klass, so entries are keyed
//! by method identity and only redefinition can change what a site calls.

use kiln_runtime::{Method, MethodId, Value};

use crate::config::DispatchConfig;
use crate::env::DispatchEnv;
use crate::error::DispatchResult;
use crate::inline_cache::{CallSiteState, CallSiteStats, InlineCache};
use crate::null_guard::null_check;
use crate::resolution::resolve_special;

/// Inline cache state for one `invokespecial` instruction.
#[derive(Debug)]
pub struct SpecialCallSite {
    cache: InlineCache<MethodId>,
}

impl SpecialCallSite {
    pub fn new(config: &DispatchConfig) -> Self {
        Self::with_limit(config.special_limit)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            cache: InlineCache::new(limit),
        }
    }

    #[inline]
    pub fn state(&self) -> CallSiteState {
        self.cache.state()
    }

    #[inline]
    pub fn stats(&self) -> &CallSiteStats {
        self.cache.stats()
    }

    /// Invoke `method` on `receiver`; `args` includes the receiver.
    pub fn execute(
        &self,
        env: &DispatchEnv,
        method: &Method,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        let receiver = null_check(receiver)?;
        self.cache
            .dispatch(method.id(), args, || resolve_special(env, method, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::test_support::{Fixture, returns};
    use kiln_runtime::{KlassDef, MethodDef};

    #[test]
    fn test_subclass_receiver_keeps_target() {
        let fx = Fixture::hierarchy();
        let a_m = fx.method("A", "m");
        let site = SpecialCallSite::new(fx.env.config());

        let on_a = site.execute(&fx.env, &a_m, &fx.value("A"), &[]).unwrap();
        let on_b = site.execute(&fx.env, &a_m, &fx.value("B"), &[]).unwrap();
        assert_eq!(on_a, Value::Int(1));
        assert_eq!(on_b, Value::Int(1));
        assert_eq!(site.state(), CallSiteState::Monomorphic);
    }

    #[test]
    fn test_redefinition_changes_target() {
        let fx = Fixture::hierarchy();
        let init = fx.method("A", "<init>");
        let site = SpecialCallSite::new(fx.env.config());
        assert_eq!(
            site.execute(&fx.env, &init, &fx.value("A"), &[]).unwrap(),
            Value::Int(0)
        );

        fx.coordinator.redefine(init.id(), Some(returns(5))).unwrap();
        assert_eq!(
            site.execute(&fx.env, &init, &fx.value("A"), &[]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(site.stats().snapshot().reresolutions, 1);
    }

    #[test]
    fn test_removed_method_uses_replacement() {
        let fx = Fixture::hierarchy();
        let a_m = fx.method("A", "m");
        let other = fx.method("A", "other");
        let site = SpecialCallSite::new(fx.env.config());
        site.execute(&fx.env, &a_m, &fx.value("A"), &[]).unwrap();

        fx.coordinator
            .remove_method(a_m.id(), Some(other.id()))
            .unwrap();
        assert_eq!(
            site.execute(&fx.env, &a_m, &fx.value("A"), &[]).unwrap(),
            Value::Int(10)
        );
    }

    #[test]
    fn test_fifth_method_goes_megamorphic() {
        let fx = Fixture::hierarchy();
        fx.registry
            .define_klass(
                KlassDef::new("C")
                    .extends(fx.klass("A"))
                    .method(MethodDef::special("helper", returns(30))),
            )
            .unwrap();
        let targets = [
            (fx.method("A", "<init>"), 0),
            (fx.method("A", "m"), 1),
            (fx.method("A", "other"), 10),
            (fx.method("B", "m"), 2),
            (fx.method("C", "helper"), 30),
        ];
        let site = SpecialCallSite::new(fx.env.config());
        let receiver = fx.value("C");

        for (i, (method, expected)) in targets.iter().enumerate() {
            let result = site.execute(&fx.env, method, &receiver, &[]).unwrap();
            assert_eq!(result, Value::Int(*expected));
            let expected_state = match i {
                0 => CallSiteState::Monomorphic,
                1..=3 => CallSiteState::Polymorphic,
                _ => CallSiteState::Megamorphic,
            };
            assert_eq!(site.state(), expected_state, "after method #{}", i + 1);
        }

        for (method, expected) in &targets {
            let result = site.execute(&fx.env, method, &receiver, &[]).unwrap();
            assert_eq!(result, Value::Int(*expected));
        }
        assert!(site.state().is_megamorphic());
    }

    #[test]
    fn test_null_receiver() {
        let fx = Fixture::hierarchy();
        let site = SpecialCallSite::new(fx.env.config());
        let err = site
            .execute(&fx.env, &fx.method("A", "<init>"), &Value::Null, &[])
            .unwrap_err();
        assert_eq!(err, DispatchError::NullReceiver);
        assert_eq!(site.stats().snapshot().total(), 0);
    }
}
