//! Method resolution.
//!
//! Computes the concrete [`MethodVersion`] a call instruction invokes:
//!
//! - **Special** (constructors, private and super calls): the current
//!   version of the statically named method. The receiver's klass is
//!   ignored.
//! - **Virtual**: the seed's vtable slot looked up in the receiver's klass;
//!   array receivers look up their super-klass instead.
//!
//! Both modes divert removed-by-redefinition methods to the redefinition
//! collaborator through a cold, never-inlined slow path.
//!
//! # Validity
//!
//! Resolution only ever hands out versions whose assumption is valid. A
//! version observed invalid means a redefinition has invalidated it but not
//! yet published the replacement; resolution re-reads until it has.

use std::sync::Arc;

use kiln_runtime::{CallTarget, GuestException, LinkageError, Method, MethodVersion, ObjectRef, Value};

use crate::env::DispatchEnv;
use crate::error::{DispatchError, DispatchResult};

/// Busy-wait iterations before yielding while a redefinition publishes.
const SPIN_LIMIT: u32 = 64;

// =============================================================================
// Resolved Target
// =============================================================================

/// A resolved method version together with its entry point.
///
/// Only constructed for versions that have code.
#[derive(Debug, Clone)]
pub struct Resolved {
    version: Arc<MethodVersion>,
    target: CallTarget,
}

impl Resolved {
    #[inline]
    pub fn version(&self) -> &Arc<MethodVersion> {
        &self.version
    }

    #[inline]
    pub fn target(&self) -> &CallTarget {
        &self.target
    }

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.version.is_valid()
    }

    /// Invoke the target unless the version was invalidated.
    ///
    /// The assumption is read immediately before the call; `None` means
    /// the caller must re-resolve.
    #[inline(always)]
    pub fn try_call(&self, args: &[Value]) -> Option<Result<Value, GuestException>> {
        if !self.version.is_valid() {
            return None;
        }
        Some(self.target.call(args))
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve a special (non-virtual) call.
pub fn resolve_special(
    env: &DispatchEnv,
    method: &Method,
    receiver: &ObjectRef,
) -> DispatchResult<Resolved> {
    let version = settle(|| {
        if env.redefinition().is_removed_by_redefinition(method) {
            return resolve_removed(env, method, receiver);
        }
        Ok(method.current_version())
    })?;
    with_code(version, receiver)
}

/// Resolve a virtual call through the receiver's vtable.
pub fn resolve_virtual(
    env: &DispatchEnv,
    seed: &Method,
    receiver: &ObjectRef,
) -> DispatchResult<Resolved> {
    let version = settle(|| {
        if env.redefinition().is_removed_by_redefinition(seed) {
            return resolve_removed(env, seed, receiver);
        }
        let slot = seed
            .vtable_index()
            .ok_or_else(|| LinkageError::NotVirtual(seed.name().into()))?;

        let klasses = env.klasses();
        let mut klass = receiver.klass();
        if klasses.is_array(klass)? {
            // Arrays own no slots; inherited methods live in the super vtable.
            klass = klasses
                .super_klass(klass)?
                .ok_or(LinkageError::UnknownKlass(klass))?;
        }
        let version = klasses.vtable_lookup(klass, slot)?;

        // The override in this slot may itself have been removed.
        if !version.is_valid() {
            let target = klasses.method(version.method())?;
            if env.redefinition().is_removed_by_redefinition(&target) {
                return resolve_removed(env, &target, receiver);
            }
        }
        Ok(version)
    })?;
    with_code(version, receiver)
}

/// Slow path for methods removed by redefinition.
#[cold]
#[inline(never)]
fn resolve_removed(
    env: &DispatchEnv,
    method: &Method,
    receiver: &ObjectRef,
) -> DispatchResult<Arc<MethodVersion>> {
    tracing::trace!(
        method = method.name(),
        klass = ?receiver.klass(),
        "resolving removed method through redefinition"
    );
    Ok(env
        .redefinition()
        .resolve_replacement(method, receiver.klass(), receiver)?)
}

/// Re-run `resolve` until it yields a version whose assumption holds.
fn settle<F>(mut resolve: F) -> DispatchResult<Arc<MethodVersion>>
where
    F: FnMut() -> DispatchResult<Arc<MethodVersion>>,
{
    let mut spins = 0;
    loop {
        let version = resolve()?;
        if version.is_valid() {
            return Ok(version);
        }
        if spins < SPIN_LIMIT {
            spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

fn with_code(version: Arc<MethodVersion>, receiver: &ObjectRef) -> DispatchResult<Resolved> {
    match version.call_target() {
        Some(target) => Ok(Resolved {
            target: target.clone(),
            version,
        }),
        None => Err(DispatchError::AbstractDispatch {
            method: version.method(),
            klass: receiver.klass(),
        }),
    }
}

// =============================================================================
// Indirect Invocation
// =============================================================================

/// Resolve and invoke on every call, with no cached state.
///
/// Used by megamorphic and uncached dispatch.
pub(crate) fn invoke_indirect<R>(args: &[Value], mut resolve: R) -> DispatchResult<Value>
where
    R: FnMut() -> DispatchResult<Resolved>,
{
    loop {
        let resolved = resolve()?;
        if let Some(result) = resolved.try_call(args) {
            return result.map_err(DispatchError::from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, returns};
    use kiln_runtime::{KlassDef, MethodDef, MethodId};

    fn result_of(resolved: &Resolved) -> i64 {
        resolved.target().call(&[]).unwrap().as_int().unwrap()
    }

    // =========================================================================
    // Virtual
    // =========================================================================

    #[test]
    fn test_virtual_uses_receiver_klass() {
        let fx = Fixture::hierarchy();
        let seed = fx.method("A", "m");

        let on_a = resolve_virtual(&fx.env, &seed, &fx.object("A")).unwrap();
        let on_b = resolve_virtual(&fx.env, &seed, &fx.object("B")).unwrap();
        assert_eq!(result_of(&on_a), 1);
        assert_eq!(result_of(&on_b), 2);
    }

    #[test]
    fn test_virtual_array_redirects_to_super() {
        let fx = Fixture::hierarchy();
        let seed = fx.method("A", "m");
        let array = fx.registry.define_array_klass("A[]", fx.klass("A")).unwrap();
        let receiver = fx.registry.instantiate(array).unwrap();

        let via_array = resolve_virtual(&fx.env, &seed, &receiver).unwrap();
        let via_super = resolve_virtual(&fx.env, &seed, &fx.object("A")).unwrap();
        assert!(Arc::ptr_eq(via_array.version(), via_super.version()));
    }

    #[test]
    fn test_virtual_abstract_target() {
        let fx = Fixture::new();
        let shape = fx
            .registry
            .define_klass(KlassDef::new("Shape").method(MethodDef::abstract_method("area")))
            .unwrap();
        let seed = fx.registry.declared_method(shape, "area").unwrap().unwrap();
        let receiver = fx.registry.instantiate(shape).unwrap();

        let err = resolve_virtual(&fx.env, &seed, &receiver).unwrap_err();
        assert_eq!(
            err,
            DispatchError::AbstractDispatch {
                method: seed.id(),
                klass: shape,
            }
        );
    }

    #[test]
    fn test_virtual_rejects_special_seed() {
        let fx = Fixture::hierarchy();
        let init = fx.method("A", "<init>");
        let err = resolve_virtual(&fx.env, &init, &fx.object("A")).unwrap_err();
        assert_eq!(err, DispatchError::Linkage(LinkageError::NotVirtual("<init>".into())));
    }

    #[test]
    fn test_virtual_removed_override_falls_back_by_name() {
        let fx = Fixture::hierarchy();
        let seed = fx.method("A", "m");
        let b_m = fx.method("B", "m");
        fx.coordinator.remove_method(b_m.id(), None).unwrap();

        let resolved = resolve_virtual(&fx.env, &seed, &fx.object("B")).unwrap();
        assert_eq!(resolved.version().method(), seed.id());
        assert_eq!(result_of(&resolved), 1);
    }

    #[test]
    fn test_virtual_removed_seed_uses_replacement() {
        let fx = Fixture::hierarchy();
        let seed = fx.method("A", "m");
        let other = fx.method("A", "other");
        fx.coordinator
            .remove_method(seed.id(), Some(other.id()))
            .unwrap();

        let resolved = resolve_virtual(&fx.env, &seed, &fx.object("B")).unwrap();
        assert_eq!(resolved.version().method(), other.id());
    }

    // =========================================================================
    // Special
    // =========================================================================

    #[test]
    fn test_special_ignores_receiver_klass() {
        let fx = Fixture::hierarchy();
        let a_m = fx.method("A", "m");

        let on_a = resolve_special(&fx.env, &a_m, &fx.object("A")).unwrap();
        let on_b = resolve_special(&fx.env, &a_m, &fx.object("B")).unwrap();
        assert!(Arc::ptr_eq(on_a.version(), on_b.version()));
        assert_eq!(result_of(&on_b), 1);
    }

    #[test]
    fn test_special_follows_redefinition() {
        let fx = Fixture::hierarchy();
        let init = fx.method("A", "<init>");
        fx.coordinator.redefine(init.id(), Some(returns(42))).unwrap();

        let resolved = resolve_special(&fx.env, &init, &fx.object("B")).unwrap();
        assert_eq!(resolved.version().revision(), 1);
        assert_eq!(result_of(&resolved), 42);
    }

    #[test]
    fn test_special_abstract_version() {
        let fx = Fixture::hierarchy();
        let init = fx.method("A", "<init>");
        fx.coordinator.redefine(init.id(), None).unwrap();

        let err = resolve_special(&fx.env, &init, &fx.object("A")).unwrap_err();
        assert!(matches!(err, DispatchError::AbstractDispatch { .. }));
    }

    // =========================================================================
    // Settling and Indirect Calls
    // =========================================================================

    #[test]
    fn test_settle_skips_invalid_versions() {
        let fx = Fixture::hierarchy();
        let stale = fx.method("A", "m").current_version();
        let fresh = fx.method("B", "m").current_version();
        stale.assumption().invalidate();

        let mut calls = 0;
        let settled = settle(|| {
            calls += 1;
            Ok(if calls < 3 { stale.clone() } else { fresh.clone() })
        })
        .unwrap();
        assert!(Arc::ptr_eq(&settled, &fresh));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_try_call_refuses_invalid_version() {
        let fx = Fixture::hierarchy();
        let seed = fx.method("A", "m");
        let resolved = resolve_virtual(&fx.env, &seed, &fx.object("A")).unwrap();
        assert!(resolved.try_call(&[]).is_some());

        seed.current_version().assumption().invalidate();
        assert!(resolved.try_call(&[]).is_none());
    }

    #[test]
    fn test_invoke_indirect_propagates_errors() {
        let err = invoke_indirect(&[], || {
            Err(DispatchError::AbstractDispatch {
                method: MethodId(0),
                klass: kiln_runtime::KlassId(0),
            })
        })
        .unwrap_err();
        assert!(matches!(err, DispatchError::AbstractDispatch { .. }));
    }
}
