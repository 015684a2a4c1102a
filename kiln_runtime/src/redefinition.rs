//! Redefinition coordinator.
//!
//! Publishes replacement method versions and removes methods at runtime.
//! Every operation follows invalidate-then-publish: the superseded
//! version's assumption is invalidated before the new version becomes
//! reachable, so a reader that still sees a valid assumption is holding the
//! currently endorsed implementation.
//!
//! Redefinitions are serialized by an internal mutex. The dispatch core never
//! calls into this module except through [`Redefinition`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::call_target::CallTarget;
use crate::error::{LinkageError, LinkageResult};
use crate::klass::KlassId;
use crate::linkage::{KlassLookup, Redefinition};
use crate::method::{Method, MethodId, MethodVersion};
use crate::registry::ClassRegistry;
use crate::value::ObjectRef;

/// Serializes and applies method redefinitions.
pub struct RedefinitionCoordinator {
    registry: Arc<ClassRegistry>,
    /// Held for the duration of one redefinition.
    serial: Mutex<()>,
    /// Explicit replacements for removed methods.
    replacements: RwLock<FxHashMap<MethodId, MethodId>>,
    events: AtomicU64,
}

impl RedefinitionCoordinator {
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self {
            registry,
            serial: Mutex::new(()),
            replacements: RwLock::new(FxHashMap::default()),
            events: AtomicU64::new(0),
        }
    }

    /// Replace the implementation of `method`.
    ///
    /// Returns the newly published version. A method already removed by
    /// [`remove_method`](Self::remove_method) stays removed.
    pub fn redefine(
        &self,
        method: MethodId,
        code: Option<CallTarget>,
    ) -> LinkageResult<Arc<MethodVersion>> {
        let _serial = self.serial.lock();
        let method = self.registry.method(method)?;
        if method.is_removed_by_redefinition() {
            return Err(LinkageError::MethodRemoved(method.name_arc()));
        }
        let old = method.current_version();
        let new = Arc::new(MethodVersion::new(
            method.id(),
            method.name(),
            old.revision() + 1,
            code,
        ));

        old.assumption().invalidate();
        method.publish_version(new.clone());
        self.events.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            method = method.name(),
            revision = new.revision(),
            "method redefined"
        );
        Ok(new)
    }

    /// Remove `method` from its klass.
    ///
    /// Callers that still reach it are routed to `replacement` if given,
    /// otherwise to a same-named method found from the receiver's klass.
    pub fn remove_method(
        &self,
        method: MethodId,
        replacement: Option<MethodId>,
    ) -> LinkageResult<()> {
        let _serial = self.serial.lock();
        let method = self.registry.method(method)?;
        if let Some(replacement) = replacement {
            self.registry.method(replacement)?;
            self.replacements.write().insert(method.id(), replacement);
        }

        // The flag must be visible to anyone who sees the invalidation.
        method.mark_removed();
        method.current_version().assumption().invalidate();
        self.events.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(method = method.name(), ?replacement, "method removed");
        Ok(())
    }

    /// Number of redefinition events applied so far.
    pub fn redefinition_count(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

impl Redefinition for RedefinitionCoordinator {
    fn resolve_replacement(
        &self,
        method: &Method,
        klass: KlassId,
        _receiver: &ObjectRef,
    ) -> LinkageResult<Arc<MethodVersion>> {
        // Follow explicit replacements until one that is still live.
        {
            let replacements = self.replacements.read();
            let mut current = method.id();
            for _ in 0..replacements.len() {
                let Some(&next) = replacements.get(&current) else {
                    break;
                };
                let next_method = self.registry.method(next)?;
                if !next_method.is_removed_by_redefinition() {
                    return Ok(next_method.current_version());
                }
                current = next;
            }
        }

        let start = if self.registry.is_array(klass)? {
            self.registry.super_klass(klass)?.unwrap_or(klass)
        } else {
            klass
        };
        match self.registry.find_method(start, method.name())? {
            Some(found) => Ok(found.current_version()),
            None => Err(LinkageError::NoSuchMethod {
                method: method.name_arc(),
                klass: self.registry.klass(klass)?.name_arc(),
            }),
        }
    }
}
