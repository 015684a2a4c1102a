//! The seam between the dispatch core and its collaborators.
//!
//! The core never reaches into the registry or the redefinition machinery
//! directly; it consults them through these traits, read-only.

use std::sync::Arc;

use crate::error::LinkageResult;
use crate::klass::KlassId;
use crate::method::{Method, MethodId, MethodVersion};
use crate::value::ObjectRef;

/// Read-only view of loaded klasses and their vtables.
pub trait KlassLookup: Send + Sync {
    /// Resolve a method handle.
    fn method(&self, method: MethodId) -> LinkageResult<Arc<Method>>;

    /// Whether `klass` is an array klass.
    fn is_array(&self, klass: KlassId) -> LinkageResult<bool>;

    /// Super-klass of `klass`, `None` for the root.
    fn super_klass(&self, klass: KlassId) -> LinkageResult<Option<KlassId>>;

    /// Current version of the method assigned to `slot` in `klass`'s vtable.
    fn vtable_lookup(&self, klass: KlassId, slot: u32) -> LinkageResult<Arc<MethodVersion>>;
}

/// The redefinition collaborator's slow-path interface.
pub trait Redefinition: Send + Sync {
    /// Whether redefinition removed `method` from its klass.
    fn is_removed_by_redefinition(&self, method: &Method) -> bool {
        method.is_removed_by_redefinition()
    }

    /// Find the version that replaces a removed method for this receiver.
    fn resolve_replacement(
        &self,
        method: &Method,
        klass: KlassId,
        receiver: &ObjectRef,
    ) -> LinkageResult<Arc<MethodVersion>>;
}
