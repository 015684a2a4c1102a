//! Methods and method versions.
//!
//! A [`Method`] is the stable, bytecode-visible identity of a declaration.
//! Its implementation is a [`MethodVersion`]: an immutable snapshot paired
//! with an [`Assumption`] that is invalidated when the version is
//! superseded. Redefinition swaps the version behind the method; the
//! method's identity and vtable slot never change.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;

use crate::assumption::Assumption;
use crate::call_target::CallTarget;
use crate::klass::KlassId;

// =============================================================================
// Method Identity
// =============================================================================

/// Handle of a method in the [`ClassRegistry`](crate::ClassRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub u32);

/// How a method is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Overridable; occupies a vtable slot.
    Virtual,
    /// Constructor or private method; bound statically, no vtable slot.
    Special,
}

// =============================================================================
// Method Version
// =============================================================================

/// One immutable, invocable form of a method.
pub struct MethodVersion {
    method: MethodId,
    revision: u32,
    code: Option<CallTarget>,
    assumption: Assumption,
}

impl MethodVersion {
    /// Create a version. `code == None` marks an abstract version.
    pub fn new(method: MethodId, name: &str, revision: u32, code: Option<CallTarget>) -> Self {
        Self {
            method,
            revision,
            code,
            assumption: Assumption::new(format!("{name}@r{revision}")),
        }
    }

    /// The method this version belongs to.
    #[inline]
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// Redefinition revision, starting at 0.
    #[inline]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// `false` for abstract versions, which can never be a dispatch target.
    #[inline]
    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }

    /// Entry point, if the version has code.
    #[inline]
    pub fn call_target(&self) -> Option<&CallTarget> {
        self.code.as_ref()
    }

    /// Validity assumption; invalidated when the version is superseded.
    #[inline]
    pub fn assumption(&self) -> &Assumption {
        &self.assumption
    }

    /// Shorthand for `assumption().is_valid()`.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.assumption.is_valid()
    }
}

impl fmt::Debug for MethodVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodVersion")
            .field("method", &self.method)
            .field("revision", &self.revision)
            .field("has_code", &self.has_code())
            .field("valid", &self.is_valid())
            .finish()
    }
}

// =============================================================================
// Method
// =============================================================================

/// A method declaration.
pub struct Method {
    id: MethodId,
    name: Arc<str>,
    declaring_klass: KlassId,
    kind: MethodKind,
    vtable_index: Option<u32>,
    /// Holds while no loaded subclass overrides this method.
    leaf: Assumption,
    removed: AtomicBool,
    version: ArcSwap<MethodVersion>,
}

impl Method {
    pub(crate) fn new(
        id: MethodId,
        name: Arc<str>,
        declaring_klass: KlassId,
        kind: MethodKind,
        vtable_index: Option<u32>,
        code: Option<CallTarget>,
    ) -> Self {
        let version = MethodVersion::new(id, &name, 0, code);
        Self {
            id,
            leaf: Assumption::new(format!("{name} leaf")),
            name,
            declaring_klass,
            kind,
            vtable_index,
            removed: AtomicBool::new(false),
            version: ArcSwap::from_pointee(version),
        }
    }

    #[inline]
    pub fn id(&self) -> MethodId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    #[inline]
    pub fn declaring_klass(&self) -> KlassId {
        self.declaring_klass
    }

    #[inline]
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Vtable slot, `None` for special methods.
    #[inline]
    pub fn vtable_index(&self) -> Option<u32> {
        self.vtable_index
    }

    /// The current version carries no code.
    #[inline]
    pub fn is_abstract(&self) -> bool {
        !self.current_version().has_code()
    }

    /// Assumption that no loaded subclass overrides this method.
    #[inline]
    pub fn leaf_assumption(&self) -> &Assumption {
        &self.leaf
    }

    /// Set once redefinition removed this method from its klass.
    #[inline]
    pub fn is_removed_by_redefinition(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// The currently endorsed version.
    #[inline]
    pub fn current_version(&self) -> Arc<MethodVersion> {
        self.version.load_full()
    }

    /// Swap in a new version, returning the superseded one.
    ///
    /// The caller invalidates the old version's assumption before calling.
    pub(crate) fn publish_version(&self, version: Arc<MethodVersion>) -> Arc<MethodVersion> {
        self.version.swap(version)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("vtable_index", &self.vtable_index)
            .field("leaf", &self.leaf.is_valid())
            .field("removed", &self.is_removed_by_redefinition())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn body() -> CallTarget {
        CallTarget::new("body", |_: &[Value]| Ok(Value::Int(1)))
    }

    #[test]
    fn test_new_method_starts_at_revision_zero() {
        let m = Method::new(
            MethodId(0),
            "A.run".into(),
            KlassId(0),
            MethodKind::Virtual,
            Some(0),
            Some(body()),
        );
        let v = m.current_version();
        assert_eq!(v.revision(), 0);
        assert_eq!(v.method(), MethodId(0));
        assert!(v.has_code());
        assert!(v.is_valid());
        assert!(!m.is_abstract());
        assert!(m.leaf_assumption().is_valid());
        assert!(!m.is_removed_by_redefinition());
    }

    #[test]
    fn test_abstract_method_has_no_code() {
        let m = Method::new(
            MethodId(1),
            "Shape.area".into(),
            KlassId(0),
            MethodKind::Virtual,
            Some(0),
            None,
        );
        assert!(m.is_abstract());
        assert!(!m.current_version().has_code());
        assert!(m.current_version().call_target().is_none());
    }

    #[test]
    fn test_abstract_follows_current_version() {
        let m = Method::new(
            MethodId(3),
            "Shape.area".into(),
            KlassId(0),
            MethodKind::Virtual,
            Some(0),
            None,
        );
        assert!(m.is_abstract());
        m.publish_version(Arc::new(MethodVersion::new(m.id(), m.name(), 1, Some(body()))));
        assert!(!m.is_abstract());
    }

    #[test]
    fn test_publish_version_returns_old() {
        let m = Method::new(
            MethodId(2),
            "A.<init>".into(),
            KlassId(0),
            MethodKind::Special,
            None,
            Some(body()),
        );
        let first = m.current_version();
        let next = Arc::new(MethodVersion::new(m.id(), m.name(), 1, Some(body())));
        let old = m.publish_version(next.clone());
        assert!(Arc::ptr_eq(&old, &first));
        assert!(Arc::ptr_eq(&m.current_version(), &next));
    }
}
