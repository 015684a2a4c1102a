//! Klass registry.
//!
//! Central, append-only table of loaded klasses and methods. Everything else
//! refers to klasses and methods by handle ([`KlassId`], [`MethodId`]), which
//! keeps the super-klass and declaring-klass back-references free of
//! ownership cycles.
//!
//! # Vtable Construction
//!
//! A klass starts from a copy of its super-klass's vtable. A virtual method
//! whose name matches an inherited slot overrides that slot; any other
//! virtual method appends a new slot. Loading an override invalidates the
//! overridden method's leaf assumption.
//!
//! # Thread Safety
//!
//! Definitions take the write lock; lookups take the read lock. Published
//! klasses are immutable and shared via `Arc`.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::call_target::CallTarget;
use crate::error::{LinkageError, LinkageResult};
use crate::klass::{Klass, KlassId};
use crate::linkage::KlassLookup;
use crate::method::{Method, MethodId, MethodKind, MethodVersion};
use crate::value::ObjectRef;

// =============================================================================
// Definitions
// =============================================================================

/// Declaration of one method inside a [`KlassDef`].
#[derive(Debug, Clone)]
pub struct MethodDef {
    name: Arc<str>,
    kind: MethodKind,
    code: Option<CallTarget>,
}

impl MethodDef {
    /// A concrete virtual method.
    pub fn virtual_method(name: impl Into<Arc<str>>, code: CallTarget) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Virtual,
            code: Some(code),
        }
    }

    /// A virtual method without code.
    pub fn abstract_method(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Virtual,
            code: None,
        }
    }

    /// A constructor or private method.
    pub fn special(name: impl Into<Arc<str>>, code: CallTarget) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Special,
            code: Some(code),
        }
    }
}

/// Declaration of a klass to load.
#[derive(Debug, Clone)]
pub struct KlassDef {
    name: Arc<str>,
    super_klass: Option<KlassId>,
    methods: Vec<MethodDef>,
}

impl KlassDef {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            super_klass: None,
            methods: Vec::new(),
        }
    }

    /// Set the super-klass.
    pub fn extends(mut self, super_klass: KlassId) -> Self {
        self.super_klass = Some(super_klass);
        self
    }

    /// Add a method declaration.
    pub fn method(mut self, def: MethodDef) -> Self {
        self.methods.push(def);
        self
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
struct Tables {
    klasses: Vec<Arc<Klass>>,
    methods: Vec<Arc<Method>>,
    by_name: FxHashMap<Arc<str>, KlassId>,
}

impl Tables {
    fn klass(&self, id: KlassId) -> LinkageResult<&Arc<Klass>> {
        self.klasses
            .get(id.0 as usize)
            .ok_or(LinkageError::UnknownKlass(id))
    }

    fn method(&self, id: MethodId) -> LinkageResult<&Arc<Method>> {
        self.methods
            .get(id.0 as usize)
            .ok_or(LinkageError::UnknownMethod(id))
    }

    fn reserve_name(&self, name: &Arc<str>) -> LinkageResult<KlassId> {
        if self.by_name.contains_key(name) {
            return Err(LinkageError::DuplicateKlass(name.clone()));
        }
        Ok(KlassId(self.klasses.len() as u32))
    }

    fn publish(&mut self, klass: Klass) -> KlassId {
        let id = klass.id();
        self.by_name.insert(klass.name_arc(), id);
        self.klasses.push(Arc::new(klass));
        id
    }
}

/// Authoritative table of loaded klasses and methods.
#[derive(Default)]
pub struct ClassRegistry {
    tables: RwLock<Tables>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a klass, building its vtable from its super-klass's.
    pub fn define_klass(&self, def: KlassDef) -> LinkageResult<KlassId> {
        let mut tables = self.tables.write();
        let id = tables.reserve_name(&def.name)?;

        let mut vtable: SmallVec<[MethodId; 16]> = match def.super_klass {
            Some(sup) => tables.klass(sup)?.vtable().iter().copied().collect(),
            None => SmallVec::new(),
        };
        let inherited = vtable.len();
        let mut declared = SmallVec::new();

        for method_def in def.methods {
            let method_id = MethodId(tables.methods.len() as u32);
            let vtable_index = match method_def.kind {
                MethodKind::Special => None,
                MethodKind::Virtual => {
                    let overridden = vtable[..inherited]
                        .iter()
                        .position(|m| tables.methods[m.0 as usize].name() == &*method_def.name);
                    match overridden {
                        Some(slot) => {
                            let previous = &tables.methods[vtable[slot].0 as usize];
                            if previous.leaf_assumption().invalidate() {
                                tracing::trace!(
                                    method = previous.name(),
                                    klass = &*def.name,
                                    "override loaded, leaf assumption invalidated"
                                );
                            }
                            vtable[slot] = method_id;
                            Some(slot as u32)
                        }
                        None => {
                            vtable.push(method_id);
                            Some((vtable.len() - 1) as u32)
                        }
                    }
                }
            };
            tables.methods.push(Arc::new(Method::new(
                method_id,
                method_def.name,
                id,
                method_def.kind,
                vtable_index,
                method_def.code,
            )));
            declared.push(method_id);
        }

        let klass = Klass::new(
            id,
            def.name,
            def.super_klass,
            false,
            vtable.into_vec().into_boxed_slice(),
            declared,
        );
        Ok(tables.publish(klass))
    }

    /// Load an array klass. Arrays inherit every method and own no slots.
    pub fn define_array_klass(
        &self,
        name: impl Into<Arc<str>>,
        super_klass: KlassId,
    ) -> LinkageResult<KlassId> {
        let name = name.into();
        let mut tables = self.tables.write();
        let id = tables.reserve_name(&name)?;
        tables.klass(super_klass)?;
        let klass = Klass::new(
            id,
            name,
            Some(super_klass),
            true,
            Box::new([]),
            SmallVec::new(),
        );
        Ok(tables.publish(klass))
    }

    /// Allocate an instance of `klass`.
    pub fn instantiate(&self, klass: KlassId) -> LinkageResult<ObjectRef> {
        self.tables.read().klass(klass)?;
        Ok(ObjectRef::new(klass))
    }

    pub fn klass(&self, id: KlassId) -> LinkageResult<Arc<Klass>> {
        self.tables.read().klass(id).cloned()
    }

    pub fn lookup_klass(&self, name: &str) -> Option<KlassId> {
        self.tables.read().by_name.get(name).copied()
    }

    /// Method declared directly by `klass` under `name`.
    pub fn declared_method(&self, klass: KlassId, name: &str) -> LinkageResult<Option<Arc<Method>>> {
        let tables = self.tables.read();
        let klass = tables.klass(klass)?;
        for &id in klass.declared_methods() {
            let method = tables.method(id)?;
            if method.name() == name {
                return Ok(Some(method.clone()));
            }
        }
        Ok(None)
    }

    /// First non-removed method named `name`, walking from `klass` up the
    /// super chain.
    pub fn find_method(&self, klass: KlassId, name: &str) -> LinkageResult<Option<Arc<Method>>> {
        let tables = self.tables.read();
        let mut current = Some(klass);
        while let Some(id) = current {
            let k = tables.klass(id)?;
            for &mid in k.declared_methods() {
                let method = tables.method(mid)?;
                if method.name() == name && !method.is_removed_by_redefinition() {
                    return Ok(Some(method.clone()));
                }
            }
            current = k.super_klass();
        }
        Ok(None)
    }
}

impl KlassLookup for ClassRegistry {
    fn method(&self, method: MethodId) -> LinkageResult<Arc<Method>> {
        self.tables.read().method(method).cloned()
    }

    fn is_array(&self, klass: KlassId) -> LinkageResult<bool> {
        Ok(self.tables.read().klass(klass)?.is_array())
    }

    fn super_klass(&self, klass: KlassId) -> LinkageResult<Option<KlassId>> {
        Ok(self.tables.read().klass(klass)?.super_klass())
    }

    fn vtable_lookup(&self, klass: KlassId, slot: u32) -> LinkageResult<Arc<MethodVersion>> {
        let tables = self.tables.read();
        let k = tables.klass(klass)?;
        let method = k.vtable_entry(slot).ok_or(LinkageError::SlotOutOfRange {
            klass,
            slot,
            len: k.vtable().len(),
        })?;
        Ok(tables.method(method)?.current_version())
    }
}
