//! Type descriptors.
//!
//! A klass owns its vtable: slot index → [`MethodId`]. Slot assignments are
//! fixed once the klass is defined; redefinition replaces the version behind
//! a method, never the method in a slot. Super-klass links are handles into
//! the registry, not owning pointers.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::method::MethodId;

/// Handle of a klass in the [`ClassRegistry`](crate::ClassRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KlassId(pub u32);

/// A loaded type.
pub struct Klass {
    id: KlassId,
    name: Arc<str>,
    super_klass: Option<KlassId>,
    is_array: bool,
    vtable: Box<[MethodId]>,
    declared: SmallVec<[MethodId; 8]>,
}

impl Klass {
    pub(crate) fn new(
        id: KlassId,
        name: Arc<str>,
        super_klass: Option<KlassId>,
        is_array: bool,
        vtable: Box<[MethodId]>,
        declared: SmallVec<[MethodId; 8]>,
    ) -> Self {
        Self {
            id,
            name,
            super_klass,
            is_array,
            vtable,
            declared,
        }
    }

    #[inline]
    pub fn id(&self) -> KlassId {
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
    pub fn super_klass(&self) -> Option<KlassId> {
        self.super_klass
    }

    /// Array klasses carry no vtable of their own.
    #[inline]
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    #[inline]
    pub fn vtable(&self) -> &[MethodId] {
        &self.vtable
    }

    /// Method in vtable slot `slot`, if in range.
    #[inline]
    pub fn vtable_entry(&self, slot: u32) -> Option<MethodId> {
        self.vtable.get(slot as usize).copied()
    }

    /// Methods declared directly by this klass, in declaration order.
    #[inline]
    pub fn declared_methods(&self) -> &[MethodId] {
        &self.declared
    }
}

impl fmt::Debug for Klass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Klass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("super", &self.super_klass)
            .field("is_array", &self.is_array)
            .field("vtable_len", &self.vtable.len())
            .finish()
    }
}
