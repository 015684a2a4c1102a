//! Guest values as seen by the dispatch core.
//!
//! Only the receiver's klass matters to dispatch, so heap objects are a
//! klass handle behind a shared pointer. Object equality is identity.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::klass::KlassId;

// =============================================================================
// Object References
// =============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct HeapObject {
    klass: KlassId,
    id: u64,
}

/// Non-null reference to a guest object.
#[derive(Clone)]
pub struct ObjectRef(Arc<HeapObject>);

impl ObjectRef {
    /// Allocate a new object of the given klass.
    pub fn new(klass: KlassId) -> Self {
        Self(Arc::new(HeapObject {
            klass,
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
        }))
    }

    /// Dynamic klass of the object.
    #[inline(always)]
    pub fn klass(&self) -> KlassId {
        self.0.klass
    }

    /// Identity hash, unique per allocation.
    #[inline]
    pub fn identity(&self) -> u64 {
        self.0.id
    }

    /// Reference equality.
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef(#{} of {:?})", self.0.id, self.0.klass)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A guest value: receiver, argument or call result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// The null reference.
    #[default]
    Null,
    /// Boolean primitive.
    Bool(bool),
    /// Integer primitive.
    Int(i64),
    /// Reference to a heap object.
    Object(ObjectRef),
}

impl Value {
    /// Check for the null reference.
    #[inline(always)]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the object reference, if this is one.
    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Extract an integer, if this is one.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
