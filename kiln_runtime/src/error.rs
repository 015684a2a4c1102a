//! Runtime error types.

use std::sync::Arc;

use thiserror::Error;

use crate::klass::KlassId;
use crate::method::MethodId;

// =============================================================================
// Linkage Errors
// =============================================================================

/// Errors raised while defining klasses or looking up methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkageError {
    /// No klass is registered under this id.
    #[error("unknown klass {0:?}")]
    UnknownKlass(KlassId),

    /// No method is registered under this id.
    #[error("unknown method {0:?}")]
    UnknownMethod(MethodId),

    /// A klass with this name is already defined.
    #[error("klass '{0}' is already defined")]
    DuplicateKlass(Arc<str>),

    /// The vtable of `klass` has no slot `slot`.
    #[error("vtable slot {slot} out of range for klass {klass:?} (len {len})")]
    SlotOutOfRange { klass: KlassId, slot: u32, len: usize },

    /// A method without a vtable slot was used as a virtual resolution seed.
    #[error("method '{0}' has no vtable slot")]
    NotVirtual(Arc<str>),

    /// A removed method has no replacement reachable from the receiver.
    #[error("no replacement for removed method '{method}' in klass '{klass}'")]
    NoSuchMethod { method: Arc<str>, klass: Arc<str> },

    /// A removed method cannot be given a new implementation.
    #[error("method '{0}' was removed by redefinition")]
    MethodRemoved(Arc<str>),
}

/// Result type for linkage operations.
pub type LinkageResult<T> = Result<T, LinkageError>;

// =============================================================================
// Guest Exceptions
// =============================================================================

/// An exception thrown by guest code and propagated through dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct GuestException {
    /// Guest class name of the thrown exception.
    pub class: Arc<str>,
    /// Detail message.
    pub message: String,
}

impl GuestException {
    /// Create a new guest exception.
    pub fn new(class: impl Into<Arc<str>>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }
}
