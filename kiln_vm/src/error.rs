//! Dispatch errors.
//!
//! Every error here propagates to the interpreter unchanged. Cache-limit
//! exhaustion and redefinition races are not errors and never surface.

use kiln_runtime::{GuestException, KlassId, LinkageError, MethodId};
use thiserror::Error;

/// Errors raised by a call instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The receiver was null. Raised before any lookup.
    #[error("null receiver")]
    NullReceiver,

    /// Resolution landed on a method version without code.
    #[error("abstract method {method:?} reached through dispatch on klass {klass:?}")]
    AbstractDispatch { method: MethodId, klass: KlassId },

    /// The registry or redefinition collaborator rejected a lookup.
    #[error(transparent)]
    Linkage(#[from] LinkageError),

    /// The invoked method threw.
    #[error(transparent)]
    Guest(#[from] GuestException),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Whether the error is an exception the guest program can observe.
    pub fn is_guest_visible(&self) -> bool {
        matches!(
            self,
            DispatchError::NullReceiver | DispatchError::AbstractDispatch { .. } | DispatchError::Guest(_)
        )
    }
}
