//! Receiver null check.
//!
//! Runs first on every dispatch path, before any cache, vtable or method
//! lookup. It is never cached or specialized.

use kiln_runtime::{ObjectRef, Value};

use crate::error::{DispatchError, DispatchResult};

/// Return the receiver object, or fail with [`DispatchError::NullReceiver`].
///
/// Non-reference receivers are treated like null: there is no klass to
/// dispatch on.
#[inline(always)]
pub fn null_check(receiver: &Value) -> DispatchResult<&ObjectRef> {
    match receiver {
        Value::Object(obj) => Ok(obj),
        _ => Err(DispatchError::NullReceiver),
    }
}
