//! Invocable entry points bound to method versions.

use std::fmt;
use std::sync::Arc;

use crate::error::GuestException;
use crate::value::Value;

/// Signature of a compiled or interpreted method body.
///
/// `args[0]` is the receiver for instance methods.
pub type MethodBody = dyn Fn(&[Value]) -> Result<Value, GuestException> + Send + Sync;

/// The invocable entry point of one method version.
///
/// Cheap to clone; clones share the body.
#[derive(Clone)]
pub struct CallTarget {
    name: Arc<str>,
    body: Arc<MethodBody>,
}

impl CallTarget {
    /// Wrap a method body.
    pub fn new<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, GuestException> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Invoke the body.
    #[inline(always)]
    pub fn call(&self, args: &[Value]) -> Result<Value, GuestException> {
        (self.body)(args)
    }

    /// Diagnostic name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether two targets share the same body.
    #[inline]
    pub fn ptr_eq(&self, other: &CallTarget) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallTarget({})", self.name)
    }
}
