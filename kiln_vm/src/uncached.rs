//! Dispatch without call-site state.
//!
//! Null guard, full resolution and an indirect call on every invocation.
//! Used when inline caching is disabled and by callers that have no call
//! site to attach a cache to.

use kiln_runtime::{Method, Value};

use crate::env::DispatchEnv;
use crate::error::DispatchResult;
use crate::null_guard::null_check;
use crate::resolution::{invoke_indirect, resolve_special, resolve_virtual};

/// Invoke `method` non-virtually on `receiver`.
pub fn invoke_special(
    env: &DispatchEnv,
    method: &Method,
    receiver: &Value,
    args: &[Value],
) -> DispatchResult<Value> {
    let receiver = null_check(receiver)?;
    invoke_indirect(args, || resolve_special(env, method, receiver))
}

/// Invoke `seed` virtually on `receiver`.
pub fn invoke_virtual(
    env: &DispatchEnv,
    seed: &Method,
    receiver: &Value,
    args: &[Value],
) -> DispatchResult<Value> {
    let receiver = null_check(receiver)?;
    invoke_indirect(args, || resolve_virtual(env, seed, receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::test_support::{Fixture, returns};

    #[test]
    fn test_virtual_follows_receiver() {
        let fx = Fixture::hierarchy();
        let seed = fx.method("A", "m");
        assert_eq!(
            invoke_virtual(&fx.env, &seed, &fx.value("A"), &[]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            invoke_virtual(&fx.env, &seed, &fx.value("B"), &[]).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn test_special_sees_redefinition() {
        let fx = Fixture::hierarchy();
        let init = fx.method("A", "<init>");
        fx.coordinator.redefine(init.id(), Some(returns(3))).unwrap();
        assert_eq!(
            invoke_special(&fx.env, &init, &fx.value("B"), &[]).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_null_receiver() {
        let fx = Fixture::hierarchy();
        let seed = fx.method("A", "m");
        assert_eq!(
            invoke_virtual(&fx.env, &seed, &Value::Null, &[]).unwrap_err(),
            DispatchError::NullReceiver
        );
        assert_eq!(
            invoke_special(&fx.env, &seed, &Value::Null, &[]).unwrap_err(),
            DispatchError::NullReceiver
        );
    }
}
