//! Shared fixtures for unit tests.

use std::sync::Arc;

use kiln_runtime::{
    CallTarget, ClassRegistry, KlassDef, KlassId, Method, MethodDef, ObjectRef,
    RedefinitionCoordinator, Value,
};

use crate::config::DispatchConfig;
use crate::env::DispatchEnv;

/// A body that returns `n`.
pub(crate) fn returns(n: i64) -> CallTarget {
    CallTarget::new(format!("returns {n}"), move |_: &[Value]| Ok(Value::Int(n)))
}

pub(crate) struct Fixture {
    pub registry: Arc<ClassRegistry>,
    pub coordinator: Arc<RedefinitionCoordinator>,
    pub env: DispatchEnv,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        let registry = Arc::new(ClassRegistry::new());
        let coordinator = Arc::new(RedefinitionCoordinator::new(registry.clone()));
        let env = DispatchEnv::new(registry.clone(), coordinator.clone(), config);
        Self {
            registry,
            coordinator,
            env,
        }
    }

    /// `A { m -> 1, other -> 10, <init> -> 0 }` and `B extends A { m -> 2 }`.
    pub fn hierarchy() -> Self {
        let fx = Self::new();
        fx.define_hierarchy();
        fx
    }

    pub fn define_hierarchy(&self) {
        let a = self
            .registry
            .define_klass(
                KlassDef::new("A")
                    .method(MethodDef::virtual_method("m", returns(1)))
                    .method(MethodDef::virtual_method("other", returns(10)))
                    .method(MethodDef::special("<init>", returns(0))),
            )
            .unwrap();
        self.registry
            .define_klass(
                KlassDef::new("B")
                    .extends(a)
                    .method(MethodDef::virtual_method("m", returns(2))),
            )
            .unwrap();
    }

    /// Define `count` subclasses of `base`, the i-th overriding `m` to
    /// return `100 + i`.
    pub fn overriding_subclasses(&self, base: &str, count: usize) -> Vec<KlassId> {
        let base = self.klass(base);
        (0..count)
            .map(|i| {
                self.registry
                    .define_klass(
                        KlassDef::new(format!("Sub{i}"))
                            .extends(base)
                            .method(MethodDef::virtual_method("m", returns(100 + i as i64))),
                    )
                    .unwrap()
            })
            .collect()
    }

    pub fn klass(&self, name: &str) -> KlassId {
        self.registry.lookup_klass(name).unwrap()
    }

    pub fn method(&self, klass: &str, name: &str) -> Arc<Method> {
        self.registry
            .declared_method(self.klass(klass), name)
            .unwrap()
            .unwrap()
    }

    pub fn object(&self, klass: &str) -> ObjectRef {
        self.registry.instantiate(self.klass(klass)).unwrap()
    }

    pub fn value(&self, klass: &str) -> Value {
        Value::Object(self.object(klass))
    }
}
