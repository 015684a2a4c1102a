//! Object model for the Kiln interpreter's dispatch core.
//!
//! This crate provides:
//! - Invalidate-once [`Assumption`]s
//! - Klasses with fixed vtables, methods and immutable method versions
//! - The [`ClassRegistry`], the authoritative source of dispatch targets
//! - The [`RedefinitionCoordinator`], which replaces and removes methods
//! - The [`KlassLookup`] / [`Redefinition`] traits the dispatch core consumes

pub mod assumption;
pub mod call_target;
pub mod error;
pub mod klass;
pub mod linkage;
pub mod method;
pub mod redefinition;
pub mod registry;
pub mod value;

pub use assumption::Assumption;
pub use call_target::{CallTarget, MethodBody};
pub use error::{GuestException, LinkageError, LinkageResult};
pub use klass::{Klass, KlassId};
pub use linkage::{KlassLookup, Redefinition};
pub use method::{Method, MethodId, MethodKind, MethodVersion};
pub use redefinition::RedefinitionCoordinator;
pub use registry::{ClassRegistry, KlassDef, MethodDef};
pub use value::{ObjectRef, Value};
