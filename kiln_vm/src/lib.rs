//! Method dispatch core for the Kiln interpreter.
//!
//! Every call instruction goes through the same pipeline:
//!
//! ```text
//!   receiver ─► null guard ─► inline cache ──hit──► call target
//!                                  │
//!                                miss / invalidated
//!                                  │
//!                                  ▼
//!                              resolution ─► install ─► call target
//! ```
//!
//! - [`invoke_virtual`]: klass-keyed caches with a Leaf-Direct fast state
//! - [`invoke_special`]: method-keyed caches for non-virtual calls
//! - [`invoke_dynamic`]: seed-keyed outer cache for reflective calls
//! - [`uncached`]: the same semantics with no call-site state
//!
//! Cached targets stay correct across class redefinition because every
//! entry is guarded by its method version's [`Assumption`](kiln_runtime::Assumption),
//! checked immediately before the call.

pub mod call_site_table;
pub mod config;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod inline_cache;
pub mod invoke_dynamic;
pub mod invoke_special;
pub mod invoke_virtual;
pub mod null_guard;
pub mod resolution;
pub mod uncached;

#[cfg(test)]
mod test_support;

pub use call_site_table::{CallSiteId, CallSiteTable, SiteStats};
pub use config::{DispatchConfig, MAX_CACHE_LIMIT};
pub use dispatcher::Dispatcher;
pub use env::DispatchEnv;
pub use error::{DispatchError, DispatchResult};
pub use inline_cache::{CallSiteState, CallSiteStatsSnapshot, InlineCache};
pub use invoke_dynamic::DynamicCallSite;
pub use invoke_special::SpecialCallSite;
pub use invoke_virtual::VirtualCallSite;
pub use null_guard::null_check;
pub use resolution::{Resolved, resolve_special, resolve_virtual};
