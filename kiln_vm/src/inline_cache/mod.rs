//! Adaptive inline caches.
//!
//! Every call instruction owns one cache that remembers prior resolutions
//! so the vtable walk is skipped on repeated dispatch.
//!
//! # State Machine
//!
//! ```text
//!                    ┌───────────────┐
//!                    │ Uninitialized │
//!                    └───────┬───────┘
//!                            │ first call (virtual, seed is a leaf)
//!                    ╔═══════▼═══════╗
//!                    ║  Leaf-Direct  ║  guarded by leaf + version assumption
//!                    ╚═══════╤═══════╝
//!                            │ first call otherwise / leaf invalidated
//!                    ╔═══════▼═══════╗
//!                    ║  Monomorphic  ║
//!                    ╚═══════╤═══════╝
//!                            │ new guard key
//!                    ╔═══════▼═══════╗
//!                    ║  Polymorphic  ║  up to LIMIT entries
//!                    ╚═══════╤═══════╝
//!                            │ LIMIT + 1-th distinct key
//!                    ┌───────▼───────┐
//!                    │  Megamorphic  │  resolve + indirect call, permanent
//!                    └───────────────┘
//! ```
//!
//! Transitions only move down the diagram. An invalidated entry is resolved
//! again and re-armed in its own slot; that is not a state change.
//!
//! # Thread Safety
//!
//! Caches are shared by every thread executing the owning code unit. The
//! fast path is a scan over [`arc_swap`] slots, a key compare, an
//! assumption load and the call; it takes no locks.

mod cache;
mod entry;
mod state;
mod stats;
mod table;

pub use cache::InlineCache;
pub use entry::{CacheEntry, Guarded};
pub use state::{AtomicCallSiteState, CallSiteState};
pub use stats::{CallSiteStats, CallSiteStatsSnapshot};
pub use table::{EntryTable, Probe};
