//! Call-site linkage and polymorphism reporting.
//!
//! The interpreter links each call instruction once and keeps the returned
//! handle next to its code. Dispatch itself never touches the table.

use std::sync::Arc;

use dashmap::DashMap;
use kiln_runtime::Method;

use crate::config::DispatchConfig;
use crate::inline_cache::CallSiteState;
use crate::invoke_dynamic::DynamicCallSite;
use crate::invoke_special::SpecialCallSite;
use crate::invoke_virtual::VirtualCallSite;

// =============================================================================
// Call Site Identifier
// =============================================================================

/// Identifies one call instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSiteId {
    /// The method body or code unit containing the instruction.
    pub code_unit: u32,
    /// Bytecode index of the instruction.
    pub bci: u32,
}

impl CallSiteId {
    #[inline]
    pub const fn new(code_unit: u32, bci: u32) -> Self {
        Self { code_unit, bci }
    }
}

// =============================================================================
// Call Site Table
// =============================================================================

/// Linked call sites, one per instruction.
#[derive(Debug)]
pub struct CallSiteTable {
    config: DispatchConfig,
    virtual_sites: DashMap<CallSiteId, Arc<VirtualCallSite>>,
    special_sites: DashMap<CallSiteId, Arc<SpecialCallSite>>,
    dynamic_sites: DashMap<CallSiteId, Arc<DynamicCallSite>>,
}

impl CallSiteTable {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            virtual_sites: DashMap::new(),
            special_sites: DashMap::new(),
            dynamic_sites: DashMap::new(),
        }
    }

    /// Get or create the virtual site at `id`.
    ///
    /// The seed is fixed by the first link.
    pub fn link_virtual(&self, id: CallSiteId, seed: &Arc<Method>) -> Arc<VirtualCallSite> {
        self.virtual_sites
            .entry(id)
            .or_insert_with(|| Arc::new(VirtualCallSite::new(Arc::clone(seed), &self.config)))
            .value()
            .clone()
    }

    pub fn link_special(&self, id: CallSiteId) -> Arc<SpecialCallSite> {
        self.special_sites
            .entry(id)
            .or_insert_with(|| Arc::new(SpecialCallSite::new(&self.config)))
            .value()
            .clone()
    }

    pub fn link_dynamic(&self, id: CallSiteId) -> Arc<DynamicCallSite> {
        self.dynamic_sites
            .entry(id)
            .or_insert_with(|| Arc::new(DynamicCallSite::new(&self.config)))
            .value()
            .clone()
    }

    /// Total linked sites of every kind.
    pub fn site_count(&self) -> usize {
        self.virtual_sites.len() + self.special_sites.len() + self.dynamic_sites.len()
    }

    /// Drop every site belonging to `code_unit`. Returns how many were
    /// removed. Handles already held by callers keep working.
    pub fn unlink_code_unit(&self, code_unit: u32) -> usize {
        let before = self.site_count();
        self.virtual_sites.retain(|id, _| id.code_unit != code_unit);
        self.special_sites.retain(|id, _| id.code_unit != code_unit);
        self.dynamic_sites.retain(|id, _| id.code_unit != code_unit);
        before.saturating_sub(self.site_count())
    }

    /// Count linked sites per state.
    pub fn classification_breakdown(&self) -> SiteStats {
        let mut stats = SiteStats::default();
        for site in self.virtual_sites.iter() {
            stats.record(site.value().state());
        }
        for site in self.special_sites.iter() {
            stats.record(site.value().state());
        }
        for site in self.dynamic_sites.iter() {
            stats.record(site.value().state());
        }
        stats
    }
}

impl Default for CallSiteTable {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

/// Number of linked call sites in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStats {
    pub uninitialized: usize,
    pub leaf_direct: usize,
    pub monomorphic: usize,
    pub polymorphic: usize,
    pub megamorphic: usize,
}

impl SiteStats {
    fn record(&mut self, state: CallSiteState) {
        match state {
            CallSiteState::Uninitialized => self.uninitialized += 1,
            CallSiteState::LeafDirect => self.leaf_direct += 1,
            CallSiteState::Monomorphic => self.monomorphic += 1,
            CallSiteState::Polymorphic => self.polymorphic += 1,
            CallSiteState::Megamorphic => self.megamorphic += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.uninitialized + self.leaf_direct + self.monomorphic + self.polymorphic + self.megamorphic
    }
}
