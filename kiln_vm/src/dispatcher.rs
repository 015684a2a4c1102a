//! Interpreter-facing dispatch entry points.
//!
//! The interpreter links call sites through the [`Dispatcher`] when it
//! prepares a code unit and then hands the site back on every execution of
//! the instruction.

use std::sync::Arc;

use kiln_runtime::{Method, Value};

use crate::call_site_table::{CallSiteId, CallSiteTable, SiteStats};
use crate::env::DispatchEnv;
use crate::error::DispatchResult;
use crate::invoke_dynamic::DynamicCallSite;
use crate::invoke_special::SpecialCallSite;
use crate::invoke_virtual::VirtualCallSite;
use crate::uncached;

/// Dispatch environment plus the call sites linked against it.
#[derive(Debug)]
pub struct Dispatcher {
    env: DispatchEnv,
    sites: CallSiteTable,
}

impl Dispatcher {
    pub fn new(env: DispatchEnv) -> Self {
        let sites = CallSiteTable::new(env.config().clone());
        Self { env, sites }
    }

    #[inline]
    pub fn env(&self) -> &DispatchEnv {
        &self.env
    }

    #[inline]
    pub fn sites(&self) -> &CallSiteTable {
        &self.sites
    }

    pub fn link_virtual(&self, id: CallSiteId, seed: &Arc<Method>) -> Arc<VirtualCallSite> {
        self.sites.link_virtual(id, seed)
    }

    pub fn link_special(&self, id: CallSiteId) -> Arc<SpecialCallSite> {
        self.sites.link_special(id)
    }

    pub fn link_dynamic(&self, id: CallSiteId) -> Arc<DynamicCallSite> {
        self.sites.link_dynamic(id)
    }

    /// `invokespecial`: constructor, private or super call.
    #[inline]
    pub fn dispatch_special(
        &self,
        site: &SpecialCallSite,
        method: &Method,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        if !self.env.config().inline_caching {
            return uncached::invoke_special(&self.env, method, receiver, args);
        }
        site.execute(&self.env, method, receiver, args)
    }

    /// `invokevirtual` with the seed fixed at link time.
    #[inline]
    pub fn dispatch_virtual(
        &self,
        site: &VirtualCallSite,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        if !self.env.config().inline_caching {
            return uncached::invoke_virtual(&self.env, site.seed(), receiver, args);
        }
        site.execute(&self.env, receiver, args)
    }

    /// Virtual dispatch with a seed computed at run time.
    #[inline]
    pub fn dispatch_virtual_dynamic(
        &self,
        site: &DynamicCallSite,
        seed: &Arc<Method>,
        receiver: &Value,
        args: &[Value],
    ) -> DispatchResult<Value> {
        if !self.env.config().inline_caching {
            return uncached::invoke_virtual(&self.env, seed, receiver, args);
        }
        site.execute(&self.env, seed, receiver, args)
    }

    /// See [`CallSiteTable::classification_breakdown`].
    pub fn classification_breakdown(&self) -> SiteStats {
        self.sites.classification_breakdown()
    }
}
