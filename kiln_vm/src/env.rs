//! Collaborators a call site consults while dispatching.

use std::sync::Arc;

use kiln_runtime::{KlassLookup, Redefinition};

use crate::config::DispatchConfig;

/// Read-only handles to the klass registry and redefinition coordinator,
/// plus the active configuration.
#[derive(Clone)]
pub struct DispatchEnv {
    klasses: Arc<dyn KlassLookup>,
    redefinition: Arc<dyn Redefinition>,
    config: DispatchConfig,
}

impl DispatchEnv {
    pub fn new(
        klasses: Arc<dyn KlassLookup>,
        redefinition: Arc<dyn Redefinition>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            klasses,
            redefinition,
            config,
        }
    }

    #[inline]
    pub fn klasses(&self) -> &dyn KlassLookup {
        &*self.klasses
    }

    #[inline]
    pub fn redefinition(&self) -> &dyn Redefinition {
        &*self.redefinition
    }

    #[inline]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

impl std::fmt::Debug for DispatchEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEnv")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
