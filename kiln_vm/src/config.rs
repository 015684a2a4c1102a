//! Dispatch configuration.
//!
//! Resolved once at startup; call sites copy the limits they need when they
//! are linked, so nothing here is read on the dispatch path.

/// Hard upper bound for any cache limit.
pub const MAX_CACHE_LIMIT: usize = 64;

/// Default entry limit for virtual call sites.
pub const DEFAULT_VIRTUAL_LIMIT: usize = 8;

/// Default entry limit for special call sites.
pub const DEFAULT_SPECIAL_LIMIT: usize = 4;

/// Default number of distinct seeds a dynamic call site caches.
pub const DEFAULT_DYNAMIC_SEED_LIMIT: usize = 4;

// =============================================================================
// Dispatch Configuration
// =============================================================================

/// Inline cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Entries per virtual call site before going megamorphic.
    pub virtual_limit: usize,
    /// Entries per special call site before going megamorphic.
    pub special_limit: usize,
    /// Seeds per dynamic call site before going megamorphic.
    pub dynamic_seed_limit: usize,
    /// Allow the Leaf-Direct state on virtual call sites.
    pub leaf_direct: bool,
    /// `false` routes every call through uncached dispatch.
    pub inline_caching: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            virtual_limit: DEFAULT_VIRTUAL_LIMIT,
            special_limit: DEFAULT_SPECIAL_LIMIT,
            dynamic_seed_limit: DEFAULT_DYNAMIC_SEED_LIMIT,
            leaf_direct: true,
            inline_caching: true,
        }
    }
}

impl DispatchConfig {
    /// Resolve configuration from `KILN_IC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to the default; limits are clamped to
    /// `1..=MAX_CACHE_LIMIT`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let limit = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .map(|n| n.clamp(1, MAX_CACHE_LIMIT))
                .unwrap_or(default)
        };
        let flag = |key: &str| lookup(key).map(|v| parse_bool(&v));

        Self {
            virtual_limit: limit("KILN_IC_VIRTUAL_LIMIT", defaults.virtual_limit),
            special_limit: limit("KILN_IC_SPECIAL_LIMIT", defaults.special_limit),
            dynamic_seed_limit: limit("KILN_IC_DYNAMIC_LIMIT", defaults.dynamic_seed_limit),
            leaf_direct: flag("KILN_IC_LEAF_DIRECT").unwrap_or(defaults.leaf_direct),
            inline_caching: !flag("KILN_IC_DISABLE").unwrap_or(false),
        }
    }
}

/// Treat `1`, `true`, `yes` and `on` (any case) as true.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
