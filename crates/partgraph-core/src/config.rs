//! # Resolution Configuration
//!
//! Knobs recognized by a design run. Deserializable from the `[config]`
//! table of a design file; missing keys take their defaults.

use crate::primitives::DEFAULT_DEPTH_LIMIT;
use serde::{Deserialize, Serialize};

/// Configuration for one design run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Reject a second, different payload for a singular capability
    /// instead of overriding it.
    pub strict_trait_override: bool,
    /// Widen every `Unset` parameter to `Any` before picking.
    pub default_fill_unset: bool,
    /// Depth guard for every tree traversal.
    pub recursion_depth_limit: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            strict_trait_override: false,
            default_fill_unset: true,
            recursion_depth_limit: DEFAULT_DEPTH_LIMIT,
        }
    }
}

impl ResolveConfig {
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict_trait_override = true;
        self
    }

    #[must_use]
    pub fn with_depth_limit(mut self, limit: usize) -> Self {
        self.recursion_depth_limit = limit;
        self
    }
}
