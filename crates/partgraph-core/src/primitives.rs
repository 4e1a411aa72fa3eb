//! # Engine Constants
//!
//! Fixed limits and format markers for the partgraph engine.
//! They are compiled in and immutable at runtime; per-run tuning goes through
//! `ResolveConfig`.

/// Default depth guard for ownership-tree and specialization traversals.
///
/// - Deeper nesting fails with `CycleDepthExceeded`.
/// - Overridable per run through `ResolveConfig::recursion_depth_limit`.
pub const DEFAULT_DEPTH_LIMIT: usize = 64;

/// Magic bytes for the canonical export header.
///
/// - File Header = Magic Bytes ("PGEX") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"PGEX";

/// Current canonical export format version.
///
/// Increment this when making breaking changes to the bundle layout.
pub const FORMAT_VERSION: u8 = 1;

/// Designator prefix for footprinted modules without a `DesignatorPrefix`.
pub const DEFAULT_DESIGNATOR_PREFIX: &str = "U";

/// Display name prefix for unnamed nets in the export bundle.
pub const ANONYMOUS_NET_PREFIX: &str = "N$";

/// Separator of structural paths (`app.led.anode`).
pub const PATH_SEPARATOR: char = '.';

/// Maximum length of a child or parameter name.
///
/// Longer names are rejected at construction.
pub const MAX_NAME_LENGTH: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"PGEX");
    }

    #[test]
    fn default_depth_limit_matches_config_default() {
        assert_eq!(
            crate::ResolveConfig::default().recursion_depth_limit,
            DEFAULT_DEPTH_LIMIT
        );
    }
}
