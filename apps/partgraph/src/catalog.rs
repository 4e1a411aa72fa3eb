//! # Catalog Files
//!
//! TOML part catalogs:
//!
//! ```toml
//! [[candidate]]
//! module_type = "Resistor"
//! part = "C25076"
//! footprint = "R0402"
//! [candidate.params]
//! resistance = "100Ω"
//! [candidate.pinmap]
//! "1" = "unnamed[0]"
//! "2" = "unnamed[1]"
//! ```
//!
//! File order is priority order within a module type.

use partgraph_core::{Candidate, CandidateRegistry, PartError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum catalog file size (256 MB).
pub const MAX_CATALOG_FILE_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default, rename = "candidate")]
    pub candidates: Vec<Candidate>,
}

impl CatalogFile {
    pub fn from_toml_str(text: &str) -> Result<Self, PartError> {
        toml::from_str(text).map_err(|e| PartError::SerializationError(format!("catalog: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, PartError> {
        let text = crate::read_text_file(path, MAX_CATALOG_FILE_SIZE)?;
        Self::from_toml_str(&text)
    }

    /// An in-memory source named `name`. Every candidate is validated.
    pub fn into_registry(self, name: &str) -> Result<CandidateRegistry, PartError> {
        let mut registry = CandidateRegistry::new(name);
        registry.extend(self.candidates)?;
        Ok(registry)
    }
}
