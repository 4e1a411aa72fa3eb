//! # partgraph
//!
//! Command-line driver around `partgraph-core`: loads design and catalog
//! files, performs one design run and writes the export bundle.

pub mod catalog;
pub mod cli;
pub mod design;

use partgraph_core::PartError;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE HELPERS
// =============================================================================

/// Canonicalize an input path and require a regular file.
pub fn validate_file_path(path: &Path) -> Result<PathBuf, PartError> {
    let canonical = path.canonicalize().map_err(|e| {
        PartError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(PartError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

/// Require an existing parent directory for an output path.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, PartError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let canonical_parent = parent.canonicalize().map_err(|e| {
        PartError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(PartError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| PartError::IoError("Output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

/// Read a UTF-8 file no larger than `max_size` bytes.
pub fn read_text_file(path: &Path, max_size: u64) -> Result<String, PartError> {
    let validated = validate_file_path(path)?;
    let metadata = std::fs::metadata(&validated)
        .map_err(|e| PartError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > max_size {
        return Err(PartError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    std::fs::read_to_string(&validated)
        .map_err(|e| PartError::IoError(format!("Read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn size_limit_is_enforced() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("big.toml");
        std::fs::write(&path, "x = 1\n".repeat(10)).expect("write");
        assert!(read_text_file(&path, 1024).is_ok());
        assert!(matches!(
            read_text_file(&path, 8),
            Err(PartError::SerializationError(_))
        ));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempdir().expect("temp dir");
        assert!(validate_file_path(dir.path()).is_err());
        assert!(validate_output_path(&dir.path().join("missing").join("out.json")).is_err());
        assert!(validate_output_path(&dir.path().join("out.json")).is_ok());
    }
}
