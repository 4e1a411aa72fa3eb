//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::CatalogArgs;
use crate::catalog::CatalogFile;
use crate::design::DesignFile;
use crate::validate_output_path;
use partgraph_core::{
    CatalogStore, NodeFilter, PartError, PickState, RunOutput, Session, canonical_checksum,
    canonical_crypto_hash, export_canonical,
};
use std::path::{Path, PathBuf};

/// Name of the redb catalog cache as a candidate source.
pub const CATALOG_DB_SOURCE: &str = "catalog-db";

/// Output switches of `resolve`.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub output: Option<PathBuf>,
    pub canonical: Option<PathBuf>,
    pub strict: bool,
    pub allow_partial: bool,
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Build the design and derive its nets without picking anything.
pub fn cmd_check(design_path: &Path, json_mode: bool) -> Result<(), PartError> {
    let design = DesignFile::load(design_path)?;
    let (graph, root) = design.build()?;
    let modules = graph.get_children(root, true, &NodeFilter::Modules)?.len();
    let interfaces = graph.get_children(root, true, &NodeFilter::Interfaces)?.len();
    let session = Session::new(graph, root)?;
    let netlist = session.derive_nets()?;
    let named: Vec<&str> = netlist.iter().filter_map(|n| n.name.as_deref()).collect();

    if json_mode {
        let output = serde_json::json!({
            "design": design.name,
            "modules": modules,
            "interfaces": interfaces,
            "connections": session.graph().edge_count(),
            "nets": netlist.len(),
            "named_nets": named,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Design: {}", design.name);
    println!("==================");
    println!("Modules:     {}", modules);
    println!("Interfaces:  {}", interfaces);
    println!("Connections: {}", session.graph().edge_count());
    println!("Nets:        {}", netlist.len());
    for name in named {
        println!("  {}", name);
    }
    Ok(())
}

// =============================================================================
// RESOLVE COMMAND
// =============================================================================

/// Open a run over `design` with every requested candidate source.
///
/// Catalog files come first, in the order given, then the redb cache.
pub fn open_session(
    design: &DesignFile,
    catalogs: &CatalogArgs,
    strict: bool,
) -> Result<Session, PartError> {
    let mut design = design.clone();
    if strict {
        design.config = design.config.strict();
    }
    let (graph, root) = design.build()?;
    let mut session = Session::new(graph, root)?;

    for path in &catalogs.catalog {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        let registry = CatalogFile::load(path)?.into_registry(&name)?;
        tracing::info!(source = %name, candidates = registry.len(), "catalog loaded");
        session.add_source(Box::new(registry));
    }
    if let Some(db) = &catalogs.catalog_db {
        let store = CatalogStore::open(db)?.with_name(CATALOG_DB_SOURCE);
        session.add_source(Box::new(store));
    }
    Ok(session)
}

/// Load, build and run a design.
pub fn resolve_design(
    design_path: &Path,
    catalogs: &CatalogArgs,
    strict: bool,
) -> Result<(Session, RunOutput), PartError> {
    let design = DesignFile::load(design_path)?;
    let mut session = open_session(&design, catalogs, strict)?;
    let out = session.run()?;
    Ok((session, out))
}

/// Full run; writes the bundle where asked.
pub fn cmd_resolve(
    design_path: &Path,
    catalogs: &CatalogArgs,
    options: &ResolveOptions,
    json_mode: bool,
) -> Result<(), PartError> {
    let (session, out) = resolve_design(design_path, catalogs, options.strict)?;
    if !options.allow_partial {
        out.report.ensure_complete()?;
    }

    if let Some(path) = &options.output {
        let validated = validate_output_path(path)?;
        let data = serde_json::to_vec_pretty(&out.bundle)
            .map_err(|e| PartError::SerializationError(e.to_string()))?;
        std::fs::write(&validated, &data)
            .map_err(|e| PartError::IoError(format!("Write file: {}", e)))?;
        tracing::info!(path = %validated.display(), bytes = data.len(), "bundle written");
    }
    if let Some(path) = &options.canonical {
        let validated = validate_output_path(path)?;
        let data = export_canonical(&out.bundle)?;
        std::fs::write(&validated, &data)
            .map_err(|e| PartError::IoError(format!("Write file: {}", e)))?;
        tracing::info!(path = %validated.display(), bytes = data.len(), "canonical bundle written");
    }

    let checksum = canonical_checksum(&out.bundle)?;
    if json_mode {
        let output = serde_json::json!({
            "design": session.graph().path(session.root()),
            "checksum": checksum,
            "report": out.report,
            "nets": out.bundle.nets.len(),
            "components": out.bundle.components.len(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Resolved {}", session.graph().path(session.root()));
    println!("==================");
    println!(
        "Modules:    {} (bound {}, unresolved {}, exhausted {})",
        out.report.outcomes.len(),
        out.report.count(PickState::PartBound),
        out.report.count(PickState::Unresolved),
        out.report.count(PickState::Exhausted)
    );
    println!("Nets:       {}", out.bundle.nets.len());
    println!("Components: {}", out.bundle.components.len());
    println!("Checksum:   {}", checksum);
    println!();
    for component in &out.bundle.components {
        println!(
            "  {:<6} {:<32} {}",
            component.designator.as_deref().unwrap_or("-"),
            component.path,
            component.part.as_deref().unwrap_or("(hand-specified)")
        );
    }
    for failure in out.report.failures() {
        println!("  !! {}", failure);
    }
    Ok(())
}

// =============================================================================
// CATALOG IMPORT COMMAND
// =============================================================================

/// Append a catalog file to the redb cache.
pub fn cmd_catalog_import(
    catalog_path: &Path,
    db_path: &Path,
    json_mode: bool,
) -> Result<(), PartError> {
    let catalog = CatalogFile::load(catalog_path)?;
    let store = CatalogStore::open(db_path)?;
    let added = store.import(catalog.candidates)?;
    let total = store.candidate_count()?;
    let types = store.type_count()?;

    if json_mode {
        let output = serde_json::json!({
            "catalog_db": db_path.to_string_lossy(),
            "added": added,
            "candidates": total,
            "module_types": types,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Imported {} candidates into {:?}", added, db_path);
    println!("Catalog now has {} candidates for {} module types", total, types);
    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Checksum and BLAKE3 digest of the canonical bundle.
pub fn cmd_hash(
    design_path: &Path,
    catalogs: &CatalogArgs,
    json_mode: bool,
) -> Result<(), PartError> {
    let (_, out) = resolve_design(design_path, catalogs, false)?;
    let checksum = canonical_checksum(&out.bundle)?;
    let hash = canonical_crypto_hash(&out.bundle)?;

    if json_mode {
        let output = serde_json::json!({
            "checksum": checksum,
            "blake3": hash,
            "nets": out.bundle.nets.len(),
            "components": out.bundle.components.len(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Checksum: {}", checksum);
    println!("BLAKE3:   {}", hash);
    Ok(())
}
