//! # partgraph CLI Module
//!
//! ## Available Commands
//!
//! - `check` - Build a design and show its nets
//! - `resolve` - Full design run: pick, designate, derive, export
//! - `catalog-import` - Load a catalog file into the redb catalog cache
//! - `hash` - Canonical checksum and BLAKE3 hash of a resolved design

mod commands;

use clap::{Parser, Subcommand};
use partgraph_core::PartError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// partgraph - parametric circuit design resolver
///
/// Builds a circuit graph from a design file, narrows its parameters and
/// binds every module to a catalog part.
#[derive(Parser, Debug)]
#[command(name = "partgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Catalog inputs shared by the commands that pick parts.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// Catalog TOML file; repeat to layer several, highest priority first
    #[arg(short, long)]
    pub catalog: Vec<PathBuf>,

    /// redb catalog cache, consulted after the catalog files
    #[arg(long)]
    pub catalog_db: Option<PathBuf>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a design and show its nets
    Check {
        /// Path to the design file
        #[arg(short, long)]
        design: PathBuf,
    },

    /// Resolve a design against the catalogs and export it
    Resolve {
        /// Path to the design file
        #[arg(short, long)]
        design: PathBuf,

        #[command(flatten)]
        catalogs: CatalogArgs,

        /// Write the export bundle as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the export bundle in canonical binary form
        #[arg(long)]
        canonical: Option<PathBuf>,

        /// Reject conflicting re-attachment of singular traits
        #[arg(long)]
        strict: bool,

        /// Export even when some modules are exhausted
        #[arg(long)]
        allow_partial: bool,
    },

    /// Import a catalog file into the redb catalog cache
    CatalogImport {
        /// Catalog TOML file
        #[arg(short, long)]
        catalog: PathBuf,

        /// redb catalog cache (created if missing)
        #[arg(long)]
        catalog_db: PathBuf,
    },

    /// Compute the canonical checksum and BLAKE3 hash of a resolved design
    Hash {
        /// Path to the design file
        #[arg(short, long)]
        design: PathBuf,

        #[command(flatten)]
        catalogs: CatalogArgs,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), PartError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Check { design } => cmd_check(&design, json_mode),
        Commands::Resolve {
            design,
            catalogs,
            output,
            canonical,
            strict,
            allow_partial,
        } => cmd_resolve(
            &design,
            &catalogs,
            &ResolveOptions {
                output,
                canonical,
                strict,
                allow_partial,
            },
            json_mode,
        ),
        Commands::CatalogImport {
            catalog,
            catalog_db,
        } => cmd_catalog_import(&catalog, &catalog_db, json_mode),
        Commands::Hash { design, catalogs } => cmd_hash(&design, &catalogs, json_mode),
    }
}
