//! # partgraph
//!
//! Command-line driver for the partgraph design engine.
//!
//! ## Usage
//!
//! ```bash
//! # Inspect a design
//! partgraph check -d design.toml
//!
//! # Resolve against a catalog and write the bundle
//! partgraph resolve -d design.toml -c parts.toml -o bundle.json
//!
//! # Cache a catalog in redb and resolve from it
//! partgraph catalog-import -c parts.toml --catalog-db parts.redb
//! partgraph resolve -d design.toml --catalog-db parts.redb
//! ```

use clap::Parser;
use partgraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // PARTGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("PARTGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "partgraph=info,partgraph_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
