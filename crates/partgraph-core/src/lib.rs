//! # partgraph-core
//!
//! The deterministic design engine for partgraph.
//!
//! A circuit is a typed, hierarchical graph of modules and interfaces.
//! Design intent is written as parameters that only ever narrow; the engine
//! derives the electrical netlist from the connections and binds abstract
//! modules to concrete catalog parts.
//!
//! ## Passes
//!
//! ```text
//! build graph ─▶ merge parameters ─▶ pick parts ─▶ designators ─▶ nets ─▶ export
//! ```
//!
//! ## Architectural Constraints
//!
//! - Pure Rust, no async, no network
//! - Deterministic: BTreeMap ordering, integer quantities, no floats
//! - Explicit run context (`Session`), no globals
//! - Catalog access only through the `CandidateSource` trait

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod designators;
pub mod export;
pub mod graph;
pub mod layout;
pub mod library;
pub mod netlist;
pub mod parameter;
pub mod picker;
pub mod primitives;
pub mod session;
pub mod shape;
pub mod storage;
pub mod traits;
pub mod types;
pub mod units;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use config::ResolveConfig;
pub use types::{MergeConflict, NodeId, NodeKind, PartError, PickFailure};
pub use units::{Quantity, Unit, Value};

// =============================================================================
// RE-EXPORTS: Graph Model
// =============================================================================

pub use graph::{Graph, Node, NodeFilter};
pub use layout::{Layer, Layout, LayoutLevel, Point};
pub use parameter::{Parameter, Range};
pub use shape::{InterfaceSpec, ModuleSpec, TraitSpec};
pub use traits::{Capability, Footprint, PartBinding, Trait, TraitRegistry};

// =============================================================================
// RE-EXPORTS: Passes
// =============================================================================

pub use designators::assign_designators;
pub use export::{
    CanonicalHeader, ExportBundle, ExportComponent, ExportLayout, ExportNet, NetPin,
    canonical_checksum, export_canonical, import_canonical, verify_canonical,
};
pub use netlist::{Net, Netlist, NetlistDeriver};
pub use picker::{
    Candidate, CandidateRegistry, CandidateSource, PickOutcome, PickReport, PickState, Picker,
};
pub use session::{RunOutput, Session};
pub use storage::CatalogStore;

#[cfg(feature = "crypto-hash")]
pub use export::canonical_crypto_hash;
