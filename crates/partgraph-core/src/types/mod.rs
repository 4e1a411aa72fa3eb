//! # Core Type Definitions
//!
//! This module contains the identifiers and the error type shared by every
//! pass of the design engine:
//! - Graph identifiers (`NodeId`, `NodeKind`)
//! - Merge conflicts (`MergeConflict`)
//! - Error types (`PartError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer identifiers only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Unique identifier for a node in the design graph.
///
/// Assigned monotonically at construction, so ordering by `NodeId` is
/// creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a node is a module (a component that may be picked) or an
/// interface (a connectable port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Module,
    Interface,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => f.write_str("module"),
            Self::Interface => f.write_str("interface"),
        }
    }
}

// =============================================================================
// MERGE CONFLICT
// =============================================================================

/// Two parameter constraints that have no common refinement.
///
/// Both sides are kept in their textual parameter form so the message
/// renders exactly what the designer wrote.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{left} is incompatible with {right}")]
pub struct MergeConflict {
    pub left: String,
    pub right: String,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the design engine.
///
/// - No silent failures
/// - Use `Result<T, PartError>` for fallible operations
/// - Every variant names the node path involved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartError {
    /// Two parameter constraints on the same attribute cannot both hold.
    #[error("Conflict at {path}.{attribute}: {left} is incompatible with {right}")]
    Conflict {
        path: String,
        attribute: String,
        left: String,
        right: String,
    },

    /// Two different names were assigned within one derived net.
    #[error("Naming conflict: net containing {members:?} is named both '{first}' and '{second}'")]
    NamingConflict {
        first: String,
        second: String,
        members: Vec<String>,
    },

    /// The same name was assigned to two separate nets.
    #[error("Duplicate net name '{name}' on {first} and {second}")]
    DuplicateNetName {
        name: String,
        first: String,
        second: String,
    },

    /// A required capability is not attached to the node.
    #[error("Unresolved capability {capability} on {path}")]
    UnresolvedCapability { path: String, capability: String },

    /// At least one module had no satisfying candidate.
    #[error("Pick exhausted for {} module(s): {}", .failures.len(), summarize(.failures))]
    PickExhausted { failures: Vec<PickFailure> },

    /// A traversal went deeper than the configured limit.
    #[error("Depth limit {limit} exceeded below {path}")]
    CycleDepthExceeded { path: String, limit: usize },

    /// The requested node is not in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// An interface was required but a module was given.
    #[error("{path} is a {kind}, not an interface")]
    NotAnInterface { path: String, kind: NodeKind },

    /// A module was required but an interface was given.
    #[error("{path} is a {kind}, not a module")]
    NotAModule { path: String, kind: NodeKind },

    /// Two composite interfaces of different types were connected.
    #[error("Cannot connect {left} ({left_type}) to {right} ({right_type})")]
    InterfaceMismatch {
        left: String,
        left_type: String,
        right: String,
        right_type: String,
    },

    /// A child name is already taken on the parent.
    #[error("{parent} already has a child named '{name}'")]
    DuplicateChild { parent: String, name: String },

    /// The node already has a structural parent.
    #[error("{path} is already owned by {owner}")]
    AlreadyOwned { path: String, owner: String },

    /// Adding the child would make the ownership tree cyclic.
    #[error("Adding {child} under {parent} would create an ownership cycle")]
    OwnershipCycle { parent: String, child: String },

    /// Strict mode rejected a second, different payload for a singular capability.
    #[error("Duplicate {capability} on {path}: '{existing}' vs '{incoming}'")]
    DuplicateTrait {
        path: String,
        capability: String,
        existing: String,
        incoming: String,
    },

    /// A range with `lo > hi` or mixed units.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// A value, quantity or parameter failed to parse.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A dotted path did not resolve to a node.
    #[error("Unknown path '{path}' below {root}")]
    UnknownPath { root: String, path: String },

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Why a single module could not be picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickFailure {
    /// Structural path of the module.
    pub path: String,
    /// Module type name.
    pub module_type: String,
    /// One `(part, reason)` per rejected candidate, in evaluation order.
    pub rejected: Vec<(String, String)>,
}

impl fmt::Display for PickFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.module_type)?;
        for (part, reason) in &self.rejected {
            write!(f, "; {part}: {reason}")?;
        }
        Ok(())
    }
}

fn summarize(failures: &[PickFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_order_by_creation() {
        let mut ids = vec![NodeId(3), NodeId(1), NodeId(2)];
        ids.sort();
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn conflict_message_names_path_and_values() {
        let err = PartError::Conflict {
            path: "app.r1".to_string(),
            attribute: "resistance".to_string(),
            left: "5Ω".to_string(),
            right: "10Ω..20Ω".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("app.r1.resistance"));
        assert!(msg.contains("5Ω"));
        assert!(msg.contains("10Ω..20Ω"));
    }

    #[test]
    fn pick_exhausted_lists_rejections() {
        let err = PartError::PickExhausted {
            failures: vec![PickFailure {
                path: "app.c1".to_string(),
                module_type: "Capacitor".to_string(),
                rejected: vec![("C1525".to_string(), "capacitance".to_string())],
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 module(s)"));
        assert!(msg.contains("app.c1 (Capacitor); C1525: capacitance"));
    }
}
