//! # Trait Registry
//!
//! Typed capability attachment for graph nodes. A node holds at most one
//! `Trait` per `Capability`; lookup is by capability, never by runtime type
//! inspection.
//!
//! Traits carry metadata only. The one trait that influences connectivity,
//! `Bridge`, names two interfaces of its own module and is read by the
//! netlist deriver; it never creates stored edges.

use crate::layout::Layout;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// CAPABILITY
// =============================================================================

/// Capability identifiers, one per `Trait` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    Footprint,
    Part,
    Datasheet,
    DesignatorPrefix,
    Designator,
    Bridge,
    NetName,
    Layout,
}

impl Capability {
    /// Singular capabilities are authoritative: under strict mode a second,
    /// different payload is an error instead of an override.
    #[must_use]
    pub const fn is_singular(self) -> bool {
        matches!(
            self,
            Self::DesignatorPrefix | Self::Designator | Self::NetName | Self::Part | Self::Bridge
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Footprint => "Footprint",
            Self::Part => "Part",
            Self::Datasheet => "Datasheet",
            Self::DesignatorPrefix => "DesignatorPrefix",
            Self::Designator => "Designator",
            Self::Bridge => "Bridge",
            Self::NetName => "NetName",
            Self::Layout => "Layout",
        };
        f.write_str(name)
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Physical footprint with its pin to interface wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub identifier: String,
    /// Pin identifier to leaf interface of the owning module.
    pub pinmap: BTreeMap<String, NodeId>,
}

/// Concrete catalog part bound by the picker or by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartBinding {
    pub partno: String,
    /// Candidate source the part came from.
    pub source: String,
}

/// An attached capability and its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trait {
    Footprint(Footprint),
    Part(PartBinding),
    Datasheet(String),
    DesignatorPrefix(String),
    Designator(String),
    /// Pass-through pair of interfaces owned by the bridge module.
    Bridge { input: NodeId, output: NodeId },
    NetName(String),
    Layout(Layout),
}

impl Trait {
    #[must_use]
    pub const fn capability(&self) -> Capability {
        match self {
            Self::Footprint(_) => Capability::Footprint,
            Self::Part(_) => Capability::Part,
            Self::Datasheet(_) => Capability::Datasheet,
            Self::DesignatorPrefix(_) => Capability::DesignatorPrefix,
            Self::Designator(_) => Capability::Designator,
            Self::Bridge { .. } => Capability::Bridge,
            Self::NetName(_) => Capability::NetName,
            Self::Layout(_) => Capability::Layout,
        }
    }

    /// Short payload rendering for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Footprint(fp) => format!("{} ({} pins)", fp.identifier, fp.pinmap.len()),
            Self::Part(part) => format!("{} from {}", part.partno, part.source),
            Self::Datasheet(s)
            | Self::DesignatorPrefix(s)
            | Self::Designator(s)
            | Self::NetName(s) => s.clone(),
            Self::Bridge { input, output } => format!("{input} -> {output}"),
            Self::Layout(layout) => layout.kind().to_string(),
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Per-node trait set, keyed by capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitRegistry {
    traits: BTreeMap<Capability, Trait>,
}

impl TraitRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `t`, returning the trait it replaced.
    pub fn insert(&mut self, t: Trait) -> Option<Trait> {
        self.traits.insert(t.capability(), t)
    }

    #[must_use]
    pub fn get(&self, capability: Capability) -> Option<&Trait> {
        self.traits.get(&capability)
    }

    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.traits.contains_key(&capability)
    }

    pub fn remove(&mut self, capability: Capability) -> Option<Trait> {
        self.traits.remove(&capability)
    }

    /// The existing trait `incoming` would clash with under strict mode.
    #[must_use]
    pub fn conflicts_with(&self, incoming: &Trait) -> Option<&Trait> {
        let capability = incoming.capability();
        if !capability.is_singular() {
            return None;
        }
        self.traits.get(&capability).filter(|existing| *existing != incoming)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trait> {
        self.traits.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    // -------------------------------------------------------------------------
    // Typed accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn footprint(&self) -> Option<&Footprint> {
        match self.traits.get(&Capability::Footprint) {
            Some(Trait::Footprint(fp)) => Some(fp),
            _ => None,
        }
    }

    #[must_use]
    pub fn part(&self) -> Option<&PartBinding> {
        match self.traits.get(&Capability::Part) {
            Some(Trait::Part(part)) => Some(part),
            _ => None,
        }
    }

    #[must_use]
    pub fn bridge(&self) -> Option<(NodeId, NodeId)> {
        match self.traits.get(&Capability::Bridge) {
            Some(Trait::Bridge { input, output }) => Some((*input, *output)),
            _ => None,
        }
    }

    #[must_use]
    pub fn layout(&self) -> Option<&Layout> {
        match self.traits.get(&Capability::Layout) {
            Some(Trait::Layout(layout)) => Some(layout),
            _ => None,
        }
    }

    /// Payload of a string-valued capability.
    #[must_use]
    pub fn text(&self, capability: Capability) -> Option<&str> {
        match self.traits.get(&capability) {
            Some(
                Trait::Datasheet(s)
                | Trait::DesignatorPrefix(s)
                | Trait::Designator(s)
                | Trait::NetName(s),
            ) => Some(s),
            _ => None,
        }
    }
}
