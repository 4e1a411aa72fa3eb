//! # Netlist Derivation
//!
//! Flattens the connection graph into nets.
//!
//! Vertices are interface nodes. Edges are the explicit connections plus, for
//! every module carrying a `Bridge` trait, the pass-through pair (paired
//! child-wise for composites). Connected components come from a union-find in
//! O(V + E · α). The bridge module is a hop, never a member.
//!
//! Output is stable: members in `NodeId` order, nets ordered by their
//! smallest member. The graph is never mutated.

use crate::graph::Graph;
use crate::traits::Capability;
use crate::{NodeId, PartError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

// =============================================================================
// UNION-FIND
// =============================================================================

/// Disjoint sets over dense indices. The root of a set is always its
/// smallest index.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

// =============================================================================
// NET
// =============================================================================

/// A maximal set of electrically joined interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    /// Assigned through a `NetName` trait on a member.
    pub name: Option<String>,
    /// Interfaces in `NodeId` order. Composite interfaces are included
    /// alongside their leaves.
    pub members: Vec<NodeId>,
    /// Bridge modules whose pass-through pair lands in this net.
    pub bridges: Vec<NodeId>,
}

impl Net {
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.members.binary_search(&node).is_ok()
    }
}

/// Derived nets in stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netlist {
    pub nets: Vec<Net>,
}

impl Netlist {
    #[must_use]
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Net> {
        self.nets.iter()
    }

    /// The net containing `node`.
    #[must_use]
    pub fn net_of(&self, node: NodeId) -> Option<&Net> {
        self.nets.iter().find(|net| net.contains(node))
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Net> {
        self.nets.iter().find(|net| net.name.as_deref() == Some(name))
    }
}

// =============================================================================
// DERIVER
// =============================================================================

/// Pure pass from a graph to its netlist.
pub struct NetlistDeriver;

impl NetlistDeriver {
    /// Compute the nets of `graph`.
    ///
    /// Only components containing a leaf interface become nets. Two different
    /// names in one net fail with `NamingConflict`; one name on two nets
    /// fails with `DuplicateNetName`.
    pub fn derive(graph: &Graph) -> Result<Netlist, PartError> {
        let interfaces: Vec<NodeId> = graph
            .nodes()
            .filter(|n| n.is_interface())
            .map(|n| n.id())
            .collect();
        let index: BTreeMap<NodeId, usize> = interfaces
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut sets = DisjointSets::new(interfaces.len());
        for (a, b) in graph.edges() {
            if let (Some(&ia), Some(&ib)) = (index.get(&a), index.get(&b)) {
                sets.union(ia, ib);
            }
        }

        let mut bridge_touch: Vec<(NodeId, NodeId)> = Vec::new();
        for module in graph.nodes().filter(|n| n.is_module()) {
            let Some((input, output)) = module.traits().bridge() else {
                continue;
            };
            for (x, y) in graph.interface_pairs(input, output)? {
                if let (Some(&ix), Some(&iy)) = (index.get(&x), index.get(&y)) {
                    sets.union(ix, iy);
                }
                bridge_touch.push((x, module.id()));
            }
        }

        let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for (i, id) in interfaces.iter().enumerate() {
            let root = sets.find(i);
            groups.entry(root).or_default().push(*id);
        }

        let mut bridges_by_root: BTreeMap<usize, BTreeSet<NodeId>> = BTreeMap::new();
        for (iface, module) in bridge_touch {
            if let Some(&i) = index.get(&iface) {
                let root = sets.find(i);
                bridges_by_root.entry(root).or_default().insert(module);
            }
        }

        let mut nets = Vec::new();
        let mut names_seen: BTreeMap<String, String> = BTreeMap::new();
        for (root, members) in groups {
            if !members.iter().any(|m| graph.is_leaf_interface(*m)) {
                continue;
            }
            let name = net_name(graph, &members)?;
            if let Some(name) = &name {
                let here = graph.path(members[0]);
                if let Some(first) = names_seen.get(name) {
                    return Err(PartError::DuplicateNetName {
                        name: name.clone(),
                        first: first.clone(),
                        second: here,
                    });
                }
                names_seen.insert(name.clone(), here);
            }
            nets.push(Net {
                name,
                members,
                bridges: bridges_by_root
                    .remove(&root)
                    .map(|b| b.into_iter().collect())
                    .unwrap_or_default(),
            });
        }

        info!(
            interfaces = interfaces.len(),
            nets = nets.len(),
            "netlist derived"
        );
        Ok(Netlist { nets })
    }
}

/// The single name assigned within `members`, if any.
fn net_name(graph: &Graph, members: &[NodeId]) -> Result<Option<String>, PartError> {
    let mut name: Option<&str> = None;
    for member in members {
        let Ok(node) = graph.node(*member) else {
            continue;
        };
        let Some(candidate) = node.traits().text(Capability::NetName) else {
            continue;
        };
        match name {
            None => name = Some(candidate),
            Some(first) if first != candidate => {
                return Err(PartError::NamingConflict {
                    first: first.to_string(),
                    second: candidate.to_string(),
                    members: members.iter().map(|m| graph.path(*m)).collect(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(name.map(str::to_string))
}

// =============================================================================
// TESTS
// =============================================================================
