//! # Graph Engine
//!
//! The deterministic design graph for partgraph.
//!
//! Two relations overlay the same node arena:
//! - **Ownership**: name -> child, tree-shaped, every node has at most one
//!   structural parent. Enforced acyclic at `add_child`.
//! - **Connections**: undirected interface-to-interface edges. Arbitrary
//!   graph, cycles and diamonds allowed.
//!
//! All data structures use `BTreeMap`/`BTreeSet` for deterministic ordering.
//! Every tree walk is an explicit stack bounded by
//! `ResolveConfig::recursion_depth_limit`.

use crate::config::ResolveConfig;
use crate::parameter::Parameter;
use crate::primitives::{MAX_NAME_LENGTH, PATH_SEPARATOR};
use crate::traits::{Capability, Footprint, Trait, TraitRegistry};
use crate::{NodeId, NodeKind, PartError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Child name given to a specialization adopted by its general module.
pub const SPECIALIZED_CHILD: &str = "specialized";

// =============================================================================
// NODE
// =============================================================================

/// A module or interface in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    type_name: String,
    name: String,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    parameters: BTreeMap<String, Parameter>,
    traits: TraitRegistry,
    specialized: Option<NodeId>,
}

impl Node {
    fn new(id: NodeId, kind: NodeKind, type_name: &str) -> Self {
        Self {
            id,
            kind,
            type_name: type_name.to_string(),
            name: type_name.to_string(),
            parent: None,
            children: BTreeMap::new(),
            parameters: BTreeMap::new(),
            traits: TraitRegistry::new(),
            specialized: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Local name under the parent, or the root name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children ordered by name.
    #[must_use]
    pub fn children(&self) -> &BTreeMap<String, NodeId> {
        &self.children
    }

    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    #[must_use]
    pub fn traits(&self) -> &TraitRegistry {
        &self.traits
    }

    #[must_use]
    pub fn is_module(&self) -> bool {
        self.kind == NodeKind::Module
    }

    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == NodeKind::Interface
    }
}

/// Selection for `get_children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeFilter {
    Any,
    Modules,
    Interfaces,
    /// Nodes whose type name equals the given one.
    OfType(String),
}

impl NodeFilter {
    fn accepts(&self, node: &Node) -> bool {
        match self {
            Self::Any => true,
            Self::Modules => node.is_module(),
            Self::Interfaces => node.is_interface(),
            Self::OfType(type_name) => node.type_name == *type_name,
        }
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The design graph.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: NodeId -> Node
    nodes: BTreeMap<NodeId, Node>,

    /// Undirected adjacency, stored in both directions.
    connections: BTreeMap<NodeId, BTreeSet<NodeId>>,

    /// Next available NodeId
    next_node_id: u64,

    config: ResolveConfig,
}

impl Graph {
    /// Create a new empty graph with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with the given configuration.
    #[must_use]
    pub fn with_config(config: ResolveConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ResolveConfig) {
        self.config = config;
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    fn insert(&mut self, kind: NodeKind, type_name: &str) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);
        self.nodes.insert(id, Node::new(id, kind, type_name));
        id
    }

    /// Create a parentless module. Its root name is its type name until
    /// renamed or adopted.
    pub fn new_module(&mut self, type_name: &str) -> NodeId {
        self.insert(NodeKind::Module, type_name)
    }

    /// Create a parentless interface.
    pub fn new_interface(&mut self, type_name: &str) -> NodeId {
        self.insert(NodeKind::Interface, type_name)
    }

    /// Rename a parentless node.
    pub fn set_root_name(&mut self, node: NodeId, name: &str) -> Result<(), PartError> {
        validate_name(name)?;
        let owner = self.node(node)?.parent;
        if let Some(owner) = owner {
            return Err(PartError::AlreadyOwned {
                path: self.path(node),
                owner: self.path(owner),
            });
        }
        self.node_mut(node)?.name = name.to_string();
        Ok(())
    }

    /// Give `child` to `parent` under `name`.
    ///
    /// Interfaces may only own interfaces. The child must be parentless and
    /// must not be an ancestor of `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: &str,
        child: NodeId,
    ) -> Result<(), PartError> {
        validate_name(name)?;
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;

        if parent_node.is_interface() && child_node.is_module() {
            return Err(PartError::NotAnInterface {
                path: self.path(child),
                kind: child_node.kind,
            });
        }
        if parent_node.children.contains_key(name) {
            return Err(PartError::DuplicateChild {
                parent: self.path(parent),
                name: name.to_string(),
            });
        }
        if let Some(owner) = child_node.parent {
            return Err(PartError::AlreadyOwned {
                path: self.path(child),
                owner: self.path(owner),
            });
        }
        if self.is_ancestor(child, parent) {
            return Err(PartError::OwnershipCycle {
                parent: self.path(parent),
                child: self.path(child),
            });
        }

        self.node_mut(parent)?.children.insert(name.to_string(), child);
        let child_node = self.node_mut(child)?;
        child_node.parent = Some(parent);
        child_node.name = name.to_string();
        Ok(())
    }

    /// Create an interface of `type_name` and add it under `parent`.
    pub fn add_interface(
        &mut self,
        parent: NodeId,
        name: &str,
        type_name: &str,
    ) -> Result<NodeId, PartError> {
        self.node(parent)?;
        let id = self.new_interface(type_name);
        if let Err(err) = self.add_child(parent, name, id) {
            self.discard(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Drop a parentless node, everything it owns and their edges.
    ///
    /// Used to undo a construction step that failed halfway. Owned nodes
    /// are left alone.
    pub(crate) fn discard(&mut self, root: NodeId) {
        if self.nodes.get(&root).is_none_or(|n| n.parent.is_some()) {
            return;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            stack.extend(node.children.values().copied());
            if let Some(peers) = self.connections.remove(&id) {
                for peer in peers {
                    if let Some(back) = self.connections.get_mut(&peer) {
                        back.remove(&id);
                        if back.is_empty() {
                            self.connections.remove(&peer);
                        }
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Connections
    // -------------------------------------------------------------------------

    /// Connect two interfaces with a symmetric edge.
    ///
    /// Composite interfaces of the same type also connect their same-named
    /// interface children, recursively. Self-connection is a no-op.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<(), PartError> {
        self.require_interface(a)?;
        self.require_interface(b)?;
        if a == b {
            return Ok(());
        }

        let pairs = self.interface_pairs(a, b)?;
        for (x, y) in &pairs {
            if x != y {
                self.connections.entry(*x).or_default().insert(*y);
                self.connections.entry(*y).or_default().insert(*x);
            }
        }
        debug!(a = %self.path(a), b = %self.path(b), edges = pairs.len(), "connect");
        Ok(())
    }

    /// Connect `a` to the bridge's input and the bridge's output to `b`.
    pub fn connect_via(&mut self, a: NodeId, bridge: NodeId, b: NodeId) -> Result<(), PartError> {
        self.require_module(bridge)?;
        let (input, output) = self
            .node(bridge)?
            .traits
            .bridge()
            .ok_or_else(|| PartError::UnresolvedCapability {
                path: self.path(bridge),
                capability: Capability::Bridge.to_string(),
            })?;
        self.require_interface(a)?;
        self.require_interface(b)?;
        // Check both legs before committing either.
        self.interface_pairs(a, input)?;
        self.interface_pairs(output, b)?;
        self.connect(a, input)?;
        self.connect(output, b)
    }

    /// Matching interface pairs below `a` and `b`, starting with `(a, b)`.
    ///
    /// Pairs same-named interface children of same-typed composites. A
    /// composite facing a different type is an `InterfaceMismatch`.
    pub(crate) fn interface_pairs(
        &self,
        a: NodeId,
        b: NodeId,
    ) -> Result<Vec<(NodeId, NodeId)>, PartError> {
        let limit = self.config.recursion_depth_limit;
        let mut pairs = Vec::new();
        let mut stack = vec![(a, b, 0usize)];

        while let Some((x, y, depth)) = stack.pop() {
            if depth > limit {
                return Err(PartError::CycleDepthExceeded {
                    path: self.path(a),
                    limit,
                });
            }
            let xn = self.node(x)?;
            let yn = self.node(y)?;
            pairs.push((x, y));

            let x_children = self.interface_children(xn);
            let y_children = self.interface_children(yn);
            if x_children.is_empty() && y_children.is_empty() {
                continue;
            }
            if xn.type_name != yn.type_name {
                return Err(PartError::InterfaceMismatch {
                    left: self.path(x),
                    left_type: xn.type_name.clone(),
                    right: self.path(y),
                    right_type: yn.type_name.clone(),
                });
            }
            // Reverse so pairs come out in name order.
            for (name, xc) in x_children.iter().rev() {
                if let Some(yc) = y_children.get(name) {
                    stack.push((*xc, *yc, depth.saturating_add(1)));
                }
            }
        }
        Ok(pairs)
    }

    fn interface_children<'a>(&self, node: &'a Node) -> BTreeMap<&'a str, NodeId> {
        node.children
            .iter()
            .filter(|(_, id)| self.nodes.get(id).is_some_and(Node::is_interface))
            .map(|(name, id)| (name.as_str(), *id))
            .collect()
    }

    /// Whether a direct edge joins `a` and `b`.
    #[must_use]
    pub fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.connections.get(&a).is_some_and(|peers| peers.contains(&b))
    }

    /// Direct connection peers of `node`, in id order.
    pub fn connections(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.connections.get(&node).into_iter().flatten().copied()
    }

    /// Every edge once, as `(lower, higher)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.connections
            .iter()
            .flat_map(|(a, peers)| peers.iter().filter(move |b| *b > a).map(move |b| (*a, *b)))
    }

    // -------------------------------------------------------------------------
    // Parameters
    // -------------------------------------------------------------------------

    /// Merge `p` into the named parameter and return the result.
    ///
    /// On conflict the stored parameter is left untouched.
    pub fn set_parameter(
        &mut self,
        node: NodeId,
        name: &str,
        p: Parameter,
    ) -> Result<Parameter, PartError> {
        validate_name(name)?;
        let current = self.node(node)?.parameters.get(name).cloned().unwrap_or_default();
        let merged = current.merge(&p).map_err(|conflict| PartError::Conflict {
            path: self.path(node),
            attribute: name.to_string(),
            left: conflict.left,
            right: conflict.right,
        })?;
        trace!(node = %self.path(node), name, value = %merged, "set_parameter");
        self.node_mut(node)?
            .parameters
            .insert(name.to_string(), merged.clone());
        Ok(merged)
    }

    /// Put back parameters and traits captured before a failed update.
    pub(crate) fn restore(
        &mut self,
        node: NodeId,
        parameters: BTreeMap<String, Parameter>,
        traits: TraitRegistry,
    ) -> Result<(), PartError> {
        let n = self.node_mut(node)?;
        n.parameters = parameters;
        n.traits = traits;
        Ok(())
    }

    #[must_use]
    pub fn parameter(&self, node: NodeId, name: &str) -> Option<&Parameter> {
        self.nodes.get(&node)?.parameters.get(name)
    }

    /// Tightest known form of a parameter; `Unset` when never stated.
    #[must_use]
    pub fn most_narrow(&self, node: NodeId, name: &str) -> Parameter {
        self.parameter(node, name)
            .map(Parameter::most_narrow)
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Traits
    // -------------------------------------------------------------------------

    /// Attach a trait, returning the one it replaced.
    ///
    /// Node references inside the payload must be interfaces owned by
    /// `node`. Under `strict_trait_override`, a singular capability that is
    /// already attached with a different payload fails with `DuplicateTrait`.
    pub fn add_trait(&mut self, node: NodeId, t: Trait) -> Result<Option<Trait>, PartError> {
        self.validate_trait(node, &t)?;
        let registry = &self.node(node)?.traits;
        if self.config.strict_trait_override {
            if let Some(existing) = registry.conflicts_with(&t) {
                return Err(PartError::DuplicateTrait {
                    path: self.path(node),
                    capability: t.capability().to_string(),
                    existing: existing.describe(),
                    incoming: t.describe(),
                });
            }
        }
        debug!(node = %self.path(node), capability = %t.capability(), "add_trait");
        Ok(self.node_mut(node)?.traits.insert(t))
    }

    fn validate_trait(&self, node: NodeId, t: &Trait) -> Result<(), PartError> {
        match t {
            Trait::Bridge { input, output } => {
                self.require_module(node)?;
                self.require_owned_interface(node, *input)?;
                self.require_owned_interface(node, *output)
            }
            Trait::Footprint(Footprint { pinmap, .. }) => {
                self.require_module(node)?;
                pinmap
                    .values()
                    .try_for_each(|iface| self.require_owned_interface(node, *iface))
            }
            Trait::NetName(_) => self.require_interface(node),
            _ => self.node(node).map(|_| ()),
        }
    }

    fn require_owned_interface(&self, owner: NodeId, iface: NodeId) -> Result<(), PartError> {
        self.require_interface(iface)?;
        if self.is_ancestor(owner, iface) {
            Ok(())
        } else {
            Err(PartError::UnknownPath {
                root: self.path(owner),
                path: self.path(iface),
            })
        }
    }

    pub fn remove_trait(
        &mut self,
        node: NodeId,
        capability: Capability,
    ) -> Result<Option<Trait>, PartError> {
        Ok(self.node_mut(node)?.traits.remove(capability))
    }

    /// The trait for `capability`, or `UnresolvedCapability`.
    pub fn get_trait(&self, node: NodeId, capability: Capability) -> Result<&Trait, PartError> {
        self.node(node)?
            .traits
            .get(capability)
            .ok_or_else(|| PartError::UnresolvedCapability {
                path: self.path(node),
                capability: capability.to_string(),
            })
    }

    #[must_use]
    pub fn has_trait(&self, node: NodeId, capability: Capability) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.traits.contains(capability))
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// Children of `node` that pass `filter`.
    ///
    /// Ordered by name; recursive walks are depth-first pre-order. Filtered
    /// out nodes are still descended into.
    pub fn get_children(
        &self,
        node: NodeId,
        recursive: bool,
        filter: &NodeFilter,
    ) -> Result<Vec<NodeId>, PartError> {
        let limit = self.config.recursion_depth_limit;
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = self
            .node(node)?
            .children
            .values()
            .rev()
            .map(|id| (*id, 1))
            .collect();

        while let Some((current, depth)) = stack.pop() {
            if depth > limit {
                return Err(PartError::CycleDepthExceeded {
                    path: self.path(node),
                    limit,
                });
            }
            let current_node = self.node(current)?;
            if filter.accepts(current_node) {
                out.push(current);
            }
            if recursive {
                stack.extend(
                    current_node
                        .children
                        .values()
                        .rev()
                        .map(|id| (*id, depth.saturating_add(1))),
                );
            }
        }
        Ok(out)
    }

    /// Replace `general` by the more derived module `special`.
    ///
    /// `special` must expose every interface `general` has, with the same
    /// types; those pairs are connected. Every parameter of the current most
    /// special module is merged into `special`, so constraints stated on the
    /// general form still bind the part picked for it. A parentless `special`
    /// is adopted under the current most special module as `specialized`.
    pub fn specialize(&mut self, general: NodeId, special: NodeId) -> Result<(), PartError> {
        self.require_module(general)?;
        self.require_module(special)?;
        let tip = self.get_most_special(general)?;
        if tip == special || self.is_ancestor(special, general) {
            return Err(PartError::OwnershipCycle {
                parent: self.path(general),
                child: self.path(special),
            });
        }

        let tip_node = self.node(tip)?;
        let special_node = self.node(special)?;
        let mut pairs = Vec::new();
        for (name, iface) in self.interface_children(tip_node) {
            let counterpart = special_node
                .children
                .get(name)
                .copied()
                .filter(|id| self.nodes.get(id).is_some_and(Node::is_interface))
                .ok_or_else(|| PartError::UnknownPath {
                    root: self.path(special),
                    path: name.to_string(),
                })?;
            let (left_type, right_type) =
                (&self.node(iface)?.type_name, &self.node(counterpart)?.type_name);
            if left_type != right_type {
                return Err(PartError::InterfaceMismatch {
                    left: self.path(iface),
                    left_type: left_type.clone(),
                    right: self.path(counterpart),
                    right_type: right_type.clone(),
                });
            }
            pairs.push((iface, counterpart));
        }

        let mut narrowed = Vec::new();
        for (name, p) in &self.node(tip)?.parameters {
            let current = special_node.parameters.get(name).cloned().unwrap_or_default();
            let merged = current.merge(p).map_err(|conflict| PartError::Conflict {
                path: self.path(special),
                attribute: name.clone(),
                left: conflict.left,
                right: conflict.right,
            })?;
            narrowed.push((name.clone(), merged));
        }

        if special_node.parent.is_none() {
            self.add_child(tip, SPECIALIZED_CHILD, special)?;
        }
        let params = &mut self.node_mut(special)?.parameters;
        for (name, p) in narrowed {
            params.insert(name, p);
        }
        for (a, b) in pairs {
            self.connect(a, b)?;
        }
        self.node_mut(tip)?.specialized = Some(special);
        debug!(general = %self.path(general), special = %self.path(special), "specialize");
        Ok(())
    }

    /// Follow specialization links to the most derived module.
    pub fn get_most_special(&self, node: NodeId) -> Result<NodeId, PartError> {
        let limit = self.config.recursion_depth_limit;
        let mut current = node;
        let mut steps = 0usize;
        while let Some(next) = self.node(current)?.specialized {
            steps = steps.saturating_add(1);
            if steps > limit {
                return Err(PartError::CycleDepthExceeded {
                    path: self.path(node),
                    limit,
                });
            }
            current = next;
        }
        Ok(current)
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Result<&Node, PartError> {
        self.nodes.get(&id).ok_or(PartError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, PartError> {
        self.nodes.get_mut(&id).ok_or(PartError::NodeNotFound(id))
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node)?.parent
    }

    /// Dotted structural path from the root, e.g. `app.led.anode`.
    #[must_use]
    pub fn path(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(node);
        // Ownership is acyclic, so the walk ends within node_count steps.
        while let Some(id) = current {
            let Some(n) = self.nodes.get(&id) else {
                segments.push(id.to_string());
                break;
            };
            segments.push(n.name.clone());
            if segments.len() > self.nodes.len() {
                break;
            }
            current = n.parent;
        }
        segments.reverse();
        segments.join(&PATH_SEPARATOR.to_string())
    }

    /// Look up a node by path relative to `root`. The empty path is `root`.
    pub fn resolve_path(&self, root: NodeId, path: &str) -> Result<NodeId, PartError> {
        let mut current = root;
        self.node(root)?;
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            current = self
                .node(current)?
                .children
                .get(segment)
                .copied()
                .ok_or_else(|| PartError::UnknownPath {
                    root: self.path(root),
                    path: path.to_string(),
                })?;
        }
        Ok(current)
    }

    /// Whether `ancestor` is `node` or owns it transitively.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        let mut steps = 0usize;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps = steps.saturating_add(1);
            if steps > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Closest module owning `node` (the node itself when it is a module).
    #[must_use]
    pub fn owning_module(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        let mut steps = 0usize;
        while let Some(id) = current {
            let n = self.nodes.get(&id)?;
            if n.is_module() {
                return Some(id);
            }
            steps = steps.saturating_add(1);
            if steps > self.nodes.len() {
                return None;
            }
            current = n.parent;
        }
        None
    }

    /// An interface without interface children: an electrical connection point.
    #[must_use]
    pub fn is_leaf_interface(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.is_interface() && self.interface_children(n).is_empty())
    }

    fn require_interface(&self, id: NodeId) -> Result<(), PartError> {
        let node = self.node(id)?;
        if node.is_interface() {
            Ok(())
        } else {
            Err(PartError::NotAnInterface {
                path: self.path(id),
                kind: node.kind,
            })
        }
    }

    fn require_module(&self, id: NodeId) -> Result<(), PartError> {
        let node = self.node(id)?;
        if node.is_module() {
            Ok(())
        } else {
            Err(PartError::NotAModule {
                path: self.path(id),
                kind: node.kind,
            })
        }
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), PartError> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH || name.contains(PATH_SEPARATOR) {
        return Err(PartError::InvalidValue(format!("invalid name '{name}'")));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
