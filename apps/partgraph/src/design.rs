//! # Design Files
//!
//! TOML description of a top-level design: library modules, extra
//! interfaces, connections, bridged connections and net names.
//!
//! ```toml
//! name = "app"
//!
//! [config]
//! strict_trait_override = false
//!
//! [[module]]
//! name = "shifter"
//! type = "SN74LXC1T45"
//! [module.params]
//! "power[0].voltage" = "3.3V"
//!
//! [[connect]]
//! a = "swd.unnamed[1]"
//! b = "shifter.io[0]"
//!
//! [nets]
//! SWDIO = "swd.unnamed[1]"
//! ```
//!
//! Paths are relative to the design root. A parameter key names an
//! attribute of the module itself (`resistance`) or of a node below it
//! (`power[0].voltage`).

use partgraph_core::{
    Graph, Layout, NodeId, Parameter, PartError, ResolveConfig, Trait, library,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Maximum design file size (16 MB).
pub const MAX_DESIGN_FILE_SIZE: u64 = 16 * 1024 * 1024;

fn default_root_name() -> String {
    "app".to_string()
}

/// A library module placed under the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub module_type: String,
    /// Contact count for sized shapes such as `Header`.
    #[serde(default)]
    pub pins: Option<usize>,
    #[serde(default)]
    pub params: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub designator_prefix: Option<String>,
    #[serde(default)]
    pub designator: Option<String>,
    #[serde(default)]
    pub datasheet: Option<String>,
    #[serde(default)]
    pub layout: Option<Layout>,
}

/// An interface owned directly by the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub interface_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectEntry {
    pub a: String,
    pub b: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectViaEntry {
    pub a: String,
    pub bridge: String,
    pub b: String,
}

/// A whole design file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignFile {
    #[serde(default = "default_root_name")]
    pub name: String,
    #[serde(default)]
    pub config: ResolveConfig,
    #[serde(default, rename = "interface")]
    pub interfaces: Vec<InterfaceEntry>,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleEntry>,
    #[serde(default, rename = "connect")]
    pub connections: Vec<ConnectEntry>,
    #[serde(default, rename = "connect_via")]
    pub bridged: Vec<ConnectViaEntry>,
    /// Net name -> interface path.
    #[serde(default)]
    pub nets: BTreeMap<String, String>,
}

impl DesignFile {
    pub fn from_toml_str(text: &str) -> Result<Self, PartError> {
        toml::from_str(text).map_err(|e| PartError::SerializationError(format!("design: {e}")))
    }

    /// Read and parse a design file.
    pub fn load(path: &Path) -> Result<Self, PartError> {
        let text = crate::read_text_file(path, MAX_DESIGN_FILE_SIZE)?;
        Self::from_toml_str(&text)
    }

    /// Build the component graph. Returns the graph and its root module.
    pub fn build(&self) -> Result<(Graph, NodeId), PartError> {
        let mut graph = Graph::with_config(self.config);
        let root = graph.new_module("App");
        graph.set_root_name(root, &self.name)?;

        for entry in &self.interfaces {
            let spec = library::lookup_interface(&entry.interface_type).ok_or_else(|| {
                PartError::InvalidValue(format!(
                    "interface '{}': unknown type '{}'",
                    entry.name, entry.interface_type
                ))
            })?;
            let iface = graph.instantiate_interface(&spec)?;
            graph.add_child(root, &entry.name, iface)?;
            apply_params(&mut graph, iface, &entry.params)?;
        }

        for entry in &self.modules {
            let spec = library::lookup(&entry.module_type, entry.pins).ok_or_else(|| {
                PartError::InvalidValue(format!(
                    "module '{}': unknown type '{}'",
                    entry.name, entry.module_type
                ))
            })?;
            let module = graph.add_module(root, &entry.name, &spec)?;
            apply_params(&mut graph, module, &entry.params)?;

            if let Some(prefix) = &entry.designator_prefix {
                graph.add_trait(module, Trait::DesignatorPrefix(prefix.clone()))?;
            }
            if let Some(designator) = &entry.designator {
                graph.add_trait(module, Trait::Designator(designator.clone()))?;
            }
            if let Some(url) = &entry.datasheet {
                graph.add_trait(module, Trait::Datasheet(url.clone()))?;
            }
            if let Some(layout) = &entry.layout {
                graph.add_trait(module, Trait::Layout(layout.clone()))?;
            }
        }

        for c in &self.connections {
            let a = graph.resolve_path(root, &c.a)?;
            let b = graph.resolve_path(root, &c.b)?;
            graph.connect(a, b)?;
        }
        for c in &self.bridged {
            let a = graph.resolve_path(root, &c.a)?;
            let bridge = graph.resolve_path(root, &c.bridge)?;
            let b = graph.resolve_path(root, &c.b)?;
            graph.connect_via(a, bridge, b)?;
        }
        for (name, path) in &self.nets {
            let iface = graph.resolve_path(root, path)?;
            graph.add_trait(iface, Trait::NetName(name.clone()))?;
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "design built"
        );
        Ok((graph, root))
    }
}

/// Merge `params` into `node`; a dotted key addresses a node below it.
fn apply_params(
    graph: &mut Graph,
    node: NodeId,
    params: &BTreeMap<String, Parameter>,
) -> Result<(), PartError> {
    for (key, p) in params {
        let (target, attribute) = match key.rsplit_once('.') {
            Some((path, attribute)) => (graph.resolve_path(node, path)?, attribute),
            None => (node, key.as_str()),
        };
        graph.set_parameter(target, attribute, p.clone())?;
    }
    Ok(())
}
