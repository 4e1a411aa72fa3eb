//! # Declarative Node Shapes
//!
//! A `ModuleSpec` is a static description of a module: its interfaces,
//! submodules, parameters, traits and internal connections.
//! `Graph::instantiate` evaluates it once into fresh nodes.
//!
//! Traits that reference the module's own interfaces (`Bridge`, pin-mapped
//! `Footprint`) are declared by relative path and bound to node ids at
//! instantiation.

use crate::graph::Graph;
use crate::parameter::Parameter;
use crate::traits::{Footprint, Trait};
use crate::{NodeId, PartError};
use std::collections::BTreeMap;

/// Shape of an interface: a leaf connection point or a composite bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    pub type_name: String,
    pub interfaces: Vec<(String, InterfaceSpec)>,
    pub parameters: Vec<(String, Parameter)>,
}

impl InterfaceSpec {
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            interfaces: Vec::new(),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn interface(mut self, name: &str, spec: InterfaceSpec) -> Self {
        self.interfaces.push((name.to_string(), spec));
        self
    }

    #[must_use]
    pub fn param(mut self, name: &str, p: Parameter) -> Self {
        self.parameters.push((name.to_string(), p));
        self
    }
}

/// A trait declared against relative interface paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitSpec {
    /// A trait without node references.
    Plain(Trait),
    Bridge { input: String, output: String },
    Footprint {
        identifier: String,
        pinmap: Vec<(String, String)>,
    },
}

/// Shape of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub type_name: String,
    pub interfaces: Vec<(String, InterfaceSpec)>,
    pub children: Vec<(String, ModuleSpec)>,
    pub parameters: Vec<(String, Parameter)>,
    pub traits: Vec<TraitSpec>,
    /// Internal connections between relative interface paths.
    pub connections: Vec<(String, String)>,
}

impl ModuleSpec {
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            interfaces: Vec::new(),
            children: Vec::new(),
            parameters: Vec::new(),
            traits: Vec::new(),
            connections: Vec::new(),
        }
    }

    #[must_use]
    pub fn interface(mut self, name: &str, spec: InterfaceSpec) -> Self {
        self.interfaces.push((name.to_string(), spec));
        self
    }

    /// `count` interfaces named `name[0]`, `name[1]`, ...
    #[must_use]
    pub fn interfaces(mut self, name: &str, count: usize, spec: &InterfaceSpec) -> Self {
        for i in 0..count {
            self.interfaces.push((format!("{name}[{i}]"), spec.clone()));
        }
        self
    }

    #[must_use]
    pub fn child(mut self, name: &str, spec: ModuleSpec) -> Self {
        self.children.push((name.to_string(), spec));
        self
    }

    /// `count` submodules named `name[0]`, `name[1]`, ...
    #[must_use]
    pub fn children(mut self, name: &str, count: usize, spec: &ModuleSpec) -> Self {
        for i in 0..count {
            self.children.push((format!("{name}[{i}]"), spec.clone()));
        }
        self
    }

    #[must_use]
    pub fn param(mut self, name: &str, p: Parameter) -> Self {
        self.parameters.push((name.to_string(), p));
        self
    }

    #[must_use]
    pub fn with_trait(mut self, t: Trait) -> Self {
        self.traits.push(TraitSpec::Plain(t));
        self
    }

    #[must_use]
    pub fn bridge(mut self, input: &str, output: &str) -> Self {
        self.traits.push(TraitSpec::Bridge {
            input: input.to_string(),
            output: output.to_string(),
        });
        self
    }

    #[must_use]
    pub fn footprint(mut self, identifier: &str, pinmap: &[(&str, &str)]) -> Self {
        self.traits.push(TraitSpec::Footprint {
            identifier: identifier.to_string(),
            pinmap: pinmap
                .iter()
                .map(|(pin, path)| ((*pin).to_string(), (*path).to_string()))
                .collect(),
        });
        self
    }

    #[must_use]
    pub fn connect(mut self, a: &str, b: &str) -> Self {
        self.connections.push((a.to_string(), b.to_string()));
        self
    }
}

impl Graph {
    /// Build fresh, parentless nodes for `spec` and return the module.
    ///
    /// Order: interfaces, submodules, parameters, internal connections,
    /// then traits, so traits can reference anything the shape declares.
    ///
    /// A failed instantiation leaves no nodes behind.
    pub fn instantiate(&mut self, spec: &ModuleSpec) -> Result<NodeId, PartError> {
        let module = self.new_module(&spec.type_name);
        match self.build_module(module, spec) {
            Ok(()) => Ok(module),
            Err(err) => {
                self.discard(module);
                Err(err)
            }
        }
    }

    fn build_module(&mut self, module: NodeId, spec: &ModuleSpec) -> Result<(), PartError> {
        for (name, iface) in &spec.interfaces {
            let id = self.instantiate_interface(iface)?;
            self.adopt(module, name, id)?;
        }
        for (name, child) in &spec.children {
            let id = self.instantiate(child)?;
            self.adopt(module, name, id)?;
        }
        for (name, p) in &spec.parameters {
            self.set_parameter(module, name, p.clone())?;
        }
        for (a, b) in &spec.connections {
            let a = self.resolve_path(module, a)?;
            let b = self.resolve_path(module, b)?;
            self.connect(a, b)?;
        }
        for t in &spec.traits {
            let bound = match t {
                TraitSpec::Plain(t) => t.clone(),
                TraitSpec::Bridge { input, output } => Trait::Bridge {
                    input: self.resolve_path(module, input)?,
                    output: self.resolve_path(module, output)?,
                },
                TraitSpec::Footprint { identifier, pinmap } => {
                    let mut pins = BTreeMap::new();
                    for (pin, path) in pinmap {
                        pins.insert(pin.clone(), self.resolve_path(module, path)?);
                    }
                    Trait::Footprint(Footprint {
                        identifier: identifier.clone(),
                        pinmap: pins,
                    })
                }
            };
            self.add_trait(module, bound)?;
        }
        Ok(())
    }

    /// Build fresh, parentless nodes for an interface shape.
    pub fn instantiate_interface(&mut self, spec: &InterfaceSpec) -> Result<NodeId, PartError> {
        let iface = self.new_interface(&spec.type_name);
        match self.build_interface(iface, spec) {
            Ok(()) => Ok(iface),
            Err(err) => {
                self.discard(iface);
                Err(err)
            }
        }
    }

    fn build_interface(&mut self, iface: NodeId, spec: &InterfaceSpec) -> Result<(), PartError> {
        for (name, child) in &spec.interfaces {
            let id = self.instantiate_interface(child)?;
            self.adopt(iface, name, id)?;
        }
        for (name, p) in &spec.parameters {
            self.set_parameter(iface, name, p.clone())?;
        }
        Ok(())
    }

    /// `add_child` for a fresh subtree; the subtree is dropped on failure.
    fn adopt(&mut self, parent: NodeId, name: &str, child: NodeId) -> Result<(), PartError> {
        self.add_child(parent, name, child).inspect_err(|_| self.discard(child))
    }

    /// Instantiate `spec` and add it under `parent` as `name`.
    pub fn add_module(
        &mut self,
        parent: NodeId,
        name: &str,
        spec: &ModuleSpec,
    ) -> Result<NodeId, PartError> {
        self.node(parent)?;
        let id = self.instantiate(spec)?;
        self.adopt(parent, name, id)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeFilter;
    use crate::traits::Capability;

    fn electrical() -> InterfaceSpec {
        InterfaceSpec::new("Electrical")
    }

    #[test]
    fn instantiate_builds_arrays_and_traits() {
        let buffer = ModuleSpec::new("Buffer")
            .interfaces("io", 2, &electrical())
            .interface("en", electrical())
            .param("delay", "1ns..5ns".parse().expect("param"))
            .bridge("io[0]", "io[1]")
            .footprint("SOT-23-5", &[("1", "io[0]"), ("2", "io[1]"), ("3", "en")]);

        let mut graph = Graph::new();
        let m = graph.instantiate(&buffer).expect("instantiate");

        let ifaces = graph.get_children(m, false, &NodeFilter::Interfaces).expect("ifaces");
        assert_eq!(ifaces.len(), 3);
        let io0 = graph.resolve_path(m, "io[0]").expect("io0");
        let io1 = graph.resolve_path(m, "io[1]").expect("io1");
        assert_eq!(graph.node(m).expect("node").traits().bridge(), Some((io0, io1)));
        assert!(graph.has_trait(m, Capability::Footprint));
        assert!(!graph.most_narrow(m, "delay").is_open());
    }

    #[test]
    fn internal_connections_resolve_relative_paths() {
        let power = InterfaceSpec::new("ElectricPower")
            .interface("hv", electrical())
            .interface("lv", electrical());
        let shifter = ModuleSpec::new("Shifter")
            .interfaces("power", 2, &power)
            .connect("power[0].lv", "power[1].lv");

        let mut graph = Graph::new();
        let m = graph.instantiate(&shifter).expect("instantiate");
        let lv0 = graph.resolve_path(m, "power[0].lv").expect("lv0");
        let lv1 = graph.resolve_path(m, "power[1].lv").expect("lv1");
        assert!(graph.is_connected(lv0, lv1));
    }

    #[test]
    fn bad_paths_fail_instantiation() {
        let broken = ModuleSpec::new("Broken").bridge("nope", "nada");
        let mut graph = Graph::new();
        assert!(matches!(
            graph.instantiate(&broken),
            Err(PartError::UnknownPath { .. })
        ));
    }
}
