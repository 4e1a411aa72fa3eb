//! # Session Module
//!
//! The explicit run context. A `Session` owns the design graph, its root
//! module and the layered candidate sources for one run:
//!
//! ```text
//! fill_unset -> pick -> assign_designators -> derive_nets -> export
//! ```
//!
//! Each pass can also be called on its own. Nothing here is global; two
//! sessions never share state.

use crate::designators;
use crate::export::ExportBundle;
use crate::graph::Graph;
use crate::netlist::{Netlist, NetlistDeriver};
use crate::picker::{CandidateSource, PickReport, Picker};
use crate::{NodeId, PartError};
use tracing::info;

/// Everything one full run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: PickReport,
    pub netlist: Netlist,
    pub bundle: ExportBundle,
}

/// A design run over one graph.
pub struct Session {
    graph: Graph,
    root: NodeId,
    picker: Picker,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.root)
            .field("nodes", &self.graph.node_count())
            .field("sources", &self.picker.source_names())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a run over `graph`. `root` must be a module.
    pub fn new(graph: Graph, root: NodeId) -> Result<Self, PartError> {
        let node = graph.node(root)?;
        if !node.is_module() {
            return Err(PartError::NotAModule {
                path: graph.path(root),
                kind: node.kind(),
            });
        }
        Ok(Self {
            graph,
            root,
            picker: Picker::new(),
        })
    }

    /// Add a candidate source behind the existing ones.
    #[must_use]
    pub fn with_source(mut self, source: impl CandidateSource + 'static) -> Self {
        self.picker.add_source(Box::new(source));
        self
    }

    pub fn add_source(&mut self, source: Box<dyn CandidateSource>) {
        self.picker.add_source(source);
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// End the run and hand the graph back.
    #[must_use]
    pub fn into_graph(self) -> Graph {
        self.graph
    }

    // =========================================================================
    // PASSES
    // =========================================================================

    pub fn fill_unset(&mut self) -> Result<usize, PartError> {
        Picker::fill_unset(&mut self.graph, self.root)
    }

    pub fn pick(&mut self) -> Result<PickReport, PartError> {
        self.picker.pick(&mut self.graph, self.root)
    }

    pub fn assign_designators(&mut self) -> Result<Vec<(NodeId, String)>, PartError> {
        designators::assign_designators(&mut self.graph, self.root)
    }

    pub fn derive_nets(&self) -> Result<Netlist, PartError> {
        NetlistDeriver::derive(&self.graph)
    }

    /// Derive the nets and build the export bundle from the current state.
    pub fn export(&self) -> Result<ExportBundle, PartError> {
        let netlist = self.derive_nets()?;
        ExportBundle::build(&self.graph, self.root, &netlist)
    }

    /// Pick, designate, derive and export.
    ///
    /// Exhausted modules do not stop the run; check
    /// `RunOutput::report.ensure_complete()` to treat them as an error.
    /// Naming and capability errors abort.
    pub fn run(&mut self) -> Result<RunOutput, PartError> {
        let report = self.pick()?;
        let assigned = self.assign_designators()?;
        let netlist = self.derive_nets()?;
        let bundle = ExportBundle::build(&self.graph, self.root, &netlist)?;
        info!(
            root = %self.graph.path(self.root),
            designators = assigned.len(),
            nets = netlist.len(),
            components = bundle.components.len(),
            "run finished"
        );
        Ok(RunOutput {
            report,
            netlist,
            bundle,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
