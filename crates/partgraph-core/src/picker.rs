//! # Picker Resolution Engine
//!
//! Binds parametrized modules to concrete catalog parts.
//!
//! Per module:
//!
//! ```text
//! Unresolved ──first compatible candidate──▶ Matched ──traits──▶ PartBound
//!      │
//!      └──────────no candidate fits────────▶ Exhausted
//! ```
//!
//! A pick runs in two phases:
//! 1. **Evaluate**: every module is matched against its candidate list on a
//!    read-only view of the graph. Merges happen on a snapshot of the
//!    module's parameters, so a candidate that fails halfway leaves nothing
//!    behind. The first full match wins and later candidates are never
//!    looked at. With the `parallel` feature this phase runs on rayon.
//! 2. **Commit**: sequentially, in traversal order, matched modules get
//!    their narrowed parameters and `Part`/`Footprint`/`Datasheet` traits.
//!    A module whose binding fails here is restored and reported Exhausted.
//!
//! One exhausted module never stops the others; failures are collected in
//! the `PickReport`.

use crate::graph::{Graph, NodeFilter, validate_name};
use crate::parameter::Parameter;
use crate::traits::{Capability, Footprint, PartBinding, Trait};
use crate::types::PickFailure;
use crate::{NodeId, PartError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// =============================================================================
// CANDIDATES
// =============================================================================

/// A concrete part offered for one module type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub module_type: String,
    /// Catalog part number.
    pub part: String,
    /// Declared values, `Exact` or `Range` only.
    #[serde(default)]
    pub params: BTreeMap<String, Parameter>,
    /// Footprint identifier. Defaults to the part number when a pin map is
    /// given.
    #[serde(default)]
    pub footprint: Option<String>,
    /// Pin identifier to interface path relative to the module.
    #[serde(default)]
    pub pinmap: BTreeMap<String, String>,
    #[serde(default)]
    pub datasheet: Option<String>,
}

impl Candidate {
    #[must_use]
    pub fn new(module_type: &str, part: &str) -> Self {
        Self {
            module_type: module_type.to_string(),
            part: part.to_string(),
            params: BTreeMap::new(),
            footprint: None,
            pinmap: BTreeMap::new(),
            datasheet: None,
        }
    }

    #[must_use]
    pub fn param(mut self, name: &str, p: Parameter) -> Self {
        self.params.insert(name.to_string(), p);
        self
    }

    #[must_use]
    pub fn pin(mut self, pin: &str, path: &str) -> Self {
        self.pinmap.insert(pin.to_string(), path.to_string());
        self
    }

    #[must_use]
    pub fn footprint(mut self, identifier: &str) -> Self {
        self.footprint = Some(identifier.to_string());
        self
    }

    #[must_use]
    pub fn datasheet(mut self, url: &str) -> Self {
        self.datasheet = Some(url.to_string());
        self
    }

    /// Reject open declared parameters, unusable parameter names and empty
    /// identifiers.
    pub fn validate(&self) -> Result<(), PartError> {
        if self.part.is_empty() || self.module_type.is_empty() {
            return Err(PartError::InvalidValue(format!(
                "candidate '{}' for '{}' needs a part number and module type",
                self.part, self.module_type
            )));
        }
        for name in self.params.keys() {
            validate_name(name).map_err(|_| {
                PartError::InvalidValue(format!(
                    "candidate {} declares invalid parameter name '{name}'",
                    self.part
                ))
            })?;
        }
        if let Some((name, _)) = self.params.iter().find(|(_, p)| p.is_open()) {
            return Err(PartError::InvalidValue(format!(
                "candidate {} declares open parameter '{name}'",
                self.part
            )));
        }
        Ok(())
    }
}

/// Supplies candidates per module type, highest priority first.
///
/// Implementations own their own timeouts and retries.
pub trait CandidateSource: Send + Sync {
    /// Name recorded in `Part` traits.
    fn name(&self) -> &str;

    /// Ordered candidates for `module_type`; empty when the type is unknown.
    fn candidates(&self, module_type: &str) -> Result<Vec<Candidate>, PartError>;
}

/// In-memory candidate source.
#[derive(Debug, Clone, Default)]
pub struct CandidateRegistry {
    name: String,
    by_type: BTreeMap<String, Vec<Candidate>>,
}

impl CandidateRegistry {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            by_type: BTreeMap::new(),
        }
    }

    /// Append `candidate` behind the ones already registered for its type.
    pub fn register(&mut self, candidate: Candidate) -> Result<(), PartError> {
        candidate.validate()?;
        self.by_type
            .entry(candidate.module_type.clone())
            .or_default()
            .push(candidate);
        Ok(())
    }

    pub fn extend(
        &mut self,
        candidates: impl IntoIterator<Item = Candidate>,
    ) -> Result<(), PartError> {
        candidates.into_iter().try_for_each(|c| self.register(c))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Every candidate, grouped by module type.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.by_type.values().flatten()
    }
}

impl CandidateSource for CandidateRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self, module_type: &str) -> Result<Vec<Candidate>, PartError> {
        Ok(self.by_type.get(module_type).cloned().unwrap_or_default())
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Resolution state of one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickState {
    Unresolved,
    Matched,
    PartBound,
    Exhausted,
}

/// What happened to one module during a pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickOutcome {
    pub module: NodeId,
    pub path: String,
    pub module_type: String,
    pub state: PickState,
    pub part: Option<String>,
    pub source: Option<String>,
    pub candidates_evaluated: usize,
    /// `(part, reason)` for every rejected candidate.
    pub rejected: Vec<(String, String)>,
}

/// Outcomes of one pick, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickReport {
    pub outcomes: Vec<PickOutcome>,
}

impl PickReport {
    #[must_use]
    pub fn count(&self, state: PickState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    #[must_use]
    pub fn outcome(&self, module: NodeId) -> Option<&PickOutcome> {
        self.outcomes.iter().find(|o| o.module == module)
    }

    #[must_use]
    pub fn failures(&self) -> Vec<PickFailure> {
        self.outcomes
            .iter()
            .filter(|o| o.state == PickState::Exhausted)
            .map(|o| PickFailure {
                path: o.path.clone(),
                module_type: o.module_type.clone(),
                rejected: o.rejected.clone(),
            })
            .collect()
    }

    /// `PickExhausted` with every failure when any module is exhausted.
    pub fn ensure_complete(&self) -> Result<(), PartError> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PartError::PickExhausted { failures })
        }
    }
}

// =============================================================================
// PICKER
// =============================================================================

struct Job {
    module: NodeId,
    candidates: Vec<(String, Candidate)>,
}

enum Evaluation {
    Match {
        source: String,
        candidate: Candidate,
        params: BTreeMap<String, Parameter>,
        pins: BTreeMap<String, NodeId>,
        attempts: usize,
        rejected: Vec<(String, String)>,
    },
    Exhausted {
        attempts: usize,
        rejected: Vec<(String, String)>,
    },
}

/// Layered candidate sources, consulted in the order they were added.
#[derive(Default)]
pub struct Picker {
    sources: Vec<Box<dyn CandidateSource>>,
}

impl Picker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source behind the existing ones.
    pub fn add_source(&mut self, source: Box<dyn CandidateSource>) {
        self.sources.push(source);
    }

    #[must_use]
    pub fn with_source(mut self, source: impl CandidateSource + 'static) -> Self {
        self.add_source(Box::new(source));
        self
    }

    #[must_use]
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Widen every `Unset` module parameter below `root` to `Any`.
    ///
    /// Returns how many parameters were widened.
    pub fn fill_unset(graph: &mut Graph, root: NodeId) -> Result<usize, PartError> {
        let mut filled = 0usize;
        for module in modules_below(graph, root)? {
            let open: Vec<String> = graph
                .node(module)?
                .parameters()
                .iter()
                .filter(|(_, p)| **p == Parameter::Unset)
                .map(|(name, _)| name.clone())
                .collect();
            for name in open {
                graph.set_parameter(module, &name, Parameter::Any)?;
                filled = filled.saturating_add(1);
            }
        }
        debug!(filled, "fill_unset");
        Ok(filled)
    }

    /// Resolve every module at or below `root`.
    ///
    /// Fills unset parameters first when `default_fill_unset` is on. Modules
    /// that already carry a `Part` or `Footprint` are reported `PartBound`
    /// and left alone, so a second run is a no-op for them.
    pub fn pick(&self, graph: &mut Graph, root: NodeId) -> Result<PickReport, PartError> {
        if graph.config().default_fill_unset {
            Self::fill_unset(graph, root)?;
        }

        let mut outcomes: BTreeMap<NodeId, PickOutcome> = BTreeMap::new();
        let mut order = Vec::new();
        let mut jobs = Vec::new();

        for module in modules_below(graph, root)? {
            order.push(module);
            let node = graph.node(module)?;
            let mut outcome = PickOutcome {
                module,
                path: graph.path(module),
                module_type: node.type_name().to_string(),
                state: PickState::Unresolved,
                part: None,
                source: None,
                candidates_evaluated: 0,
                rejected: Vec::new(),
            };

            let traits = node.traits();
            if traits.contains(Capability::Part) || traits.contains(Capability::Footprint) {
                outcome.state = PickState::PartBound;
                outcome.part = traits
                    .part()
                    .map(|p| p.partno.clone())
                    .or_else(|| traits.footprint().map(|fp| fp.identifier.clone()));
                outcome.source = traits.part().map(|p| p.source.clone());
                outcomes.insert(module, outcome);
                continue;
            }

            match self.collect(node.type_name()) {
                Ok(candidates) if candidates.is_empty() => {}
                Ok(candidates) => jobs.push(Job { module, candidates }),
                Err(err) => {
                    outcome.state = PickState::Exhausted;
                    outcome.rejected.push(("<source>".to_string(), err.to_string()));
                    warn!(module = %outcome.path, error = %err, "candidate source failed");
                }
            }
            outcomes.insert(module, outcome);
        }

        let view: &Graph = graph;
        #[cfg(feature = "parallel")]
        let evaluations: Vec<(NodeId, Evaluation)> = jobs
            .par_iter()
            .map(|job| (job.module, evaluate(view, job)))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let evaluations: Vec<(NodeId, Evaluation)> = jobs
            .iter()
            .map(|job| (job.module, evaluate(view, job)))
            .collect();

        for (module, evaluation) in evaluations {
            let Some(outcome) = outcomes.get_mut(&module) else {
                continue;
            };
            match evaluation {
                Evaluation::Match {
                    source,
                    candidate,
                    params,
                    pins,
                    attempts,
                    rejected,
                } => {
                    outcome.candidates_evaluated = attempts;
                    outcome.rejected = rejected;
                    let before = graph.node(module)?;
                    let parameters = before.parameters().clone();
                    let traits = before.traits().clone();
                    match commit(graph, module, &source, &candidate, params, pins) {
                        Ok(()) => {
                            outcome.state = PickState::PartBound;
                            outcome.part = Some(candidate.part);
                            outcome.source = Some(source);
                            debug!(module = %outcome.path, part = ?outcome.part, "picked");
                        }
                        Err(err) => {
                            graph.restore(module, parameters, traits)?;
                            outcome.state = PickState::Exhausted;
                            outcome.rejected.push((candidate.part, err.to_string()));
                            warn!(module = %outcome.path, error = %err, "binding failed");
                        }
                    }
                }
                Evaluation::Exhausted { attempts, rejected } => {
                    outcome.state = PickState::Exhausted;
                    outcome.candidates_evaluated = attempts;
                    outcome.rejected = rejected;
                    warn!(
                        module = %outcome.path,
                        candidates = attempts,
                        "no candidate satisfies module"
                    );
                }
            }
        }

        let report = PickReport {
            outcomes: order
                .into_iter()
                .filter_map(|m| outcomes.remove(&m))
                .collect(),
        };
        info!(
            modules = report.outcomes.len(),
            bound = report.count(PickState::PartBound),
            exhausted = report.count(PickState::Exhausted),
            unresolved = report.count(PickState::Unresolved),
            "pick finished"
        );
        Ok(report)
    }

    fn collect(&self, module_type: &str) -> Result<Vec<(String, Candidate)>, PartError> {
        let mut all = Vec::new();
        for source in &self.sources {
            let name = source.name().to_string();
            all.extend(
                source
                    .candidates(module_type)?
                    .into_iter()
                    .map(|c| (name.clone(), c)),
            );
        }
        Ok(all)
    }
}

/// Apply a matched candidate: narrowed parameters, then `Part`,
/// `Footprint` and `Datasheet` traits.
fn commit(
    graph: &mut Graph,
    module: NodeId,
    source: &str,
    candidate: &Candidate,
    params: BTreeMap<String, Parameter>,
    pins: BTreeMap<String, NodeId>,
) -> Result<(), PartError> {
    for (name, p) in params {
        graph.set_parameter(module, &name, p)?;
    }
    graph.add_trait(
        module,
        Trait::Part(PartBinding {
            partno: candidate.part.clone(),
            source: source.to_string(),
        }),
    )?;
    if !pins.is_empty() {
        graph.add_trait(
            module,
            Trait::Footprint(Footprint {
                identifier: candidate
                    .footprint
                    .clone()
                    .unwrap_or_else(|| candidate.part.clone()),
                pinmap: pins,
            }),
        )?;
    }
    if let Some(url) = &candidate.datasheet {
        graph.add_trait(module, Trait::Datasheet(url.clone()))?;
    }
    Ok(())
}

/// `root` (when a module) and every module below it, each replaced by its
/// most special form, without duplicates.
fn modules_below(graph: &Graph, root: NodeId) -> Result<Vec<NodeId>, PartError> {
    let mut all = Vec::new();
    if graph.node(root)?.is_module() {
        all.push(root);
    }
    all.extend(graph.get_children(root, true, &NodeFilter::Modules)?);

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for module in all {
        let special = graph.get_most_special(module)?;
        if seen.insert(special) {
            out.push(special);
        }
    }
    Ok(out)
}

/// Try candidates in order against a snapshot of the module's parameters.
fn evaluate(graph: &Graph, job: &Job) -> Evaluation {
    let path = graph.path(job.module);
    let snapshot = graph
        .node(job.module)
        .map(|n| n.parameters().clone())
        .unwrap_or_default();

    let mut rejected = Vec::new();
    for (attempt, (source, candidate)) in job.candidates.iter().enumerate() {
        match try_candidate(graph, job.module, &snapshot, candidate) {
            Ok((params, pins)) => {
                debug!(module = %path, part = %candidate.part, "candidate accepted");
                return Evaluation::Match {
                    source: source.clone(),
                    candidate: candidate.clone(),
                    params,
                    pins,
                    attempts: attempt.saturating_add(1),
                    rejected,
                };
            }
            Err(reason) => {
                debug!(module = %path, part = %candidate.part, %reason, "candidate rejected");
                rejected.push((candidate.part.clone(), reason));
            }
        }
    }
    Evaluation::Exhausted {
        attempts: job.candidates.len(),
        rejected,
    }
}

/// Merged parameters and bound pins, or why the candidate does not fit.
fn try_candidate(
    graph: &Graph,
    module: NodeId,
    snapshot: &BTreeMap<String, Parameter>,
    candidate: &Candidate,
) -> Result<(BTreeMap<String, Parameter>, BTreeMap<String, NodeId>), String> {
    let mut merged = BTreeMap::new();
    for (name, declared) in &candidate.params {
        let current = snapshot.get(name).cloned().unwrap_or_default();
        let narrowed = current
            .merge(declared)
            .map_err(|conflict| format!("{name}: {conflict}"))?;
        merged.insert(name.clone(), narrowed);
    }

    let mut pins = BTreeMap::new();
    for (pin, path) in &candidate.pinmap {
        let iface = graph
            .resolve_path(module, path)
            .map_err(|_| format!("pin {pin}: no interface '{path}'"))?;
        if !graph.is_leaf_interface(iface) {
            return Err(format!("pin {pin}: '{path}' is not a connection point"));
        }
        pins.insert(pin.clone(), iface);
    }
    Ok((merged, pins))
}

// =============================================================================
// TESTS
// =============================================================================
