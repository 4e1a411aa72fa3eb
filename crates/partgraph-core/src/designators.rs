//! # Designator Assignment
//!
//! Gives every footprinted module a reference designator (`R1`, `C3`,
//! `U2`). Existing designators are kept and their numbers are never reused.

use crate::graph::{Graph, NodeFilter};
use crate::primitives::DEFAULT_DESIGNATOR_PREFIX;
use crate::traits::{Capability, Trait};
use crate::{NodeId, PartError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Assign `<prefix><n>` to every module at or below `root` that has a
/// `Footprint` but no `Designator`.
///
/// The prefix comes from `DesignatorPrefix` (default `U`). Numbers start at
/// 1 per prefix, follow traversal order, and skip numbers already taken.
/// Returns the newly assigned designators.
pub fn assign_designators(
    graph: &mut Graph,
    root: NodeId,
) -> Result<Vec<(NodeId, String)>, PartError> {
    let mut modules = Vec::new();
    if graph.node(root)?.is_module() {
        modules.push(root);
    }
    modules.extend(graph.get_children(root, true, &NodeFilter::Modules)?);

    let mut taken: BTreeMap<String, BTreeSet<u64>> = BTreeMap::new();
    let mut pending = Vec::new();
    for module in modules {
        let traits = graph.node(module)?.traits();
        if !traits.contains(Capability::Footprint) {
            continue;
        }
        let prefix = traits
            .text(Capability::DesignatorPrefix)
            .unwrap_or(DEFAULT_DESIGNATOR_PREFIX)
            .to_string();
        match traits.text(Capability::Designator) {
            Some(existing) => {
                if let Some((p, n)) = split_designator(existing) {
                    taken.entry(p.to_string()).or_default().insert(n);
                }
            }
            None => pending.push((module, prefix)),
        }
    }

    let mut assigned = Vec::new();
    let mut next: BTreeMap<String, u64> = BTreeMap::new();
    for (module, prefix) in pending {
        let used = taken.entry(prefix.clone()).or_default();
        let counter = next.entry(prefix.clone()).or_insert(1);
        while used.contains(&*counter) {
            *counter = counter.saturating_add(1);
        }
        let designator = format!("{prefix}{counter}");
        used.insert(*counter);
        graph.add_trait(module, Trait::Designator(designator.clone()))?;
        debug!(module = %graph.path(module), %designator, "designator assigned");
        assigned.push((module, designator));
    }
    Ok(assigned)
}

/// `"R12"` -> `("R", 12)`. `None` without a trailing number.
fn split_designator(designator: &str) -> Option<(&str, u64)> {
    let digits = designator
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let (prefix, number) = designator.split_at(digits);
    number.parse().ok().map(|n| (prefix, n))
}
