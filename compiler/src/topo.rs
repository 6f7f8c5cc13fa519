// topo.rs — Topological serializer
//
// Orders nodes so that every linked input is produced before it is read.
// Repeated fixed-point scan: each pass emits every pending node whose
// linked inputs all come from already-emitted nodes, in ascending id order.
//
// Preconditions: none; dangling links are tolerated and reported.
// Postconditions: `EmissionOrder::nodes()` lists every node exactly once.
// Failure modes: a pass that emits nothing while nodes remain (a cycle, or
//                a link whose source is missing) → `SerializationDeadlock`.
// Side effects: none.

use std::collections::{BTreeSet, HashSet};

use crate::error::GraphError;
use crate::graph::CompiledGraph;
use crate::id::NodeId;

const TRACING_TARGET: &str = "flowc::topo";

/// Emission order grouped by pass. Nodes within a pass are independent
/// of each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionOrder {
    pub passes: Vec<Vec<NodeId>>,
}

impl EmissionOrder {
    /// Flattened order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.passes.iter().flatten().copied()
    }
}

/// Compute the dependency-respecting emission order of `graph`.
pub fn emission_order(graph: &CompiledGraph) -> Result<EmissionOrder, GraphError> {
    // Source node of each linked input, per node. `None` marks a link that
    // does not resolve, which keeps its node pending forever.
    let deps: Vec<(NodeId, Vec<Option<NodeId>>)> = graph
        .nodes
        .iter()
        .map(|node| {
            let sources = node
                .inputs
                .iter()
                .filter_map(|port| port.link)
                .map(|link| {
                    graph
                        .link(link)
                        .map(|l| l.source)
                        .filter(|src| graph.node(*src).is_some())
                })
                .collect();
            (node.id, sources)
        })
        .collect();

    let mut pending: BTreeSet<NodeId> = deps.iter().map(|(id, _)| *id).collect();
    let mut emitted: HashSet<NodeId> = HashSet::with_capacity(pending.len());
    let mut passes = Vec::new();

    while !pending.is_empty() {
        // Eligibility is judged against the nodes emitted by earlier passes
        // only, so each pass is one dependency layer.
        let layer: Vec<NodeId> = deps
            .iter()
            .filter(|(id, _)| pending.contains(id))
            .filter(|(_, sources)| {
                sources
                    .iter()
                    .all(|src| src.is_some_and(|s| emitted.contains(&s)))
            })
            .map(|(id, _)| *id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if layer.is_empty() {
            let remaining: Vec<NodeId> = pending.into_iter().collect();
            tracing::debug!(
                target: TRACING_TARGET,
                remaining = ?remaining,
                "Serialization deadlock"
            );
            return Err(GraphError::SerializationDeadlock(remaining));
        }

        for id in &layer {
            pending.remove(id);
            emitted.insert(*id);
        }
        tracing::trace!(
            target: TRACING_TARGET,
            pass = passes.len(),
            nodes = ?layer,
            "Emitted pass"
        );
        passes.push(layer);
    }

    Ok(EmissionOrder { passes })
}

// ── Tests ───────────────────────────────────────────────────────────────────
