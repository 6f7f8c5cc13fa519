// verify.rs — Compiled Graph invariant checks
//
// Re-derives the structural invariants of a `CompiledGraph` from scratch.
// Builders keep them by construction; imported or hand-edited graphs are
// checked here before anything is serialized from them.
//
// Preconditions: none.
// Postconditions: `GraphCert::all_pass()` iff every obligation holds.
// Failure modes: none (the certificate records failures).
// Side effects: none.

use std::collections::{HashMap, HashSet};

use crate::diag::Diagnostic;
use crate::error::GraphError;
use crate::graph::{check_link_types, CompiledGraph};
use crate::topo;

/// A set of named boolean obligations established by a check.
pub trait StageCert {
    fn all_pass(&self) -> bool;
    fn obligations(&self) -> Vec<(&'static str, bool)>;

    /// Names of the obligations that failed.
    fn failures(&self) -> Vec<&'static str> {
        self.obligations()
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphCert {
    /// G1: every link's endpoints are existing nodes and ports.
    pub links_reference_nodes: bool,
    /// G2: every input port holds at most one link, and that link names it.
    pub single_incoming: bool,
    /// G3: every output's link list matches the links naming it as source.
    pub outputs_consistent: bool,
    /// G4: no cycle through links.
    pub acyclic: bool,
    /// G5: every link passes the type-checker and carries its source type.
    pub link_types: bool,
}

impl StageCert for GraphCert {
    fn all_pass(&self) -> bool {
        self.links_reference_nodes
            && self.single_incoming
            && self.outputs_consistent
            && self.acyclic
            && self.link_types
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("G1_links_reference_nodes", self.links_reference_nodes),
            ("G2_single_incoming", self.single_incoming),
            ("G3_outputs_consistent", self.outputs_consistent),
            ("G4_acyclic", self.acyclic),
            ("G5_link_types", self.link_types),
        ]
    }
}

/// Check every graph invariant.
pub fn verify_graph(graph: &CompiledGraph) -> GraphCert {
    let g1 = verify_g1_links_reference_nodes(graph);
    GraphCert {
        links_reference_nodes: g1,
        single_incoming: verify_g2_single_incoming(graph),
        outputs_consistent: verify_g3_outputs_consistent(graph),
        // A dangling link also stalls the serializer, so only report a cycle
        // when the endpoints are sound.
        acyclic: !g1 || topo::emission_order(graph).is_ok(),
        link_types: g1 && verify_g5_link_types(graph),
    }
}

/// G1: link endpoints exist, and the slots are in range.
fn verify_g1_links_reference_nodes(graph: &CompiledGraph) -> bool {
    let mut ids = HashSet::new();
    if !graph.nodes.iter().all(|n| ids.insert(n.id)) {
        return false;
    }
    graph.links.iter().all(|link| {
        let source_ok = graph
            .node(link.source)
            .is_some_and(|n| link.source_slot < n.outputs.len());
        let target_ok = graph
            .node(link.target)
            .is_some_and(|n| link.target_slot < n.inputs.len());
        source_ok && target_ok
    })
}

/// G2: each link targets exactly one input port, and that port refers back
/// to it.
fn verify_g2_single_incoming(graph: &CompiledGraph) -> bool {
    let mut targets = HashSet::new();
    for link in &graph.links {
        if !targets.insert((link.target, link.target_slot)) {
            return false;
        }
        let back = graph
            .node(link.target)
            .and_then(|n| n.inputs.get(link.target_slot))
            .and_then(|p| p.link);
        if back != Some(link.id) {
            return false;
        }
    }
    // No port may hold a link id that no link carries.
    let link_ids: HashSet<_> = graph.links.iter().map(|l| l.id).collect();
    graph
        .nodes
        .iter()
        .flat_map(|n| n.inputs.iter())
        .filter_map(|p| p.link)
        .all(|id| link_ids.contains(&id))
}

/// G3: output link lists, as sets, equal the links naming them.
fn verify_g3_outputs_consistent(graph: &CompiledGraph) -> bool {
    let mut expected: HashMap<_, HashSet<_>> = HashMap::new();
    for link in &graph.links {
        expected
            .entry((link.source, link.source_slot))
            .or_default()
            .insert(link.id);
    }
    for node in &graph.nodes {
        for (slot, port) in node.outputs.iter().enumerate() {
            let actual: HashSet<_> = port.links.iter().copied().collect();
            if actual.len() != port.links.len() {
                return false;
            }
            let want = expected.remove(&(node.id, slot)).unwrap_or_default();
            if actual != want {
                return false;
            }
        }
    }
    expected.is_empty()
}

/// G5: link types agree with both endpoints.
fn verify_g5_link_types(graph: &CompiledGraph) -> bool {
    graph.links.iter().all(|link| {
        let source = graph
            .node(link.source)
            .and_then(|n| n.outputs.get(link.source_slot));
        let target = graph
            .node(link.target)
            .and_then(|n| n.inputs.get(link.target_slot));
        match (source, target) {
            (Some(s), Some(t)) => s.ty == link.ty && check_link_types(&s.ty, &t.ty).is_ok(),
            _ => false,
        }
    })
}

impl CompiledGraph {
    /// Verify every invariant, reporting the first failed obligation.
    pub fn validate(&self) -> Result<GraphCert, Diagnostic> {
        let cert = verify_graph(self);
        if cert.all_pass() {
            return Ok(cert);
        }
        // Prefer the serializer's own error for cycles: it names the nodes.
        if cert.links_reference_nodes && !cert.acyclic {
            if let Err(err) = topo::emission_order(self) {
                return Err(Diagnostic::new(err));
            }
        }
        Err(Diagnostic::new(GraphError::InvalidGraph(format!(
            "failed obligations: {}",
            cert.failures().join(", ")
        ))))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
