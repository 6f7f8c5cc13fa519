// dot.rs — Graphviz DOT output for compiled workflow graphs
//
// One DOT node per graph node, one edge per link labelled with the link's
// data type. Nodes the serializer cannot order (cycles) have their
// connecting edges drawn bold.
//
// Preconditions: none; dangling links are skipped.
// Postconditions: returns a DOT string with nodes and edges in id order.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::collections::HashSet;
use std::fmt::Write;

use crate::error::GraphError;
use crate::graph::{CompiledGraph, Node};
use crate::id::NodeId;
use crate::literal::escape;
use crate::topo;

/// Emit the compiled graph as a Graphviz DOT string.
pub fn emit_dot(graph: &CompiledGraph) -> String {
    let stalled: HashSet<NodeId> = match topo::emission_order(graph) {
        Err(GraphError::SerializationDeadlock(ids)) => ids.into_iter().collect(),
        _ => HashSet::new(),
    };

    let mut buf = String::new();
    writeln!(buf, "digraph flowc {{").unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();

    writeln!(buf).unwrap();
    let mut nodes: Vec<&Node> = graph.nodes.iter().collect();
    nodes.sort_by_key(|n| n.id);
    for node in &nodes {
        writeln!(buf, "    n{} [{}];", node.id, node_attrs(node)).unwrap();
    }

    writeln!(buf).unwrap();
    let mut links: Vec<_> = graph.links.iter().collect();
    links.sort_by_key(|l| l.id);
    for link in links {
        let (Some(source), Some(target)) = (graph.node(link.source), graph.node(link.target)) else {
            continue;
        };
        let tail = source
            .outputs
            .get(link.source_slot)
            .map_or("", |p| p.name.as_str());
        let head = target
            .inputs
            .get(link.target_slot)
            .map_or("", |p| p.name.as_str());
        let style = if stalled.contains(&link.source) && stalled.contains(&link.target) {
            ", style=bold, color=blue"
        } else {
            ""
        };
        writeln!(
            buf,
            "    n{} -> n{} [label=\"{}\", taillabel=\"{}\", headlabel=\"{}\"{style}];",
            link.source,
            link.target,
            escape(link.ty.as_str()),
            escape(tail),
            escape(head),
        ).unwrap();
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Loaders and other input-free nodes, sinks, and everything in between
/// get distinct fills.
fn node_attrs(node: &Node) -> String {
    let color = match (node.inputs.is_empty(), node.outputs.is_empty()) {
        (true, false) => "lightsalmon",
        (_, true) => "lightgreen",
        (false, false) => "lightblue",
    };
    format!(
        "shape=box, style=filled, fillcolor={color}, label=\"{}: {}\"",
        node.id,
        escape(&node.type_name)
    )
}
