// naming.rs — Symbolic names for serialized code
//
// Assigns every node an instance name (`<type>_<k>`), every output a
// tensor name (`<port>_<k>`) and every zero-output node a placeholder
// result name (`result_<k>`), where `k` is the node's 1-based position in
// id order. Parsing the code back allocates ids 1..n in that same order,
// so names do not drift when the graph's ids are sparse.
//
// Preconditions: none.
// Postconditions: all assigned names are distinct, valid identifiers.
// Failure modes: none.
// Side effects: none.

use std::collections::{HashMap, HashSet};

use crate::graph::{CompiledGraph, Node};
use crate::id::NodeId;
use crate::ident;

/// Name assignment for one graph.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    instances: HashMap<NodeId, String>,
    tensors: HashMap<(NodeId, usize), String>,
    placeholders: HashMap<NodeId, String>,
}

impl NameTable {
    pub fn new(graph: &CompiledGraph) -> Self {
        let mut nodes: Vec<&Node> = graph.nodes.iter().collect();
        nodes.sort_by_key(|n| n.id);

        let mut taken = HashSet::new();
        let mut table = NameTable::default();

        for (k, node) in (1..).zip(&nodes) {
            let base = format!("{}_{k}", node.type_name.to_lowercase());
            let name = claim(&mut taken, identifier(&ident::encode(&base)));
            table.instances.insert(node.id, name);
        }
        for (k, node) in (1..).zip(&nodes) {
            if node.outputs.is_empty() {
                let name = claim(&mut taken, format!("result_{k}"));
                table.placeholders.insert(node.id, name);
                continue;
            }
            for (slot, port) in node.outputs.iter().enumerate() {
                let base = format!("{}_{k}", port.name.to_lowercase().replace(' ', "_"));
                let name = claim(&mut taken, identifier(&ident::encode(&base)));
                table.tensors.insert((node.id, slot), name);
            }
        }
        table
    }

    pub fn instance(&self, node: NodeId) -> &str {
        self.instances.get(&node).map_or("", String::as_str)
    }

    pub fn tensor(&self, node: NodeId, slot: usize) -> Option<&str> {
        self.tensors.get(&(node, slot)).map(String::as_str)
    }

    /// Tensor names of every output of `node`, in slot order.
    pub fn outputs(&self, node: &Node) -> Vec<&str> {
        (0..node.outputs.len())
            .filter_map(|slot| self.tensor(node.id, slot))
            .collect()
    }

    /// Result name for a node without outputs.
    pub fn placeholder(&self, node: NodeId) -> Option<&str> {
        self.placeholders.get(&node).map(String::as_str)
    }
}

/// Reserve `base`, or the first free `base_<k>` (k ≥ 2).
fn claim(taken: &mut HashSet<String>, base: String) -> String {
    if taken.insert(base.clone()) {
        return base;
    }
    let mut k = 2;
    loop {
        let candidate = format!("{base}_{k}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        k += 1;
    }
}

/// Force `raw` into `[A-Za-z_][A-Za-z0-9_]*`. Characters outside the
/// identifier codec's alphabet have no marker and become `_`.
pub fn identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !out.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        out.insert(0, '_');
    }
    out
}
