// markdown.rs — Markdown codec
//
// Surface form: two nested lists.
//
//   - Nodes:
//       - N1:
//           - node_type: "CheckpointLoader"
//           - ckpt: "m.safetensors"
//       - N2:
//           - node_type: "TextEncode"
//           - text: "a cat"
//
//   - Links:
//       - L1: N1.clip -> N2.clip
//
// There is no invocation step: links address outputs by node label and
// port name. Labels carry the ids (`N<id>`, `L<id>`), so sparse ids from
// imported workflows survive a round trip. Port and parameter names match
// the schema case-insensitively; serialization writes port names in lower
// case.
//
// Preconditions: node types resolve in the registry.
// Postconditions: parsed node and link ids are the label numbers.
// Failure modes: malformed lines, malformed or duplicate labels and Graph
//                IR errors → `Diagnostic` carrying the offending line.
// Side effects: none.

use std::collections::HashSet;
use std::fmt::Write;

use crate::diag::Diagnostic;
use crate::error::GraphError;
use crate::graph::{CompiledGraph, GraphBuilder, Node, SourceRef};
use crate::id::{LinkId, NodeId};
use crate::ident::{self, TokenForm};
use crate::literal::{Literal, Quote};
use crate::parser::parse_literal;
use crate::registry::Registry;

const TRACING_TARGET: &str = "flowc::markdown";

const NODES_HEADER: &str = "Nodes";
const LINKS_HEADER: &str = "Links";
const NODE_TYPE_KEY: &str = "node_type";

/// One `- key: value` list entry.
#[derive(Debug, Clone, Copy)]
struct Entry<'a> {
    line: usize,
    text: &'a str,
    key: &'a str,
    value: Option<&'a str>,
}

/// Split a list line into key and optional value. Blank lines yield `None`.
fn entry(line: usize, text: &str) -> Result<Option<Entry<'_>>, Diagnostic> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let Some(body) = trimmed.strip_prefix("- ") else {
        return Err(Diagnostic::new(GraphError::Malformed(
            "expected a list entry starting with '- '".to_string(),
        ))
        .with_location(line, text));
    };
    let (key, value) = match body.split_once(':') {
        Some((key, value)) if !value.trim().is_empty() => (key.trim(), Some(value.trim())),
        Some((key, _)) => (key.trim(), None),
        None => (body.trim(), None),
    };
    Ok(Some(Entry {
        line,
        text,
        key,
        value,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Nodes,
    Links,
}

#[derive(Debug)]
struct NodeDecl<'a> {
    header: Entry<'a>,
    node_type: Option<Entry<'a>>,
    params: Vec<Entry<'a>>,
}

// ── Parse ───────────────────────────────────────────────────────────────────

/// Parse the markdown form into a compiled graph.
pub fn parse(source: &str, registry: &Registry) -> Result<CompiledGraph, Diagnostic> {
    let mut section = Section::Preamble;
    let mut nodes: Vec<NodeDecl<'_>> = Vec::new();
    let mut links: Vec<Entry<'_>> = Vec::new();

    for (idx, text) in source.lines().enumerate() {
        let Some(e) = entry(idx + 1, text)? else { continue };
        let malformed = |msg: &str| {
            Diagnostic::new(GraphError::Malformed(msg.to_string())).with_location(e.line, e.text)
        };
        match (e.key, e.value) {
            (NODES_HEADER, None) => section = Section::Nodes,
            (LINKS_HEADER, None) => section = Section::Links,
            _ => match section {
                Section::Preamble => {
                    return Err(malformed("expected '- Nodes:' before any entry"))
                }
                Section::Nodes => match (e.value, nodes.last_mut()) {
                    (None, _) => nodes.push(NodeDecl {
                        header: e,
                        node_type: None,
                        params: Vec::new(),
                    }),
                    (Some(_), None) => {
                        return Err(malformed("node property outside of a node entry"))
                    }
                    (Some(_), Some(decl)) if e.key == NODE_TYPE_KEY => {
                        if decl.node_type.is_some() {
                            return Err(malformed("node_type given twice"));
                        }
                        decl.node_type = Some(e);
                    }
                    (Some(_), Some(decl)) => decl.params.push(e),
                },
                Section::Links => {
                    if e.value.is_none() {
                        return Err(malformed("expected '- L<id>: N<a>.port -> N<b>.port'"));
                    }
                    links.push(e);
                }
            },
        }
    }
    if section == Section::Preamble {
        return Err(Diagnostic::new(GraphError::Malformed(
            "missing '- Nodes:' section".to_string(),
        )));
    }

    let mut builder = GraphBuilder::new(registry);
    let mut node_ids = HashSet::new();
    for decl in &nodes {
        let header = &decl.header;
        let at_header = |err: GraphError| Diagnostic::new(err).with_location(header.line, header.text);
        let id = label_number(header.key, 'N').map(NodeId).ok_or_else(|| {
            at_header(GraphError::Malformed(format!(
                "expected a node label N<id>, found '{}'",
                header.key
            )))
        })?;
        if !node_ids.insert(id) {
            return Err(at_header(GraphError::DuplicateBinding(header.key.to_string())));
        }
        add_node(&mut builder, id, decl)?;
    }
    let mut link_ids = HashSet::new();
    for link in &links {
        let at_link = |err: GraphError| Diagnostic::new(err).with_location(link.line, link.text);
        let id = label_number(link.key, 'L').map(LinkId).ok_or_else(|| {
            at_link(GraphError::Malformed(format!(
                "expected a link label L<id>, found '{}'",
                link.key
            )))
        })?;
        if !link_ids.insert(id) {
            return Err(at_link(GraphError::DuplicateBinding(link.key.to_string())));
        }
        connect(&mut builder, id, link).map_err(at_link)?;
    }

    let graph = builder.finish();
    tracing::debug!(
        target: TRACING_TARGET,
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Parsed markdown"
    );
    Ok(graph)
}

/// Read a value as a literal; a bare word is not accepted.
fn literal(entry: &Entry<'_>) -> Result<Literal, Diagnostic> {
    let text = entry.value.unwrap_or_default();
    parse_literal(text).ok_or_else(|| {
        Diagnostic::new(GraphError::Malformed(format!(
            "'{text}' is not a literal; quote strings"
        )))
        .with_location(entry.line, entry.text)
    })
}

/// Number of an `N<id>` or `L<id>` label.
fn label_number(label: &str, prefix: char) -> Option<u32> {
    let digits = label.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Exact match first, then case-insensitive.
fn match_name<'n>(names: impl Iterator<Item = &'n str> + Clone, wanted: &str) -> Option<&'n str> {
    names.clone().find(|n| *n == wanted).or_else(|| {
        let lower = wanted.to_lowercase();
        names.into_iter().find(|n| n.to_lowercase() == lower)
    })
}

fn add_node(b: &mut GraphBuilder<'_>, id: NodeId, decl: &NodeDecl<'_>) -> Result<NodeId, Diagnostic> {
    let at_header = |err: GraphError| {
        Diagnostic::new(err).with_location(decl.header.line, decl.header.text)
    };
    let type_entry = decl.node_type.as_ref().ok_or_else(|| {
        at_header(GraphError::Malformed(format!(
            "node {} has no node_type",
            decl.header.key
        )))
    })?;
    let type_token = match literal(type_entry)? {
        Literal::Str(s) => s,
        _ => {
            return Err(Diagnostic::new(GraphError::Malformed(
                "node_type must be a quoted string".to_string(),
            ))
            .with_location(type_entry.line, type_entry.text))
        }
    };

    let registry = b.registry();
    let type_name = ident::resolve(&type_token, TokenForm::Quoted, |t| {
        registry.lookup(t).is_some()
    });
    let schema = registry.lookup(&type_name);

    let mut params = Vec::with_capacity(decl.params.len());
    for p in &decl.params {
        let name = schema
            .and_then(|s| match_name(s.params.iter().map(|x| x.name.as_str()), p.key))
            .unwrap_or(p.key);
        params.push((name.to_string(), literal(p)?));
    }

    let location = type_entry;
    b.add_node_with_id(id, &type_name, &params)
        .map_err(|err| Diagnostic::new(err).with_location(location.line, location.text))
}

/// Split `N1.port` into label and port.
fn endpoint(text: &str) -> Result<(&str, &str), GraphError> {
    text.trim()
        .split_once('.')
        .map(|(label, port)| (label.trim(), port.trim()))
        .ok_or_else(|| GraphError::Malformed(format!("expected <node>.<port>, found '{text}'")))
}

fn connect(b: &mut GraphBuilder<'_>, id: LinkId, link: &Entry<'_>) -> Result<(), GraphError> {
    let value = link.value.unwrap_or_default();
    let (source, target) = value
        .split_once("->")
        .ok_or_else(|| GraphError::Malformed("expected '<source> -> <target>'".to_string()))?;
    let (source_label, source_port) = endpoint(source)?;
    let (target_label, target_port) = endpoint(target)?;

    let graph = b.graph();
    let node_for = |label: &str| {
        let node = label_number(label, 'N').map(NodeId).ok_or_else(|| {
            GraphError::Malformed(format!("expected a node label N<id>, found '{label}'"))
        })?;
        graph
            .node(node)
            .map(|n| n.id)
            .ok_or_else(|| GraphError::UsedBeforeDefined(label.to_string()))
    };
    let source_id = node_for(source_label)?;
    let target_id = node_for(target_label)?;

    let source_node = b.graph().node(source_id).ok_or(GraphError::UnknownNode(source_id))?;
    let slot = match_name(source_node.outputs.iter().map(|o| o.name.as_str()), source_port)
        .and_then(|name| source_node.output(name))
        .map(|(slot, _)| slot)
        .ok_or_else(|| unknown_port(source_node, source_port))?;

    let target_node = b.graph().node(target_id).ok_or(GraphError::UnknownNode(target_id))?;
    let port = match_name(target_node.inputs.iter().map(|i| i.name.as_str()), target_port)
        .or_else(|| match_name(target_node.params.iter().map(|p| p.name.as_str()), target_port))
        .map(str::to_string)
        .ok_or_else(|| unknown_port(target_node, target_port))?;

    b.connect_with_id(
        id,
        SourceRef::Output {
            node: source_id,
            slot,
        },
        target_id,
        &port,
    )?;
    Ok(())
}

fn unknown_port(node: &Node, port: &str) -> GraphError {
    GraphError::UnknownPort {
        node: node.id,
        node_type: node.type_name.clone(),
        port: port.to_string(),
    }
}

// ── Serialize ───────────────────────────────────────────────────────────────

/// Serialize a compiled graph in the markdown form. Infallible: the
/// markdown form needs no emission order.
pub fn serialize(graph: &CompiledGraph) -> String {
    let mut out = String::new();
    writeln!(out, "- {NODES_HEADER}:").unwrap();
    let mut nodes: Vec<_> = graph.nodes.iter().collect();
    nodes.sort_by_key(|n| n.id);
    for node in nodes {
        writeln!(out, "    - N{}:", node.id).unwrap();
        writeln!(
            out,
            "        - {NODE_TYPE_KEY}: {}",
            Literal::Str(node.type_name.clone()).to_code(Quote::Double)
        ).unwrap();
        for (name, lit) in node.literal_params() {
            writeln!(out, "        - {}: {}", name, lit.to_code(Quote::Double)).unwrap();
        }
    }

    writeln!(out).unwrap();
    writeln!(out, "- {LINKS_HEADER}:").unwrap();
    let mut links: Vec<_> = graph.links.iter().collect();
    links.sort_by_key(|l| l.id);
    for link in links {
        let source = graph
            .node(link.source)
            .and_then(|n| n.outputs.get(link.source_slot))
            .map(|p| p.name.to_lowercase())
            .unwrap_or_default();
        let target = graph
            .node(link.target)
            .and_then(|n| n.inputs.get(link.target_slot))
            .map(|p| p.name.to_lowercase())
            .unwrap_or_default();
        writeln!(
            out,
            "    - L{}: N{}.{} -> N{}.{}",
            link.id, link.source, source, link.target, target
        ).unwrap();
    }

    tracing::debug!(
        target: TRACING_TARGET,
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Serialized markdown"
    );
    out
}

// ── Tests ───────────────────────────────────────────────────────────────────
