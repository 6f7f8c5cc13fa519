// export.rs — Workflow JSON and engine prompt
//
// The execution engine's two interchange formats:
//
// - workflow JSON: `{nodes, links, groups, config, extra, version}` with
//   links as `[id, source, source_slot, target, target_slot, type]` and
//   parameter values in `widgets_values`;
// - API prompt: `{"<id>": {"class_type": .., "inputs": {..}}}`, where a
//   linked input is `["<source id>", source_slot]`.
//
// Preconditions: imported JSON names node types the registry knows.
// Postconditions: import preserves node and link ids; the imported graph
//                 satisfies every structural invariant except acyclicity.
// Failure modes: undecodable or inconsistent JSON → `Diagnostic`
//                (InvalidGraph); Graph IR errors pass through.
// Side effects: none.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::diag::Diagnostic;
use crate::error::GraphError;
use crate::graph::{CompiledGraph, GraphBuilder, SourceRef};
use crate::id::{LinkId, NodeId};
use crate::literal::Literal;
use crate::registry::{DataType, Registry};
use crate::verify::{verify_graph, StageCert};

const TRACING_TARGET: &str = "flowc::export";

/// Format version written to exported workflows.
pub const WORKFLOW_VERSION: f64 = 0.4;

// ── Workflow JSON model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJson {
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub links: Vec<WorkflowLink>,
    #[serde(default)]
    pub groups: Vec<Value>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default = "default_version")]
    pub version: Value,
}

fn default_version() -> Value {
    json!(WORKFLOW_VERSION)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub inputs: Vec<WorkflowInput>,
    #[serde(default)]
    pub outputs: Vec<WorkflowOutput>,
    #[serde(default)]
    pub widgets_values: Widgets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: DataType,
    #[serde(default)]
    pub link: Option<LinkId>,
    #[serde(default)]
    pub slot_index: Option<usize>,
    /// Present on an input made from a parameter slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutput {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: DataType,
    #[serde(default)]
    pub links: Option<Vec<LinkId>>,
    #[serde(default)]
    pub slot_index: Option<usize>,
}

/// `[id, source, source_slot, target, target_slot, type]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowLink(
    pub LinkId,
    pub NodeId,
    pub usize,
    pub NodeId,
    pub usize,
    pub DataType,
);

/// Parameter values, positional or keyed by parameter name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Widgets {
    List(Vec<Literal>),
    Map(BTreeMap<String, Literal>),
}

impl Default for Widgets {
    fn default() -> Self {
        Widgets::List(Vec::new())
    }
}

// ── Export ──────────────────────────────────────────────────────────────────

/// Build the workflow JSON for a graph. Promoted parameter slots export
/// `null` in `widgets_values` and a `widget` marker on their input.
pub fn to_workflow_json(graph: &CompiledGraph) -> WorkflowJson {
    let nodes = graph
        .nodes
        .iter()
        .map(|node| WorkflowNode {
            id: node.id,
            type_name: node.type_name.clone(),
            inputs: node
                .inputs
                .iter()
                .enumerate()
                .map(|(slot, port)| WorkflowInput {
                    name: port.name.clone(),
                    ty: port.ty.clone(),
                    link: port.link,
                    slot_index: Some(slot),
                    widget: port.promoted.then(|| WidgetRef {
                        name: port.name.clone(),
                    }),
                })
                .collect(),
            outputs: node
                .outputs
                .iter()
                .enumerate()
                .map(|(slot, port)| WorkflowOutput {
                    name: port.name.clone(),
                    ty: port.ty.clone(),
                    links: Some(port.links.clone()),
                    slot_index: Some(slot),
                })
                .collect(),
            widgets_values: Widgets::List(
                node.params
                    .iter()
                    .map(|p| p.literal().cloned().unwrap_or(Literal::Null))
                    .collect(),
            ),
        })
        .collect();

    let links = graph
        .links
        .iter()
        .map(|l| WorkflowLink(l.id, l.source, l.source_slot, l.target, l.target_slot, l.ty.clone()))
        .collect();

    tracing::debug!(
        target: TRACING_TARGET,
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Exported workflow JSON"
    );
    WorkflowJson {
        nodes,
        links,
        groups: Vec::new(),
        config: Map::new(),
        extra: Map::new(),
        version: default_version(),
    }
}

/// Build the engine's API prompt. Unlinked inputs are omitted; a promoted
/// parameter appears as a link, never as its literal.
pub fn to_api_prompt(graph: &CompiledGraph) -> Value {
    let mut prompt = Map::new();
    for node in &graph.nodes {
        let mut inputs = Map::new();
        for (name, lit) in node.literal_params() {
            inputs.insert(name.to_string(), lit.to_json());
        }
        for port in &node.inputs {
            let Some(link) = port.link.and_then(|l| graph.link(l)) else { continue };
            inputs.insert(
                port.name.clone(),
                json!([link.source.to_string(), link.source_slot]),
            );
        }
        prompt.insert(
            node.id.to_string(),
            json!({ "inputs": inputs, "class_type": node.type_name }),
        );
    }
    Value::Object(prompt)
}

// ── Import ──────────────────────────────────────────────────────────────────

fn invalid(msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(GraphError::InvalidGraph(msg.into()))
}

/// Rebuild a compiled graph from workflow JSON text.
pub fn from_workflow_json(text: &str, registry: &Registry) -> Result<CompiledGraph, Diagnostic> {
    let workflow: WorkflowJson = serde_json::from_str(text).map_err(|e| {
        invalid(format!("cannot decode workflow JSON: {e}"))
            .with_hint("expected an object with 'nodes' and 'links' arrays")
    })?;
    from_workflow(&workflow, registry)
}

/// Rebuild a compiled graph from decoded workflow JSON.
pub fn from_workflow(workflow: &WorkflowJson, registry: &Registry) -> Result<CompiledGraph, Diagnostic> {
    let mut builder = GraphBuilder::new(registry);

    for node in &workflow.nodes {
        let params = widget_params(node, registry)?;
        builder
            .add_node_with_id(node.id, &node.type_name, &params)
            .map_err(Diagnostic::new)?;
    }

    // Promoted inputs take the next free slot, so connect in slot order.
    let mut links: Vec<&WorkflowLink> = workflow.links.iter().collect();
    links.sort_by_key(|l| (l.3, l.4));
    for link in links {
        let WorkflowLink(id, source, source_slot, target, target_slot, declared) = link;
        let port = target_port(workflow, builder.graph(), *target, *target_slot)?;
        let created = builder
            .connect_with_id(
                *id,
                SourceRef::Output {
                    node: *source,
                    slot: *source_slot,
                },
                *target,
                &port,
            )
            .map_err(Diagnostic::new)?;
        let actual = builder.graph().link(created).map(|l| (l.target_slot, l.ty.clone()));
        match actual {
            Some((slot, _)) if slot != *target_slot => {
                return Err(invalid(format!(
                    "link {id} targets slot {target_slot} of node {target}, but '{port}' is slot {slot}"
                )))
            }
            Some((_, ty)) if ty != *declared && declared.as_str() != "*" => {
                return Err(invalid(format!(
                    "link {id} declares type {declared} but its source produces {ty}"
                )))
            }
            _ => {}
        }
    }

    let graph = builder.finish();
    check_references(workflow, &graph)?;

    let cert = verify_graph(&graph);
    let failures: Vec<&str> = cert
        .failures()
        .into_iter()
        .filter(|name| *name != "G4_acyclic")
        .collect();
    if !failures.is_empty() {
        return Err(invalid(format!("failed obligations: {}", failures.join(", "))));
    }

    tracing::debug!(
        target: TRACING_TARGET,
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Imported workflow JSON"
    );
    Ok(graph)
}

/// Parameter overrides from `widgets_values`.
fn widget_params(node: &WorkflowNode, registry: &Registry) -> Result<Vec<(String, Literal)>, Diagnostic> {
    match &node.widgets_values {
        Widgets::Map(values) => Ok(values.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Widgets::List(values) => {
            let schema = registry
                .lookup(&node.type_name)
                .ok_or_else(|| Diagnostic::new(GraphError::UnknownNodeType(node.type_name.clone())))?;
            if values.len() > schema.params.len() {
                return Err(invalid(format!(
                    "node {} ({}) has {} widget values for {} parameters",
                    node.id,
                    node.type_name,
                    values.len(),
                    schema.params.len()
                )));
            }
            Ok(schema
                .params
                .iter()
                .zip(values)
                .map(|(p, v)| (p.name.clone(), v.clone()))
                .collect())
        }
    }
}

/// Name of the input a link lands on: the node's own input list first,
/// then the schema input at that position.
fn target_port(
    workflow: &WorkflowJson,
    graph: &CompiledGraph,
    target: NodeId,
    slot: usize,
) -> Result<String, Diagnostic> {
    let listed = workflow
        .nodes
        .iter()
        .find(|n| n.id == target)
        .and_then(|n| {
            n.inputs
                .iter()
                .enumerate()
                .find(|(pos, input)| input.slot_index.unwrap_or(*pos) == slot)
                .map(|(_, input)| input.name.clone())
        });
    listed
        .or_else(|| {
            graph
                .node(target)
                .and_then(|n| n.inputs.get(slot))
                .map(|p| p.name.clone())
        })
        .ok_or_else(|| invalid(format!("no input at slot {slot} of node {target}")))
}

/// The node records' own link fields must agree with the links array.
fn check_references(workflow: &WorkflowJson, graph: &CompiledGraph) -> Result<(), Diagnostic> {
    for node in &workflow.nodes {
        for input in &node.inputs {
            let Some(id) = input.link else { continue };
            let landed = graph.link(id).filter(|l| l.target == node.id).and_then(|l| {
                graph
                    .node(node.id)
                    .and_then(|n| n.inputs.get(l.target_slot))
            });
            let ok = landed.is_some_and(|p| p.name == input.name);
            if !ok {
                return Err(invalid(format!(
                    "input '{}' of node {} references link {id}, which does not target it",
                    input.name, node.id
                )));
            }
        }
        for output in &node.outputs {
            for id in output.links.iter().flatten() {
                if !graph.link(*id).is_some_and(|l| l.source == node.id) {
                    return Err(invalid(format!(
                        "output '{}' of node {} lists link {id}, which does not start there",
                        output.name, node.id
                    )));
                }
            }
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
