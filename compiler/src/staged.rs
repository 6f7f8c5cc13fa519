// staged.rs — Staged-call codec
//
// Surface form: three labelled blocks of method calls on a workflow object.
//
//   # Add Node
//   workflow.add_node("checkpointloader_1", "CheckpointLoader", {"ckpt": "m.safetensors"})
//   # Invoke Node
//   workflow.invoke_node(["model_1", "clip_1", "vae_1"], "checkpointloader_1")
//   # Link Node
//   workflow.connect("clip_1", "textencode_2", "clip")
//
// Parsing applies every add, then every invoke, then every connect,
// whatever order the statements appear in.
//
// Preconditions: node types resolve in the registry.
// Postconditions: `serialize` emits adds in id order, invokes in
//                 topological order and connects in link-id order.
// Failure modes: unknown calls, wrong argument shapes and Graph IR errors
//                → `Diagnostic` carrying the offending statement.
// Side effects: none.

use std::fmt::Write;

use crate::ast::{Arg, Expr, Statement};
use crate::diag::Diagnostic;
use crate::error::GraphError;
use crate::graph::{CompiledGraph, GraphBuilder, SourceRef};
use crate::id::NodeId;
use crate::ident::{self, TokenForm};
use crate::literal::{Literal, Quote};
use crate::naming::NameTable;
use crate::parser;
use crate::registry::Registry;
use crate::topo;

const TRACING_TARGET: &str = "flowc::staged";

const RECEIVER: &str = "workflow";

const ADD_HEADER: &str = "# Add Node";
const INVOKE_HEADER: &str = "# Invoke Node";
const LINK_HEADER: &str = "# Link Node";

/// One recognised staged call, with its arguments extracted.
#[derive(Debug)]
enum Step<'a> {
    Add {
        name: &'a str,
        type_name: &'a str,
        params: Vec<(&'a str, &'a Literal)>,
    },
    Invoke {
        outputs: Vec<&'a str>,
        node: &'a str,
    },
    Connect {
        tensor: &'a str,
        node: &'a str,
        port: &'a str,
    },
}

impl Step<'_> {
    fn stage(&self) -> u8 {
        match self {
            Step::Add { .. } => 0,
            Step::Invoke { .. } => 1,
            Step::Connect { .. } => 2,
        }
    }
}

// ── Parse ───────────────────────────────────────────────────────────────────

/// Parse staged calls into a compiled graph.
pub fn parse(source: &str, registry: &Registry) -> Result<CompiledGraph, Diagnostic> {
    let program = parser::parse_program(source)?;

    let mut steps = Vec::with_capacity(program.statements.len());
    for stmt in &program.statements {
        let step = classify(stmt).map_err(|e| Diagnostic::new(e).at(source, stmt.span))?;
        steps.push((step, stmt.span));
    }
    // Stable: statement order is kept within each stage.
    steps.sort_by_key(|(step, _)| step.stage());

    let mut builder = GraphBuilder::new(registry);
    for (step, span) in &steps {
        apply(&mut builder, step).map_err(|e| Diagnostic::new(e).at(source, *span))?;
    }
    let graph = builder.finish();
    tracing::debug!(
        target: TRACING_TARGET,
        statements = steps.len(),
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Parsed staged calls"
    );
    Ok(graph)
}

fn malformed(message: impl Into<String>) -> GraphError {
    GraphError::Malformed(message.into())
}

fn positional<'a>(stmt: &'a Statement) -> Result<Vec<&'a Expr>, GraphError> {
    stmt.call()
        .args
        .iter()
        .map(|arg| match arg {
            Arg::Positional(expr) => Ok(expr),
            Arg::Keyword(key, _) => Err(malformed(format!(
                "unexpected keyword argument '{}'; staged calls take positional arguments",
                key.name
            ))),
        })
        .collect()
}

fn string_arg<'a>(expr: &'a Expr, what: &str) -> Result<&'a str, GraphError> {
    expr.as_str()
        .ok_or_else(|| malformed(format!("{what} must be a string")))
}

fn classify(stmt: &Statement) -> Result<Step<'_>, GraphError> {
    if !stmt.targets().is_empty() {
        return Err(malformed("staged calls are not assigned to names"));
    }
    let call = stmt.call();
    let method = match call.callee.as_slice() {
        [receiver, method] if receiver.name == RECEIVER => method.name.as_str(),
        _ => {
            return Err(malformed(format!(
                "expected workflow.add_node, workflow.invoke_node or workflow.connect, found '{}'",
                call.callee_path()
            )))
        }
    };
    let args = positional(stmt)?;

    match (method, args.as_slice()) {
        ("add_node", [name, type_name, rest @ ..]) if rest.len() <= 1 => {
            let mut params = Vec::new();
            if let Some(dict) = rest.first() {
                let Expr::Dict(entries, _) = *dict else {
                    return Err(malformed("add_node parameters must be a dict"));
                };
                for (key, value) in entries {
                    let key = string_arg(key, "parameter name")?;
                    let value = value
                        .as_literal()
                        .ok_or_else(|| malformed(format!("parameter '{key}' must be a literal")))?;
                    params.push((key, value));
                }
            }
            Ok(Step::Add {
                name: string_arg(*name, "node name")?,
                type_name: string_arg(*type_name, "node type")?,
                params,
            })
        }
        ("invoke_node", [outputs, node]) => {
            let Expr::List(items, _) = *outputs else {
                return Err(malformed("invoke_node outputs must be a list of names"));
            };
            let outputs = items
                .iter()
                .map(|item| string_arg(item, "output name"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Step::Invoke {
                outputs,
                node: string_arg(*node, "node name")?,
            })
        }
        ("connect", [tensor, node, port]) => Ok(Step::Connect {
            tensor: string_arg(*tensor, "tensor name")?,
            node: string_arg(*node, "node name")?,
            port: string_arg(*port, "port name")?,
        }),
        ("add_node", _) => Err(malformed("usage: add_node(name, type, {params})")),
        ("invoke_node", _) => Err(malformed("usage: invoke_node([outputs], name)")),
        ("connect", _) => Err(malformed("usage: connect(tensor, node, port)")),
        (other, _) => Err(malformed(format!("unknown workflow call '{other}'"))),
    }
}

fn node_named(b: &GraphBuilder<'_>, name: &str) -> Result<NodeId, GraphError> {
    b.lookup_node(name)
        .ok_or_else(|| GraphError::UsedBeforeDefined(name.to_string()))
}

fn apply(b: &mut GraphBuilder<'_>, step: &Step<'_>) -> Result<(), GraphError> {
    match step {
        Step::Add {
            name,
            type_name,
            params,
        } => {
            if b.is_bound(name) {
                return Err(GraphError::DuplicateBinding(name.to_string()));
            }
            let registry = b.registry();
            let type_name = ident::resolve(type_name, TokenForm::Quoted, |t| {
                registry.lookup(t).is_some()
            });
            let schema = registry.lookup(&type_name);
            let params: Vec<(String, Literal)> = params
                .iter()
                .map(|(key, value)| {
                    let key = ident::resolve(key, TokenForm::Quoted, |p| {
                        schema.is_some_and(|s| s.param(p).is_some())
                    });
                    (key, Literal::clone(value))
                })
                .collect();
            let node = b.add_node(&type_name, &params)?;
            b.bind_node(name, node)
        }
        Step::Invoke { outputs, node } => {
            let node = node_named(b, node)?;
            let names: Vec<String> = outputs.iter().map(|s| s.to_string()).collect();
            b.invoke(node, &names)
        }
        Step::Connect { tensor, node, port } => {
            let target = node_named(b, node)?;
            let port = {
                let target_node = b.graph().node(target).ok_or(GraphError::UnknownNode(target))?;
                ident::resolve(port, TokenForm::Quoted, |p| {
                    target_node.input(p).is_some() || target_node.param(p).is_some()
                })
            };
            b.connect(SourceRef::Tensor(*tensor), target, &port)?;
            Ok(())
        }
    }
}

// ── Serialize ───────────────────────────────────────────────────────────────

fn quoted(s: &str) -> String {
    Literal::Str(s.to_string()).to_code(Quote::Double)
}

/// Serialize a compiled graph as staged calls.
pub fn serialize(graph: &CompiledGraph) -> Result<String, Diagnostic> {
    let order = topo::emission_order(graph)?;
    let names = NameTable::new(graph);
    let mut out = String::new();

    writeln!(out, "{ADD_HEADER}").unwrap();
    let mut nodes: Vec<_> = graph.nodes.iter().collect();
    nodes.sort_by_key(|n| n.id);
    for node in nodes {
        let params: Vec<String> = node
            .literal_params()
            .map(|(name, lit)| format!("{}: {}", quoted(name), lit.to_code(Quote::Double)))
            .collect();
        writeln!(
            out,
            "workflow.add_node({}, {}, {{{}}})",
            quoted(names.instance(node.id)),
            quoted(&node.type_name),
            params.join(", ")
        ).unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "{INVOKE_HEADER}").unwrap();
    for id in order.nodes() {
        let Some(node) = graph.node(id) else { continue };
        let outputs: Vec<String> = names.outputs(node).into_iter().map(quoted).collect();
        writeln!(
            out,
            "workflow.invoke_node([{}], {})",
            outputs.join(", "),
            quoted(names.instance(id))
        ).unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "{LINK_HEADER}").unwrap();
    let mut links: Vec<_> = graph.links.iter().collect();
    links.sort_by_key(|l| l.id);
    for link in links {
        let tensor = names.tensor(link.source, link.source_slot).unwrap_or_default();
        let port = graph
            .node(link.target)
            .and_then(|n| n.inputs.get(link.target_slot))
            .map(|p| p.name.as_str())
            .unwrap_or_default();
        writeln!(
            out,
            "workflow.connect({}, {}, {})",
            quoted(tensor),
            quoted(names.instance(link.target)),
            quoted(port)
        ).unwrap();
    }

    tracing::debug!(
        target: TRACING_TARGET,
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Serialized staged calls"
    );
    Ok(out)
}

// ── Tests ───────────────────────────────────────────────────────────────────
