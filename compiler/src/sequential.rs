// sequential.rs — Sequential-code codec
//
// Surface form: a flat list of Python-like statements.
//
//   # create nodes by instantiation
//   checkpointloader_1 = CheckpointLoader(ckpt="""m.safetensors""")
//   textencode_2 = TextEncode(text="""a cat""")
//
//   # link nodes by invocation
//   model_1, clip_1, vae_1 = checkpointloader_1()
//   conditioning_2 = textencode_2(clip=clip_1)
//
// The first use of a callee instantiates a node type; a call on a bound
// instance name invokes it. Invocation keywords naming a tensor connect,
// literal keywords set the parameter, `None` leaves an input unlinked.
//
// Preconditions: node types resolve in the registry.
// Postconditions: `parse` returns a graph with dense ids in statement order;
//                 `serialize` emits instantiations in id order and
//                 invocations in topological order.
// Failure modes: malformed statements and Graph IR errors → `Diagnostic`
//                carrying the offending statement; cycles → deadlock.
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

const TRACING_TARGET: &str = "flowc::sequential";

const CREATE_HEADER: &str = "# create nodes by instantiation";
const LINK_HEADER: &str = "# link nodes by invocation";

// ── Parse ───────────────────────────────────────────────────────────────────

/// Parse sequential code into a compiled graph.
pub fn parse(source: &str, registry: &Registry) -> Result<CompiledGraph, Diagnostic> {
    let program = parser::parse_program(source)?;
    let mut builder = GraphBuilder::new(registry);
    for stmt in &program.statements {
        apply(&mut builder, stmt).map_err(|e| Diagnostic::new(e).at(source, stmt.span))?;
    }
    let graph = builder.finish();
    tracing::debug!(
        target: TRACING_TARGET,
        statements = program.statements.len(),
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        "Parsed sequential code"
    );
    Ok(graph)
}

fn apply(b: &mut GraphBuilder<'_>, stmt: &Statement) -> Result<(), GraphError> {
    let call = stmt.call();
    let [callee] = call.callee.as_slice() else {
        return Err(GraphError::Malformed(format!(
            "expected a node type or instance name, found '{}'",
            call.callee_path()
        )));
    };
    match b.lookup_node(&callee.name) {
        Some(node) => invoke(b, node, stmt),
        None => instantiate(b, &callee.name, stmt),
    }
}

fn instantiate(b: &mut GraphBuilder<'_>, type_token: &str, stmt: &Statement) -> Result<(), GraphError> {
    let [instance] = stmt.targets() else {
        return Err(GraphError::Malformed(
            "an instantiation binds exactly one instance name".to_string(),
        ));
    };
    if b.is_bound(&instance.name) {
        return Err(GraphError::DuplicateBinding(instance.name.clone()));
    }

    let registry = b.registry();
    let type_name = ident::resolve(type_token, TokenForm::Identifier, |t| {
        registry.lookup(t).is_some()
    });
    let schema = registry.lookup(&type_name);

    let mut params = Vec::with_capacity(stmt.call().args.len());
    for arg in &stmt.call().args {
        match arg {
            Arg::Keyword(key, Expr::Literal(lit, _)) => {
                let name = ident::resolve(&key.name, TokenForm::Identifier, |p| {
                    schema.is_some_and(|s| s.param(p).is_some())
                });
                params.push((name, lit.clone()));
            }
            Arg::Keyword(key, _) => {
                return Err(GraphError::Malformed(format!(
                    "parameter '{}' must be a literal when instantiating",
                    key.name
                )))
            }
            Arg::Positional(_) => {
                return Err(GraphError::Malformed(
                    "parameters are passed by name, as name=value".to_string(),
                ))
            }
        }
    }

    let node = b.add_node(&type_name, &params)?;
    b.bind_node(&instance.name, node)
}

fn invoke(b: &mut GraphBuilder<'_>, node: NodeId, stmt: &Statement) -> Result<(), GraphError> {
    for arg in &stmt.call().args {
        let Arg::Keyword(key, value) = arg else {
            return Err(GraphError::Malformed(
                "inputs are passed by port name, as port=tensor".to_string(),
            ));
        };
        let (port, is_input) = {
            let target = b.graph().node(node).ok_or(GraphError::UnknownNode(node))?;
            let port = ident::resolve(&key.name, TokenForm::Identifier, |p| {
                target.input(p).is_some() || target.param(p).is_some()
            });
            let is_input = target.input(&port).is_some();
            (port, is_input)
        };
        match value {
            Expr::Name(var) => {
                b.connect(SourceRef::Tensor(&var.name), node, &port)?;
            }
            Expr::Literal(Literal::Null, _) if is_input => {}
            Expr::Literal(_, _) if is_input => {
                return Err(GraphError::Malformed(format!(
                    "input '{port}' takes a tensor name or None"
                )))
            }
            Expr::Literal(lit, _) => b.set_parameter(node, &port, lit.clone())?,
            Expr::List(..) | Expr::Dict(..) => {
                return Err(GraphError::Malformed(format!(
                    "argument '{port}' must be a tensor name or a literal"
                )))
            }
        }
    }

    let outputs = b.graph().node(node).map_or(0, |n| n.outputs.len());
    let targets: Vec<String> = stmt.targets().iter().map(|t| t.name.clone()).collect();
    // A zero-output node may bind one placeholder name; it names nothing.
    let names = if outputs == 0 && targets.len() <= 1 {
        Vec::new()
    } else {
        targets
    };
    b.invoke(node, &names)
}

// ── Serialize ───────────────────────────────────────────────────────────────

/// Serialize a compiled graph as sequential code.
pub fn serialize(graph: &CompiledGraph) -> Result<String, Diagnostic> {
    let order = topo::emission_order(graph)?;
    let names = NameTable::new(graph);
    let mut out = String::new();

    writeln!(out, "{CREATE_HEADER}").unwrap();
    let mut nodes: Vec<_> = graph.nodes.iter().collect();
    nodes.sort_by_key(|n| n.id);
    for node in nodes {
        let params: Vec<String> = node
            .literal_params()
            .map(|(name, lit)| format!("{}={}", ident::encode(name), lit.to_code(Quote::Triple)))
            .collect();
        writeln!(
            out,
            "{} = {}({})",
            names.instance(node.id),
            ident::encode(&node.type_name),
            params.join(", ")
        ).unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "{LINK_HEADER}").unwrap();
    for id in order.nodes() {
        let Some(node) = graph.node(id) else { continue };
        let args: Vec<String> = node
            .inputs
            .iter()
            .map(|port| {
                let value = port
                    .link
                    .and_then(|l| graph.link(l))
                    .and_then(|l| names.tensor(l.source, l.source_slot))
                    .unwrap_or("None");
                format!("{}={}", ident::encode(&port.name), value)
            })
            .collect();
        let targets = match names.placeholder(id) {
            Some(placeholder) => placeholder.to_string(),
            None => names.outputs(node).join(", "),
        };
        writeln!(
            out,
            "{} = {}({})",
            targets,
            names.instance(id),
            args.join(", ")
        ).unwrap();
    }

    tracing::debug!(
        target: TRACING_TARGET,
        nodes = graph.nodes.len(),
        passes = order.passes.len(),
        "Serialized sequential code"
    );
    Ok(out)
}

// ── Tests ───────────────────────────────────────────────────────────────────
