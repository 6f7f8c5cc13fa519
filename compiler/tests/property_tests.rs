// Property-based tests for compiler invariants.
//
// Three categories:
// 1. Round trip: generated graphs serialize and parse back to the same text
//    in every textual form, and all forms agree up to link ids. A second
//    generator draws sparse ids, promotes parameters and links into nodes
//    created before their producers.
// 2. Type safety: `connect` succeeds exactly when the link types check, and
//    a rejected connection leaves the graph untouched
// 3. Identifier codec: decode(encode(x)) == x for arbitrary display names
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use flowc::graph::{check_link_types, CompiledGraph, GraphBuilder, SourceRef};
use flowc::id::{LinkId, NodeId};
use flowc::literal::Literal;
use flowc::registry::{NodeSchema, Registry};
use flowc::verify::StageCert;
use flowc::{ident, markdown, natural, sequential, staged};
use proptest::prelude::*;

// ── Test helpers ────────────────────────────────────────────────────────────

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn load_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .load_dir(&project_root().join("templates"))
        .unwrap_or_else(|e| panic!("failed to load templates: {e}"));
    registry
}

/// Templates plus scalar producers, so parameters can be promoted.
fn load_registry_with_scalars() -> Registry {
    let mut registry = load_registry();
    for schema in [
        NodeSchema::new("Seed")
            .with_param("value", "INT", Literal::Int(0))
            .with_output("INT", "INT"),
        NodeSchema::new("Ratio")
            .with_param("value", "FLOAT", Literal::Float(1.0))
            .with_output("FLOAT", "FLOAT"),
        NodeSchema::new("Prompt")
            .with_param("text", "STRING", Literal::Str(String::new()))
            .with_output("STRING", "STRING"),
    ] {
        registry.insert(schema).unwrap();
    }
    registry
}

/// Template types in a fixed order, so generated indices are stable.
fn type_names(registry: &Registry) -> Vec<String> {
    let mut names: Vec<String> = registry.schemas().map(|s| s.type_name.clone()).collect();
    names.sort();
    names
}

fn signature(graph: &CompiledGraph) -> (Vec<String>, BTreeSet<String>) {
    let nodes = graph
        .nodes
        .iter()
        .map(|n| {
            let params: Vec<String> = n
                .literal_params()
                .map(|(name, lit)| format!("{name}={lit}"))
                .collect();
            format!("{} {} [{}]", n.id, n.type_name, params.join(", "))
        })
        .collect();
    let links = graph
        .links
        .iter()
        .map(|l| format!("{}:{} -> {}:{}", l.source, l.source_slot, l.target, l.target_slot))
        .collect();
    (nodes, links)
}

/// Like `signature`, with node ids replaced by their rank in id order and
/// input port names included, for codecs that renumber nodes.
fn shape(graph: &CompiledGraph) -> (Vec<String>, BTreeSet<String>) {
    let mut ids: Vec<NodeId> = graph.nodes.iter().map(|n| n.id).collect();
    ids.sort();
    let pos = |id: NodeId| ids.binary_search(&id).unwrap();
    let nodes = graph
        .nodes
        .iter()
        .map(|n| {
            let params: Vec<String> = n
                .literal_params()
                .map(|(name, lit)| format!("{name}={lit}"))
                .collect();
            let inputs: Vec<&str> = n.inputs.iter().map(|p| p.name.as_str()).collect();
            format!(
                "{} {} [{}] ({})",
                pos(n.id),
                n.type_name,
                params.join(", "),
                inputs.join(", ")
            )
        })
        .collect();
    let links = graph
        .links
        .iter()
        .map(|l| {
            format!(
                "{}:{} -> {}:{}",
                pos(l.source),
                l.source_slot,
                pos(l.target),
                l.target_slot
            )
        })
        .collect();
    (nodes, links)
}

// ── Graph generator ─────────────────────────────────────────────────────────

/// One node: a type index, bits choosing which inputs to link and from
/// where, and a text value for string parameters.
type NodeGen = (usize, u64, String);

fn arb_nodes() -> impl Strategy<Value = Vec<NodeGen>> {
    prop::collection::vec((0usize..64, any::<u64>(), "[a-z ,.:'\"\\\\]{0,12}"), 1..8)
}

/// Build an acyclic graph: inputs only link to outputs of earlier nodes
/// with the same type.
fn build(registry: &Registry, nodes: &[NodeGen]) -> CompiledGraph {
    let types = type_names(registry);
    let mut b = GraphBuilder::new(registry);
    for (type_idx, bits, text) in nodes {
        let type_name = &types[type_idx % types.len()];
        let schema = registry.lookup(type_name).unwrap();
        let params: Vec<(String, Literal)> = schema
            .params
            .iter()
            .filter_map(|p| match p.ty.as_str() {
                "STRING" => Some((p.name.clone(), Literal::Str(text.clone()))),
                "INT" => Some((p.name.clone(), Literal::Int((bits & 0xffff) as i64))),
                _ => None,
            })
            .collect();
        let id = b.add_node(type_name, &params).unwrap();

        for (slot, input) in schema.inputs.iter().enumerate() {
            if bits >> slot & 1 == 0 {
                continue;
            }
            let candidates: Vec<(NodeId, usize)> = b
                .graph()
                .nodes
                .iter()
                .filter(|n| n.id != id)
                .flat_map(|n| {
                    n.outputs
                        .iter()
                        .enumerate()
                        .filter(|(_, o)| o.ty == input.ty)
                        .map(move |(s, _)| (n.id, s))
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let pick = (bits >> (8 + slot * 4)) as usize % candidates.len();
            let (node, s) = candidates[pick];
            b.connect(SourceRef::Output { node, slot: s }, id, &input.name)
                .unwrap();
        }
    }
    b.finish()
}

// ── Sparse graph generator ──────────────────────────────────────────────────

/// A node with a fixed id. `rank` orders producers before consumers and is
/// independent of both the id and the creation order.
#[derive(Debug, Clone)]
struct SparseNode {
    id: NodeId,
    type_idx: usize,
    rank: u8,
    bits: u64,
    text: String,
}

/// Nodes in creation order, plus the gaps between consecutive link ids.
type SparseGen = (Vec<SparseNode>, Vec<u32>);

fn arb_sparse() -> impl Strategy<Value = SparseGen> {
    (
        prop::collection::vec(
            (0usize..64, 0u8..4, 1u32..6, any::<u64>(), "[a-z ,.:'\"\\\\]{0,12}"),
            1..8,
        ),
        prop::collection::vec(1u32..5, 1..4),
    )
        .prop_map(|(nodes, link_gaps)| {
            let mut id = 0;
            let nodes: Vec<SparseNode> = nodes
                .into_iter()
                .map(|(type_idx, rank, gap, bits, text)| {
                    id += gap;
                    SparseNode { id: NodeId(id), type_idx, rank, bits, text }
                })
                .collect();
            (nodes, link_gaps)
        })
        .prop_flat_map(|(nodes, link_gaps)| (Just(nodes).prop_shuffle(), Just(link_gaps)))
}

fn schema_for<'r>(registry: &'r Registry, types: &[String], type_idx: usize) -> &'r NodeSchema {
    registry.lookup(&types[type_idx % types.len()]).unwrap()
}

/// Build an acyclic graph with caller-chosen ids. All nodes exist before
/// any link, so a consumer may be created before its producer; inputs and
/// parameters link only to producers of lower `(rank, id)`.
fn build_sparse(registry: &Registry, (nodes, link_gaps): &SparseGen) -> CompiledGraph {
    let types = type_names(registry);
    let mut b = GraphBuilder::new(registry);
    for node in nodes {
        let schema = schema_for(registry, &types, node.type_idx);
        let params: Vec<(String, Literal)> = schema
            .params
            .iter()
            .filter_map(|p| match p.ty.as_str() {
                "STRING" => Some((p.name.clone(), Literal::Str(node.text.clone()))),
                "INT" => Literal::integer(i128::from(node.bits)).map(|lit| (p.name.clone(), lit)),
                _ => None,
            })
            .collect();
        b.add_node_with_id(node.id, &schema.type_name, &params)
            .unwrap();
    }

    let mut link_id = 0;
    let mut made = 0;
    for target in nodes {
        let schema = schema_for(registry, &types, target.type_idx);
        let ports: Vec<_> = schema
            .inputs
            .iter()
            .map(|p| (&p.name, &p.ty))
            .chain(schema.params.iter().map(|p| (&p.name, &p.ty)))
            .take(12)
            .collect();
        for (j, (port, ty)) in ports.into_iter().enumerate() {
            if target.bits >> j & 1 == 0 {
                continue;
            }
            let candidates: Vec<(NodeId, usize)> = nodes
                .iter()
                .filter(|n| (n.rank, n.id) < (target.rank, target.id))
                .flat_map(|n| {
                    schema_for(registry, &types, n.type_idx)
                        .outputs
                        .iter()
                        .enumerate()
                        .filter(|(_, o)| &o.ty == ty)
                        .map(move |(slot, _)| (n.id, slot))
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let pick = (target.bits >> (16 + j * 3)) as usize % candidates.len();
            let (node, slot) = candidates[pick];
            link_id += link_gaps[made % link_gaps.len()];
            made += 1;
            b.connect_with_id(LinkId(link_id), SourceRef::Output { node, slot }, target.id, port)
                .unwrap();
        }
    }
    b.finish()
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn generated_graphs_verify(nodes in arb_nodes()) {
        let reg = load_registry();
        let graph = build(&reg, &nodes);
        let cert = graph.validate().unwrap();
        prop_assert!(cert.all_pass());
    }

    #[test]
    fn sequential_is_idempotent(nodes in arb_nodes()) {
        let reg = load_registry();
        let graph = build(&reg, &nodes);
        let first = sequential::serialize(&graph).unwrap();
        let parsed = sequential::parse(&first, &reg).unwrap();
        prop_assert_eq!(sequential::serialize(&parsed).unwrap(), first);
        prop_assert_eq!(signature(&parsed), signature(&graph));
    }

    #[test]
    fn staged_is_idempotent(nodes in arb_nodes()) {
        let reg = load_registry();
        let graph = build(&reg, &nodes);
        let first = staged::serialize(&graph).unwrap();
        let parsed = staged::parse(&first, &reg).unwrap();
        prop_assert_eq!(staged::serialize(&parsed).unwrap(), first);
        prop_assert_eq!(signature(&parsed), signature(&graph));
    }

    #[test]
    fn markdown_is_idempotent(nodes in arb_nodes()) {
        let reg = load_registry();
        let graph = build(&reg, &nodes);
        let first = markdown::serialize(&graph);
        let parsed = markdown::parse(&first, &reg).unwrap();
        prop_assert_eq!(markdown::serialize(&parsed), first);
        prop_assert_eq!(signature(&parsed), signature(&graph));
    }

    #[test]
    fn natural_is_idempotent(nodes in arb_nodes()) {
        let reg = load_registry();
        let graph = build(&reg, &nodes);
        let first = natural::serialize(&graph).unwrap();
        let parsed = natural::parse(&first, &reg).unwrap();
        prop_assert_eq!(natural::serialize(&parsed).unwrap(), first);
        prop_assert_eq!(signature(&parsed), signature(&graph));
    }

    #[test]
    fn sparse_graphs_verify(sample in arb_sparse()) {
        let reg = load_registry_with_scalars();
        let graph = build_sparse(&reg, &sample);
        prop_assert!(graph.validate().unwrap().all_pass());
    }

    #[test]
    fn sparse_sequential_is_idempotent(sample in arb_sparse()) {
        let reg = load_registry_with_scalars();
        let graph = build_sparse(&reg, &sample);
        let first = sequential::serialize(&graph).unwrap();
        let parsed = sequential::parse(&first, &reg).unwrap();
        prop_assert_eq!(sequential::serialize(&parsed).unwrap(), first);
        prop_assert_eq!(shape(&parsed), shape(&graph));
    }

    #[test]
    fn sparse_staged_is_idempotent(sample in arb_sparse()) {
        let reg = load_registry_with_scalars();
        let graph = build_sparse(&reg, &sample);
        let first = staged::serialize(&graph).unwrap();
        let parsed = staged::parse(&first, &reg).unwrap();
        prop_assert_eq!(staged::serialize(&parsed).unwrap(), first);
        prop_assert_eq!(shape(&parsed), shape(&graph));
    }

    #[test]
    fn sparse_markdown_keeps_ids(sample in arb_sparse()) {
        let reg = load_registry_with_scalars();
        let graph = build_sparse(&reg, &sample);
        let first = markdown::serialize(&graph);
        let parsed = markdown::parse(&first, &reg).unwrap();
        prop_assert_eq!(markdown::serialize(&parsed), first);
        prop_assert_eq!(&parsed, &graph);
    }

    #[test]
    fn sparse_natural_is_idempotent(sample in arb_sparse()) {
        let reg = load_registry_with_scalars();
        let graph = build_sparse(&reg, &sample);
        let first = natural::serialize(&graph).unwrap();
        let parsed = natural::parse(&first, &reg).unwrap();
        prop_assert_eq!(natural::serialize(&parsed).unwrap(), first);
        prop_assert_eq!(shape(&parsed), shape(&graph));
    }

    #[test]
    fn connect_respects_link_types(
        source_idx in 0usize..64,
        source_slot in 0usize..4,
        target_idx in 0usize..64,
        port_idx in 0usize..8,
    ) {
        let reg = load_registry();
        let types = type_names(&reg);
        let source_type = &types[source_idx % types.len()];
        let target_type = &types[target_idx % types.len()];
        let source_schema = reg.lookup(source_type).unwrap();
        let target_schema = reg.lookup(target_type).unwrap();
        prop_assume!(!source_schema.outputs.is_empty() && !target_schema.inputs.is_empty());

        let slot = source_slot % source_schema.outputs.len();
        let port = &target_schema.inputs[port_idx % target_schema.inputs.len()];

        let mut b = GraphBuilder::new(&reg);
        let from = b.add_node(source_type, &[]).unwrap();
        let to = b.add_node(target_type, &[]).unwrap();
        let before = b.graph().clone();
        let result = b.connect(SourceRef::Output { node: from, slot }, to, &port.name);

        let expected = check_link_types(&source_schema.outputs[slot].ty, &port.ty);
        prop_assert_eq!(result.is_ok(), expected.is_ok());
        if let Err(err) = result {
            prop_assert_eq!(Some(err), expected.err());
            prop_assert_eq!(b.graph(), &before);
        }
    }

    #[test]
    fn identifier_codec_is_lossless(name in "[A-Za-z0-9_ ()\\[\\]+-]{0,24}") {
        prop_assert_eq!(ident::decode(&ident::encode(&name)), name);
    }
}
