// graph.rs — Compiled Graph IR and link type-checker
//
// The canonical representation every codec parses into and serializes out
// of: typed nodes (instantiated from registry schemas) and typed links
// between output and input ports.
//
// Preconditions: node types resolve in the `Registry` the builder holds.
// Postconditions: a graph produced by `GraphBuilder` satisfies the
//                 structural invariants checked by `verify::verify_graph`
//                 except acyclicity, which only the serializer enforces.
// Failure modes: every operation validates before mutating; a failed call
//                leaves the graph unchanged and returns a `GraphError`.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::GraphError;
use crate::id::{IdAllocator, LinkId, NodeId};
use crate::literal::Literal;
use crate::registry::{DataType, NodeSchema, Registry};

const TRACING_TARGET: &str = "flowc::graph";

// ── Public types ────────────────────────────────────────────────────────────

/// Current state of a parameter slot. Promotion is a one-way transition:
/// once a link targets the slot, the literal is gone.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Literal(Literal),
    /// Superseded by the input port at this position in `Node::inputs`.
    Promoted { input: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub name: String,
    pub ty: DataType,
    pub value: SlotValue,
}

impl ParamSlot {
    /// The literal value, or `None` once the slot has been promoted.
    pub fn literal(&self) -> Option<&Literal> {
        match &self.value {
            SlotValue::Literal(lit) => Some(lit),
            SlotValue::Promoted { .. } => None,
        }
    }
}

/// An input port. Its slot number is its position in `Node::inputs`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPort {
    pub name: String,
    pub ty: DataType,
    pub link: Option<LinkId>,
    /// Created by promoting the parameter slot of the same name.
    pub promoted: bool,
}

/// An output port. Its slot number is its position in `Node::outputs`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPort {
    pub name: String,
    pub ty: DataType,
    pub links: Vec<LinkId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub type_name: String,
    pub params: Vec<ParamSlot>,
    pub inputs: Vec<InputPort>,
    pub outputs: Vec<OutputPort>,
}

impl Node {
    /// Instantiate a node from its schema. Ports are copied so later
    /// mutation stays local to this node.
    fn from_schema(id: NodeId, schema: &NodeSchema) -> Self {
        Node {
            id,
            type_name: schema.type_name.clone(),
            params: schema
                .params
                .iter()
                .map(|p| ParamSlot {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    value: SlotValue::Literal(p.default.clone()),
                })
                .collect(),
            inputs: schema
                .inputs
                .iter()
                .map(|p| InputPort {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    link: None,
                    promoted: false,
                })
                .collect(),
            outputs: schema
                .outputs
                .iter()
                .map(|p| OutputPort {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    links: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSlot> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Slot number and port for an input name.
    pub fn input(&self, name: &str) -> Option<(usize, &InputPort)> {
        self.inputs.iter().enumerate().find(|(_, p)| p.name == name)
    }

    /// Slot number and port for an output name.
    pub fn output(&self, name: &str) -> Option<(usize, &OutputPort)> {
        self.outputs.iter().enumerate().find(|(_, p)| p.name == name)
    }

    /// Parameter slots that still hold a literal, in slot order.
    pub fn literal_params(&self) -> impl Iterator<Item = (&str, &Literal)> {
        self.params
            .iter()
            .filter_map(|p| p.literal().map(|lit| (p.name.as_str(), lit)))
    }

    fn unknown_port(&self, port: &str) -> GraphError {
        GraphError::UnknownPort {
            node: self.id,
            node_type: self.type_name.clone(),
            port: port.to_string(),
        }
    }
}

/// A directed, typed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub source: NodeId,
    pub source_slot: usize,
    pub target: NodeId,
    pub target_slot: usize,
    /// Copied from the source output port.
    pub ty: DataType,
}

/// The compiled workflow: nodes and links, each kept in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl CompiledGraph {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    /// Links whose target is `node`, in target slot order.
    pub fn incoming(&self, node: NodeId) -> Vec<&Link> {
        let mut links: Vec<&Link> = self.links.iter().filter(|l| l.target == node).collect();
        links.sort_by_key(|l| l.target_slot);
        links
    }
}

impl fmt::Display for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            writeln!(f, "node {} {}", node.id, node.type_name)?;
            for p in &node.params {
                match &p.value {
                    SlotValue::Literal(lit) => writeln!(f, "  param {} = {}", p.name, lit)?,
                    SlotValue::Promoted { input } => {
                        writeln!(f, "  param {} -> input {}", p.name, input)?
                    }
                }
            }
            for (slot, port) in node.inputs.iter().enumerate() {
                match port.link {
                    Some(link) => writeln!(f, "  in[{slot}] {}: {} <- link {link}", port.name, port.ty)?,
                    None => writeln!(f, "  in[{slot}] {}: {}", port.name, port.ty)?,
                }
            }
            for (slot, port) in node.outputs.iter().enumerate() {
                writeln!(f, "  out[{slot}] {}: {} -> {:?}", port.name, port.ty, port.links)?;
            }
        }
        for link in &self.links {
            writeln!(
                f,
                "link {} {}:{} -> {}:{} ({})",
                link.id, link.source, link.source_slot, link.target, link.target_slot, link.ty
            )?;
        }
        Ok(())
    }
}

// ── Link type-checker ───────────────────────────────────────────────────────

/// Types must match exactly, except that a `CONDITIONING` input accepts
/// any source type.
pub fn check_link_types(source: &DataType, target: &DataType) -> Result<(), GraphError> {
    if source == target || target.is_conditioning() {
        Ok(())
    } else {
        Err(GraphError::TypeMismatch {
            source_type: source.clone(),
            target_type: target.clone(),
        })
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Where a connection reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRef<'a> {
    /// A tensor name bound by `invoke`.
    Tensor(&'a str),
    /// A node output addressed directly.
    Output { node: NodeId, slot: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Node(NodeId),
    Tensor { node: NodeId, slot: usize },
}

/// Builds one `CompiledGraph`. Owns the id counters and the symbolic
/// name table for a single compilation.
#[derive(Debug)]
pub struct GraphBuilder<'r> {
    registry: &'r Registry,
    graph: CompiledGraph,
    ids: IdAllocator,
    bindings: HashMap<String, Binding>,
    invoked: HashSet<NodeId>,
}

impl<'r> GraphBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        GraphBuilder {
            registry,
            graph: CompiledGraph::default(),
            ids: IdAllocator::new(),
            bindings: HashMap::new(),
            invoked: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Finish the compilation, handing back the graph in id order.
    pub fn finish(mut self) -> CompiledGraph {
        self.graph.nodes.sort_by_key(|n| n.id);
        self.graph.links.sort_by_key(|l| l.id);
        self.graph
    }

    // ── Nodes ──

    /// Instantiate `type_name` with literal parameter overrides.
    pub fn add_node(
        &mut self,
        type_name: &str,
        params: &[(String, Literal)],
    ) -> Result<NodeId, GraphError> {
        let node = self.instantiate(NodeId(0), type_name, params)?;
        let id = self.ids.alloc_node();
        self.push_node(Node { id, ..node });
        Ok(id)
    }

    /// Instantiate a node under a caller-chosen id (graph import).
    pub fn add_node_with_id(
        &mut self,
        id: NodeId,
        type_name: &str,
        params: &[(String, Literal)],
    ) -> Result<NodeId, GraphError> {
        if self.graph.node(id).is_some() {
            return Err(GraphError::InvalidGraph(format!("duplicate node id {id}")));
        }
        let node = self.instantiate(id, type_name, params)?;
        self.ids.reserve_node(id);
        self.push_node(node);
        Ok(id)
    }

    fn instantiate(
        &self,
        id: NodeId,
        type_name: &str,
        params: &[(String, Literal)],
    ) -> Result<Node, GraphError> {
        let schema = self
            .registry
            .lookup(type_name)
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))?;
        let mut node = Node::from_schema(id, schema);
        for (name, value) in params {
            let slot = node
                .params
                .iter_mut()
                .find(|p| &p.name == name)
                .ok_or_else(|| GraphError::UnknownParameter {
                    node_type: type_name.to_string(),
                    param: name.clone(),
                })?;
            slot.value = SlotValue::Literal(value.clone());
        }
        Ok(node)
    }

    fn push_node(&mut self, node: Node) {
        tracing::trace!(
            target: TRACING_TARGET,
            node = %node.id,
            node_type = %node.type_name,
            "Added node"
        );
        self.graph.nodes.push(node);
    }

    /// Overwrite a parameter literal. A promoted slot cannot take a literal.
    pub fn set_parameter(
        &mut self,
        node: NodeId,
        name: &str,
        value: Literal,
    ) -> Result<(), GraphError> {
        let target = self
            .graph
            .node_mut(node)
            .ok_or(GraphError::UnknownNode(node))?;
        let type_name = target.type_name.clone();
        let Some(slot_pos) = target.params.iter().position(|p| p.name == name) else {
            return Err(GraphError::UnknownParameter {
                node_type: type_name,
                param: name.to_string(),
            });
        };
        if let SlotValue::Promoted { input } = target.params[slot_pos].value {
            let link = target.inputs.get(input).and_then(|p| p.link);
            return Err(GraphError::AlreadyLinked {
                node,
                port: name.to_string(),
                link: link.unwrap_or(LinkId(0)),
            });
        }
        target.params[slot_pos].value = SlotValue::Literal(value);
        Ok(())
    }

    // ── Names ──

    /// Bind an instance name to a node.
    pub fn bind_node(&mut self, name: &str, node: NodeId) -> Result<(), GraphError> {
        if self.graph.node(node).is_none() {
            return Err(GraphError::UnknownNode(node));
        }
        if self.bindings.contains_key(name) {
            return Err(GraphError::DuplicateBinding(name.to_string()));
        }
        self.bindings.insert(name.to_string(), Binding::Node(node));
        Ok(())
    }

    /// Node bound to an instance name.
    pub fn lookup_node(&self, name: &str) -> Option<NodeId> {
        match self.bindings.get(name) {
            Some(Binding::Node(id)) => Some(*id),
            _ => None,
        }
    }

    /// Output bound to a tensor name.
    pub fn lookup_tensor(&self, name: &str) -> Option<(NodeId, usize)> {
        match self.bindings.get(name) {
            Some(Binding::Tensor { node, slot }) => Some((*node, *slot)),
            _ => None,
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bind `names` to the node's outputs in slot order. The count must
    /// equal the declared output count; a node is invoked at most once.
    pub fn invoke(&mut self, node: NodeId, names: &[String]) -> Result<(), GraphError> {
        let target = self.graph.node(node).ok_or(GraphError::UnknownNode(node))?;
        if self.invoked.contains(&node) {
            return Err(GraphError::AlreadyInvoked(node));
        }
        if names.len() != target.outputs.len() {
            return Err(GraphError::ArityMismatch {
                node,
                node_type: target.type_name.clone(),
                expected: target.outputs.len(),
                found: names.len(),
            });
        }
        let mut seen = HashSet::new();
        for name in names {
            if self.bindings.contains_key(name) || !seen.insert(name.as_str()) {
                return Err(GraphError::DuplicateBinding(name.clone()));
            }
        }

        for (slot, name) in names.iter().enumerate() {
            self.bindings
                .insert(name.clone(), Binding::Tensor { node, slot });
        }
        self.invoked.insert(node);
        Ok(())
    }

    // ── Links ──

    /// Link `source` into the port named `port` on `target`, promoting a
    /// parameter slot of that name when no input port exists.
    pub fn connect(
        &mut self,
        source: SourceRef<'_>,
        target: NodeId,
        port: &str,
    ) -> Result<LinkId, GraphError> {
        self.connect_inner(None, source, target, port)
    }

    /// `connect` under a caller-chosen link id (graph import).
    pub fn connect_with_id(
        &mut self,
        id: LinkId,
        source: SourceRef<'_>,
        target: NodeId,
        port: &str,
    ) -> Result<LinkId, GraphError> {
        if self.graph.link(id).is_some() {
            return Err(GraphError::InvalidGraph(format!("duplicate link id {id}")));
        }
        self.connect_inner(Some(id), source, target, port)
    }

    fn resolve_source(&self, source: SourceRef<'_>) -> Result<(NodeId, usize), GraphError> {
        let (node, slot) = match source {
            SourceRef::Tensor(name) => self
                .lookup_tensor(name)
                .ok_or_else(|| GraphError::UsedBeforeDefined(name.to_string()))?,
            SourceRef::Output { node, slot } => (node, slot),
        };
        let source_node = self.graph.node(node).ok_or(GraphError::UnknownNode(node))?;
        if slot >= source_node.outputs.len() {
            return Err(source_node.unknown_port(&format!("#{slot}")));
        }
        Ok((node, slot))
    }

    fn connect_inner(
        &mut self,
        id: Option<LinkId>,
        source: SourceRef<'_>,
        target: NodeId,
        port: &str,
    ) -> Result<LinkId, GraphError> {
        let (source_node, source_slot) = self.resolve_source(source)?;
        let source_ty = self
            .graph
            .node(source_node)
            .map(|n| n.outputs[source_slot].ty.clone())
            .ok_or(GraphError::UnknownNode(source_node))?;

        let target_node = self
            .graph
            .node(target)
            .ok_or(GraphError::UnknownNode(target))?;

        // Resolve the target port before touching anything.
        enum Resolved {
            Input(usize),
            Promote(usize),
        }
        let (resolved, target_ty) = if let Some((slot, input)) = target_node.input(port) {
            if let Some(link) = input.link {
                return Err(GraphError::AlreadyLinked {
                    node: target,
                    port: port.to_string(),
                    link,
                });
            }
            (Resolved::Input(slot), input.ty.clone())
        } else if let Some(pos) = target_node.params.iter().position(|p| p.name == port) {
            (Resolved::Promote(pos), target_node.params[pos].ty.clone())
        } else {
            return Err(target_node.unknown_port(port));
        };
        check_link_types(&source_ty, &target_ty)?;

        let link_id = match id {
            Some(id) => {
                self.ids.reserve_link(id);
                id
            }
            None => self.ids.alloc_link(),
        };

        let target_node = self
            .graph
            .node_mut(target)
            .ok_or(GraphError::UnknownNode(target))?;
        let target_slot = match resolved {
            Resolved::Input(slot) => slot,
            Resolved::Promote(pos) => {
                let slot = target_node.inputs.len();
                let param = &mut target_node.params[pos];
                param.value = SlotValue::Promoted { input: slot };
                target_node.inputs.push(InputPort {
                    name: param.name.clone(),
                    ty: param.ty.clone(),
                    link: None,
                    promoted: true,
                });
                slot
            }
        };
        target_node.inputs[target_slot].link = Some(link_id);

        if let Some(src) = self.graph.node_mut(source_node) {
            src.outputs[source_slot].links.push(link_id);
        }
        self.graph.links.push(Link {
            id: link_id,
            source: source_node,
            source_slot,
            target,
            target_slot,
            ty: source_ty,
        });

        tracing::trace!(
            target: TRACING_TARGET,
            link = %link_id,
            from = %source_node,
            source_slot,
            to = %target,
            target_slot,
            "Connected"
        );
        Ok(link_id)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::sample_registry;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let a = b.add_node("CheckpointLoader", &[]).unwrap();
        let c = b.add_node("TextEncode", &[]).unwrap();
        assert_eq!(a, NodeId(1));
        assert_eq!(c, NodeId(2));
    }

    #[test]
    fn add_node_copies_schema_and_overrides() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let id = b
            .add_node("TextEncode", &[("text".into(), Literal::Str("a cat".into()))])
            .unwrap();
        let node = b.graph().node(id).unwrap();
        assert_eq!(node.param("text").and_then(|p| p.literal()), Some(&Literal::Str("a cat".into())));
        assert_eq!(node.inputs.len(), 1);
        assert_eq!(node.outputs[0].ty, DataType::new("CONDITIONING"));
    }

    #[test]
    fn unknown_type_and_parameter() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        assert_eq!(
            b.add_node("Bogus", &[]),
            Err(GraphError::UnknownNodeType("Bogus".into()))
        );
        let err = b
            .add_node("TextEncode", &[("prompt".into(), Literal::Null)])
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownParameter {
                node_type: "TextEncode".into(),
                param: "prompt".into()
            }
        );
        assert!(b.graph().nodes.is_empty());
    }

    #[test]
    fn checkpoint_to_text_encode() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let loader = b.add_node("CheckpointLoader", &[]).unwrap();
        let enc = b.add_node("TextEncode", &[]).unwrap();
        b.invoke(loader, &names(&["model_1", "clip_1", "vae_1"])).unwrap();
        let link = b.connect(SourceRef::Tensor("clip_1"), enc, "clip").unwrap();
        b.invoke(enc, &names(&["cond_2"])).unwrap();

        let g = b.finish();
        assert_eq!(link, LinkId(1));
        let l = g.link(link).unwrap();
        assert_eq!((l.source, l.source_slot, l.target, l.target_slot), (loader, 1, enc, 0));
        assert_eq!(l.ty, DataType::new("CLIP"));
        assert_eq!(g.node(loader).unwrap().outputs[1].links, vec![link]);
        assert_eq!(g.node(enc).unwrap().inputs[0].link, Some(link));
    }

    #[test]
    fn image_to_latent_is_type_mismatch() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let img = b.add_node("LoadImage", &[]).unwrap();
        let sampler = b.add_node("Sampler", &[]).unwrap();
        let err = b
            .connect(SourceRef::Output { node: img, slot: 0 }, sampler, "latent")
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::TypeMismatch {
                source_type: DataType::new("IMAGE"),
                target_type: DataType::new("LATENT"),
            }
        );
        assert!(b.graph().links.is_empty());
    }

    #[test]
    fn conditioning_accepts_any_source() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let img = b.add_node("LoadImage", &[]).unwrap();
        let sampler = b.add_node("Sampler", &[]).unwrap();
        b.connect(SourceRef::Output { node: img, slot: 1 }, sampler, "positive")
            .unwrap();
        let g = b.finish();
        assert_eq!(g.links[0].ty, DataType::new("MASK"));
    }

    #[test]
    fn conditioning_source_does_not_relax_target() {
        assert!(check_link_types(&DataType::new("CONDITIONING"), &DataType::new("IMAGE")).is_err());
        assert!(check_link_types(&DataType::new("IMAGE"), &DataType::new("IMAGE")).is_ok());
    }

    #[test]
    fn unbound_tensor_is_used_before_defined() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let enc = b.add_node("TextEncode", &[]).unwrap();
        assert_eq!(
            b.connect(SourceRef::Tensor("clip_9"), enc, "clip"),
            Err(GraphError::UsedBeforeDefined("clip_9".into()))
        );
    }

    #[test]
    fn promotion_supersedes_literal() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let num = b.add_node("Number", &[("value".into(), Literal::Int(1024))]).unwrap();
        let latent = b.add_node("EmptyLatent", &[]).unwrap();
        let link = b
            .connect(SourceRef::Output { node: num, slot: 0 }, latent, "width")
            .unwrap();

        let node = b.graph().node(latent).unwrap().clone();
        assert_eq!(node.param("width").unwrap().value, SlotValue::Promoted { input: 0 });
        assert_eq!(node.param("width").unwrap().literal(), None);
        assert_eq!(node.inputs[0].name, "width");
        assert!(node.inputs[0].promoted);
        assert_eq!(node.inputs[0].link, Some(link));
        assert_eq!(node.literal_params().count(), 1);

        let err = b.set_parameter(latent, "width", Literal::Int(64)).unwrap_err();
        assert!(matches!(err, GraphError::AlreadyLinked { link: l, .. } if l == link));
    }

    #[test]
    fn promoted_input_appended_after_schema_inputs() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let num = b.add_node("Number", &[]).unwrap();
        let sampler = b.add_node("Sampler", &[]).unwrap();
        b.connect(SourceRef::Output { node: num, slot: 0 }, sampler, "seed")
            .unwrap();
        let g = b.finish();
        let node = g.node(sampler).unwrap();
        assert_eq!(node.inputs.len(), 4);
        assert_eq!(node.input("seed").map(|(slot, _)| slot), Some(3));
        assert_eq!(g.links[0].target_slot, 3);
    }

    #[test]
    fn reconnecting_linked_input_rejected() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let loader = b.add_node("CheckpointLoader", &[]).unwrap();
        let enc = b.add_node("TextEncode", &[]).unwrap();
        let first = b
            .connect(SourceRef::Output { node: loader, slot: 1 }, enc, "clip")
            .unwrap();
        let err = b
            .connect(SourceRef::Output { node: loader, slot: 1 }, enc, "clip")
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::AlreadyLinked {
                node: enc,
                port: "clip".into(),
                link: first
            }
        );
        assert_eq!(b.graph().links.len(), 1);
        assert_eq!(b.graph().node(loader).unwrap().outputs[1].links.len(), 1);
    }

    #[test]
    fn invoke_arity_and_duplicates() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let loader = b.add_node("CheckpointLoader", &[]).unwrap();
        let save = b.add_node("SaveImage", &[]).unwrap();
        assert!(matches!(
            b.invoke(loader, &names(&["a", "b"])),
            Err(GraphError::ArityMismatch { expected: 3, found: 2, .. })
        ));
        assert_eq!(
            b.invoke(loader, &names(&["a", "b", "a"])),
            Err(GraphError::DuplicateBinding("a".into()))
        );
        b.invoke(loader, &names(&["a", "b", "c"])).unwrap();
        assert_eq!(b.invoke(loader, &names(&["d", "e", "f"])), Err(GraphError::AlreadyInvoked(loader)));
        b.invoke(save, &[]).unwrap();
        assert_eq!(b.lookup_tensor("c"), Some((loader, 2)));
    }

    #[test]
    fn binding_names_share_one_namespace() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let loader = b.add_node("CheckpointLoader", &[]).unwrap();
        b.bind_node("loader", loader).unwrap();
        assert_eq!(
            b.invoke(loader, &names(&["loader", "x", "y"])),
            Err(GraphError::DuplicateBinding("loader".into()))
        );
        assert_eq!(b.lookup_node("loader"), Some(loader));
        assert_eq!(b.lookup_tensor("loader"), None);
    }

    #[test]
    fn explicit_ids_advance_allocator() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        b.add_node_with_id(NodeId(7), "Number", &[]).unwrap();
        assert!(matches!(
            b.add_node_with_id(NodeId(7), "Number", &[]),
            Err(GraphError::InvalidGraph(_))
        ));
        let next = b.add_node("EmptyLatent", &[]).unwrap();
        assert_eq!(next, NodeId(8));
        let l = b
            .connect_with_id(LinkId(4), SourceRef::Output { node: NodeId(7), slot: 0 }, next, "height")
            .unwrap();
        assert_eq!(l, LinkId(4));
    }

    #[test]
    fn display_lists_nodes_and_links() {
        let reg = sample_registry();
        let mut b = GraphBuilder::new(&reg);
        let num = b.add_node("Number", &[]).unwrap();
        let latent = b.add_node("EmptyLatent", &[]).unwrap();
        b.connect(SourceRef::Output { node: num, slot: 0 }, latent, "height")
            .unwrap();
        let text = b.finish().to_string();
        assert!(text.contains("node 2 EmptyLatent"));
        assert!(text.contains("param height -> input 0"));
        assert!(text.contains("link 1 1:0 -> 2:0 (INT)"));
    }
}
