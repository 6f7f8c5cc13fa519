// id.rs — Node and link identifiers for one compilation
//
// Ids are allocated per `GraphBuilder`, starting at 1, in allocation order.
// Imported graphs keep the ids they were saved with; the allocator is then
// advanced past the largest id seen so later additions never collide.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node within a compiled graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Identifier of a link within a compiled graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LinkId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocator for node and link ids. Produces monotonically increasing ids
/// in allocation order, ensuring deterministic assignment.
#[derive(Debug)]
pub struct IdAllocator {
    next_node: u32,
    next_link: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            next_node: 1,
            next_link: 1,
        }
    }

    pub fn alloc_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn alloc_link(&mut self) -> LinkId {
        let id = LinkId(self.next_link);
        self.next_link += 1;
        id
    }

    /// Mark an externally assigned node id as used.
    pub fn reserve_node(&mut self, id: NodeId) {
        self.next_node = self.next_node.max(id.0.saturating_add(1));
    }

    /// Mark an externally assigned link id as used.
    pub fn reserve_link(&mut self, id: LinkId) {
        self.next_link = self.next_link.max(id.0.saturating_add(1));
    }
}
