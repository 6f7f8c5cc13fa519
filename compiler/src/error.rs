// error.rs — Graph IR error kinds
//
// Structural failures raised by registry lookups, Graph IR mutation and
// topological serialization. Codecs wrap these in a `Diagnostic` carrying
// the offending statement.

use thiserror::Error;

use crate::diag::{codes, DiagCode};
use crate::id::{LinkId, NodeId};
use crate::registry::DataType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("unknown parameter '{param}' for node type '{node_type}'")]
    UnknownParameter { node_type: String, param: String },

    #[error("unknown port '{port}' on node {node} ({node_type})")]
    UnknownPort {
        node: NodeId,
        node_type: String,
        port: String,
    },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("'{0}' is used before it is defined")]
    UsedBeforeDefined(String),

    #[error("type mismatch: cannot connect output of type {source_type} to input of type {target_type}")]
    TypeMismatch {
        source_type: DataType,
        target_type: DataType,
    },

    #[error("binding '{0}' would overwrite an existing binding")]
    DuplicateBinding(String),

    #[error("node {0} is already invoked")]
    AlreadyInvoked(NodeId),

    #[error("port '{port}' on node {node} is already linked by link {link}")]
    AlreadyLinked {
        node: NodeId,
        port: String,
        link: LinkId,
    },

    #[error("node {node} ({node_type}) has {expected} output(s) but {found} name(s) were bound")]
    ArityMismatch {
        node: NodeId,
        node_type: String,
        expected: usize,
        found: usize,
    },

    #[error("serialization deadlock: no progress possible for node(s) {}", join_ids(.0))]
    SerializationDeadlock(Vec<NodeId>),

    #[error("malformed statement: {0}")]
    Malformed(String),

    #[error("invalid graph: {0}")]
    InvalidGraph(String),
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl GraphError {
    /// Stable diagnostic code for this kind.
    pub fn code(&self) -> DiagCode {
        match self {
            GraphError::UnknownNodeType(_) => codes::E0100,
            GraphError::UnknownParameter { .. } => codes::E0101,
            GraphError::UnknownPort { .. } => codes::E0102,
            GraphError::UnknownNode(_) => codes::E0103,
            GraphError::TypeMismatch { .. } => codes::E0200,
            GraphError::UsedBeforeDefined(_) => codes::E0300,
            GraphError::DuplicateBinding(_) | GraphError::AlreadyInvoked(_) => codes::E0301,
            GraphError::AlreadyLinked { .. } => codes::E0302,
            GraphError::ArityMismatch { .. } => codes::E0303,
            GraphError::SerializationDeadlock(_) => codes::E0400,
            GraphError::Malformed(_) => codes::E0500,
            GraphError::InvalidGraph(_) => codes::E0600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_names_both_types() {
        let err = GraphError::TypeMismatch {
            source_type: DataType::new("IMAGE"),
            target_type: DataType::new("LATENT"),
        };
        let msg = err.to_string();
        assert!(msg.contains("IMAGE") && msg.contains("LATENT"), "{msg}");
        assert_eq!(err.code(), codes::E0200);
    }

    #[test]
    fn deadlock_lists_node_ids() {
        let err = GraphError::SerializationDeadlock(vec![NodeId(2), NodeId(5)]);
        assert_eq!(
            err.to_string(),
            "serialization deadlock: no progress possible for node(s) 2, 5"
        );
    }
}
