use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recoverable failure of a single step. Every variant names the node at fault.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeError {
    #[error("Wrong type at node {node}: expected {expected}, found {actual}")]
    WrongType {
        node: NodeId,
        expected: String,
        actual: String,
    },

    #[error("Node {node} is not on the board")]
    NotOnBoard { node: NodeId },

    #[error("Node {node} is an empty hole")]
    MissingNode { node: NodeId },

    #[error("Unknown name '{name}' at node {node}")]
    UnknownName { node: NodeId, name: String },

    #[error("Circular call to '{name}' at node {node}")]
    CircularCall { node: NodeId, name: String },

    #[error("Node {node} already has all of its arguments")]
    AlreadyFullyBound { node: NodeId },

    #[error("Builtin at node {node} takes {expected} parameters, found {actual}")]
    WrongBuiltInParamsCount {
        node: NodeId,
        expected: usize,
        actual: usize,
    },

    #[error("Builtin error at node {node}: {message}")]
    BuiltIn { node: NodeId, message: String },
}

impl NodeError {
    pub fn node(&self) -> NodeId {
        match self {
            NodeError::WrongType { node, .. }
            | NodeError::NotOnBoard { node }
            | NodeError::MissingNode { node }
            | NodeError::UnknownName { node, .. }
            | NodeError::CircularCall { node, .. }
            | NodeError::AlreadyFullyBound { node }
            | NodeError::WrongBuiltInParamsCount { node, .. }
            | NodeError::BuiltIn { node, .. } => *node,
        }
    }

    pub fn wrong_type(node: NodeId, expected: impl ToString, actual: impl ToString) -> Self {
        NodeError::WrongType {
            node,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn builtin(node: NodeId, message: impl Into<String>) -> Self {
        NodeError::BuiltIn {
            node,
            message: message.into(),
        }
    }
}

/// Contract violations. These are programming or content defects and are never
/// absorbed by the undo boundary.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("Dangling node id: {0}")]
    DanglingNode(NodeId),

    #[error("No type descriptor registered for '{0}'")]
    UnregisteredKind(String),

    #[error("Unknown node tag: {0}")]
    UnknownTag(String),

    #[error("Malformed term: {0}")]
    MalformedTerm(String),

    #[error("Level not found: {0}")]
    UnknownLevel(usize),

    #[error("Step on node {0} was begun against a state that is no longer present")]
    StaleStep(NodeId),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Fatal(#[from] FatalError),
}
