//! Structural errors raised by tree construction and lookups.
//!
//! Invalid state transitions (starting an active node, stopping an inactive
//! one) are not errors: they are reported as `false` by the lifecycle methods.
//! The variants here indicate a tree-construction or caller bug and are
//! surfaced through `Result` so they cannot be silently ignored.

use thiserror::Error;

use crate::node::NodeId;
use crate::status::NodeType;

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("root node {node:?} cannot be given a parent")]
    IllegalReparent { node: NodeId },

    #[error("node {child:?} already belongs to parent {parent:?}")]
    AlreadyParented { child: NodeId, parent: NodeId },

    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },

    #[error("{kind} node {parent:?} cannot own more than {limit} children")]
    ChildLimit {
        parent: NodeId,
        kind: NodeType,
        limit: usize,
    },

    #[error("node {0:?} does not exist in this tree")]
    InvalidHandle(NodeId),

    #[error("no node with id `{0}` is registered")]
    UnknownNode(String),

    #[error("node name `{name}` contains the sync separator `{separator}`")]
    SeparatorInName { name: String, separator: char },

    #[error("node registry is stale; call populate_registry after changing the tree")]
    StaleRegistry,

    #[error("tick delta must be finite and non-negative, got {0}")]
    InvalidDelta(f32),

    #[error("no current tree is selected")]
    NoCurrentTree,
}
