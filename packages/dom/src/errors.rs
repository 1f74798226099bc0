//! Error types for DOM tree manipulation

use crate::tree::DomNodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("Node {0} does not exist")]
    MissingNode(DomNodeId),

    #[error("Text node {0} cannot have children")]
    TextHasNoChildren(DomNodeId),

    #[error("Inserting {child} under {parent} would create a cycle")]
    Cycle { parent: DomNodeId, child: DomNodeId },

    #[error("Node {reference} is not a child of {parent}")]
    NotAChild {
        parent: DomNodeId,
        reference: DomNodeId,
    },
}
