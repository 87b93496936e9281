//! # Type Error Definitions
//!
//! Errors raised while lowering blocks into expressions or inferring their
//! types:
//!
//! - A name is used that no binder or operator provides (`UnboundVariable`)
//! - Two types cannot be reconciled (`Unification`)
//! - The graph itself is unusable (`Structural`): a cycle, an unknown id or
//!   a malformed mutation payload
//!
//! ## Attribution
//!
//! Instead of a source span, errors carry the [`Tag`] of the expression node
//! that failed. The workspace turns that into a warning on the owning block.
//!
//! ## Related Modules
//!
//! - [`crate::types::infer`] - Produces these errors
//! - [`crate::types::unify`] - Unification failures wrapped by `TypeError`
//! - [`crate::graph::build`] - Produces `StructuralError`

use thiserror::Error;

use super::unify::UnifyError;
use crate::expr::Tag;
use crate::graph::{BlockId, ConnectionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("block {0} is part of a cycle")]
    Cycle(BlockId),
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
    #[error("block {0} does not denote an expression")]
    NotAnExpression(BlockId),
    #[error("malformed mutation on block {block}: {reason}")]
    MalformedMutation { block: BlockId, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("unbound variable: {name}")]
    UnboundVariable { name: String, tag: Option<Tag> },

    #[error("{source}")]
    Unification {
        #[source]
        source: UnifyError,
        tag: Option<Tag>,
    },

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl TypeError {
    pub fn unbound_variable(name: impl Into<String>, tag: Option<Tag>) -> Self {
        TypeError::UnboundVariable {
            name: name.into(),
            tag,
        }
    }

    pub fn from_unify_error(err: UnifyError, tag: Option<Tag>) -> Self {
        TypeError::Unification { source: err, tag }
    }

    /// The expression node the error should be reported on, if known.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            TypeError::UnboundVariable { tag, .. } | TypeError::Unification { tag, .. } => *tag,
            TypeError::Structural(StructuralError::Cycle(block))
            | TypeError::Structural(StructuralError::NotAnExpression(block))
            | TypeError::Structural(StructuralError::UnknownBlock(block))
            | TypeError::Structural(StructuralError::MalformedMutation { block, .. }) => {
                Some(Tag::Block(*block))
            }
            TypeError::Structural(StructuralError::UnknownConnection(conn)) => {
                Some(Tag::Connection(*conn))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_unification_error_message() {
        let err = TypeError::from_unify_error(
            UnifyError::Mismatch {
                left: Type::number(),
                right: Type::bool(),
            },
            Some(Tag::Block(BlockId(4))),
        );
        assert_eq!(err.to_string(), "type mismatch: Number vs Bool");
        assert_eq!(err.tag(), Some(Tag::Block(BlockId(4))));
    }

    #[test]
    fn test_structural_error_tags_block() {
        let err: TypeError = StructuralError::Cycle(BlockId(2)).into();
        assert_eq!(err.tag(), Some(Tag::Block(BlockId(2))));
        assert_eq!(err.to_string(), "block #2 is part of a cycle");
    }

    #[test]
    fn test_unbound_variable_message() {
        let err = TypeError::unbound_variable("x", None);
        assert_eq!(err.to_string(), "unbound variable: x");
        assert_eq!(err.tag(), None);
    }
}
