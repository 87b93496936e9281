use thiserror::Error;

use crate::graph::{BlockId, ConnectionId};
use crate::types::{ParseTypeError, StructuralError, UnifyError};

/// Failures of editing operations. Type errors found while inferring are not
/// among them: those end up as warnings on the offending blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("attempt to connect incompatible types: {0}")]
    Incompatible(#[source] UnifyError),

    #[error("port {0} is already connected")]
    AlreadyConnected(ConnectionId),

    #[error("ports {0} and {1} must be one output and one input")]
    PortDirection(ConnectionId, ConnectionId),

    #[error("blocks {parent} and {child} are not connected")]
    NotConnected { parent: BlockId, child: BlockId },

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("unknown data type `{0}`")]
    UnknownDataType(String),

    #[error("unknown statement `{0}`")]
    UnknownStatement(String),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Signature(#[from] ParseTypeError),
}
