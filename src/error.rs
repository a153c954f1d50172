use crate::model::{EdgeId, NodeId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid connection: {reason}")]
    InvalidConnection { reason: String },

    #[error("corrupt {format} file at {location}: {message}")]
    CorruptFile {
        format: &'static str,
        location: String,
        message: String,
    },

    #[error("edge {edge} references node {node}, which is not in the document")]
    DanglingReference { edge: usize, node: NodeId },

    #[error("division by zero on the edge {from} -> {to}")]
    DivideByZero { from: NodeId, to: NodeId },

    #[error("node id {0} is already in the document")]
    DuplicateNode(NodeId),

    #[error("node identities are exhausted")]
    IdsExhausted,

    #[error("no node with id {0}")]
    UnknownNode(NodeId),

    #[error("no edge with id {0}")]
    UnknownEdge(EdgeId),

    #[error("node {0} is locked while a connection is being drawn")]
    NodeLocked(NodeId),

    #[error("cannot encode {what}: {message}")]
    Encode { what: &'static str, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(
        format: &'static str,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::CorruptFile {
            format,
            location: location.into(),
            message: message.into(),
        }
    }
}
