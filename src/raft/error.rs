use thiserror::Error;

use super::NodeId;

#[derive(Error, Debug)]
pub enum RaftError {
    #[error("No leader available")]
    NoLeader,

    #[error("Client command is empty")]
    EmptyCommand,

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
