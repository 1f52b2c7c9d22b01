//! Error types for navgraph

use crate::model::{EdgeId, NodeId};
use thiserror::Error;

/// Graph authoring errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// Coordinate text was not a `y, x` pair of finite numbers
    #[error("Malformed coordinates: {0:?} (expected `lat, lon`)")]
    MalformedCoordinates(String),

    /// An edge would start and end at the same node
    #[error("Edge would start and end at node {0}")]
    SelfLoop(NodeId),

    /// A handle referred to a node that is not in the graph
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Loaded records contradict each other
    #[error("Inconsistent records: {0}")]
    Inconsistent(String),

    /// A building calibration cannot be used for pixel transforms
    #[error("Invalid calibration for {building} floor {floor}: {reason}")]
    InvalidCalibration {
        building: String,
        floor: i32,
        reason: String,
    },

    /// The operator's input stream ended
    #[error("Operator input closed")]
    InputClosed,

    /// Terminal I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub(crate) fn duplicate_node(id: NodeId) -> Self {
        GraphError::Inconsistent(format!("node id {} appears more than once", id))
    }

    pub(crate) fn duplicate_edge(id: EdgeId) -> Self {
        GraphError::Inconsistent(format!("edge id {} appears more than once", id))
    }
}

/// Pick-point channel errors
#[derive(Debug, Error)]
pub enum PickError {
    /// The other end hung up
    #[error("Pick channel closed")]
    Closed,

    /// A line on the channel did not follow the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failed to encode or decode the graph snapshot
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Pipe I/O failure
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}
