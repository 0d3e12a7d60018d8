use serde::{Deserialize, Serialize};
use std::fmt;

use super::{LogEntry, NodeId};

/// RPC body, keyed by message kind. Each arm carries only what that kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    RequestVote,
    VoteResponse {
        granted: bool,
    },
    AppendEntries {
        log: Vec<LogEntry>,
        commit_index: i64,
    },
    AppendEntriesResponse {
        success: bool,
        match_index: i64,
    },
    Heartbeat {
        log: Vec<LogEntry>,
        commit_index: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    RequestVote,
    VoteResponse,
    AppendEntries,
    AppendEntriesResponse,
    Heartbeat,
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::RequestVote => MessageKind::RequestVote,
            Payload::VoteResponse { .. } => MessageKind::VoteResponse,
            Payload::AppendEntries { .. } => MessageKind::AppendEntries,
            Payload::AppendEntriesResponse { .. } => MessageKind::AppendEntriesResponse,
            Payload::Heartbeat { .. } => MessageKind::Heartbeat,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::RequestVote => "RequestVote",
            MessageKind::VoteResponse => "VoteResponse",
            MessageKind::AppendEntries => "AppendEntries",
            MessageKind::AppendEntriesResponse => "AppendEntriesResponse",
            MessageKind::Heartbeat => "Heartbeat",
        };
        f.write_str(s)
    }
}

/// A message emitted by a node, not yet placed in transit.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub from: NodeId,
    pub to: Destination,
    pub term: u64,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Node(NodeId),
    /// Every live node other than the sender.
    Broadcast,
}

/// A message travelling between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub from: NodeId,
    pub to: NodeId,
    pub term: u64,
    pub payload: Payload,
    /// Transit progress, 0 to 100.
    pub progress: f64,
    /// Progress added per tick.
    pub speed: f64,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn has_arrived(&self) -> bool {
        self.progress >= 100.0
    }
}
