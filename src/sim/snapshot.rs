use serde::{Deserialize, Serialize};

use super::EventLogEntry;
use crate::raft::{LogEntry, Message, NodeId, NodeRole, RaftNode};

/// Read-only copy of one node, detached from the running engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub role: NodeRole,
    pub current_term: u64,
    pub voted_for: Option<NodeId>,
    pub log: Vec<LogEntry>,
    pub commit_index: i64,
    pub vote_count: usize,
    pub election_timer: u64,
    pub election_timeout: u64,
    pub heartbeat_ticks: u64,
}

impl From<&RaftNode> for NodeView {
    fn from(node: &RaftNode) -> Self {
        Self {
            id: node.id(),
            role: node.role(),
            current_term: node.current_term(),
            voted_for: node.voted_for(),
            log: node.log().entries().to_vec(),
            commit_index: node.commit_index(),
            vote_count: node.vote_count(),
            election_timer: node.election_timer(),
            election_timeout: node.election_timeout(),
            heartbeat_ticks: node.heartbeat_ticks(),
        }
    }
}

/// Everything a presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub running: bool,
    pub leader: Option<NodeId>,
    pub nodes: Vec<NodeView>,
    /// In-flight messages with their transit progress.
    pub messages: Vec<Message>,
    /// Most recent first.
    pub events: Vec<EventLogEntry>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
