mod config;
mod error;
mod log;
mod message;
mod node;
mod state;
mod timeout;

pub use self::config::{CommitPolicy, QuorumPolicy, RaftConfig};
pub use self::error::RaftError;
pub use self::log::{Log, LogEntry};
pub use self::message::{Destination, Message, MessageKind, Outbound, Payload};
pub use self::node::{ClusterView, Effects, NodeEvent, RaftNode};
pub use self::state::{NodeRole, RoleEvent};
pub use self::timeout::{FixedTimeouts, SeededTimeouts, TimeoutSource};

/// Stable 0-based position of a node in the cluster.
pub type NodeId = usize;
