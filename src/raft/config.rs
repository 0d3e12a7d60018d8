use serde::{Deserialize, Serialize};

/// How a leader advances its commit index when followers acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit the highest index held by a majority, restricted to entries of
    /// the leader's current term.
    #[default]
    Majority,
    /// Acknowledgements are recorded but never advance the commit index.
    Legacy,
}

/// Which nodes count towards a majority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumPolicy {
    /// Majority of the nodes that are not stopped.
    #[default]
    Active,
    /// Majority of the whole cluster, stopped nodes included.
    Cluster,
}

impl QuorumPolicy {
    /// Votes needed for a majority given the cluster size and live node count.
    pub fn majority(self, cluster_size: usize, active: usize) -> usize {
        let base = match self {
            QuorumPolicy::Active => active,
            QuorumPolicy::Cluster => cluster_size,
        };
        base / 2 + 1
    }
}

/// Protocol timing, all measured in simulation ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftConfig {
    pub election_timeout_min: u64,
    pub election_timeout_max: u64,
    pub heartbeat_interval: u64,
    pub commit_policy: CommitPolicy,
    pub quorum: QuorumPolicy,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_min: 100,
            election_timeout_max: 200,
            heartbeat_interval: 50,
            commit_policy: CommitPolicy::default(),
            quorum: QuorumPolicy::default(),
        }
    }
}
