use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Follower,
    Candidate,
    Leader,
    Stopped,
}

/// Things that can move a node between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleEvent {
    /// A message carried a term above ours.
    HigherTerm,
    /// A current-term heartbeat or append arrived from a leader.
    LeaderContact,
    ElectionTimeout,
    MajorityReached,
    PowerOff,
    PowerOn,
}

impl NodeRole {
    /// Transition table for the role state machine.
    ///
    /// Every (role, event) pair has an answer; pairs that make no sense for a
    /// role leave it unchanged.
    pub fn on(self, event: RoleEvent) -> NodeRole {
        use NodeRole::*;
        use RoleEvent::*;

        match (self, event) {
            (Stopped, PowerOn) => Follower,
            (Stopped, _) => Stopped,
            (_, PowerOff) => Stopped,
            (_, PowerOn) => self,
            (_, HigherTerm) | (_, LeaderContact) => Follower,
            (Follower, ElectionTimeout) | (Candidate, ElectionTimeout) => Candidate,
            (Leader, ElectionTimeout) => Leader,
            (Candidate, MajorityReached) => Leader,
            (Follower, MajorityReached) | (Leader, MajorityReached) => self,
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, NodeRole::Stopped)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeRole::Follower => "Follower",
            NodeRole::Candidate => "Candidate",
            NodeRole::Leader => "Leader",
            NodeRole::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_only_leaves_on_power_on() {
        for event in [
            RoleEvent::HigherTerm,
            RoleEvent::LeaderContact,
            RoleEvent::ElectionTimeout,
            RoleEvent::MajorityReached,
            RoleEvent::PowerOff,
        ] {
            assert_eq!(NodeRole::Stopped.on(event), NodeRole::Stopped);
        }
        assert_eq!(NodeRole::Stopped.on(RoleEvent::PowerOn), NodeRole::Follower);
    }

    #[test]
    fn higher_term_demotes_everyone_active() {
        for role in [NodeRole::Follower, NodeRole::Candidate, NodeRole::Leader] {
            assert_eq!(role.on(RoleEvent::HigherTerm), NodeRole::Follower);
            assert_eq!(role.on(RoleEvent::LeaderContact), NodeRole::Follower);
            assert_eq!(role.on(RoleEvent::PowerOff), NodeRole::Stopped);
        }
    }

    #[test]
    fn only_candidates_win_elections() {
        assert_eq!(NodeRole::Candidate.on(RoleEvent::MajorityReached), NodeRole::Leader);
        assert_eq!(NodeRole::Follower.on(RoleEvent::MajorityReached), NodeRole::Follower);
        assert_eq!(NodeRole::Leader.on(RoleEvent::ElectionTimeout), NodeRole::Leader);
        assert_eq!(NodeRole::Follower.on(RoleEvent::ElectionTimeout), NodeRole::Candidate);
    }
}
