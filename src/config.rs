use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::raft::{CommitPolicy, QuorumPolicy, RaftConfig, RaftError, SeededTimeouts, TimeoutSource};
use crate::sim::DEFAULT_EVENT_CAPACITY;

/// Simulation settings. Every field may be omitted from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub cluster_size: usize,
    /// Wall-clock period between scheduled steps.
    pub tick_period_ms: u64,
    /// Transit progress per tick, out of 100.
    pub message_speed: f64,
    pub election_timeout_min: u64,
    pub election_timeout_max: u64,
    pub heartbeat_interval: u64,
    pub event_log_capacity: usize,
    /// Seed for election timeouts; OS entropy when unset.
    pub seed: Option<u64>,
    pub commit_policy: CommitPolicy,
    pub quorum: QuorumPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        let raft = RaftConfig::default();
        Self {
            cluster_size: 5,
            tick_period_ms: 30,
            message_speed: 2.5,
            election_timeout_min: raft.election_timeout_min,
            election_timeout_max: raft.election_timeout_max,
            heartbeat_interval: raft.heartbeat_interval,
            event_log_capacity: DEFAULT_EVENT_CAPACITY,
            seed: None,
            commit_policy: raft.commit_policy,
            quorum: raft.quorum,
        }
    }
}

impl SimConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RaftError> {
        let contents = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&contents)
            .map_err(|e| RaftError::SerializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RaftError> {
        if self.cluster_size == 0 {
            return Err(RaftError::InvalidConfig(
                "cluster_size must be at least 1".to_string(),
            ));
        }
        if self.tick_period_ms == 0 {
            return Err(RaftError::InvalidConfig(
                "tick_period_ms must be positive".to_string(),
            ));
        }
        if !self.message_speed.is_finite() || self.message_speed <= 0.0 {
            return Err(RaftError::InvalidConfig(format!(
                "message_speed must be positive, got {}",
                self.message_speed
            )));
        }
        if self.election_timeout_min == 0 || self.election_timeout_min > self.election_timeout_max {
            return Err(RaftError::InvalidConfig(format!(
                "election timeout bounds {}..={} are invalid",
                self.election_timeout_min, self.election_timeout_max
            )));
        }
        if self.heartbeat_interval == 0 {
            return Err(RaftError::InvalidConfig(
                "heartbeat_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn raft(&self) -> RaftConfig {
        RaftConfig {
            election_timeout_min: self.election_timeout_min,
            election_timeout_max: self.election_timeout_max,
            heartbeat_interval: self.heartbeat_interval,
            commit_policy: self.commit_policy,
            quorum: self.quorum,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Timeout source honoring `seed`.
    pub fn timeouts(&self) -> Box<dyn TimeoutSource> {
        match self.seed {
            Some(seed) => Box::new(SeededTimeouts::new(seed)),
            None => Box::new(SeededTimeouts::from_entropy()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_default_values_match_reference_cluster() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.cluster_size, 5);
        assert_eq!(cfg.tick_period_ms, 30);
        assert_eq!(cfg.message_speed, 2.5);
        assert_eq!(cfg.election_timeout_min, 100);
        assert_eq!(cfg.election_timeout_max, 200);
        assert_eq!(cfg.heartbeat_interval, 50);
        assert_eq!(cfg.event_log_capacity, 50);
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.commit_policy, CommitPolicy::Majority);
        assert_eq!(cfg.quorum, QuorumPolicy::Active);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{ "cluster_size": 3, "seed": 9, "quorum": "cluster" }}"#).unwrap();

        let cfg = SimConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.cluster_size, 3);
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.quorum, QuorumPolicy::Cluster);
        assert_eq!(cfg.heartbeat_interval, 50);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            SimConfig { cluster_size: 0, ..SimConfig::default() },
            SimConfig { tick_period_ms: 0, ..SimConfig::default() },
            SimConfig { message_speed: 0.0, ..SimConfig::default() },
            SimConfig { message_speed: f64::NAN, ..SimConfig::default() },
            SimConfig { election_timeout_min: 300, ..SimConfig::default() },
            SimConfig { heartbeat_interval: 0, ..SimConfig::default() },
        ];
        for cfg in cases {
            match cfg.validate() {
                Err(RaftError::InvalidConfig(_)) => {}
                other => panic!("expected InvalidConfig for {cfg:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_file_is_a_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "not json").unwrap();

        let err = SimConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, RaftError::SerializationError(_)));
    }
}
