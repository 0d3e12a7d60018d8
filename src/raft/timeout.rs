use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use super::NodeId;

/// Source of randomized election timeouts.
///
/// Injected into the simulation so tests can script election races.
pub trait TimeoutSource: Send {
    /// Draws a timeout for `node` within `min..=max` ticks.
    fn next_timeout(&mut self, node: NodeId, min: u64, max: u64) -> u64;
}

/// Uniform timeouts from a seedable generator.
pub struct SeededTimeouts {
    rng: StdRng,
}

impl SeededTimeouts {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl TimeoutSource for SeededTimeouts {
    fn next_timeout(&mut self, _node: NodeId, min: u64, max: u64) -> u64 {
        self.rng.random_range(min..=max)
    }
}

/// Fixed per-node timeouts, falling back to a default for unlisted nodes.
///
/// Values are clamped into the requested bounds.
#[derive(Debug, Clone, Default)]
pub struct FixedTimeouts {
    per_node: HashMap<NodeId, u64>,
    fallback: Option<u64>,
}

impl FixedTimeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: NodeId, ticks: u64) -> Self {
        self.per_node.insert(node, ticks);
        self
    }

    pub fn with_fallback(mut self, ticks: u64) -> Self {
        self.fallback = Some(ticks);
        self
    }
}

impl TimeoutSource for FixedTimeouts {
    fn next_timeout(&mut self, node: NodeId, min: u64, max: u64) -> u64 {
        let ticks = self
            .per_node
            .get(&node)
            .copied()
            .or(self.fallback)
            .unwrap_or(max);
        ticks.clamp(min, max)
    }
}
