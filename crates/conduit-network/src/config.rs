use serde::{Deserialize, Serialize};

/// Tuning knobs for a routing network. Every field has a default so a
/// partial config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Items an input node may pull per transfer tick, across all its sides.
    pub item_bandwidth: u32,
    /// Millibuckets an input node may pull per transfer tick.
    pub fluid_bandwidth: u32,
    /// Node expansions orphan searches may spend per tick, shared by all of
    /// them.
    pub discovery_budget: usize,
    /// Ticks an orphan waits after a failed search before trying again.
    pub rediscovery_interval: u64,
    /// Transfers run on ticks that are a multiple of this. Zero disables
    /// transfers.
    pub transfer_interval: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            item_bandwidth: 16,
            fluid_bandwidth: 1000,
            discovery_budget: 64,
            rediscovery_interval: 20,
            transfer_interval: 1,
        }
    }
}

impl RoutingConfig {
    /// Whether the transfer engine runs on `tick`.
    pub fn transfers_on(&self, tick: u64) -> bool {
        self.transfer_interval != 0 && tick % self.transfer_interval == 0
    }
}
