//! Persistence of network topology and configuration.
//!
//! A snapshot stores what the player built: each node's position, kind,
//! side configuration and the connections switched off at that node.
//! Everything else (connections, master ownership, registries, graphs,
//! routes) is derived again on load, so a snapshot can never carry a stale
//! graph.

use crate::config::RoutingConfig;
use crate::network::RoutingNetwork;
use crate::node::{MAX_PRIORITY, NodeKind, RoutingNode, SideConfig};
use conduit_core::position::{Direction, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a routing network snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xC0D1_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid node record at {position}: {reason}")]
    InvalidNode { position: Position, reason: String },
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Network tick when the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// The persisted state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub position: Position,
    pub kind: NodeKind,
    pub sides: BTreeMap<Direction, SideConfig>,
    /// Neighbors whose connection is switched off at this node.
    pub disabled_connections: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub header: SnapshotHeader,
    /// Records in position order.
    pub nodes: Vec<NodeRecord>,
}

/// Decode only far enough to return the header.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: NetworkSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

// ---------------------------------------------------------------------------
// RoutingNetwork persistence
// ---------------------------------------------------------------------------

impl RoutingNetwork {
    /// Capture the persisted state of every node.
    pub fn snapshot(&self) -> NetworkSnapshot {
        let nodes = self
            .nodes()
            .map(|node| NodeRecord {
                position: node.position(),
                kind: node.kind(),
                sides: node
                    .sides()
                    .map(|(side, config)| (side, config.clone()))
                    .collect(),
                disabled_connections: node.disabled_connections().collect(),
            })
            .collect();
        NetworkSnapshot {
            header: SnapshotHeader::new(self.current_tick()),
            nodes,
        }
    }

    /// Encode the network to bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(&self.snapshot()).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Decode a network previously written by [`serialize`](Self::serialize).
    pub fn deserialize(data: &[u8], config: RoutingConfig) -> Result<Self, DeserializeError> {
        let snapshot: NetworkSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        Self::from_snapshot(snapshot, config)
    }

    /// Rebuild a network from a decoded snapshot. Connections are re-derived
    /// from adjacency, then the recorded disabled ends are switched off.
    pub fn from_snapshot(
        snapshot: NetworkSnapshot,
        config: RoutingConfig,
    ) -> Result<Self, DeserializeError> {
        snapshot.header.validate()?;

        let positions: BTreeSet<Position> = snapshot.nodes.iter().map(|r| r.position).collect();
        if positions.len() != snapshot.nodes.len() {
            let mut seen = BTreeSet::new();
            let duplicate = snapshot
                .nodes
                .iter()
                .map(|r| r.position)
                .find(|p| !seen.insert(*p))
                .unwrap_or(Position::ORIGIN);
            return Err(DeserializeError::InvalidNode {
                position: duplicate,
                reason: "duplicate position".to_string(),
            });
        }

        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        for record in snapshot.nodes {
            let mut node = RoutingNode::new(record.position, record.kind);
            for other in record.position.neighbors() {
                if positions.contains(&other) {
                    node.add_connection(other);
                }
            }
            for other in &record.disabled_connections {
                node.set_connection_enabled(*other, false);
            }
            for (side, side_config) in record.sides {
                validate_side(record.position, &side_config)?;
                node.set_side(side, side_config);
            }
            nodes.push(node);
        }

        Ok(Self::from_restored_nodes(config, snapshot.header.tick, nodes))
    }
}

fn validate_side(position: Position, config: &SideConfig) -> Result<(), DeserializeError> {
    let invalid = |reason: String| DeserializeError::InvalidNode { position, reason };
    if config.priority > MAX_PRIORITY {
        return Err(invalid(format!("priority {} out of range", config.priority)));
    }
    if let Some(filter) = &config.item_filter {
        filter.validate().map_err(|e| invalid(e.to_string()))?;
    }
    if let Some(filter) = &config.fluid_filter {
        filter.validate().map_err(|e| invalid(e.to_string()))?;
    }
    Ok(())
}
