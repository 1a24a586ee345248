//! Routing nodes: the per-block state of the network.
//!
//! A [`RoutingNode`] only knows its own connections and which master it
//! answers to. Anything that needs to look at other nodes (discovery,
//! purging, joining) goes through [`NodeLookup`] and lives on the
//! [`RoutingNetwork`](crate::network::RoutingNetwork) facade.

use conduit_core::filter_key::FilterConfig;
use conduit_core::position::{Direction, Position};
use conduit_core::resource::{FluidStack, ItemStack};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest priority a side may be configured with.
pub const MAX_PRIORITY: u8 = 9;

/// What a node does in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Owns a network and runs its transfers.
    Master,
    /// Carries connections only.
    Relay,
    /// Pulls from adjacent endpoints.
    Input,
    /// Pushes into adjacent endpoints.
    Output,
    /// Both pulls and pushes.
    Interface,
}

impl NodeKind {
    pub fn is_master(&self) -> bool {
        matches!(self, NodeKind::Master)
    }

    pub fn is_input(&self) -> bool {
        matches!(self, NodeKind::Input | NodeKind::Interface)
    }

    pub fn is_output(&self) -> bool {
        matches!(self, NodeKind::Output | NodeKind::Interface)
    }
}

/// Configuration of one side of a node. The endpoint served by a side is
/// the block at `position.offset(side)`. A side without a filter for a
/// resource does not take part in transfers of that resource.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SideConfig {
    pub priority: u8,
    pub item_filter: Option<FilterConfig<ItemStack>>,
    pub fluid_filter: Option<FilterConfig<FluidStack>>,
}

impl SideConfig {
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_item_filter(mut self, filter: FilterConfig<ItemStack>) -> Self {
        self.item_filter = Some(filter);
        self
    }

    pub fn with_fluid_filter(mut self, filter: FilterConfig<FluidStack>) -> Self {
        self.fluid_filter = Some(filter);
        self
    }

    pub fn is_unconfigured(&self) -> bool {
        self.item_filter.is_none() && self.fluid_filter.is_none()
    }
}

// ---------------------------------------------------------------------------
// RoutingNode
// ---------------------------------------------------------------------------

/// One routing block.
///
/// Connections are stored per neighbor with an enabled flag. The flag is
/// local: an edge is only usable when both ends have it enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingNode {
    position: Position,
    kind: NodeKind,
    connections: BTreeMap<Position, bool>,
    master: Option<Position>,
    sides: BTreeMap<Direction, SideConfig>,
}

impl RoutingNode {
    pub fn new(position: Position, kind: NodeKind) -> Self {
        Self {
            position,
            kind,
            connections: BTreeMap::new(),
            master: None,
            sides: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The master this node answers to, if any. For a master node this is
    /// its own position.
    pub fn master_position(&self) -> Option<Position> {
        self.master
    }

    pub fn set_master_position(&mut self, master: Option<Position>) {
        self.master = master;
    }

    /// Record an enabled connection to `other`. Returns `false` for a
    /// self-loop or a connection that already exists.
    pub fn add_connection(&mut self, other: Position) -> bool {
        if other == self.position || self.connections.contains_key(&other) {
            return false;
        }
        self.connections.insert(other, true);
        true
    }

    pub fn remove_connection(&mut self, other: Position) -> bool {
        self.connections.remove(&other).is_some()
    }

    pub fn has_connection(&self, other: Position) -> bool {
        self.connections.contains_key(&other)
    }

    pub fn is_connection_enabled(&self, other: Position) -> bool {
        self.connections.get(&other).copied().unwrap_or(false)
    }

    /// Flip this end of a connection. Returns `false` if there is no
    /// connection to `other`.
    pub fn set_connection_enabled(&mut self, other: Position, enabled: bool) -> bool {
        match self.connections.get_mut(&other) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    /// Every connection with its local enabled flag, in position order.
    pub fn connections(&self) -> impl Iterator<Item = (Position, bool)> + '_ {
        self.connections.iter().map(|(pos, enabled)| (*pos, *enabled))
    }

    pub fn enabled_connections(&self) -> impl Iterator<Item = Position> + '_ {
        self.connections().filter(|(_, enabled)| *enabled).map(|(pos, _)| pos)
    }

    pub fn disabled_connections(&self) -> impl Iterator<Item = Position> + '_ {
        self.connections().filter(|(_, enabled)| !*enabled).map(|(pos, _)| pos)
    }

    pub fn side(&self, side: Direction) -> Option<&SideConfig> {
        self.sides.get(&side)
    }

    pub fn side_mut(&mut self, side: Direction) -> &mut SideConfig {
        self.sides.entry(side).or_default()
    }

    /// Replace a side's configuration. An unconfigured side is removed.
    pub fn set_side(&mut self, side: Direction, config: SideConfig) {
        if config.is_unconfigured() && config.priority == 0 {
            self.sides.remove(&side);
        } else {
            self.sides.insert(side, config);
        }
    }

    /// Configured sides in direction order.
    pub fn sides(&self) -> impl Iterator<Item = (Direction, &SideConfig)> {
        self.sides.iter().map(|(dir, config)| (*dir, config))
    }

    /// Priority of a side; unconfigured sides sit at zero.
    pub fn priority(&self, side: Direction) -> u8 {
        self.sides.get(&side).map_or(0, |s| s.priority)
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Read access to the node set, used by the discovery searches.
pub trait NodeLookup {
    fn node(&self, pos: Position) -> Option<&RoutingNode>;

    /// Whether the edge `a`-`b` can carry traffic: both nodes exist and both
    /// ends have it enabled.
    fn is_traversable(&self, a: Position, b: Position) -> bool {
        match (self.node(a), self.node(b)) {
            (Some(na), Some(nb)) => na.is_connection_enabled(b) && nb.is_connection_enabled(a),
            _ => false,
        }
    }

    /// Neighbors of `pos` across traversable edges, in position order.
    fn traversable_neighbors(&self, pos: Position) -> Vec<Position> {
        let Some(node) = self.node(pos) else {
            return Vec::new();
        };
        node.enabled_connections()
            .filter(|other| self.is_traversable(pos, *other))
            .collect()
    }

    /// Whether a master node currently exists at `pos`.
    fn is_live_master(&self, pos: Position) -> bool {
        self.node(pos).is_some_and(|n| n.kind().is_master())
    }
}

impl NodeLookup for BTreeMap<Position, RoutingNode> {
    fn node(&self, pos: Position) -> Option<&RoutingNode> {
        self.get(&pos)
    }
}
