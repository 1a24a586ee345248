//! Serde structs for network layout files.
//!
//! A layout names its item and fluid kinds once, then refers to them by name
//! from filter entries and endpoint contents. The loader resolves those names
//! into ids and builds a live network from the result. Routing tuning lives
//! in a separate file and deserializes straight into
//! [`RoutingConfig`](conduit_network::RoutingConfig).

use conduit_core::filter_key::{FilterMode, MatchMode};
use conduit_core::position::{Direction, Position};
use conduit_network::node::NodeKind;
use serde::Deserialize;

/// A block position written as `(x, y, z)` in RON or `[x, y, z]` in TOML
/// and JSON.
pub type PositionData = (i32, i32, i32);

pub fn to_position(data: PositionData) -> Position {
    Position::new(data.0, data.1, data.2)
}

// ===========================================================================
// Layout
// ===========================================================================

/// The whole contents of a layout file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutData {
    /// Item kind names. An item's id is its index in this list.
    #[serde(default)]
    pub items: Vec<String>,
    /// Fluid kind names, indexed the same way.
    #[serde(default)]
    pub fluids: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub endpoints: Vec<EndpointData>,
    /// Connections switched off after the network is assembled.
    #[serde(default)]
    pub disabled_connections: Vec<(PositionData, PositionData)>,
}

// ===========================================================================
// Nodes
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NodeData {
    pub position: PositionData,
    pub kind: NodeKindData,
    #[serde(default)]
    pub sides: Vec<SideData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKindData {
    Master,
    Relay,
    Input,
    Output,
    Interface,
}

impl From<NodeKindData> for NodeKind {
    fn from(kind: NodeKindData) -> Self {
        match kind {
            NodeKindData::Master => NodeKind::Master,
            NodeKindData::Relay => NodeKind::Relay,
            NodeKindData::Input => NodeKind::Input,
            NodeKindData::Output => NodeKind::Output,
            NodeKindData::Interface => NodeKind::Interface,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideName {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl From<SideName> for Direction {
    fn from(side: SideName) -> Self {
        match side {
            SideName::Down => Direction::Down,
            SideName::Up => Direction::Up,
            SideName::North => Direction::North,
            SideName::South => Direction::South,
            SideName::West => Direction::West,
            SideName::East => Direction::East,
        }
    }
}

/// Priority and filters for one side of a node.
#[derive(Debug, Clone, Deserialize)]
pub struct SideData {
    pub side: SideName,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub items: Option<FilterData>,
    #[serde(default)]
    pub fluids: Option<FilterData>,
}

// ===========================================================================
// Filters
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct FilterData {
    #[serde(default)]
    pub mode: FilterModeData,
    #[serde(default)]
    pub entries: Vec<FilterEntryData>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterModeData {
    #[default]
    Whitelist,
    Blacklist,
}

impl From<FilterModeData> for FilterMode {
    fn from(mode: FilterModeData) -> Self {
        match mode {
            FilterModeData::Whitelist => FilterMode::Whitelist,
            FilterModeData::Blacklist => FilterMode::Blacklist,
        }
    }
}

/// One filter entry. A missing `amount` means unlimited.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterEntryData {
    pub name: String,
    #[serde(default)]
    pub amount: Option<u32>,
    /// Match on kind alone, ignoring components.
    #[serde(default)]
    pub kind_only: bool,
    #[serde(default)]
    pub components: Vec<(u16, i64)>,
}

impl FilterEntryData {
    pub fn match_mode(&self) -> MatchMode {
        if self.kind_only {
            MatchMode::KindOnly
        } else {
            MatchMode::Exact
        }
    }
}

// ===========================================================================
// Endpoints
// ===========================================================================

/// The storage sitting at one position. Either half may be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointData {
    pub position: PositionData,
    #[serde(default)]
    pub inventory: Option<InventoryData>,
    #[serde(default)]
    pub tanks: Option<TankData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryData {
    #[serde(default = "default_inventory_slots")]
    pub slots: usize,
    #[serde(default = "default_stack_size")]
    pub capacity: u32,
    #[serde(default)]
    pub contents: Vec<StackData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TankData {
    #[serde(default = "default_tank_count")]
    pub tanks: usize,
    #[serde(default = "default_tank_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub contents: Vec<StackData>,
}

/// Initial contents. Without a `slot` the stack is merged in like a normal
/// insertion.
#[derive(Debug, Clone, Deserialize)]
pub struct StackData {
    pub name: String,
    pub amount: u32,
    #[serde(default)]
    pub slot: Option<usize>,
    #[serde(default)]
    pub components: Vec<(u16, i64)>,
}

fn default_inventory_slots() -> usize {
    27
}

fn default_stack_size() -> u32 {
    64
}

fn default_tank_count() -> usize {
    1
}

fn default_tank_capacity() -> u32 {
    16_000
}
