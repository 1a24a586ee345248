//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::config::RoutingConfig;
use crate::network::RoutingNetwork;
use crate::node::{NodeKind, SideConfig};
use crate::world::StorageWorld;
use conduit_core::filter_key::FilterConfig;
use conduit_core::position::{Direction, Position};
use conduit_core::resource::{ItemStack, ItemTypeId};
use conduit_core::storage::{Inventory, Storage};

// ===========================================================================
// Positions
// ===========================================================================

pub fn pos(x: i32, y: i32, z: i32) -> Position {
    Position::new(x, y, z)
}

// ===========================================================================
// Network builders
// ===========================================================================

/// Place a node, panicking if the position is taken.
pub fn place(network: &mut RoutingNetwork, at: Position, kind: NodeKind) -> Position {
    network
        .on_node_added(at, kind)
        .unwrap_or_else(|e| panic!("placing {kind:?} at {at}: {e}"));
    at
}

/// Place `len` relays in a straight line starting one step from `from`.
pub fn relay_line(
    network: &mut RoutingNetwork,
    from: Position,
    dir: Direction,
    len: usize,
) -> Vec<Position> {
    let mut placed = Vec::with_capacity(len);
    let mut cursor = from;
    for _ in 0..len {
        cursor = cursor.offset(dir);
        placed.push(place(network, cursor, NodeKind::Relay));
    }
    placed
}

/// Attach an item filter to the `Up` side of `node`.
pub fn serve_up(network: &mut RoutingNetwork, node: Position, filter: FilterConfig<ItemStack>) {
    network
        .configure_side(node, Direction::Up, SideConfig::default().with_item_filter(filter))
        .unwrap_or_else(|e| panic!("configuring {node}: {e}"));
}

/// A master with one input and one output, each serving the chest above it.
///
/// ```text
///   [dest]            [source]
///   output  -  master  -  input
///  (-1,0,0)   (0,0,0)   (1,0,0)
/// ```
pub struct BasicNetwork {
    pub network: RoutingNetwork,
    pub world: StorageWorld,
    pub master: Position,
    pub input: Position,
    pub output: Position,
    pub source: Position,
    pub destination: Position,
}

pub fn basic_network(
    config: RoutingConfig,
    input_filter: FilterConfig<ItemStack>,
    output_filter: FilterConfig<ItemStack>,
    source_contents: &[ItemStack],
) -> BasicNetwork {
    let mut network = RoutingNetwork::new(config);
    let master = place(&mut network, pos(0, 0, 0), NodeKind::Master);
    let input = place(&mut network, pos(1, 0, 0), NodeKind::Input);
    let output = place(&mut network, pos(-1, 0, 0), NodeKind::Output);
    serve_up(&mut network, input, input_filter);
    serve_up(&mut network, output, output_filter);

    let source = input.offset(Direction::Up);
    let destination = output.offset(Direction::Up);
    let mut world = StorageWorld::new();
    world.place_inventory(source, chest_with(source_contents));
    world.place_inventory(destination, chest_with(&[]));

    BasicNetwork {
        network,
        world,
        master,
        input,
        output,
        source,
        destination,
    }
}

// ===========================================================================
// World helpers
// ===========================================================================

/// A 9-slot chest holding `stacks` in its first slots.
pub fn chest_with(stacks: &[ItemStack]) -> Inventory {
    let mut chest = Inventory::new(9, 64);
    for (index, stack) in stacks.iter().enumerate() {
        chest.set_slot(index, Some(stack.clone()));
    }
    chest
}

/// Units of `item` (any components) in the chest at `at`.
pub fn count_in(world: &StorageWorld, at: Position, item: ItemTypeId) -> u64 {
    world
        .inventory(at)
        .map_or(0, |inv| inv.total_matching(&|s: &ItemStack| s.item_type == item))
}

/// Tick `network` `n` times, collecting every event.
pub fn run_ticks(
    network: &mut RoutingNetwork,
    world: &mut StorageWorld,
    n: usize,
) -> Vec<crate::event::RoutingEvent> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(network.tick(world));
    }
    events
}
