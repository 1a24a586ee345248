//! The per-tick transfer pass of one master.
//!
//! # Order of work
//!
//! 1. Every input node's cached route is validated against the master's
//!    graph. A stale route is recomputed; a node with no route is reported
//!    as unreachable and sits the tick out.
//! 2. Output filters are initialized once from their endpoints and shared
//!    by every input, so a request filled by one input is not filled again
//!    by the next.
//! 3. Input sides run in descending priority, ties in position order. Each
//!    offers its endpoint to the output sides in the same order until the
//!    node's bandwidth for the tick is spent.
//!
//! Items move before fluids. Both passes use the same code through
//! [`Routable`].

use crate::config::RoutingConfig;
use crate::event::{RoutingEvent, Ticks};
use crate::master::MasterRoutingNode;
use crate::node::{RoutingNode, SideConfig};
use crate::world::EndpointProvider;
use conduit_core::filter::{Filter, FilterRole};
use conduit_core::filter_key::FilterConfig;
use conduit_core::position::Position;
use conduit_core::resource::{FluidStack, ItemStack, Resource};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// A resource the transfer engine knows how to route.
pub trait Routable: Resource {
    /// Short name used in log lines.
    const LABEL: &'static str;

    fn side_filter(side: &SideConfig) -> Option<&FilterConfig<Self>>;

    /// Units an input node may move per transfer tick.
    fn bandwidth(config: &RoutingConfig) -> u32;

    fn transfer_event(from: Position, to: Position, amount: u32, tick: Ticks) -> RoutingEvent;
}

impl Routable for ItemStack {
    const LABEL: &'static str = "items";

    fn side_filter(side: &SideConfig) -> Option<&FilterConfig<Self>> {
        side.item_filter.as_ref()
    }

    fn bandwidth(config: &RoutingConfig) -> u32 {
        config.item_bandwidth
    }

    fn transfer_event(from: Position, to: Position, amount: u32, tick: Ticks) -> RoutingEvent {
        RoutingEvent::ItemsTransferred {
            from,
            to,
            quantity: amount,
            tick,
        }
    }
}

impl Routable for FluidStack {
    const LABEL: &'static str = "fluid";

    fn side_filter(side: &SideConfig) -> Option<&FilterConfig<Self>> {
        side.fluid_filter.as_ref()
    }

    fn bandwidth(config: &RoutingConfig) -> u32 {
        config.fluid_bandwidth
    }

    fn transfer_event(from: Position, to: Position, amount: u32, tick: Ticks) -> RoutingEvent {
        RoutingEvent::FluidTransferred {
            from,
            to,
            amount,
            tick,
        }
    }
}

/// Result of validating one input node's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    /// The cached route still holds, or a first route was computed.
    Valid,
    /// The cached route was stale and has been replaced.
    Repaired,
    /// The master's graph no longer reaches the node.
    Unreachable,
}

/// What one transfer pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    pub events: Vec<RoutingEvent>,
    /// Input nodes skipped because no route reaches them.
    pub unreachable: Vec<Position>,
    pub items_moved: u64,
    pub fluid_moved: u64,
}

struct OutputSide<R> {
    node: Position,
    endpoint: Position,
    priority: u8,
    filter: Filter<R>,
}

struct InputSide<'a, R> {
    node: Position,
    endpoint: Position,
    priority: u8,
    config: &'a FilterConfig<R>,
}

/// Runs transfers and owns the route cache.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    routes: BTreeMap<Position, Vec<Position>>,
}

impl TransferEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_route(&self, node: Position) -> Option<&[Position]> {
        self.routes.get(&node).map(Vec::as_slice)
    }

    /// Drop the cached route of a node that left its network.
    pub fn forget(&mut self, node: Position) {
        self.routes.remove(&node);
    }

    /// Drop every cached route that starts at `master`.
    pub fn forget_master(&mut self, master: Position) {
        self.routes.retain(|_, route| route.first() != Some(&master));
    }

    pub fn cached_route_count(&self) -> usize {
        self.routes.len()
    }

    /// Check `node`'s cached route and recompute it if stale.
    pub fn validate_route(&mut self, master: &MasterRoutingNode, node: Position) -> RouteStatus {
        if let Some(route) = self.routes.get(&node) {
            if master.is_connected(route, node) {
                return RouteStatus::Valid;
            }
        }
        let was_cached = self.routes.remove(&node).is_some();
        match master.find_route(node) {
            Some(route) => {
                self.routes.insert(node, route);
                if was_cached {
                    RouteStatus::Repaired
                } else {
                    RouteStatus::Valid
                }
            }
            None => RouteStatus::Unreachable,
        }
    }

    /// Run one transfer pass for `master`.
    pub fn run<W>(
        &mut self,
        master: &MasterRoutingNode,
        nodes: &BTreeMap<Position, RoutingNode>,
        world: &mut W,
        config: &RoutingConfig,
        tick: Ticks,
    ) -> TransferReport
    where
        W: EndpointProvider<ItemStack> + EndpointProvider<FluidStack> + ?Sized,
    {
        let mut report = TransferReport::default();
        let mut routable = BTreeSet::new();

        let inputs: Vec<Position> = master.input_nodes().collect();
        for node in inputs {
            match self.validate_route(master, node) {
                RouteStatus::Valid => {
                    routable.insert(node);
                }
                RouteStatus::Repaired => {
                    debug!(%node, master = %master.position(), "repaired stale route");
                    report.events.push(RoutingEvent::RouteRepaired {
                        node,
                        master: master.position(),
                        tick,
                    });
                    routable.insert(node);
                }
                RouteStatus::Unreachable => {
                    debug!(%node, master = %master.position(), "no route to input node; skipping");
                    report.unreachable.push(node);
                }
            }
        }

        report.items_moved = move_resource::<ItemStack, W>(
            master,
            nodes,
            &mut *world,
            config,
            tick,
            &routable,
            &mut report.events,
        );
        report.fluid_moved = move_resource::<FluidStack, W>(
            master,
            nodes,
            &mut *world,
            config,
            tick,
            &routable,
            &mut report.events,
        );
        report
    }
}

fn move_resource<R, W>(
    master: &MasterRoutingNode,
    nodes: &BTreeMap<Position, RoutingNode>,
    world: &mut W,
    config: &RoutingConfig,
    tick: Ticks,
    routable: &BTreeSet<Position>,
    events: &mut Vec<RoutingEvent>,
) -> u64
where
    R: Routable,
    W: EndpointProvider<R> + ?Sized,
{
    let mut outputs: Vec<OutputSide<R>> = Vec::new();
    for pos in master.output_nodes() {
        let Some(node) = nodes.get(&pos) else {
            continue;
        };
        for (side, side_config) in node.sides() {
            let Some(filter_config) = R::side_filter(side_config) else {
                continue;
            };
            let endpoint = pos.offset(side);
            let Some(storage) = world.storage(endpoint) else {
                continue;
            };
            outputs.push(OutputSide {
                node: pos,
                endpoint,
                priority: side_config.priority,
                filter: Filter::initialize(filter_config, FilterRole::Output, endpoint, storage),
            });
        }
    }
    if outputs.is_empty() {
        return 0;
    }
    outputs.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut inputs: Vec<InputSide<'_, R>> = Vec::new();
    for pos in master.input_nodes().filter(|p| routable.contains(p)) {
        let Some(node) = nodes.get(&pos) else {
            continue;
        };
        for (side, side_config) in node.sides() {
            if let Some(filter_config) = R::side_filter(side_config) {
                inputs.push(InputSide {
                    node: pos,
                    endpoint: pos.offset(side),
                    priority: side_config.priority,
                    config: filter_config,
                });
            }
        }
    }
    inputs.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut budgets: BTreeMap<Position, u32> = BTreeMap::new();
    let mut moved_total = 0u64;

    for input in &inputs {
        let budget = budgets.entry(input.node).or_insert_with(|| R::bandwidth(config));
        if *budget == 0 {
            continue;
        }
        let Some(source) = world.storage(input.endpoint) else {
            continue;
        };
        let mut filter =
            Filter::initialize(input.config, FilterRole::Input, input.endpoint, source);

        for output in outputs.iter_mut() {
            if *budget == 0 {
                break;
            }
            if output.endpoint == input.endpoint {
                continue;
            }
            let Some((src, dst)) = world.storage_pair_mut(input.endpoint, output.endpoint) else {
                continue;
            };
            let moved = filter.transfer_through_input_filter(src, &mut output.filter, dst, *budget);
            if moved == 0 {
                continue;
            }
            *budget -= moved;
            moved_total += u64::from(moved);
            world.notify_changed(input.endpoint);
            world.notify_changed(output.endpoint);
            trace!(
                resource = R::LABEL,
                from = %input.endpoint,
                to = %output.endpoint,
                moved,
                "transfer"
            );
            events.push(R::transfer_event(input.node, output.node, moved, tick));
        }
    }

    if moved_total > 0 {
        debug!(
            resource = R::LABEL,
            master = %master.position(),
            moved_total,
            tick,
            "transfer pass"
        );
    }
    moved_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::world::StorageWorld;
    use conduit_core::position::Direction;
    use conduit_core::test_utils::*;

    fn at(x: i32, y: i32) -> Position {
        Position::new(x, y, 0)
    }

    /// Master at the origin, input at +x, output at -x. Each serves the
    /// chest above it.
    fn small_network(
        input_filter: FilterConfig<ItemStack>,
        output_filter: FilterConfig<ItemStack>,
    ) -> (MasterRoutingNode, BTreeMap<Position, RoutingNode>) {
        let mut master = MasterRoutingNode::new(at(0, 0));
        master.add_node_to_list(at(1, 0), NodeKind::Input);
        master.add_node_to_list(at(-1, 0), NodeKind::Output);
        master.add_connection(at(0, 0), at(1, 0));
        master.add_connection(at(0, 0), at(-1, 0));

        let mut input = RoutingNode::new(at(1, 0), NodeKind::Input);
        input.set_side(Direction::Up, SideConfig::default().with_item_filter(input_filter));
        let mut output = RoutingNode::new(at(-1, 0), NodeKind::Output);
        output.set_side(Direction::Up, SideConfig::default().with_item_filter(output_filter));

        let mut nodes = BTreeMap::new();
        nodes.insert(at(0, 0), RoutingNode::new(at(0, 0), NodeKind::Master));
        nodes.insert(at(1, 0), input);
        nodes.insert(at(-1, 0), output);
        (master, nodes)
    }

    #[test]
    fn first_route_is_valid_and_cached() {
        let (master, _) = small_network(whitelist_unlimited(&[iron()]), whitelist(&[(iron(), 1)]));
        let mut engine = TransferEngine::new();
        assert_eq!(engine.validate_route(&master, at(1, 0)), RouteStatus::Valid);
        assert_eq!(engine.cached_route(at(1, 0)), Some(&[at(0, 0), at(1, 0)][..]));
        assert_eq!(engine.validate_route(&master, at(1, 0)), RouteStatus::Valid);
    }

    #[test]
    fn stale_route_is_repaired() {
        let mut master = MasterRoutingNode::new(at(0, 0));
        let links = [
            ((0, 0), (1, 0)),
            ((1, 0), (2, 0)),
            ((0, 0), (0, 1)),
            ((0, 1), (1, 1)),
            ((1, 1), (2, 0)),
        ];
        for (a, b) in links {
            master.add_connection(at(a.0, a.1), at(b.0, b.1));
        }
        let mut engine = TransferEngine::new();
        assert_eq!(engine.validate_route(&master, at(2, 0)), RouteStatus::Valid);
        master.remove_connection(at(1, 0), at(2, 0));
        assert_eq!(engine.validate_route(&master, at(2, 0)), RouteStatus::Repaired);
        let route = engine.cached_route(at(2, 0)).unwrap();
        assert!(master.is_connected(route, at(2, 0)));
    }

    #[test]
    fn unreachable_node_loses_its_route() {
        let mut master = MasterRoutingNode::new(at(0, 0));
        master.add_connection(at(0, 0), at(1, 0));
        let mut engine = TransferEngine::new();
        engine.validate_route(&master, at(1, 0));
        master.remove_connection(at(0, 0), at(1, 0));
        assert_eq!(engine.validate_route(&master, at(1, 0)), RouteStatus::Unreachable);
        assert_eq!(engine.cached_route(at(1, 0)), None);
    }

    #[test]
    fn run_moves_up_to_the_output_request() {
        let (master, nodes) =
            small_network(whitelist_unlimited(&[iron()]), whitelist(&[(iron(), 10)]));
        let mut world = StorageWorld::new();
        world.place_inventory(at(1, 1), inventory_with(&[iron_stack(30)]));
        world.place_inventory(at(-1, 1), inventory_with(&[]));

        let mut engine = TransferEngine::new();
        let report = engine.run(&master, &nodes, &mut world, &RoutingConfig::default(), 1);
        assert_eq!(report.items_moved, 10);
        assert_eq!(world.inventory(at(-1, 1)).unwrap().total(), 10);
        assert_eq!(world.inventory(at(1, 1)).unwrap().total(), 20);
        assert_eq!(
            report.events,
            vec![RoutingEvent::ItemsTransferred {
                from: at(1, 0),
                to: at(-1, 0),
                quantity: 10,
                tick: 1,
            }]
        );
        assert!(world.changes().is_changed(at(1, 1)));
        assert!(world.changes().is_changed(at(-1, 1)));
    }

    #[test]
    fn bandwidth_caps_each_tick() {
        let (master, nodes) =
            small_network(whitelist_unlimited(&[iron()]), whitelist_unlimited(&[iron()]));
        let mut world = StorageWorld::new();
        world.place_inventory(at(1, 1), inventory_with(&[iron_stack(40)]));
        world.place_inventory(at(-1, 1), inventory_with(&[]));
        let config = RoutingConfig {
            item_bandwidth: 8,
            ..RoutingConfig::default()
        };

        let mut engine = TransferEngine::new();
        let report = engine.run(&master, &nodes, &mut world, &config, 1);
        assert_eq!(report.items_moved, 8);
        let report = engine.run(&master, &nodes, &mut world, &config, 2);
        assert_eq!(report.items_moved, 8);
        assert_eq!(world.inventory(at(-1, 1)).unwrap().total(), 16);
    }

    #[test]
    fn missing_endpoints_move_nothing() {
        let (master, nodes) =
            small_network(whitelist_unlimited(&[iron()]), whitelist(&[(iron(), 10)]));
        let mut world = StorageWorld::new();
        world.place_inventory(at(1, 1), inventory_with(&[iron_stack(30)]));

        let config = RoutingConfig::default();
        let report = TransferEngine::new().run(&master, &nodes, &mut world, &config, 1);
        assert_eq!(report.items_moved, 0);
        assert!(report.events.is_empty());
        assert_eq!(world.total_items(), 30);
    }
}
