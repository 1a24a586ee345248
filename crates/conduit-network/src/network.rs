//! The routing network facade.
//!
//! [`RoutingNetwork`] owns every routing node and master in one world and
//! is the only place that mutates topology. The surrounding game reports
//! block placement, removal and connection toggles through the lifecycle
//! hooks, and calls [`RoutingNetwork::tick`] once per game tick.
//!
//! # Topology rules
//!
//! - Placing a node connects it to every routing node on its six faces.
//! - An edge carries traffic only while both ends have it enabled.
//! - A master claims every node it can reach that has no live master of its
//!   own. It never claims, or floods through, another master's nodes.
//! - A node that loses its path to its master is orphaned and retries
//!   discovery every `rediscovery_interval` ticks, spending at most
//!   `discovery_budget` node expansions per tick across all orphans.

use crate::config::RoutingConfig;
use crate::discovery::{FloodStep, MasterFlood, MasterSearch, SearchStep, SearchTarget};
use crate::event::{RoutingEvent, Ticks};
use crate::master::MasterRoutingNode;
use crate::node::{MAX_PRIORITY, NodeKind, NodeLookup, RoutingNode, SideConfig};
use crate::transfer::TransferEngine;
use crate::world::EndpointProvider;
use conduit_core::filter_key::{FilterConfig, FilterError};
use conduit_core::position::{Direction, Position};
use conduit_core::resource::{FluidStack, ItemStack};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from lifecycle hooks and configuration calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("a routing node already exists at {0}")]
    NodeExists(Position),
    #[error("no routing node at {0}")]
    NodeNotFound(Position),
    #[error("{0} has no connection to {1}")]
    NotConnected(Position, Position),
    #[error("a node cannot connect to itself ({0})")]
    SelfConnection(Position),
    #[error("priority {0} is out of range (0..={max})", max = MAX_PRIORITY)]
    PriorityOutOfRange(u8),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

// ---------------------------------------------------------------------------
// RoutingNetwork
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RoutingNetwork {
    config: RoutingConfig,
    nodes: BTreeMap<Position, RoutingNode>,
    masters: BTreeMap<Position, MasterRoutingNode>,
    /// In-flight orphan searches, keyed by origin.
    searches: BTreeMap<Position, MasterSearch>,
    /// Orphans waiting for their next search, with the tick it may start.
    retry_at: BTreeMap<Position, Ticks>,
    engine: TransferEngine,
    pending_events: Vec<RoutingEvent>,
    tick: Ticks,
}

impl Default for RoutingNetwork {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

impl RoutingNetwork {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config,
            nodes: BTreeMap::new(),
            masters: BTreeMap::new(),
            searches: BTreeMap::new(),
            retry_at: BTreeMap::new(),
            engine: TransferEngine::new(),
            pending_events: Vec::new(),
            tick: 0,
        }
    }

    /// Rebuild a network from nodes whose links and sides are already set.
    /// Masters flood in position order, so a node bordering two networks
    /// goes to the lower master. Orphans are queued for rediscovery. The
    /// rebuild emits no events.
    pub(crate) fn from_restored_nodes(
        config: RoutingConfig,
        tick: Ticks,
        nodes: Vec<RoutingNode>,
    ) -> Self {
        let mut network = Self::new(config);
        network.tick = tick;
        for mut node in nodes {
            node.set_master_position(None);
            network.nodes.insert(node.position(), node);
        }

        let masters: Vec<Position> = network
            .nodes
            .values()
            .filter(|n| n.kind().is_master())
            .map(RoutingNode::position)
            .collect();
        for master in &masters {
            network.masters.insert(*master, MasterRoutingNode::new(*master));
            if let Some(node) = network.nodes.get_mut(master) {
                node.set_master_position(Some(*master));
            }
        }
        for master in masters {
            network.rediscover(master);
        }

        let orphans: Vec<Position> = network
            .nodes
            .values()
            .filter(|n| n.master_position().is_none())
            .map(RoutingNode::position)
            .collect();
        for orphan in orphans {
            network.retry_at.insert(orphan, tick);
        }
        network.pending_events.clear();
        network
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RoutingConfig) {
        self.config = config;
    }

    /// The last tick that ran. Zero before the first call to `tick`.
    pub fn current_tick(&self) -> Ticks {
        self.tick
    }

    pub fn node(&self, pos: Position) -> Option<&RoutingNode> {
        self.nodes.get(&pos)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RoutingNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn master(&self, pos: Position) -> Option<&MasterRoutingNode> {
        self.masters.get(&pos)
    }

    pub fn masters(&self) -> impl Iterator<Item = &MasterRoutingNode> {
        self.masters.values()
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    /// Whether an orphan at `pos` has a search running or scheduled.
    pub fn is_awaiting_rediscovery(&self, pos: Position) -> bool {
        self.searches.contains_key(&pos) || self.retry_at.contains_key(&pos)
    }

    pub fn active_searches(&self) -> usize {
        self.searches.len()
    }

    /// Take the events queued since the last tick without running one.
    pub fn drain_events(&mut self) -> Vec<RoutingEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// The master that currently owns `pos`, if it still exists. A master
    /// owns itself.
    pub fn live_master_of(&self, pos: Position) -> Option<Position> {
        let node = self.nodes.get(&pos)?;
        if node.kind().is_master() {
            return Some(pos);
        }
        node.master_position()
            .filter(|master| self.masters.contains_key(master))
    }

    // -----------------------------------------------------------------------
    // Lifecycle hooks
    // -----------------------------------------------------------------------

    /// A routing block was placed at `pos`.
    pub fn on_node_added(&mut self, pos: Position, kind: NodeKind) -> Result<(), RoutingError> {
        if self.nodes.contains_key(&pos) {
            return Err(RoutingError::NodeExists(pos));
        }

        let mut node = RoutingNode::new(pos, kind);
        let neighbors: Vec<Position> = pos
            .neighbors()
            .into_iter()
            .filter(|other| self.nodes.contains_key(other))
            .collect();
        for other in &neighbors {
            node.add_connection(*other);
            if let Some(neighbor) = self.nodes.get_mut(other) {
                neighbor.add_connection(pos);
            }
        }
        self.nodes.insert(pos, node);
        trace!(%pos, ?kind, neighbors = neighbors.len(), "node added");

        if kind.is_master() {
            self.masters.insert(pos, MasterRoutingNode::new(pos));
            if let Some(node) = self.nodes.get_mut(&pos) {
                node.set_master_position(Some(pos));
            }
            self.rediscover(pos);
            return Ok(());
        }

        let master = neighbors
            .iter()
            .filter(|other| self.nodes.is_traversable(pos, **other))
            .find_map(|other| self.live_master_of(*other));
        match master {
            Some(master) => {
                self.connect_master_to_remaining_node(pos, master);
            }
            None => {
                self.retry_at.insert(pos, self.tick);
            }
        }
        Ok(())
    }

    /// The routing block at `pos` was removed. Returns its final state.
    pub fn on_node_removed(&mut self, pos: Position) -> Result<RoutingNode, RoutingError> {
        let node = self.nodes.remove(&pos).ok_or(RoutingError::NodeNotFound(pos))?;
        self.searches.remove(&pos);
        self.retry_at.remove(&pos);
        self.engine.forget(pos);

        let neighbors: Vec<Position> = node.connections().map(|(other, _)| other).collect();
        for other in &neighbors {
            if let Some(neighbor) = self.nodes.get_mut(other) {
                neighbor.remove_connection(pos);
            }
        }

        if node.kind().is_master() {
            self.remove_master(pos);
        } else if let Some(master_pos) = node.master_position() {
            if let Some(master) = self.masters.get_mut(&master_pos) {
                master.remove_node_from_list(pos);
            }
            let mut confirmed: BTreeSet<Position> = BTreeSet::new();
            for other in neighbors {
                if confirmed.contains(&other) || self.owner_of(other) != Some(master_pos) {
                    continue;
                }
                let visited = self.check_and_purge_connection_to_master(other, Some(pos));
                if self.owner_of(other) == Some(master_pos) {
                    confirmed.extend(visited);
                }
            }
        }

        debug!(%pos, kind = ?node.kind(), "node removed");
        Ok(node)
    }

    /// One end of the connection `a`-`b` was switched on or off at `a`.
    pub fn on_connection_toggled(
        &mut self,
        a: Position,
        b: Position,
        enabled: bool,
    ) -> Result<(), RoutingError> {
        if a == b {
            return Err(RoutingError::SelfConnection(a));
        }
        let node = self.nodes.get(&a).ok_or(RoutingError::NodeNotFound(a))?;
        if !node.has_connection(b) {
            return Err(RoutingError::NotConnected(a, b));
        }

        let was_traversable = self.nodes.is_traversable(a, b);
        if let Some(node) = self.nodes.get_mut(&a) {
            node.set_connection_enabled(b, enabled);
        }
        let now_traversable = self.nodes.is_traversable(a, b);
        trace!(%a, %b, enabled, "connection toggled");

        match (was_traversable, now_traversable) {
            (true, false) => self.sever(a, b),
            (false, true) => self.join(a, b),
            _ => {}
        }
        Ok(())
    }

    fn remove_master(&mut self, pos: Position) {
        let Some(master) = self.masters.remove(&pos) else {
            return;
        };
        self.engine.forget_master(pos);

        let orphans: Vec<Position> = master
            .members()
            .filter(|member| *member != pos && self.owner_of(*member) == Some(pos))
            .collect();
        debug!(master = %pos, members = orphans.len(), "master removed");
        self.pending_events.push(RoutingEvent::MasterRemoved {
            master: pos,
            members: orphans.len(),
            tick: self.tick,
        });
        self.orphan_nodes(&orphans, pos);
    }

    fn sever(&mut self, a: Position, b: Position) {
        let owners: BTreeSet<Position> = [a, b]
            .into_iter()
            .filter_map(|end| self.live_master_of(end))
            .collect();
        for owner in owners {
            if let Some(master) = self.masters.get_mut(&owner) {
                master.remove_connection(a, b);
            }
        }
        // The cut edge is already untraversable, so neither end is ignored.
        self.check_and_purge_connection_to_master(a, None);
        self.check_and_purge_connection_to_master(b, None);
    }

    fn join(&mut self, a: Position, b: Position) {
        match (self.live_master_of(a), self.live_master_of(b)) {
            (Some(master_a), Some(master_b)) if master_a == master_b => {
                if let Some(master) = self.masters.get_mut(&master_a) {
                    master.add_connection(a, b);
                }
            }
            (Some(master), None) => {
                self.connect_master_to_remaining_node(b, master);
            }
            (None, Some(master)) => {
                self.connect_master_to_remaining_node(a, master);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Discovery and repair
    // -----------------------------------------------------------------------

    /// Search from `pos` for its master over the master's own nodes. If the
    /// master cannot be reached, every node the search found is orphaned.
    /// Returns the positions the search checked; empty if `pos` has no
    /// master.
    pub fn check_and_purge_connection_to_master(
        &mut self,
        pos: Position,
        ignore: Option<Position>,
    ) -> BTreeSet<Position> {
        let Some(master_pos) = self.owner_of(pos) else {
            return BTreeSet::new();
        };

        let mut search = MasterSearch::new(pos, SearchTarget::Master(master_pos), ignore);
        let found = if self.masters.contains_key(&master_pos) {
            search.run(&self.nodes)
        } else {
            None
        };

        if found.is_none() {
            let fragment = search.found_nodes().to_vec();
            debug!(
                %pos,
                master = %master_pos,
                orphaned = fragment.len(),
                "lost connection to master"
            );
            self.orphan_nodes(&fragment, master_pos);
        }
        search.checked().clone()
    }

    /// Advance an externally held search by up to `max_expansions` nodes.
    pub fn recheck_connection_to_master(
        &self,
        search: &mut MasterSearch,
        max_expansions: usize,
    ) -> SearchStep {
        search.step(&self.nodes, max_expansions)
    }

    /// Attach `pos`, and whatever unowned nodes lie beyond it, to `master`.
    /// Returns the nodes that joined.
    pub fn connect_master_to_remaining_node(
        &mut self,
        pos: Position,
        master_pos: Position,
    ) -> Vec<Position> {
        let Some(master) = self.masters.get(&master_pos) else {
            return Vec::new();
        };
        let seeded: BTreeSet<Position> = master.members().filter(|m| *m != pos).collect();
        let result = MasterFlood::from_node(master_pos, pos, seeded).run(&self.nodes);
        self.apply_flood(master_pos, result)
    }

    /// Rebuild a master's registry and graph from scratch by flooding from
    /// it. Former members the flood no longer reaches are orphaned. Returns
    /// the new member count, the master included.
    pub fn rediscover(&mut self, master_pos: Position) -> usize {
        let Some(master) = self.masters.get_mut(&master_pos) else {
            return 0;
        };
        let previous: Vec<Position> = master.members().collect();
        master.reset();

        let result = MasterFlood::new(master_pos).run(&self.nodes);
        self.apply_flood(master_pos, result);

        let Some(master) = self.masters.get(&master_pos) else {
            return 0;
        };
        let lost: Vec<Position> = previous.into_iter().filter(|p| !master.contains(*p)).collect();
        let count = master.node_count();
        self.orphan_nodes(&lost, master_pos);
        count
    }

    fn apply_flood(&mut self, master_pos: Position, result: FloodStep) -> Vec<Position> {
        let mut joined = Vec::new();
        for pos in result.claimed {
            let Some(node) = self.nodes.get_mut(&pos) else {
                continue;
            };
            let kind = node.kind();
            let changed = node.master_position() != Some(master_pos);
            node.set_master_position(Some(master_pos));
            if let Some(master) = self.masters.get_mut(&master_pos) {
                master.add_node_to_list(pos, kind);
            }
            self.searches.remove(&pos);
            self.retry_at.remove(&pos);

            if changed && pos != master_pos {
                self.pending_events.push(RoutingEvent::NodeJoined {
                    node: pos,
                    master: master_pos,
                    tick: self.tick,
                });
                joined.push(pos);
            }
        }
        if let Some(master) = self.masters.get_mut(&master_pos) {
            for (a, b) in result.edges {
                master.add_connection(a, b);
            }
        }
        if !joined.is_empty() {
            debug!(master = %master_pos, joined = joined.len(), "nodes joined network");
        }
        joined
    }

    fn orphan_nodes(&mut self, positions: &[Position], former: Position) {
        for &pos in positions {
            let Some(node) = self.nodes.get_mut(&pos) else {
                continue;
            };
            if node.kind().is_master() || node.master_position() != Some(former) {
                continue;
            }
            node.set_master_position(None);
            if let Some(master) = self.masters.get_mut(&former) {
                master.remove_node_from_list(pos);
            }
            self.engine.forget(pos);
            self.retry_at.insert(pos, self.tick);
            self.pending_events.push(RoutingEvent::NodeOrphaned {
                node: pos,
                former_master: former,
                tick: self.tick,
            });
        }
    }

    fn owner_of(&self, pos: Position) -> Option<Position> {
        self.nodes.get(&pos).and_then(RoutingNode::master_position)
    }

    /// Start due orphan searches and advance running ones within the tick's
    /// discovery budget.
    fn advance_rediscovery(&mut self) {
        let due: Vec<Position> = self
            .retry_at
            .iter()
            .filter(|(_, at)| **at <= self.tick)
            .map(|(pos, _)| *pos)
            .collect();
        for pos in due {
            self.retry_at.remove(&pos);
            if self.owner_of(pos).is_none() && self.nodes.contains_key(&pos) {
                self.searches
                    .insert(pos, MasterSearch::new(pos, SearchTarget::AnyMaster, None));
            }
        }

        let mut budget = self.config.discovery_budget;
        let origins: Vec<Position> = self.searches.keys().copied().collect();
        for origin in origins {
            if budget == 0 {
                break;
            }
            let Some(mut search) = self.searches.remove(&origin) else {
                continue;
            };
            if !self.nodes.contains_key(&origin) || self.owner_of(origin).is_some() {
                continue;
            }

            let step = search.step(&self.nodes, budget);
            budget = budget.saturating_sub(step.expanded);

            if let Some(master) = step.found_master {
                trace!(%origin, %master, "orphan found a master");
                self.rediscover(master);
                if self.owner_of(origin).is_none() {
                    self.retry_at
                        .insert(origin, self.tick + self.config.rediscovery_interval);
                }
            } else if search.is_finished() {
                trace!(%origin, checked = search.checked().len(), "orphan search failed");
                self.retry_at
                    .insert(origin, self.tick + self.config.rediscovery_interval);
            } else {
                self.searches.insert(origin, search);
            }
        }
    }

    fn repair_unreachable(&mut self, node: Position, master_pos: Position) {
        self.check_and_purge_connection_to_master(node, None);
        if self.owner_of(node) == Some(master_pos) {
            warn!(
                %node,
                master = %master_pos,
                "master graph disagrees with node links; rebuilding"
            );
            self.rediscover(master_pos);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Neighbors of `pos` in its network: the master's graph when the node
    /// is registered, otherwise its own traversable links.
    pub fn get_connected(&self, pos: Position) -> Vec<Position> {
        let registered = self
            .live_master_of(pos)
            .and_then(|m| self.masters.get(&m))
            .filter(|master| master.contains(pos));
        match registered {
            Some(master) => master.connected(pos),
            None => self.nodes.traversable_neighbors(pos),
        }
    }

    pub fn get_priority(&self, pos: Position, side: Direction) -> Option<u8> {
        self.nodes.get(&pos).map(|node| node.priority(side))
    }

    pub fn get_item_filter_list(
        &self,
        pos: Position,
        side: Direction,
    ) -> Option<&FilterConfig<ItemStack>> {
        self.nodes.get(&pos)?.side(side)?.item_filter.as_ref()
    }

    pub fn get_fluid_filter_list(
        &self,
        pos: Position,
        side: Direction,
    ) -> Option<&FilterConfig<FluidStack>> {
        self.nodes.get(&pos)?.side(side)?.fluid_filter.as_ref()
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Replace the whole configuration of one side.
    pub fn configure_side(
        &mut self,
        pos: Position,
        side: Direction,
        config: SideConfig,
    ) -> Result<(), RoutingError> {
        if config.priority > MAX_PRIORITY {
            return Err(RoutingError::PriorityOutOfRange(config.priority));
        }
        if let Some(filter) = &config.item_filter {
            filter.validate()?;
        }
        if let Some(filter) = &config.fluid_filter {
            filter.validate()?;
        }
        let node = self.nodes.get_mut(&pos).ok_or(RoutingError::NodeNotFound(pos))?;
        node.set_side(side, config);
        Ok(())
    }

    pub fn set_priority(
        &mut self,
        pos: Position,
        side: Direction,
        priority: u8,
    ) -> Result<(), RoutingError> {
        if priority > MAX_PRIORITY {
            return Err(RoutingError::PriorityOutOfRange(priority));
        }
        let node = self.nodes.get_mut(&pos).ok_or(RoutingError::NodeNotFound(pos))?;
        node.side_mut(side).priority = priority;
        Ok(())
    }

    pub fn set_item_filter(
        &mut self,
        pos: Position,
        side: Direction,
        filter: Option<FilterConfig<ItemStack>>,
    ) -> Result<(), RoutingError> {
        if let Some(filter) = &filter {
            filter.validate()?;
        }
        let node = self.nodes.get_mut(&pos).ok_or(RoutingError::NodeNotFound(pos))?;
        node.side_mut(side).item_filter = filter;
        Ok(())
    }

    pub fn set_fluid_filter(
        &mut self,
        pos: Position,
        side: Direction,
        filter: Option<FilterConfig<FluidStack>>,
    ) -> Result<(), RoutingError> {
        if let Some(filter) = &filter {
            filter.validate()?;
        }
        let node = self.nodes.get_mut(&pos).ok_or(RoutingError::NodeNotFound(pos))?;
        node.side_mut(side).fluid_filter = filter;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance one tick: progress orphan searches, then run every master's
    /// transfer pass if this is a transfer tick. Returns every event queued
    /// since the previous tick.
    pub fn tick<W>(&mut self, world: &mut W) -> Vec<RoutingEvent>
    where
        W: EndpointProvider<ItemStack> + EndpointProvider<FluidStack> + ?Sized,
    {
        self.tick += 1;
        self.advance_rediscovery();

        if self.config.transfers_on(self.tick) {
            let masters: Vec<Position> = self.masters.keys().copied().collect();
            for master_pos in masters {
                let Some(master) = self.masters.get(&master_pos) else {
                    continue;
                };
                let report = self
                    .engine
                    .run(master, &self.nodes, &mut *world, &self.config, self.tick);
                self.pending_events.extend(report.events);
                for node in report.unreachable {
                    self.repair_unreachable(node, master_pos);
                }
            }
        }

        std::mem::take(&mut self.pending_events)
    }
}
