//! The master's view of its network: a registry of member nodes and the
//! canonical connection graph used for routing.

use crate::node::NodeKind;
use conduit_core::position::Position;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Owner of one network.
///
/// The registry holds every node reachable from the master through the
/// graph, the master included. Edges are undirected and stored on both
/// ends. Iteration is in position order, which keeps transfers and routes
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRoutingNode {
    position: Position,
    registry: BTreeMap<Position, NodeKind>,
    graph: BTreeMap<Position, BTreeSet<Position>>,
}

impl MasterRoutingNode {
    pub fn new(position: Position) -> Self {
        let mut registry = BTreeMap::new();
        registry.insert(position, NodeKind::Master);
        Self {
            position,
            registry,
            graph: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register a member. Returns `true` if it was not registered before.
    pub fn add_node_to_list(&mut self, pos: Position, kind: NodeKind) -> bool {
        self.registry.insert(pos, kind).is_none()
    }

    /// Drop a member and every edge touching it. The master itself cannot
    /// be dropped.
    pub fn remove_node_from_list(&mut self, pos: Position) -> bool {
        if pos == self.position {
            return false;
        }
        if let Some(neighbors) = self.graph.remove(&pos) {
            for other in neighbors {
                self.unlink(other, pos);
            }
        }
        self.registry.remove(&pos).is_some()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.registry.contains_key(&pos)
    }

    pub fn kind_of(&self, pos: Position) -> Option<NodeKind> {
        self.registry.get(&pos).copied()
    }

    /// Members in position order, the master included.
    pub fn registry(&self) -> impl Iterator<Item = (Position, NodeKind)> + '_ {
        self.registry.iter().map(|(pos, kind)| (*pos, *kind))
    }

    pub fn members(&self) -> impl Iterator<Item = Position> + '_ {
        self.registry.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn input_nodes(&self) -> impl Iterator<Item = Position> + '_ {
        self.registry()
            .filter(|(_, kind)| kind.is_input())
            .map(|(pos, _)| pos)
    }

    pub fn output_nodes(&self) -> impl Iterator<Item = Position> + '_ {
        self.registry()
            .filter(|(_, kind)| kind.is_output())
            .map(|(pos, _)| pos)
    }

    /// Forget every member and edge, keeping only the master.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.registry.insert(self.position, NodeKind::Master);
        self.graph.clear();
    }

    // -----------------------------------------------------------------------
    // Graph
    // -----------------------------------------------------------------------

    /// Add the undirected edge `a`-`b`. Self-loops are rejected.
    pub fn add_connection(&mut self, a: Position, b: Position) -> bool {
        if a == b {
            return false;
        }
        let added = self.graph.entry(a).or_default().insert(b);
        self.graph.entry(b).or_default().insert(a);
        added
    }

    pub fn remove_connection(&mut self, a: Position, b: Position) -> bool {
        let removed = self.unlink(a, b);
        self.unlink(b, a);
        removed
    }

    pub fn has_connection(&self, a: Position, b: Position) -> bool {
        self.graph.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Graph neighbors of `pos`, in position order.
    pub fn connected(&self, pos: Position) -> Vec<Position> {
        self.graph
            .get(&pos)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    fn unlink(&mut self, from: Position, to: Position) -> bool {
        let Some(set) = self.graph.get_mut(&from) else {
            return false;
        };
        let removed = set.remove(&to);
        if set.is_empty() {
            self.graph.remove(&from);
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Routes
    // -----------------------------------------------------------------------

    /// Whether `path` is still a walk from the master to `node_pos` over the
    /// current graph.
    pub fn is_connected(&self, path: &[Position], node_pos: Position) -> bool {
        if path.first() != Some(&self.position) || path.last() != Some(&node_pos) {
            return false;
        }
        path.windows(2).all(|hop| self.has_connection(hop[0], hop[1]))
    }

    /// Shortest route from the master to `node_pos`, both ends included.
    /// Ties between equal-length routes go to the lower positions.
    pub fn find_route(&self, node_pos: Position) -> Option<Vec<Position>> {
        if node_pos == self.position {
            return Some(vec![self.position]);
        }
        let mut parent: BTreeMap<Position, Position> = BTreeMap::new();
        let mut queue = VecDeque::from([self.position]);
        let mut seen = BTreeSet::from([self.position]);

        while let Some(current) = queue.pop_front() {
            for next in self.graph.get(&current).into_iter().flatten() {
                if !seen.insert(*next) {
                    continue;
                }
                parent.insert(*next, current);
                if *next == node_pos {
                    let mut route = vec![node_pos];
                    let mut cursor = node_pos;
                    while let Some(prev) = parent.get(&cursor) {
                        route.push(*prev);
                        cursor = *prev;
                    }
                    route.reverse();
                    return Some(route);
                }
                queue.push_back(*next);
            }
        }
        None
    }

    /// Every position reachable from the master over the graph.
    pub fn reachable(&self) -> BTreeSet<Position> {
        let mut seen = BTreeSet::from([self.position]);
        let mut queue = VecDeque::from([self.position]);
        while let Some(current) = queue.pop_front() {
            for next in self.graph.get(&current).into_iter().flatten() {
                if seen.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        seen
    }

    /// Drop members (and their edges) that the graph no longer reaches.
    /// Returns them in position order.
    pub fn prune_unreachable(&mut self) -> Vec<Position> {
        let reachable = self.reachable();
        let stale: Vec<Position> = self
            .registry
            .keys()
            .chain(self.graph.keys())
            .filter(|pos| !reachable.contains(pos))
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for pos in &stale {
            self.remove_node_from_list(*pos);
        }
        stale
    }
}
