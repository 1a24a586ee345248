//! Chunked breadth-first searches over the node set.
//!
//! Two searches live here:
//!
//! - [`MasterSearch`] walks outward from one node looking for a master. It
//!   backs purge checks after a removal or a severed edge, and the
//!   rediscovery attempts of orphaned nodes.
//! - [`MasterFlood`] walks outward from a master (or from a node being
//!   attached to one) and reports every node and edge it may claim.
//!
//! Both keep their frontier between calls so the work can be spread over
//! several ticks. A call to `step` expands at most `max_expansions` frontier
//! nodes in FIFO order, so the visit order is breadth-first no matter how
//! the work is chunked.

use crate::node::NodeLookup;
use conduit_core::position::Position;
use std::collections::{BTreeSet, VecDeque};

// ---------------------------------------------------------------------------
// MasterSearch
// ---------------------------------------------------------------------------

/// What a [`MasterSearch`] is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    /// One specific master. Only nodes it owns are walked through, which
    /// keeps the search on the same edges as the master's graph.
    Master(Position),
    /// Any live master. Every non-master node is walked through.
    AnyMaster,
}

/// Outcome of one [`MasterSearch::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStep {
    pub found_master: Option<Position>,
    /// Positions marked as checked during this step.
    pub newly_checked: Vec<Position>,
    /// Non-master nodes added to the found list during this step.
    pub newly_found: Vec<Position>,
    /// Frontier nodes expanded during this step.
    pub expanded: usize,
}

/// A resumable search from `origin` toward a master.
#[derive(Debug, Clone)]
pub struct MasterSearch {
    origin: Position,
    target: SearchTarget,
    ignore: Option<Position>,
    checked: BTreeSet<Position>,
    frontier: VecDeque<Position>,
    found: Vec<Position>,
    found_master: Option<Position>,
}

impl MasterSearch {
    /// Start a search at `origin`. `ignore` is never entered; it names the
    /// node being removed or the far end of an edge being cut.
    pub fn new(origin: Position, target: SearchTarget, ignore: Option<Position>) -> Self {
        let mut checked = BTreeSet::new();
        checked.insert(origin);
        Self {
            origin,
            target,
            ignore,
            checked,
            frontier: VecDeque::from([origin]),
            found: vec![origin],
            found_master: None,
        }
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn target(&self) -> SearchTarget {
        self.target
    }

    pub fn found_master(&self) -> Option<Position> {
        self.found_master
    }

    /// Every position checked so far, the origin included.
    pub fn checked(&self) -> &BTreeSet<Position> {
        &self.checked
    }

    /// Non-master nodes reached so far, in discovery order.
    pub fn found_nodes(&self) -> &[Position] {
        &self.found
    }

    pub fn is_finished(&self) -> bool {
        self.found_master.is_some() || self.frontier.is_empty()
    }

    /// Expand up to `max_expansions` frontier nodes.
    pub fn step<L: NodeLookup + ?Sized>(
        &mut self,
        lookup: &L,
        max_expansions: usize,
    ) -> SearchStep {
        let mut step = SearchStep::default();
        if self.origin_is_target(lookup) {
            self.found_master = Some(self.origin);
            self.frontier.clear();
        }

        while step.expanded < max_expansions && !self.is_finished() {
            let Some(current) = self.frontier.pop_front() else {
                break;
            };
            step.expanded += 1;

            for next in lookup.traversable_neighbors(current) {
                if Some(next) == self.ignore || !self.checked.insert(next) {
                    continue;
                }
                step.newly_checked.push(next);
                let Some(node) = lookup.node(next) else {
                    continue;
                };

                if node.kind().is_master() {
                    let wanted = match self.target {
                        SearchTarget::Master(master) => next == master,
                        SearchTarget::AnyMaster => true,
                    };
                    if wanted {
                        self.found_master = Some(next);
                        self.frontier.clear();
                        break;
                    }
                    continue;
                }

                if let SearchTarget::Master(master) = self.target {
                    if node.master_position() != Some(master) {
                        continue;
                    }
                }

                self.found.push(next);
                step.newly_found.push(next);
                self.frontier.push_back(next);
            }
        }

        step.found_master = self.found_master;
        step
    }

    /// Run the search to completion.
    pub fn run<L: NodeLookup + ?Sized>(&mut self, lookup: &L) -> Option<Position> {
        while !self.is_finished() {
            self.step(lookup, usize::MAX);
        }
        self.found_master
    }

    fn origin_is_target<L: NodeLookup + ?Sized>(&self, lookup: &L) -> bool {
        if self.found_master.is_some() || !lookup.is_live_master(self.origin) {
            return false;
        }
        match self.target {
            SearchTarget::Master(master) => master == self.origin,
            SearchTarget::AnyMaster => true,
        }
    }
}

// ---------------------------------------------------------------------------
// MasterFlood
// ---------------------------------------------------------------------------

/// Outcome of one [`MasterFlood::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloodStep {
    /// Nodes reached for the first time, in breadth-first order.
    pub claimed: Vec<Position>,
    /// Traversable edges between claimable nodes, each reported once from
    /// the end expanded first.
    pub edges: Vec<(Position, Position)>,
    pub expanded: usize,
}

/// A resumable flood-fill that claims nodes for one master.
///
/// The flood never enters another live master, nor any node that master
/// currently owns. Nodes without a master, or whose master no longer
/// exists, are claimable.
#[derive(Debug, Clone)]
pub struct MasterFlood {
    master: Position,
    visited: BTreeSet<Position>,
    /// Nodes expanded by this flood; seeded nodes are not included.
    expanded: BTreeSet<Position>,
    frontier: VecDeque<Position>,
}

impl MasterFlood {
    /// Flood the whole network reachable from `master`.
    pub fn new(master: Position) -> Self {
        Self::from_node(master, master, BTreeSet::new())
    }

    /// Flood outward from `start`, treating `already_checked` as owned and
    /// not walking into it again. Edges into already-checked nodes are still
    /// reported.
    pub fn from_node(
        master: Position,
        start: Position,
        already_checked: BTreeSet<Position>,
    ) -> Self {
        let mut visited = already_checked;
        visited.insert(start);
        Self {
            master,
            visited,
            expanded: BTreeSet::new(),
            frontier: VecDeque::from([start]),
        }
    }

    pub fn master(&self) -> Position {
        self.master
    }

    pub fn visited(&self) -> &BTreeSet<Position> {
        &self.visited
    }

    pub fn is_finished(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Whether the flood may claim the node at `pos`.
    pub fn can_claim<L: NodeLookup + ?Sized>(&self, lookup: &L, pos: Position) -> bool {
        let Some(node) = lookup.node(pos) else {
            return false;
        };
        if node.kind().is_master() {
            return pos == self.master;
        }
        match node.master_position() {
            None => true,
            Some(owner) if owner == self.master => true,
            Some(owner) => !lookup.is_live_master(owner),
        }
    }

    /// Expand up to `max_expansions` frontier nodes.
    pub fn step<L: NodeLookup + ?Sized>(&mut self, lookup: &L, max_expansions: usize) -> FloodStep {
        let mut step = FloodStep::default();

        while step.expanded < max_expansions {
            let Some(current) = self.frontier.pop_front() else {
                break;
            };
            if !self.can_claim(lookup, current) {
                continue;
            }
            step.expanded += 1;
            self.expanded.insert(current);
            step.claimed.push(current);

            for next in lookup.traversable_neighbors(current) {
                if !self.can_claim(lookup, next) {
                    continue;
                }
                // Already reported from the other end.
                if !self.expanded.contains(&next) {
                    step.edges.push((current, next));
                }
                if self.visited.insert(next) {
                    self.frontier.push_back(next);
                }
            }
        }
        step
    }

    /// Run the flood to completion and merge every step.
    pub fn run<L: NodeLookup + ?Sized>(&mut self, lookup: &L) -> FloodStep {
        let mut total = FloodStep::default();
        while !self.is_finished() {
            let step = self.step(lookup, usize::MAX);
            total.claimed.extend(step.claimed);
            total.edges.extend(step.edges);
            total.expanded += step.expanded;
        }
        total
    }
}
