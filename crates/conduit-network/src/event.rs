//! Events emitted by a routing network.
//!
//! Topology events are queued as lifecycle hooks run; transfer events are
//! queued during [`RoutingNetwork::tick`](crate::network::RoutingNetwork::tick).
//! Both are handed back in one batch at the end of the tick.

use conduit_core::position::Position;
use serde::{Deserialize, Serialize};

/// Simulation time in ticks.
pub type Ticks = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingEvent {
    // -- Topology --
    /// A node was claimed by a master's discovery flood.
    NodeJoined {
        node: Position,
        master: Position,
        tick: Ticks,
    },
    /// A node lost its path to its master and was dropped from it.
    NodeOrphaned {
        node: Position,
        former_master: Position,
        tick: Ticks,
    },
    /// A master node left the world; `members` nodes were orphaned.
    MasterRemoved {
        master: Position,
        members: usize,
        tick: Ticks,
    },
    /// A cached route failed validation and a new one was computed.
    RouteRepaired {
        node: Position,
        master: Position,
        tick: Ticks,
    },

    // -- Transfers --
    ItemsTransferred {
        from: Position,
        to: Position,
        quantity: u32,
        tick: Ticks,
    },
    FluidTransferred {
        from: Position,
        to: Position,
        amount: u32,
        tick: Ticks,
    },
}

impl RoutingEvent {
    pub fn tick(&self) -> Ticks {
        match self {
            RoutingEvent::NodeJoined { tick, .. }
            | RoutingEvent::NodeOrphaned { tick, .. }
            | RoutingEvent::MasterRemoved { tick, .. }
            | RoutingEvent::RouteRepaired { tick, .. }
            | RoutingEvent::ItemsTransferred { tick, .. }
            | RoutingEvent::FluidTransferred { tick, .. } => *tick,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            RoutingEvent::ItemsTransferred { .. } | RoutingEvent::FluidTransferred { .. }
        )
    }
}
