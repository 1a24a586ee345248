//! Routing networks: nodes, masters, discovery, repair and transfers.
//!
//! # Modules
//!
//! - [`node`]: per-block state and the [`NodeLookup`](node::NodeLookup) view
//! - [`master`]: a master's registry, connection graph and routes
//! - [`discovery`]: chunked searches toward and floods from a master
//! - [`network`]: the [`RoutingNetwork`] facade and its lifecycle hooks
//! - [`transfer`]: the per-tick transfer pass and route cache
//! - [`world`]: the endpoint storage the network moves resources between
//! - [`serialize`]: snapshots of topology and configuration
//! - [`config`], [`event`]: tuning knobs and emitted events

pub mod config;
pub mod discovery;
pub mod event;
pub mod master;
pub mod network;
pub mod node;
pub mod serialize;
pub mod transfer;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::RoutingConfig;
pub use event::RoutingEvent;
pub use network::{RoutingError, RoutingNetwork};
