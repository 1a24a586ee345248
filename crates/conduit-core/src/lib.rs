//! Conduit Core -- shared value types for the item and fluid routing network.
//!
//! This crate holds everything the routing graph and the transfer engine
//! agree on but that has no notion of topology:
//!
//! - [`position::Position`] and [`position::Direction`] -- node identity and
//!   the six sides of a block.
//! - [`resource::ItemStack`] and [`resource::FluidStack`] behind the
//!   [`resource::Resource`] trait, so storage and filters are written once.
//! - [`storage::Storage`] -- the narrow slot capability the network consumes
//!   from inventories and tanks, with [`storage::SlotStorage`] as an
//!   in-memory implementation.
//! - [`filter_key::FilterKey`] and [`filter_key::FilterConfig`] -- the
//!   persisted wants of a filter.
//! - [`filter::Filter`] -- whitelist/blacklist policies with fill-to-request
//!   and pull-until-request transfer semantics.
//! - [`dirty::ChangeTracker`] -- the change-notification sink.

pub mod dirty;
pub mod filter;
pub mod filter_key;
pub mod position;
pub mod resource;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
