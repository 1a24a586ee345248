//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::filter_key::{Amount, FilterConfig, MatchMode};
use crate::resource::{FluidStack, FluidTypeId, ItemStack, ItemTypeId};
use crate::storage::{Inventory, TankSet};

// ===========================================================================
// Resource constructors
// ===========================================================================

pub fn iron() -> ItemTypeId {
    ItemTypeId(0)
}
pub fn copper() -> ItemTypeId {
    ItemTypeId(1)
}
pub fn gold() -> ItemTypeId {
    ItemTypeId(2)
}
pub fn water() -> FluidTypeId {
    FluidTypeId(0)
}
pub fn lava() -> FluidTypeId {
    FluidTypeId(1)
}

pub fn iron_stack(quantity: u32) -> ItemStack {
    ItemStack::new(iron(), quantity)
}
pub fn copper_stack(quantity: u32) -> ItemStack {
    ItemStack::new(copper(), quantity)
}
pub fn gold_stack(quantity: u32) -> ItemStack {
    ItemStack::new(gold(), quantity)
}
pub fn water_stack(amount: u32) -> FluidStack {
    FluidStack::new(water(), amount)
}
pub fn lava_stack(amount: u32) -> FluidStack {
    FluidStack::new(lava(), amount)
}

// ===========================================================================
// Filter configurations
// ===========================================================================

fn config_from(
    mut config: FilterConfig<ItemStack>,
    entries: &[(ItemTypeId, u32)],
) -> FilterConfig<ItemStack> {
    for &(kind, amount) in entries {
        config
            .add_entry(ItemStack::new(kind, 1), Amount::Limited(amount), MatchMode::Exact)
            .expect("test filter entry must be valid");
    }
    config
}

/// Whitelist with exact-match entries of limited amounts.
pub fn whitelist(entries: &[(ItemTypeId, u32)]) -> FilterConfig<ItemStack> {
    config_from(FilterConfig::whitelist(), entries)
}

/// Whitelist requesting (or, on an input, releasing) every unit of each kind.
pub fn whitelist_unlimited(kinds: &[ItemTypeId]) -> FilterConfig<ItemStack> {
    let mut config = FilterConfig::whitelist();
    for &kind in kinds {
        config
            .add_entry(ItemStack::new(kind, 1), Amount::Unlimited, MatchMode::Exact)
            .expect("test filter entry must be valid");
    }
    config
}

pub fn blacklist(entries: &[(ItemTypeId, u32)]) -> FilterConfig<ItemStack> {
    config_from(FilterConfig::blacklist(), entries)
}

pub fn fluid_whitelist(entries: &[(FluidTypeId, Amount)]) -> FilterConfig<FluidStack> {
    let mut config = FilterConfig::whitelist();
    for &(kind, amount) in entries {
        config
            .add_entry(FluidStack::new(kind, 1), amount, MatchMode::Exact)
            .expect("test filter entry must be valid");
    }
    config
}

// ===========================================================================
// Storage
// ===========================================================================

/// A 64-per-slot inventory holding each stack in its own slot, followed by
/// two empty slots.
pub fn inventory_with(stacks: &[ItemStack]) -> Inventory {
    let mut inv = Inventory::new(stacks.len() + 2, 64);
    for (index, stack) in stacks.iter().enumerate() {
        inv.set_slot(index, Some(stack.clone()));
    }
    inv
}

/// Tanks of `capacity` each, holding the given fluids in order.
pub fn tanks_with(fluids: &[FluidStack], tank_count: usize, capacity: u32) -> TankSet {
    let mut tanks = TankSet::new(tank_count.max(fluids.len()), capacity);
    for (index, fluid) in fluids.iter().enumerate() {
        tanks.set_slot(index, Some(fluid.clone()));
    }
    tanks
}
