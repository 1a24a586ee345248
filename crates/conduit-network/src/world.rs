//! The world the network routes through.
//!
//! The network never owns endpoints. It asks an [`EndpointProvider`] for
//! the storage at a position and reports which endpoints it changed.
//! [`StorageWorld`] is the bundled in-memory provider.

use conduit_core::dirty::ChangeTracker;
use conduit_core::position::Position;
use conduit_core::resource::{FluidStack, ItemStack, Resource};
use conduit_core::storage::{Inventory, Storage, TankSet};
use std::collections::BTreeMap;

/// Storage lookup for one resource type.
pub trait EndpointProvider<R: Resource> {
    fn storage(&self, pos: Position) -> Option<&dyn Storage<R>>;

    /// Two distinct endpoints borrowed mutably at once. `None` if either is
    /// missing or `a == b`.
    fn storage_pair_mut(
        &mut self,
        a: Position,
        b: Position,
    ) -> Option<(&mut dyn Storage<R>, &mut dyn Storage<R>)>;

    /// Called after a real transfer touched the endpoint at `pos`.
    fn notify_changed(&mut self, pos: Position);
}

/// What sits at one endpoint position. A block may expose items, fluids or
/// both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Endpoint {
    pub items: Option<Inventory>,
    pub fluids: Option<TankSet>,
}

/// In-memory endpoints keyed by position.
#[derive(Debug, Clone, Default)]
pub struct StorageWorld {
    endpoints: BTreeMap<Position, Endpoint>,
    changes: ChangeTracker,
}

impl StorageWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place_inventory(&mut self, pos: Position, inventory: Inventory) {
        self.endpoints.entry(pos).or_default().items = Some(inventory);
    }

    pub fn place_tanks(&mut self, pos: Position, tanks: TankSet) {
        self.endpoints.entry(pos).or_default().fluids = Some(tanks);
    }

    pub fn remove(&mut self, pos: Position) -> Option<Endpoint> {
        self.endpoints.remove(&pos)
    }

    pub fn endpoint(&self, pos: Position) -> Option<&Endpoint> {
        self.endpoints.get(&pos)
    }

    pub fn inventory(&self, pos: Position) -> Option<&Inventory> {
        self.endpoints.get(&pos).and_then(|e| e.items.as_ref())
    }

    pub fn inventory_mut(&mut self, pos: Position) -> Option<&mut Inventory> {
        self.endpoints.get_mut(&pos).and_then(|e| e.items.as_mut())
    }

    pub fn tanks(&self, pos: Position) -> Option<&TankSet> {
        self.endpoints.get(&pos).and_then(|e| e.fluids.as_ref())
    }

    pub fn tanks_mut(&mut self, pos: Position) -> Option<&mut TankSet> {
        self.endpoints.get_mut(&pos).and_then(|e| e.fluids.as_mut())
    }

    /// Total items across every inventory.
    pub fn total_items(&self) -> u64 {
        self.endpoints
            .values()
            .filter_map(|e| e.items.as_ref())
            .map(Inventory::total)
            .sum()
    }

    /// Total millibuckets across every tank set.
    pub fn total_fluid(&self) -> u64 {
        self.endpoints
            .values()
            .filter_map(|e| e.fluids.as_ref())
            .map(TankSet::total)
            .sum()
    }

    pub fn changes(&self) -> &ChangeTracker {
        &self.changes
    }

    /// Take the set of endpoints changed since the last drain.
    pub fn drain_changes(&mut self) -> Vec<Position> {
        self.changes.drain()
    }

    fn pair_mut<T>(
        &mut self,
        a: Position,
        b: Position,
        select: impl Fn(&mut Endpoint) -> Option<&mut T>,
    ) -> Option<(&mut T, &mut T)> {
        if a == b {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (pos, endpoint) in self.endpoints.iter_mut() {
            if *pos == a {
                first = select(endpoint);
            } else if *pos == b {
                second = select(endpoint);
            }
        }
        Some((first?, second?))
    }
}

impl EndpointProvider<ItemStack> for StorageWorld {
    fn storage(&self, pos: Position) -> Option<&dyn Storage<ItemStack>> {
        let inventory: &dyn Storage<ItemStack> = self.inventory(pos)?;
        Some(inventory)
    }

    fn storage_pair_mut(
        &mut self,
        a: Position,
        b: Position,
    ) -> Option<(&mut dyn Storage<ItemStack>, &mut dyn Storage<ItemStack>)> {
        let (first, second) = self.pair_mut(a, b, |e| e.items.as_mut())?;
        let first: &mut dyn Storage<ItemStack> = first;
        let second: &mut dyn Storage<ItemStack> = second;
        Some((first, second))
    }

    fn notify_changed(&mut self, pos: Position) {
        self.changes.mark(pos);
    }
}

impl EndpointProvider<FluidStack> for StorageWorld {
    fn storage(&self, pos: Position) -> Option<&dyn Storage<FluidStack>> {
        let tanks: &dyn Storage<FluidStack> = self.tanks(pos)?;
        Some(tanks)
    }

    fn storage_pair_mut(
        &mut self,
        a: Position,
        b: Position,
    ) -> Option<(&mut dyn Storage<FluidStack>, &mut dyn Storage<FluidStack>)> {
        let (first, second) = self.pair_mut(a, b, |e| e.fluids.as_mut())?;
        let first: &mut dyn Storage<FluidStack> = first;
        let second: &mut dyn Storage<FluidStack> = second;
        Some((first, second))
    }

    fn notify_changed(&mut self, pos: Position) {
        self.changes.mark(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::test_utils::*;

    #[test]
    fn pair_borrow_needs_two_distinct_endpoints() {
        let mut world = StorageWorld::new();
        let a = Position::new(0, 0, 0);
        let b = Position::new(1, 0, 0);
        world.place_inventory(a, inventory_with(&[iron_stack(5)]));
        assert!(EndpointProvider::<ItemStack>::storage_pair_mut(&mut world, a, b).is_none());
        world.place_inventory(b, inventory_with(&[]));
        assert!(EndpointProvider::<ItemStack>::storage_pair_mut(&mut world, a, a).is_none());

        let (src, dst) = EndpointProvider::<ItemStack>::storage_pair_mut(&mut world, a, b).unwrap();
        let taken = src.extract(0, 5, false).unwrap();
        assert_eq!(dst.insert_any(&taken, false), 5);
        assert_eq!(world.inventory(b).unwrap().total(), 5);
        assert_eq!(world.inventory(a).unwrap().total(), 0);
    }

    #[test]
    fn items_and_fluids_share_a_position() {
        let mut world = StorageWorld::new();
        let pos = Position::new(0, 1, 0);
        world.place_inventory(pos, inventory_with(&[copper_stack(3)]));
        world.place_tanks(pos, tanks_with(&[water_stack(500)], 1, 1000));
        assert!(EndpointProvider::<ItemStack>::storage(&world, pos).is_some());
        assert!(EndpointProvider::<FluidStack>::storage(&world, pos).is_some());
        assert_eq!(world.total_items(), 3);
        assert_eq!(world.total_fluid(), 500);
        world.remove(pos);
        assert!(EndpointProvider::<FluidStack>::storage(&world, pos).is_none());
    }

    #[test]
    fn notifications_land_in_the_tracker() {
        let mut world = StorageWorld::new();
        let pos = Position::new(4, 0, 0);
        EndpointProvider::<ItemStack>::notify_changed(&mut world, pos);
        assert!(world.changes().is_changed(pos));
        assert_eq!(world.drain_changes(), vec![pos]);
        assert!(!world.changes().any_changed());
    }
}
