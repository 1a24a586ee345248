//! The storage capability consumed by filters and the transfer engine.
//!
//! A routing network never owns the inventories and tanks it moves resources
//! between. It only sees them through [`Storage`], a narrow slot-based
//! interface (query, insert, extract, each with a simulate flag).
//! [`SlotStorage`] is the in-memory implementation used by the bundled world
//! and by tests.

use crate::resource::{FluidStack, ItemStack, Resource};
use serde::{Deserialize, Serialize};

/// Slot-addressed access to an endpoint's contents.
///
/// All mutating calls take a `simulate` flag. A simulated call reports what
/// would happen without changing anything, and must agree with the real call
/// made immediately afterwards.
pub trait Storage<R: Resource> {
    /// Number of slots (item slots or fluid tanks).
    fn slot_count(&self) -> usize;

    /// Contents of a slot, or `None` if the slot is empty or out of range.
    fn contents_at(&self, index: usize) -> Option<R>;

    /// Insert into one slot. Returns the amount accepted, never more than
    /// `resource.amount()`.
    fn insert(&mut self, index: usize, resource: &R, simulate: bool) -> u32;

    /// Extract up to `amount` from one slot. Returns what was (or would be)
    /// removed, or `None` if nothing can be taken.
    fn extract(&mut self, index: usize, amount: u32, simulate: bool) -> Option<R>;

    /// Change notification for the owning block. Called by bound filters
    /// after a real transfer.
    fn mark_changed(&mut self) {}

    /// Insert across all slots: first merging into slots that already hold
    /// the same variant, then into empty slots. Returns the amount accepted.
    fn insert_any(&mut self, resource: &R, simulate: bool) -> u32 {
        if resource.is_empty() {
            return 0;
        }
        let mut remaining = resource.amount();

        for index in 0..self.slot_count() {
            if remaining == 0 {
                break;
            }
            let merges = self
                .contents_at(index)
                .is_some_and(|held| held.same_variant(resource));
            if merges {
                let accepted = self.insert(index, &resource.with_amount(remaining), simulate);
                remaining -= accepted.min(remaining);
            }
        }

        for index in 0..self.slot_count() {
            if remaining == 0 {
                break;
            }
            if self.contents_at(index).is_none() {
                let accepted = self.insert(index, &resource.with_amount(remaining), simulate);
                remaining -= accepted.min(remaining);
            }
        }

        resource.amount() - remaining
    }

    /// Sum of the amounts in every slot whose contents satisfy `predicate`.
    fn total_matching(&self, predicate: &dyn Fn(&R) -> bool) -> u64 {
        (0..self.slot_count())
            .filter_map(|index| self.contents_at(index))
            .filter(|held| predicate(held))
            .map(|held| u64::from(held.amount()))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// SlotStorage
// ---------------------------------------------------------------------------

/// A fixed set of slots, each holding at most `slot_capacity` units of a
/// single variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStorage<R> {
    slots: Vec<Option<R>>,
    slot_capacity: u32,
    /// Bumped on every real mutation and every change notification.
    #[serde(default)]
    revision: u64,
}

/// An item inventory.
pub type Inventory = SlotStorage<ItemStack>;

/// A set of fluid tanks.
pub type TankSet = SlotStorage<FluidStack>;

impl<R: Resource> SlotStorage<R> {
    pub fn new(slot_count: usize, slot_capacity: u32) -> Self {
        Self {
            slots: vec![None; slot_count],
            slot_capacity,
            revision: 0,
        }
    }

    /// Overwrite a slot directly, bypassing capacity checks. Intended for
    /// world setup and loading.
    pub fn set_slot(&mut self, index: usize, contents: Option<R>) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = contents.filter(|r| !r.is_empty());
            self.revision += 1;
        }
    }

    pub fn slot(&self, index: usize) -> Option<&R> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn slot_capacity(&self) -> u32 {
        self.slot_capacity
    }

    /// Total units of the given variant across all slots.
    pub fn quantity_of(&self, variant: &R) -> u64 {
        self.total_matching(&|held: &R| held.same_variant(variant))
    }

    /// Total units across all slots.
    pub fn total(&self) -> u64 {
        self.total_matching(&|_: &R| true)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl<R: Resource> Storage<R> for SlotStorage<R> {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn contents_at(&self, index: usize) -> Option<R> {
        self.slot(index).cloned()
    }

    fn insert(&mut self, index: usize, resource: &R, simulate: bool) -> u32 {
        if resource.is_empty() {
            return 0;
        }
        let capacity = self.slot_capacity;
        let Some(slot) = self.slots.get_mut(index) else {
            return 0;
        };

        let current = match slot.as_ref() {
            None => 0,
            Some(held) if held.same_variant(resource) => held.amount(),
            Some(_) => return 0,
        };
        let accepted = resource.amount().min(capacity.saturating_sub(current));

        if accepted > 0 && !simulate {
            *slot = Some(resource.with_amount(current + accepted));
            self.revision += 1;
        }
        accepted
    }

    fn extract(&mut self, index: usize, amount: u32, simulate: bool) -> Option<R> {
        if amount == 0 {
            return None;
        }
        let slot = self.slots.get_mut(index)?;
        let held = slot.as_ref()?;
        let taken = amount.min(held.amount());
        let removed = held.with_amount(taken);

        if !simulate {
            let left = held.amount() - taken;
            let rest = held.with_amount(left);
            *slot = (left > 0).then_some(rest);
            self.revision += 1;
        }
        Some(removed)
    }

    fn mark_changed(&mut self) {
        self.revision += 1;
    }
}
