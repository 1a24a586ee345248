use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies an item kind. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a fluid kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FluidTypeId(pub u32);

/// Identifies a data component attached to a stack (enchantment, damage,
/// potion contents, ...). Two stacks of the same kind are the same variant
/// only if their component maps are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub u16);

/// Anything the routing network can move: a quantity of one resource
/// variant. Implemented by [`ItemStack`] and [`FluidStack`] so that storage
/// and filter logic is written once.
pub trait Resource: Clone + PartialEq + std::fmt::Debug {
    /// Units in this stack (items, or millibuckets for fluids).
    fn amount(&self) -> u32;

    /// A copy of this stack carrying `amount` units instead.
    fn with_amount(&self, amount: u32) -> Self;

    fn is_empty(&self) -> bool {
        self.amount() == 0
    }

    /// Same item or fluid kind, ignoring components.
    fn same_kind(&self, other: &Self) -> bool;

    /// Same kind and identical components. Stacks must be the same variant
    /// to share a slot.
    fn same_variant(&self, other: &Self) -> bool;
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A stack of items of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ItemTypeId,
    pub quantity: u32,
    /// Per-stack data components. Empty for plain items.
    #[serde(default)]
    pub components: BTreeMap<ComponentId, i64>,
}

impl ItemStack {
    pub fn new(item_type: ItemTypeId, quantity: u32) -> Self {
        Self {
            item_type,
            quantity,
            components: BTreeMap::new(),
        }
    }

    /// Builder-style component setter.
    pub fn with_component(mut self, id: ComponentId, value: i64) -> Self {
        self.components.insert(id, value);
        self
    }

    pub fn component(&self, id: ComponentId) -> Option<i64> {
        self.components.get(&id).copied()
    }
}

impl Resource for ItemStack {
    fn amount(&self) -> u32 {
        self.quantity
    }

    fn with_amount(&self, amount: u32) -> Self {
        Self {
            item_type: self.item_type,
            quantity: amount,
            components: self.components.clone(),
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        self.item_type == other.item_type
    }

    fn same_variant(&self, other: &Self) -> bool {
        self.item_type == other.item_type && self.components == other.components
    }
}

// ---------------------------------------------------------------------------
// Fluids
// ---------------------------------------------------------------------------

/// A quantity of one fluid variant, measured in millibuckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidStack {
    pub fluid_type: FluidTypeId,
    pub amount: u32,
    #[serde(default)]
    pub components: BTreeMap<ComponentId, i64>,
}

impl FluidStack {
    pub fn new(fluid_type: FluidTypeId, amount: u32) -> Self {
        Self {
            fluid_type,
            amount,
            components: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, id: ComponentId, value: i64) -> Self {
        self.components.insert(id, value);
        self
    }
}

impl Resource for FluidStack {
    fn amount(&self) -> u32 {
        self.amount
    }

    fn with_amount(&self, amount: u32) -> Self {
        Self {
            fluid_type: self.fluid_type,
            amount,
            components: self.components.clone(),
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        self.fluid_type == other.fluid_type
    }

    fn same_variant(&self, other: &Self) -> bool {
        self.fluid_type == other.fluid_type && self.components == other.components
    }
}
