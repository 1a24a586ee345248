//! Filter policies: how many units an endpoint wants (output role) or may
//! give up (input role), and the transfer logic built on top.
//!
//! A [`Filter`] is transient. It is rebuilt from a [`FilterConfig`] and the
//! live contents of its endpoint each time the owning node prepares a
//! transfer, then consumed as units move.
//!
//! # Initialization
//!
//! - **Whitelist, output**: each key starts at its requested amount and the
//!   endpoint's matching contents are subtracted. Keys that reach zero are
//!   dropped.
//! - **Whitelist, input**: each key starts at minus its retain amount and the
//!   endpoint's matching contents are added back. Keys at or below zero are
//!   dropped.
//! - **Blacklist**: counts are computed the same way but only clamped, never
//!   dropped. They are informational; a blacklist never caps a transfer by
//!   quantity.
//!
//! Contents are attributed to keys in list order, so the first matching
//! entry is always charged first. On an input, a held stack is credited to
//! its first matching entry only. Later overlapping entries keep their
//! retain and are dropped, so the same units are never offered twice.

use crate::filter_key::{FilterConfig, FilterKey, FilterMode};
use crate::position::Position;
use crate::resource::{FluidStack, ItemStack, Resource};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Which side of a transfer a filter sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterRole {
    /// Receives resources: counts are "still wanted".
    Output,
    /// Supplies resources: counts are "still pullable".
    Input,
}

/// The closed set of filter behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterPolicy {
    WhitelistOutput,
    WhitelistInput,
    Blacklist(FilterRole),
}

impl FilterPolicy {
    pub fn new(mode: FilterMode, role: FilterRole) -> Self {
        match (mode, role) {
            (FilterMode::Whitelist, FilterRole::Output) => FilterPolicy::WhitelistOutput,
            (FilterMode::Whitelist, FilterRole::Input) => FilterPolicy::WhitelistInput,
            (FilterMode::Blacklist, role) => FilterPolicy::Blacklist(role),
        }
    }

    pub fn role(&self) -> FilterRole {
        match self {
            FilterPolicy::WhitelistOutput => FilterRole::Output,
            FilterPolicy::WhitelistInput => FilterRole::Input,
            FilterPolicy::Blacklist(role) => *role,
        }
    }

    pub fn mode(&self) -> FilterMode {
        match self {
            FilterPolicy::WhitelistOutput | FilterPolicy::WhitelistInput => FilterMode::Whitelist,
            FilterPolicy::Blacklist(_) => FilterMode::Blacklist,
        }
    }
}

/// A filter initialized for one role, optionally bound to an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<R> {
    policy: FilterPolicy,
    keys: Vec<FilterKey<R>>,
    endpoint: Option<Position>,
}

pub type ItemFilter = Filter<ItemStack>;
pub type FluidFilter = Filter<FluidStack>;

impl<R: Resource> Filter<R> {
    /// Build an unbound filter for list inspection. Keys carry the
    /// configured amounts untouched by any endpoint contents.
    pub fn detached(config: &FilterConfig<R>, role: FilterRole) -> Self {
        let keys = config
            .entries()
            .iter()
            .map(|entry| {
                FilterKey::new(
                    entry.template.clone(),
                    entry.match_mode,
                    entry.amount.requested(),
                )
            })
            .collect();
        Self {
            policy: FilterPolicy::new(config.mode, role),
            keys,
            endpoint: None,
        }
    }

    /// Build a filter bound to the endpoint at `position`, computing live
    /// counts from its current contents.
    pub fn initialize(
        config: &FilterConfig<R>,
        role: FilterRole,
        position: Position,
        storage: &dyn Storage<R>,
    ) -> Self {
        let policy = FilterPolicy::new(config.mode, role);
        let mut keys: Vec<FilterKey<R>> = config
            .entries()
            .iter()
            .map(|entry| {
                let count = match role {
                    FilterRole::Output => entry.amount.requested(),
                    FilterRole::Input => -entry.amount.retained(),
                };
                FilterKey::new(entry.template.clone(), entry.match_mode, count)
            })
            .collect();

        for index in 0..storage.slot_count() {
            let Some(held) = storage.contents_at(index) else {
                continue;
            };
            match role {
                FilterRole::Output => {
                    let mut left = i64::from(held.amount());
                    for key in keys.iter_mut().filter(|k| k.count() > 0 && k.matches(&held)) {
                        let charged = left.min(key.count());
                        key.grow(-charged);
                        left -= charged;
                        if left == 0 {
                            break;
                        }
                    }
                }
                FilterRole::Input => {
                    // First match only; later overlapping keys stay at minus their retain.
                    if let Some(key) = keys.iter_mut().find(|k| k.matches(&held)) {
                        key.grow(i64::from(held.amount()));
                    }
                }
            }
        }

        for key in &mut keys {
            if key.count() < 0 {
                key.set_count(0);
            }
        }
        if policy.mode() == FilterMode::Whitelist {
            keys.retain(|k| k.count() > 0);
        }

        Self {
            policy,
            keys,
            endpoint: Some(position),
        }
    }

    pub fn policy(&self) -> FilterPolicy {
        self.policy
    }

    pub fn role(&self) -> FilterRole {
        self.policy.role()
    }

    /// The position of the bound endpoint, `None` for detached filters.
    pub fn endpoint(&self) -> Option<Position> {
        self.endpoint
    }

    /// The current request list, in tie-break order.
    pub fn filtered_list(&self) -> &[FilterKey<R>] {
        &self.keys
    }

    /// Whether any key describes `stack`, regardless of counts.
    pub fn does_stack_match_filter(&self, stack: &R) -> bool {
        self.keys.iter().any(|k| k.matches(stack))
    }

    /// Whether `stack` may pass. A whitelist passes listed resources, a
    /// blacklist passes everything it does not list.
    pub fn does_stack_pass_filter(&self, stack: &R) -> bool {
        match self.policy.mode() {
            FilterMode::Whitelist => self.does_stack_match_filter(stack),
            FilterMode::Blacklist => !self.does_stack_match_filter(stack),
        }
    }

    /// Offer `stack` to this filter's endpoint. Returns the part that was not
    /// accepted; an empty remainder means the stack was fully consumed.
    ///
    /// Only output-role filters accept pushes. A whitelist caps the insert at
    /// the first matching key's remaining count and charges that key with the
    /// amount the endpoint actually took.
    pub fn transfer_through_output_filter(
        &mut self,
        storage: &mut dyn Storage<R>,
        stack: &R,
        simulate: bool,
    ) -> R {
        if stack.is_empty() {
            return stack.clone();
        }
        let accepted = match self.policy {
            FilterPolicy::WhitelistInput | FilterPolicy::Blacklist(FilterRole::Input) => 0,
            FilterPolicy::Blacklist(FilterRole::Output) => {
                if self.does_stack_match_filter(stack) {
                    0
                } else {
                    storage.insert_any(stack, simulate).min(stack.amount())
                }
            }
            FilterPolicy::WhitelistOutput => {
                let Some(index) = self
                    .keys
                    .iter()
                    .position(|k| k.remaining() > 0 && k.matches(stack))
                else {
                    return stack.clone();
                };
                let allowed = self.keys[index].remaining().min(stack.amount());
                let accepted = storage
                    .insert_any(&stack.with_amount(allowed), simulate)
                    .min(allowed);
                if !simulate && accepted > 0 {
                    self.keys[index].shrink(accepted);
                    if self.keys[index].count() <= 0 {
                        self.keys.remove(index);
                    }
                }
                accepted
            }
        };

        if !simulate && accepted > 0 && self.endpoint.is_some() {
            storage.mark_changed();
        }
        stack.with_amount(stack.amount() - accepted)
    }

    /// Pull from this filter's endpoint into `output`'s endpoint, moving at
    /// most `max_transfer` units. Returns the units moved.
    ///
    /// Each slot is simulated against the destination first and only the
    /// amount the destination will take is extracted, so a refused transfer
    /// never loses resources.
    pub fn transfer_through_input_filter(
        &mut self,
        source: &mut dyn Storage<R>,
        output: &mut Filter<R>,
        destination: &mut dyn Storage<R>,
        max_transfer: u32,
    ) -> u32 {
        if self.role() != FilterRole::Input {
            return 0;
        }
        let mut budget = max_transfer;
        let mut total = 0;

        for slot in 0..source.slot_count() {
            if budget == 0 {
                break;
            }
            let Some(held) = source.contents_at(slot) else {
                continue;
            };
            let Some(extractable) = source.extract(slot, held.amount(), true) else {
                continue;
            };
            if extractable.is_empty() {
                continue;
            }

            let key_index = match self.policy {
                FilterPolicy::WhitelistInput => {
                    let found = self
                        .keys
                        .iter()
                        .position(|k| k.remaining() > 0 && k.matches(&extractable));
                    match found {
                        Some(index) => Some(index),
                        None => continue,
                    }
                }
                FilterPolicy::Blacklist(_) => {
                    if self.does_stack_match_filter(&extractable) {
                        continue;
                    }
                    None
                }
                FilterPolicy::WhitelistOutput => return total,
            };

            let key_cap = key_index.map_or(u32::MAX, |i| self.keys[i].remaining());
            let allowed = budget.min(key_cap).min(extractable.amount());
            if allowed == 0 {
                continue;
            }

            let offered = extractable.with_amount(allowed);
            let refused = output.transfer_through_output_filter(destination, &offered, true);
            let accepted = allowed - refused.amount().min(allowed);
            if accepted == 0 {
                continue;
            }

            let Some(extracted) = source.extract(slot, accepted, false) else {
                continue;
            };
            let leftover = output.transfer_through_output_filter(destination, &extracted, false);
            let moved = extracted.amount() - leftover.amount();
            if !leftover.is_empty() {
                warn!(
                    slot,
                    refused = leftover.amount(),
                    "destination refused part of a simulated insert; returning it to the source"
                );
                let restored = source.insert(slot, &leftover, false);
                let missing = leftover.amount() - restored.min(leftover.amount());
                if missing > 0 {
                    let returned = source.insert_any(&leftover.with_amount(missing), false);
                    let lost = missing - returned.min(missing);
                    if lost > 0 {
                        warn!(slot, lost, "source could not take back refused units");
                    }
                }
            }
            if moved == 0 {
                continue;
            }

            if let Some(index) = key_index {
                self.keys[index].shrink(moved);
                if self.keys[index].count() <= 0 {
                    self.keys.remove(index);
                }
            }
            if self.endpoint.is_some() {
                source.mark_changed();
            }
            budget -= moved;
            total += moved;
            trace!(slot, moved, budget, "moved through input filter");
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_key::{Amount, MatchMode};
    use crate::resource::ComponentId;
    use crate::storage::Inventory;
    use crate::test_utils::*;

    fn at() -> Position {
        Position::new(0, 0, 0)
    }

    fn input_of(config: &FilterConfig<ItemStack>, source: &dyn Storage<ItemStack>) -> ItemFilter {
        Filter::initialize(config, FilterRole::Input, at(), source)
    }

    fn output_of(config: &FilterConfig<ItemStack>, dest: &dyn Storage<ItemStack>) -> ItemFilter {
        Filter::initialize(config, FilterRole::Output, at(), dest)
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    #[test]
    fn whitelist_output_subtracts_present_contents() {
        let config = whitelist(&[(iron(), 10), (copper(), 4)]);
        let inv = inventory_with(&[iron_stack(3), copper_stack(4)]);
        let filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        let list = filter.filtered_list();
        assert_eq!(list.len(), 1, "satisfied copper key must be dropped");
        assert_eq!(list[0].descriptor().item_type, iron());
        assert_eq!(list[0].count(), 7);
    }

    #[test]
    fn whitelist_output_never_goes_negative() {
        let config = whitelist(&[(iron(), 2)]);
        let inv = inventory_with(&[iron_stack(50)]);
        let filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        assert!(filter.filtered_list().is_empty());
    }

    #[test]
    fn whitelist_input_reports_pullable_above_retain() {
        let config = whitelist(&[(iron(), 3), (copper(), 10)]);
        let inv = inventory_with(&[iron_stack(10), copper_stack(4)]);
        let filter = Filter::initialize(&config, FilterRole::Input, at(), &inv);
        let list = filter.filtered_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].descriptor().item_type, iron());
        assert_eq!(list[0].count(), 7);
    }

    #[test]
    fn unlimited_input_retains_nothing() {
        let config = whitelist_unlimited(&[iron()]);
        let inv = inventory_with(&[iron_stack(10), iron_stack(5)]);
        let filter = Filter::initialize(&config, FilterRole::Input, at(), &inv);
        assert_eq!(filter.filtered_list()[0].count(), 15);
    }

    #[test]
    fn output_contents_are_charged_in_list_order() {
        // Two keys for the same item: the first absorbs the contents first.
        let config = whitelist(&[(iron(), 4), (iron(), 6)]);
        let inv = inventory_with(&[iron_stack(7)]);
        let filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        let counts: Vec<_> = filter.filtered_list().iter().map(|k| k.count()).collect();
        assert_eq!(counts, vec![3]);
    }

    #[test]
    fn blacklist_keeps_zero_count_entries() {
        let config = blacklist(&[(iron(), 2)]);
        let inv = inventory_with(&[iron_stack(9)]);
        let filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        assert_eq!(filter.filtered_list().len(), 1);
        assert_eq!(filter.filtered_list()[0].count(), 0);
    }

    #[test]
    fn detached_filter_lists_configured_amounts() {
        let config = whitelist(&[(iron(), 12)]);
        let filter = Filter::detached(&config, FilterRole::Output);
        assert_eq!(filter.endpoint(), None);
        assert_eq!(filter.filtered_list()[0].count(), 12);
    }

    // -----------------------------------------------------------------------
    // Pass / match
    // -----------------------------------------------------------------------

    #[test]
    fn blacklist_pass_is_negated_match() {
        let filter = Filter::detached(&blacklist(&[(iron(), 64)]), FilterRole::Output);
        assert!(!filter.does_stack_pass_filter(&iron_stack(1)));
        assert!(filter.does_stack_pass_filter(&copper_stack(1)));
    }

    #[test]
    fn whitelist_pass_requires_a_listed_resource() {
        let filter = Filter::detached(&whitelist(&[(iron(), 1)]), FilterRole::Output);
        assert!(filter.does_stack_pass_filter(&iron_stack(30)));
        assert!(!filter.does_stack_pass_filter(&copper_stack(1)));
    }

    #[test]
    fn kind_only_entry_matches_any_components() {
        let mut config = FilterConfig::whitelist();
        config
            .add_entry(iron_stack(1), Amount::Limited(5), MatchMode::KindOnly)
            .unwrap();
        let filter = Filter::detached(&config, FilterRole::Output);
        let damaged = iron_stack(1).with_component(ComponentId(0), 12);
        assert!(filter.does_stack_pass_filter(&damaged));
    }

    // -----------------------------------------------------------------------
    // Output transfer
    // -----------------------------------------------------------------------

    #[test]
    fn output_transfer_caps_at_request_and_removes_satisfied_key() {
        let config = whitelist(&[(iron(), 4)]);
        let mut inv = Inventory::new(4, 64);
        let mut filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        let remainder = filter.transfer_through_output_filter(&mut inv, &iron_stack(10), false);
        assert_eq!(remainder.quantity, 6);
        assert_eq!(inv.quantity_of(&iron_stack(1)), 4);
        assert!(filter.filtered_list().is_empty());
    }

    #[test]
    fn output_transfer_charges_only_accepted_amount() {
        let config = whitelist(&[(iron(), 4)]);
        let mut inv = Inventory::new(1, 2);
        let mut filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        let remainder = filter.transfer_through_output_filter(&mut inv, &iron_stack(10), false);
        assert_eq!(remainder.quantity, 8);
        assert_eq!(filter.filtered_list()[0].count(), 2);
    }

    #[test]
    fn simulated_output_transfer_changes_nothing() {
        let config = whitelist(&[(iron(), 4)]);
        let mut inv = Inventory::new(1, 64);
        let mut filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        let before = filter.clone();
        let remainder = filter.transfer_through_output_filter(&mut inv, &iron_stack(3), true);
        assert_eq!(remainder.quantity, 0);
        assert_eq!(filter, before);
        assert_eq!(inv.total(), 0);
        assert_eq!(inv.revision(), 0);
    }

    #[test]
    fn first_matching_entry_wins() {
        let mut config = FilterConfig::whitelist();
        let enchanted = iron_stack(1).with_component(ComponentId(3), 1);
        config
            .add_entry(iron_stack(1), Amount::Limited(2), MatchMode::KindOnly)
            .unwrap();
        config
            .add_entry(enchanted.clone(), Amount::Limited(5), MatchMode::Exact)
            .unwrap();
        let mut inv = Inventory::new(4, 64);
        let mut filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);

        let offered = enchanted.with_amount(5);
        let remainder = filter.transfer_through_output_filter(&mut inv, &offered, false);
        // The broad first entry absorbs 2; the exact entry is not consulted
        // for the same offer.
        assert_eq!(remainder.quantity, 3);
        let list = filter.filtered_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].match_mode(), MatchMode::Exact);
        assert_eq!(list[0].count(), 5);

        let remainder = filter.transfer_through_output_filter(&mut inv, &remainder, false);
        assert_eq!(remainder.quantity, 0);
    }

    #[test]
    fn blacklist_output_accepts_unlisted_without_quantity_cap() {
        let config = blacklist(&[(copper(), 1)]);
        let mut inv = Inventory::new(2, 64);
        let mut filter = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        let rest = filter.transfer_through_output_filter(&mut inv, &iron_stack(150), false);
        assert_eq!(rest.quantity, 22);
        assert_eq!(inv.quantity_of(&iron_stack(1)), 128);
        let refused = filter.transfer_through_output_filter(&mut inv, &copper_stack(5), false);
        assert_eq!(refused.quantity, 5);
    }

    #[test]
    fn bound_filter_notifies_endpoint_detached_does_not() {
        let config = whitelist(&[(iron(), 4)]);
        let mut inv = Inventory::new(1, 64);
        let mut bound = Filter::initialize(&config, FilterRole::Output, at(), &inv);
        let _ = bound.transfer_through_output_filter(&mut inv, &iron_stack(1), false);
        // One bump for the insert, one for the change notification.
        assert_eq!(inv.revision(), 2);

        let mut other = Inventory::new(1, 64);
        let mut detached = Filter::detached(&config, FilterRole::Output);
        let _ = detached.transfer_through_output_filter(&mut other, &iron_stack(1), false);
        assert_eq!(other.revision(), 1);
    }

    #[test]
    fn input_role_filter_refuses_pushes() {
        let config = whitelist(&[(iron(), 4)]);
        let mut inv = Inventory::new(1, 64);
        let mut filter = Filter::detached(&config, FilterRole::Input);
        let rest = filter.transfer_through_output_filter(&mut inv, &iron_stack(2), false);
        assert_eq!(rest.quantity, 2);
    }

    // -----------------------------------------------------------------------
    // Input transfer
    // -----------------------------------------------------------------------

    #[test]
    fn input_transfer_moves_up_to_request() {
        let mut source = inventory_with(&[iron_stack(10)]);
        let mut dest = Inventory::new(4, 64);
        let mut input = input_of(&whitelist_unlimited(&[iron()]), &source);
        let mut output = output_of(&whitelist(&[(iron(), 4)]), &dest);

        let moved = input.transfer_through_input_filter(&mut source, &mut output, &mut dest, 64);
        assert_eq!(moved, 4);
        assert_eq!(source.quantity_of(&iron_stack(1)), 6);
        assert_eq!(dest.quantity_of(&iron_stack(1)), 4);
        assert!(output.filtered_list().is_empty());
    }

    #[test]
    fn input_transfer_respects_bandwidth() {
        let mut source = inventory_with(&[iron_stack(30), iron_stack(30)]);
        let mut dest = Inventory::new(4, 64);
        let mut input = input_of(&whitelist_unlimited(&[iron()]), &source);
        let mut output = output_of(&whitelist_unlimited(&[iron()]), &dest);

        let moved = input.transfer_through_input_filter(&mut source, &mut output, &mut dest, 45);
        assert_eq!(moved, 45);
        assert_eq!(source.total() + dest.total(), 60);
    }

    #[test]
    fn input_transfer_leaves_retained_amount() {
        let mut source = inventory_with(&[iron_stack(10)]);
        let mut dest = Inventory::new(4, 64);
        let mut input = input_of(&whitelist(&[(iron(), 8)]), &source);
        let mut output = output_of(&whitelist_unlimited(&[iron()]), &dest);

        let moved = input.transfer_through_input_filter(&mut source, &mut output, &mut dest, 64);
        assert_eq!(moved, 2);
        assert_eq!(source.quantity_of(&iron_stack(1)), 8);
    }

    #[test]
    fn refused_destination_extracts_nothing() {
        let mut source = inventory_with(&[iron_stack(10)]);
        let mut full = Inventory::new(1, 1);
        full.set_slot(0, Some(copper_stack(1)));
        let mut input = input_of(&whitelist_unlimited(&[iron()]), &source);
        let mut output = output_of(&whitelist_unlimited(&[iron()]), &full);

        let moved = input.transfer_through_input_filter(&mut source, &mut output, &mut full, 64);
        assert_eq!(moved, 0);
        assert_eq!(source.quantity_of(&iron_stack(1)), 10);
        assert_eq!(full.quantity_of(&copper_stack(1)), 1);
    }

    #[test]
    fn blacklist_input_skips_listed_slots() {
        let mut source = inventory_with(&[copper_stack(5), iron_stack(5)]);
        let mut dest = Inventory::new(4, 64);
        let mut input = input_of(&blacklist(&[(copper(), 1)]), &source);
        let mut output = output_of(&blacklist(&[]), &dest);

        let moved = input.transfer_through_input_filter(&mut source, &mut output, &mut dest, 64);
        assert_eq!(moved, 5);
        assert_eq!(source.quantity_of(&copper_stack(1)), 5);
        assert_eq!(dest.quantity_of(&iron_stack(1)), 5);
    }

    #[test]
    fn input_contents_credit_first_matching_key_only() {
        let mut config = FilterConfig::whitelist();
        config
            .add_entry(iron_stack(1), Amount::Limited(2), MatchMode::KindOnly)
            .unwrap();
        config
            .add_entry(iron_stack(1), Amount::Limited(8), MatchMode::Exact)
            .unwrap();
        let mut source = inventory_with(&[iron_stack(10)]);
        let mut dest = Inventory::new(4, 64);
        let mut input = input_of(&config, &source);
        let counts: Vec<_> = input.filtered_list().iter().map(|k| k.count()).collect();
        assert_eq!(counts, vec![8]);

        let mut output = output_of(&whitelist_unlimited(&[iron()]), &dest);
        let moved = input.transfer_through_input_filter(&mut source, &mut output, &mut dest, 64);
        assert_eq!(moved, 8);
        assert_eq!(source.quantity_of(&iron_stack(1)), 2);
    }

    /// Reports room for anything when simulated, but really takes at most
    /// `limit` units.
    struct Overpromising {
        inner: Inventory,
        limit: u32,
    }

    impl Storage<ItemStack> for Overpromising {
        fn slot_count(&self) -> usize {
            self.inner.slot_count()
        }

        fn contents_at(&self, index: usize) -> Option<ItemStack> {
            self.inner.contents_at(index)
        }

        fn insert(&mut self, index: usize, resource: &ItemStack, simulate: bool) -> u32 {
            if simulate {
                return self.inner.insert(index, resource, true);
            }
            let offered = resource.with_amount(resource.amount().min(self.limit));
            let accepted = self.inner.insert(index, &offered, false);
            self.limit -= accepted;
            accepted
        }

        fn extract(&mut self, index: usize, amount: u32, simulate: bool) -> Option<ItemStack> {
            self.inner.extract(index, amount, simulate)
        }
    }

    #[test]
    fn units_refused_after_extraction_return_to_source() {
        let mut source = inventory_with(&[iron_stack(10)]);
        let mut dest = Overpromising {
            inner: Inventory::new(4, 64),
            limit: 3,
        };
        let mut input = input_of(&whitelist_unlimited(&[iron()]), &source);
        let mut output = output_of(&whitelist_unlimited(&[iron()]), &dest);

        let moved = input.transfer_through_input_filter(&mut source, &mut output, &mut dest, 64);
        assert_eq!(moved, 3);
        assert_eq!(dest.inner.quantity_of(&iron_stack(1)), 3);
        assert_eq!(source.quantity_of(&iron_stack(1)), 7);
        assert_eq!(source.slot(0), Some(&iron_stack(7)));
    }

    #[test]
    fn output_role_filter_cannot_pull() {
        let mut source = inventory_with(&[iron_stack(10)]);
        let mut dest = Inventory::new(4, 64);
        let mut wrong = output_of(&whitelist_unlimited(&[iron()]), &source);
        let mut output = output_of(&whitelist_unlimited(&[iron()]), &dest);
        assert_eq!(wrong.transfer_through_input_filter(&mut source, &mut output, &mut dest, 64), 0);
    }

    #[test]
    fn policy_constructor_covers_all_combinations() {
        assert_eq!(
            FilterPolicy::new(FilterMode::Whitelist, FilterRole::Output),
            FilterPolicy::WhitelistOutput
        );
        assert_eq!(
            FilterPolicy::new(FilterMode::Whitelist, FilterRole::Input),
            FilterPolicy::WhitelistInput
        );
        let black_in = FilterPolicy::new(FilterMode::Blacklist, FilterRole::Input);
        assert_eq!(black_in.role(), FilterRole::Input);
        assert_eq!(black_in.mode(), FilterMode::Blacklist);
    }
}
