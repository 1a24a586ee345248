//! Building a ready network from data files.
//!
//! A data directory holds an optional `routing.{ron,toml,json}` with
//! [`RoutingConfig`] overrides and a required `layout.{ron,toml,json}`
//! describing nodes, side filters and endpoint storage.

use crate::loader::{
    DataLoadError, check_duplicate, deserialize_file, find_data_file, require_data_file,
    resolve_name,
};
use crate::schema::{
    FilterData, FilterEntryData, InventoryData, LayoutData, SideData, StackData, TankData,
    to_position,
};
use conduit_core::filter_key::{Amount, FilterConfig};
use conduit_core::position::Position;
use conduit_core::resource::{ComponentId, FluidStack, FluidTypeId, ItemStack, ItemTypeId, Resource};
use conduit_core::storage::{Inventory, SlotStorage, Storage, TankSet};
use conduit_network::node::SideConfig;
use conduit_network::world::StorageWorld;
use conduit_network::{RoutingConfig, RoutingError, RoutingNetwork};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "routing";
pub const LAYOUT_FILE: &str = "layout";

// ===========================================================================
// Names
// ===========================================================================

/// Item and fluid names declared by a layout, mapped to the ids they were
/// assigned.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    items: HashMap<String, ItemTypeId>,
    fluids: HashMap<String, FluidTypeId>,
}

impl NameTable {
    /// Assign ids in declaration order, rejecting repeated names.
    pub fn from_layout(data: &LayoutData, file: &Path) -> Result<Self, DataLoadError> {
        let mut table = Self::default();
        for (index, name) in data.items.iter().enumerate() {
            check_duplicate(&table.items, name, file)?;
            table.items.insert(name.clone(), ItemTypeId(index as u32));
        }
        for (index, name) in data.fluids.iter().enumerate() {
            check_duplicate(&table.fluids, name, file)?;
            table.fluids.insert(name.clone(), FluidTypeId(index as u32));
        }
        Ok(table)
    }

    pub fn item(&self, name: &str) -> Option<ItemTypeId> {
        self.items.get(name).copied()
    }

    pub fn fluid(&self, name: &str) -> Option<FluidTypeId> {
        self.fluids.get(name).copied()
    }

    fn item_stack(
        &self,
        name: &str,
        amount: u32,
        components: &[(u16, i64)],
        file: &Path,
    ) -> Result<ItemStack, DataLoadError> {
        let kind = resolve_name(&self.items, name, file, "item")?;
        Ok(components
            .iter()
            .fold(ItemStack::new(kind, amount), |stack, &(id, value)| {
                stack.with_component(ComponentId(id), value)
            }))
    }

    fn fluid_stack(
        &self,
        name: &str,
        amount: u32,
        components: &[(u16, i64)],
        file: &Path,
    ) -> Result<FluidStack, DataLoadError> {
        let kind = resolve_name(&self.fluids, name, file, "fluid")?;
        Ok(components
            .iter()
            .fold(FluidStack::new(kind, amount), |stack, &(id, value)| {
                stack.with_component(ComponentId(id), value)
            }))
    }
}

// ===========================================================================
// Loaded result
// ===========================================================================

/// A network assembled from a layout, together with the storage it routes
/// between.
#[derive(Debug)]
pub struct LoadedLayout {
    pub network: RoutingNetwork,
    pub world: StorageWorld,
    pub names: NameTable,
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load `routing.*` from `dir`, falling back to defaults when it is absent.
pub fn load_config(dir: &Path) -> Result<RoutingConfig, DataLoadError> {
    let Some(path) = find_data_file(dir, CONFIG_FILE)? else {
        debug!(dir = %dir.display(), "no routing config, using defaults");
        return Ok(RoutingConfig::default());
    };
    let config: RoutingConfig = deserialize_file(&path)?;
    if config.transfer_interval == 0 {
        warn!(file = %path.display(), "transfer_interval is 0, transfers are disabled");
    }
    Ok(config)
}

/// Load `layout.*` from `dir` and build it with the given config.
pub fn load_layout(dir: &Path, config: RoutingConfig) -> Result<LoadedLayout, DataLoadError> {
    let path = require_data_file(dir, LAYOUT_FILE)?;
    let data: LayoutData = deserialize_file(&path)?;
    build_layout(&data, config, &path)
}

/// Load both files from `dir`.
pub fn load_network(dir: &Path) -> Result<LoadedLayout, DataLoadError> {
    let config = load_config(dir)?;
    load_layout(dir, config)
}

/// Build a network from already-parsed layout data. `file` is only used in
/// error messages.
///
/// Endpoints are placed first, then every node is added in file order, then
/// sides are configured and finally listed connections are disabled. Events
/// produced while assembling are discarded.
pub fn build_layout(
    data: &LayoutData,
    config: RoutingConfig,
    file: &Path,
) -> Result<LoadedLayout, DataLoadError> {
    let names = NameTable::from_layout(data, file)?;

    let mut world = StorageWorld::new();
    let mut placed = BTreeSet::new();
    for endpoint in &data.endpoints {
        let pos = to_position(endpoint.position);
        if !placed.insert(pos) {
            return Err(invalid(file, format!("endpoint at {pos} declared twice")));
        }
        if let Some(inventory) = &endpoint.inventory {
            world.place_inventory(pos, build_inventory(inventory, &names, file, pos)?);
        }
        if let Some(tanks) = &endpoint.tanks {
            world.place_tanks(pos, build_tanks(tanks, &names, file, pos)?);
        }
    }

    let mut network = RoutingNetwork::new(config);
    for node in &data.nodes {
        network
            .on_node_added(to_position(node.position), node.kind.into())
            .map_err(routing(file))?;
    }
    for node in &data.nodes {
        let pos = to_position(node.position);
        for side in &node.sides {
            let side_config = build_side(side, &names, file)?;
            network
                .configure_side(pos, side.side.into(), side_config)
                .map_err(routing(file))?;
        }
    }
    for &(a, b) in &data.disabled_connections {
        network
            .on_connection_toggled(to_position(a), to_position(b), false)
            .map_err(routing(file))?;
    }

    let discarded = network.drain_events().len();
    debug!(
        file = %file.display(),
        nodes = network.node_count(),
        masters = network.masters().count(),
        endpoints = placed.len(),
        discarded,
        "layout built"
    );

    Ok(LoadedLayout {
        network,
        world,
        names,
    })
}

// ===========================================================================
// Helpers
// ===========================================================================

fn invalid(file: &Path, detail: String) -> DataLoadError {
    DataLoadError::InvalidLayout {
        file: file.to_path_buf(),
        detail,
    }
}

fn routing(file: &Path) -> impl Fn(RoutingError) -> DataLoadError {
    let file: PathBuf = file.to_path_buf();
    move |source| DataLoadError::Routing {
        file: file.clone(),
        source,
    }
}

fn build_side(
    side: &SideData,
    names: &NameTable,
    file: &Path,
) -> Result<SideConfig, DataLoadError> {
    let mut config = SideConfig::default().with_priority(side.priority);
    if let Some(filter) = &side.items {
        config = config.with_item_filter(build_filter(filter, file, |entry| {
            names.item_stack(&entry.name, 1, &entry.components, file)
        })?);
    }
    if let Some(filter) = &side.fluids {
        config = config.with_fluid_filter(build_filter(filter, file, |entry| {
            names.fluid_stack(&entry.name, 1, &entry.components, file)
        })?);
    }
    Ok(config)
}

fn build_filter<R: Resource>(
    data: &FilterData,
    file: &Path,
    template: impl Fn(&FilterEntryData) -> Result<R, DataLoadError>,
) -> Result<FilterConfig<R>, DataLoadError> {
    let mut config = FilterConfig::new(data.mode.into());
    for entry in &data.entries {
        let amount = entry.amount.map_or(Amount::Unlimited, Amount::Limited);
        config
            .add_entry(template(entry)?, amount, entry.match_mode())
            .map_err(|e| routing(file)(RoutingError::from(e)))?;
    }
    Ok(config)
}

fn build_inventory(
    data: &InventoryData,
    names: &NameTable,
    file: &Path,
    pos: Position,
) -> Result<Inventory, DataLoadError> {
    let mut inventory = Inventory::new(data.slots, data.capacity);
    for stack in &data.contents {
        let resource = names.item_stack(&stack.name, stack.amount, &stack.components, file)?;
        fill(&mut inventory, resource, stack, file, pos)?;
    }
    Ok(inventory)
}

fn build_tanks(
    data: &TankData,
    names: &NameTable,
    file: &Path,
    pos: Position,
) -> Result<TankSet, DataLoadError> {
    let mut tanks = TankSet::new(data.tanks, data.capacity);
    for stack in &data.contents {
        let resource = names.fluid_stack(&stack.name, stack.amount, &stack.components, file)?;
        fill(&mut tanks, resource, stack, file, pos)?;
    }
    Ok(tanks)
}

/// Put initial contents into storage, either into a named slot or merged
/// wherever it fits. Contents that do not fit entirely are an error.
fn fill<R: Resource>(
    storage: &mut SlotStorage<R>,
    resource: R,
    data: &StackData,
    file: &Path,
    pos: Position,
) -> Result<(), DataLoadError> {
    let accepted = match data.slot {
        Some(slot) if slot >= storage.slot_count() => {
            return Err(invalid(
                file,
                format!("slot {slot} out of range for endpoint at {pos}"),
            ));
        }
        Some(slot) => storage.insert(slot, &resource, false),
        None => storage.insert_any(&resource, false),
    };
    if accepted < resource.amount() {
        return Err(invalid(
            file,
            format!(
                "{} x{} does not fit in endpoint at {pos}",
                data.name, data.amount
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::position::Direction;
    use conduit_network::node::NodeKind;
    use std::fs;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "conduit_layout_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const ITEM_LAYOUT_RON: &str = r#"(
        items: ["iron", "copper"],
        nodes: [
            (position: (0, 0, 0), kind: master),
            (position: (1, 0, 0), kind: input, sides: [
                (side: up, items: Some((entries: [(name: "iron")]))),
            ]),
            (position: (-1, 0, 0), kind: output, sides: [
                (side: up, priority: 3, items: Some((entries: [(name: "iron", amount: Some(8))]))),
            ]),
        ],
        endpoints: [
            (position: (1, 1, 0), inventory: Some((slots: 9, contents: [(name: "iron", amount: 20)]))),
            (position: (-1, 1, 0), inventory: Some((slots: 9))),
        ],
    )"#;

    const FLUID_LAYOUT_TOML: &str = r#"
items = []
fluids = ["water", "lava"]

[[nodes]]
position = [0, 0, 0]
kind = "master"

[[nodes]]
position = [1, 0, 0]
kind = "input"

[[nodes.sides]]
side = "east"

[nodes.sides.fluids]
entries = [{ name = "water" }]

[[nodes]]
position = [-1, 0, 0]
kind = "output"

[[nodes.sides]]
side = "west"

[nodes.sides.fluids]
entries = [{ name = "water", amount = 1500 }]

[[endpoints]]
position = [2, 0, 0]

[endpoints.tanks]
capacity = 4000
contents = [{ name = "water", amount = 3000 }]

[[endpoints]]
position = [-2, 0, 0]

[endpoints.tanks]
capacity = 4000
"#;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = make_test_dir("config_default");
        assert_eq!(load_config(&dir).unwrap(), RoutingConfig::default());
        cleanup(&dir);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = make_test_dir("config_partial");
        fs::write(dir.join("routing.json"), r#"{"item_bandwidth": 4}"#).unwrap();

        let config = load_config(&dir).unwrap();
        assert_eq!(config.item_bandwidth, 4);
        assert_eq!(config.fluid_bandwidth, RoutingConfig::default().fluid_bandwidth);

        cleanup(&dir);
    }

    #[test]
    fn missing_layout_is_an_error() {
        let dir = make_test_dir("layout_missing");
        assert!(matches!(
            load_network(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn ron_layout_builds_and_transfers() {
        let dir = make_test_dir("ron_layout");
        fs::write(dir.join("layout.ron"), ITEM_LAYOUT_RON).unwrap();

        let LoadedLayout {
            mut network,
            mut world,
            names,
        } = load_network(&dir).unwrap();
        let iron = names.item("iron").unwrap();
        assert_eq!(names.item("copper"), Some(ItemTypeId(1)));

        let master = Position::ORIGIN;
        assert_eq!(network.node_count(), 3);
        assert_eq!(network.live_master_of(Position::new(1, 0, 0)), Some(master));
        assert_eq!(network.get_priority(Position::new(-1, 0, 0), Direction::Up), Some(3));
        assert_eq!(
            network.node(Position::new(1, 0, 0)).map(|n| n.kind()),
            Some(NodeKind::Input)
        );

        network.tick(&mut world);
        let moved = world
            .inventory(Position::new(-1, 1, 0))
            .unwrap()
            .quantity_of(&ItemStack::new(iron, 1));
        assert_eq!(moved, 8);
        assert_eq!(world.total_items(), 20);

        cleanup(&dir);
    }

    #[test]
    fn toml_fluid_layout_respects_requested_amount() {
        let dir = make_test_dir("toml_layout");
        fs::write(dir.join("layout.toml"), FLUID_LAYOUT_TOML).unwrap();

        let LoadedLayout {
            mut network,
            mut world,
            names,
        } = load_network(&dir).unwrap();
        let water = FluidStack::new(names.fluid("water").unwrap(), 1);
        let destination = Position::new(-2, 0, 0);

        network.tick(&mut world);
        assert_eq!(world.tanks(destination).unwrap().quantity_of(&water), 1000);
        network.tick(&mut world);
        network.tick(&mut world);
        assert_eq!(world.tanks(destination).unwrap().quantity_of(&water), 1500);
        assert_eq!(world.total_fluid(), 3000);

        cleanup(&dir);
    }

    #[test]
    fn disabled_connection_is_applied() {
        let data: LayoutData = crate::loader::deserialize_str(
            r#"{
                "nodes": [
                    {"position": [0, 0, 0], "kind": "master"},
                    {"position": [1, 0, 0], "kind": "relay"}
                ],
                "disabled_connections": [[[1, 0, 0], [0, 0, 0]]]
            }"#,
            crate::loader::Format::Json,
        )
        .unwrap();
        let loaded =
            build_layout(&data, RoutingConfig::default(), Path::new("layout.json")).unwrap();
        let relay = loaded.network.node(Position::new(1, 0, 0)).unwrap();
        assert!(!relay.is_connection_enabled(Position::ORIGIN));
        assert_eq!(loaded.network.live_master_of(Position::new(1, 0, 0)), None);
    }

    #[test]
    fn unknown_filter_name_is_unresolved() {
        let data: LayoutData = crate::loader::deserialize_str(
            r#"(
                items: ["iron"],
                nodes: [(position: (0, 0, 0), kind: output, sides: [
                    (side: north, items: Some((entries: [(name: "gold")]))),
                ])],
            )"#,
            crate::loader::Format::Ron,
        )
        .unwrap();
        let result = build_layout(&data, RoutingConfig::default(), Path::new("layout.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { expected_kind: "item", .. })
        ));
    }

    #[test]
    fn duplicate_item_name_is_rejected() {
        let data = LayoutData {
            items: vec!["iron".to_string(), "iron".to_string()],
            ..LayoutData::default()
        };
        assert!(matches!(
            build_layout(&data, RoutingConfig::default(), Path::new("layout.ron")),
            Err(DataLoadError::DuplicateName { .. })
        ));
    }

    #[test]
    fn priority_out_of_range_surfaces_routing_error() {
        let data: LayoutData = crate::loader::deserialize_str(
            r#"(nodes: [(position: (0, 0, 0), kind: interface, sides: [(side: down, priority: 12)])])"#,
            crate::loader::Format::Ron,
        )
        .unwrap();
        let result = build_layout(&data, RoutingConfig::default(), Path::new("layout.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::Routing {
                source: RoutingError::PriorityOutOfRange(12),
                ..
            })
        ));
    }

    #[test]
    fn overfull_endpoint_is_invalid() {
        let data: LayoutData = crate::loader::deserialize_str(
            r#"(
                items: ["iron"],
                endpoints: [(position: (0, 1, 0), inventory: Some((slots: 1, contents: [(name: "iron", amount: 65)])))],
            )"#,
            crate::loader::Format::Ron,
        )
        .unwrap();
        assert!(matches!(
            build_layout(&data, RoutingConfig::default(), Path::new("layout.ron")),
            Err(DataLoadError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn components_reach_endpoint_contents() {
        let data: LayoutData = crate::loader::deserialize_str(
            r#"(
                items: ["sword"],
                endpoints: [(position: (0, 1, 0), inventory: Some((contents: [
                    (name: "sword", amount: 1, slot: Some(4), components: [(0, 3)]),
                ])))],
            )"#,
            crate::loader::Format::Ron,
        )
        .unwrap();
        let loaded =
            build_layout(&data, RoutingConfig::default(), Path::new("layout.ron")).unwrap();
        let inventory = loaded.world.inventory(Position::new(0, 1, 0)).unwrap();
        assert_eq!(inventory.slot_count(), 27);
        let sword = inventory.slot(4).unwrap();
        assert_eq!(sword.component(ComponentId(0)), Some(3));
    }
}
