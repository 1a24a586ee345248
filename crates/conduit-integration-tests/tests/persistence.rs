//! Integration test: snapshots and data-file loading.
//!
//! A network built from a layout file is saved, restored, and then ticked
//! side by side with the original to check that the restored copy routes
//! exactly the same way.

use conduit_core::filter_key::Amount;
use conduit_core::position::{Direction, Position};
use conduit_core::test_utils::{fluid_whitelist, iron, water};
use conduit_data::{LoadedLayout, load_network};
use conduit_network::serialize::{DeserializeError, SNAPSHOT_MAGIC, read_snapshot_header};
use conduit_network::test_utils::count_in;
use conduit_network::{RoutingConfig, RoutingNetwork};
use std::fs;
use std::path::PathBuf;

const LAYOUT: &str = r#"(
    items: ["iron", "copper"],
    fluids: ["water"],
    nodes: [
        (position: (0, 0, 0), kind: master),
        (position: (1, 0, 0), kind: input, sides: [
            (side: up, priority: 5, items: Some((entries: [(name: "iron")]))),
        ]),
        (position: (-1, 0, 0), kind: output, sides: [
            (side: up, priority: 3, items: Some((entries: [(name: "iron", amount: Some(12))]))),
        ]),
        (position: (0, 0, 1), kind: relay),
        (position: (0, 0, 2), kind: output, sides: [
            (side: up, items: Some((mode: blacklist, entries: [(name: "copper")]))),
        ]),
    ],
    endpoints: [
        (position: (1, 1, 0), inventory: Some((slots: 9, contents: [(name: "iron", amount: 40), (name: "copper", amount: 5)]))),
        (position: (-1, 1, 0), inventory: Some((slots: 9))),
        (position: (0, 1, 2), inventory: Some((slots: 9))),
    ],
    disabled_connections: [((0, 0, 1), (0, 0, 2))],
)"#;

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "conduit_persistence_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn load(suffix: &str) -> LoadedLayout {
    let dir = make_test_dir(suffix);
    fs::write(dir.join("layout.ron"), LAYOUT).unwrap();
    fs::write(dir.join("routing.toml"), "item_bandwidth = 8\n").unwrap();
    let loaded = load_network(&dir).unwrap();
    let _ = fs::remove_dir_all(&dir);
    loaded
}

#[test]
fn loaded_layout_has_expected_topology() {
    let LoadedLayout { network, .. } = load("topology");
    assert_eq!(network.config().item_bandwidth, 8);
    assert_eq!(network.node_count(), 5);

    let far = Position::new(0, 0, 2);
    assert_eq!(network.live_master_of(far), None);
    assert_eq!(
        network.live_master_of(Position::new(0, 0, 1)),
        Some(Position::ORIGIN)
    );
    assert_eq!(network.get_priority(Position::new(1, 0, 0), Direction::Up), Some(5));
}

#[test]
fn snapshot_round_trip_preserves_configuration() {
    let LoadedLayout { mut network, .. } = load("round_trip");
    let output = Position::new(-1, 0, 0);
    network
        .set_fluid_filter(
            output,
            Direction::North,
            Some(fluid_whitelist(&[(water(), Amount::Limited(500))])),
        )
        .unwrap();

    let bytes = network.serialize().unwrap();
    assert_eq!(read_snapshot_header(&bytes).unwrap().magic, SNAPSHOT_MAGIC);

    let restored = RoutingNetwork::deserialize(&bytes, network.config().clone()).unwrap();
    assert_eq!(restored.snapshot().nodes, network.snapshot().nodes);
    assert_eq!(restored.node_count(), network.node_count());
    for node in network.nodes() {
        let pos = node.position();
        assert_eq!(restored.live_master_of(pos), network.live_master_of(pos), "at {pos}");
        assert_eq!(restored.get_connected(pos), network.get_connected(pos), "at {pos}");
    }
    assert_eq!(
        restored.get_fluid_filter_list(output, Direction::North),
        network.get_fluid_filter_list(output, Direction::North)
    );
    assert!(
        !restored
            .node(Position::new(0, 0, 1))
            .unwrap()
            .is_connection_enabled(Position::new(0, 0, 2))
    );
}

#[test]
fn restored_network_routes_like_the_original() {
    let LoadedLayout {
        mut network,
        world,
        names,
    } = load("routes");
    let bytes = network.serialize().unwrap();
    let mut restored = RoutingNetwork::deserialize(&bytes, network.config().clone()).unwrap();

    let mut original_world = world.clone();
    let mut restored_world = world;
    for _ in 0..4 {
        let a = network.tick(&mut original_world);
        let b = restored.tick(&mut restored_world);
        assert_eq!(a, b);
    }

    let destination = Position::new(-1, 1, 0);
    let source = Position::new(1, 1, 0);
    for world in [&original_world, &restored_world] {
        assert_eq!(count_in(world, destination, iron()), 12);
        assert_eq!(count_in(world, source, iron()), 28);
        let copper = names.item("copper").unwrap();
        assert_eq!(count_in(world, source, copper), 5);
        assert_eq!(count_in(world, Position::new(0, 1, 2), copper), 0);
    }
}

#[test]
fn restored_tick_counter_continues() {
    let LoadedLayout {
        mut network,
        mut world,
        ..
    } = load("tick");
    network.tick(&mut world);
    network.tick(&mut world);

    let bytes = network.serialize().unwrap();
    assert_eq!(read_snapshot_header(&bytes).unwrap().tick, 2);
    let restored = RoutingNetwork::deserialize(&bytes, RoutingConfig::default()).unwrap();
    assert_eq!(restored.current_tick(), 2);
    assert_eq!(restored.config(), &RoutingConfig::default());
}

#[test]
fn foreign_bytes_are_rejected() {
    let mut snapshot = RoutingNetwork::default().snapshot();
    snapshot.header.magic = 0xDEAD_BEEF;
    let result = RoutingNetwork::from_snapshot(snapshot, RoutingConfig::default());
    assert!(matches!(result, Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))));

    let garbage = RoutingNetwork::deserialize(&[1, 2, 3], RoutingConfig::default());
    assert!(matches!(garbage, Err(DeserializeError::Decode(_))));
}
