//! Streaming scenarios over real worker threads.

use std::collections::BTreeSet;
use std::time::Duration;

use cgmath::Vector3;
use voxel_world::{
    config::ChunkManagerConfig,
    engine_state::{
        rendering::mesh::INDICES,
        scene::{EntityConfig, EntityId, Scene},
        task_management::Task,
        voxels::{
            biome::{BiomeRange, BiomeTable},
            chunk::{
                generator::{LEAVES_INDEX, TRUNK_INDEX, TRUNK_TOP_INDEX},
                window_coordinates, ChunkCoordinate, ChunkRecord,
            },
            ChunkSystem, StreamingReport,
        },
    },
};

/// Updates until every request has come back and a tick changes nothing.
fn settle(system: &mut ChunkSystem, scene: &mut Scene) -> StreamingReport {
    let deadline = web_time::Instant::now() + Duration::from_secs(120);
    let mut total = StreamingReport::default();
    loop {
        let report = system.update(scene);
        total.integrated += report.integrated;
        total.requested += report.requested;
        total.evicted += report.evicted;
        total.failed += report.failed;
        if report.is_quiet() && system.is_idle() {
            return total;
        }
        assert!(web_time::Instant::now() < deadline, "streaming did not settle");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn small_world(seed: u32, radius: u32) -> ChunkManagerConfig {
    ChunkManagerConfig {
        width: 8,
        depth: 8,
        height: 32,
        radius,
        seed: Some(seed),
        ..ChunkManagerConfig::default()
    }
}

fn entity_of(system: &ChunkSystem, coordinate: ChunkCoordinate) -> Option<EntityId> {
    match system.managers()[0].record(coordinate) {
        Some(ChunkRecord::Materialized(id)) => Some(id),
        _ => None,
    }
}

fn window(center: ChunkCoordinate, radius: u32) -> Vec<ChunkCoordinate> {
    let mut coordinates = window_coordinates(center, radius);
    coordinates.sort_unstable();
    coordinates
}

#[test]
fn treeless_world_fills_the_window() {
    let config = ChunkManagerConfig {
        width: 32,
        depth: 32,
        height: 256,
        radius: 2,
        seed: Some(42),
        tree_threshold: 1.1,
        biome_table: BiomeTable {
            ranges: vec![BiomeRange {
                height_start: 0.0,
                height_end: 1.0,
                biomes: vec!["forest".to_owned()],
            }],
            ..BiomeTable::default()
        },
        ..ChunkManagerConfig::default()
    };

    let mut scene = Scene::new();
    scene.instantiate(EntityConfig::default().with_tag("player")).unwrap();
    let mut system = ChunkSystem::new(2);
    system.add_manager(&config, None).unwrap();

    let report = settle(&mut system, &mut scene);
    assert_eq!(report.requested, 9);
    assert_eq!(report.integrated, 9);
    assert_eq!(report.failed, 0);

    let center = ChunkCoordinate::new(0, 0);
    assert_eq!(system.managers()[0].materialized(), window(center, 2));
    assert_eq!(system.managers()[0].requested_count(), 0);

    let tree_tiles = [TRUNK_INDEX, TRUNK_TOP_INDEX, LEAVES_INDEX].map(|i| i as f32);
    for coordinate in window(center, 2) {
        let id = entity_of(&system, coordinate).unwrap();
        let mesh = scene.get(id).unwrap().mesh().unwrap().mesh().clone();
        let tiles = &mesh.attribute(INDICES).unwrap().data;
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|tile| !tree_tiles.contains(tile)), "tree in {coordinate}");
    }
}

#[test]
fn moving_one_chunk_swaps_one_column() {
    let radius = 3;
    let mut scene = Scene::new();
    let player = scene.instantiate(EntityConfig::default().with_tag("player")).unwrap();
    let mut system = ChunkSystem::new(3);
    system.add_manager(&small_world(11, radius), None).unwrap();
    settle(&mut system, &mut scene);

    let kept: Vec<(ChunkCoordinate, EntityId)> = window(ChunkCoordinate::new(0, 0), radius)
        .into_iter()
        .filter(|c| c.x > -(radius as i32 - 1))
        .map(|c| (c, entity_of(&system, c).unwrap()))
        .collect();

    scene.translate(player, Vector3::new(8.0, 0.0, 0.0)).unwrap();
    let report = system.update(&mut scene);
    let side = 2 * radius as usize - 1;
    assert_eq!(report.evicted, side);
    assert_eq!(report.requested, side);

    settle(&mut system, &mut scene);
    assert_eq!(system.managers()[0].materialized(), window(ChunkCoordinate::new(1, 0), radius));
    for (coordinate, id) in kept {
        assert_eq!(entity_of(&system, coordinate), Some(id), "{coordinate} was rebuilt");
    }
}

#[test]
fn late_result_is_evicted_on_the_next_tick() {
    let mut scene = Scene::new();
    scene.instantiate(EntityConfig::default().with_tag("player")).unwrap();
    let mut system = ChunkSystem::new(1);
    system.add_manager(&small_world(3, 2), None).unwrap();
    settle(&mut system, &mut scene);
    let live = scene.len();

    let stray = ChunkCoordinate::new(6, -6);
    let outcome = system.managers()[0].request(stray).process();
    let id = system.on_chunk_generated(outcome, &mut scene).unwrap();
    assert_eq!(entity_of(&system, stray), Some(id));
    assert_eq!(scene.len(), live + 1);

    let report = system.update(&mut scene);
    assert_eq!(report.evicted, 1);
    assert_eq!(report.requested, 0);
    assert!(!scene.contains(id));
    assert_eq!(system.managers()[0].record(stray), None);
}

#[test]
fn window_follows_any_path() {
    let radius = 2;
    let mut rng = fastrand::Rng::with_seed(2024);
    let mut scene = Scene::new();
    let player = scene.instantiate(EntityConfig::default().with_tag("player")).unwrap();
    let mut system = ChunkSystem::new(2);
    system.add_manager(&small_world(5, radius), None).unwrap();

    for _ in 0..8 {
        let step = Vector3::new(rng.f32() * 40.0 - 20.0, 0.0, rng.f32() * 40.0 - 20.0);
        scene.translate(player, step).unwrap();
        settle(&mut system, &mut scene);

        let manager = &system.managers()[0];
        let center = manager.center(&scene).unwrap();
        assert_eq!(manager.materialized(), window(center, radius));

        let chunk_entities: BTreeSet<EntityId> = scene
            .entities()
            .filter(|e| e.mesh().is_some())
            .map(|e| e.id())
            .collect();
        assert_eq!(chunk_entities.len(), (2 * radius as usize - 1).pow(2));
    }
}
