//! Whole frames on the headless backend, with shaders and atlas loaded from `assets/`.

use std::time::Duration;

use voxel_world::{
    config::EngineConfig,
    engine_state::{rendering::HeadlessContext, EngineState},
};

fn config(velocity: [f32; 3]) -> EngineConfig {
    let json = format!(
        r#"{{
            "workers": 2,
            "skyColor": [0.1, 0.2, 0.3, 1.0],
            "player": {{ "velocity": [{}, {}, {}] }},
            "chunkManagers": [
                {{ "width": 8, "depth": 8, "height": 32, "radius": 2, "seed": 9 }}
            ]
        }}"#,
        velocity[0], velocity[1], velocity[2]
    );
    EngineConfig::from_json(&json).unwrap()
}

/// Ticks until a frame draws `expected` chunks with nothing pending.
fn run_until_drawn(engine: &mut EngineState<HeadlessContext>, expected: usize) {
    let deadline = web_time::Instant::now() + Duration::from_secs(120);
    loop {
        let report = engine.tick(Duration::from_millis(16)).unwrap();
        if report.render.frame.drawn == expected && engine.chunks.is_idle() {
            return;
        }
        assert!(web_time::Instant::now() < deadline, "frames never settled");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn standing_player_sees_the_whole_window() {
    let config = config([0.0, 0.0, 0.0]);
    let mut engine = EngineState::new(&config, HeadlessContext::new()).unwrap();
    run_until_drawn(&mut engine, 9);

    let context = engine.rendering.pipeline().context();
    assert_eq!(context.clear_color(), [0.1, 0.2, 0.3, 1.0]);
    assert_eq!(context.mesh_count(), 9);
    assert_eq!(context.frame_uniforms().unwrap().light_count[0], 1);
    assert!(context.last_frame().iter().all(|draw| draw.textures.len() == 1));
    assert_eq!(engine.scene.len(), 10);
}

#[test]
fn walking_player_releases_left_behind_chunks() {
    let config = config([0.0, 0.0, 0.0]);
    let mut engine = EngineState::new(&config, HeadlessContext::new()).unwrap();
    run_until_drawn(&mut engine, 9);

    // Two chunk widths along +z
    engine.player.velocity = cgmath::Vector3::new(0.0, 0.0, 16.0 / 0.016);
    engine.tick(Duration::from_millis(16)).unwrap();
    engine.player.velocity = cgmath::Vector3::new(0.0, 0.0, 0.0);
    run_until_drawn(&mut engine, 9);

    let stats = engine.rendering.pipeline().context().stats();
    assert_eq!(stats.meshes_destroyed, 6);
    assert_eq!(stats.textures_destroyed, 0);
    assert_eq!(engine.rendering.pipeline().context().mesh_count(), 9);
    let center = engine.chunks.managers()[0].center(&engine.scene).unwrap();
    assert_eq!((center.x, center.z), (0, 2));
}

#[test]
fn resize_reaches_the_surface_and_the_projection() {
    let config = config([0.0, 0.0, 0.0]);
    let mut engine = EngineState::new(&config, HeadlessContext::new()).unwrap();

    engine.resize(800, 400);
    assert_eq!(engine.rendering.pipeline().context().size(), (800, 400));
    assert_eq!(engine.camera.projection.aspect(), 2.0);

    // Minimised windows report a zero size
    engine.resize(0, 0);
    assert_eq!(engine.rendering.pipeline().context().size(), (800, 400));
    assert_eq!(engine.camera.projection.aspect(), 2.0);
    engine.tick(Duration::from_millis(16)).unwrap();
}
