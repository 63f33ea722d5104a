//! # Voxel World
//!
//! An endless voxel landscape streamed in chunks around a moving player and rendered
//! with WGPU.
//!
//! ## Key Modules
//!
//! * `config` - JSON configuration with a default for every value
//! * `engine_state` - Scene, chunk streaming, rendering and the worker pool
//! * `error` - The crate error type
//!
//! ## Architecture
//!
//! Every frame runs on one thread: the player moves, finished chunks are placed in the
//! scene, the streaming window requests and evicts chunks, and the rendering system
//! draws the scene and presents it to the window. Terrain meshes are generated on a
//! pool of worker threads (web workers on WASM), so the frame never waits for
//! generation.
//!
//! ## Usage
//!
//! ```no_run
//! fn main() {
//!     if let Err(err) = voxel_world::run() {
//!         eprintln!("{err}");
//!     }
//! }
//! ```
//!
//! On the web, JavaScript calls `run_web()` once; the engine draws into the canvas
//! with id `wgpu-canvas`, or into a canvas appended to the page without one.

#[cfg(target_family = "wasm")]
use wasm_bindgen::prelude::wasm_bindgen;

use log::info;
#[cfg(not(target_family = "wasm"))]
use log::warn;
use winit::event_loop::EventLoop;

mod application_state;
pub mod config;
pub mod engine_state;
pub mod error;

use application_state::{graphics_resources_builder::Graphics, ApplicationState};
use config::EngineConfig;
#[cfg(not(target_family = "wasm"))]
use engine_state::{rendering::GpuContext, EngineState};
use engine_state::TickReport;
use error::{EngineError, EngineResult};

/// Logs streaming and render counts.
pub(crate) fn log_stats(frame: u64, report: &TickReport, pending: usize, entities: usize) {
    info!(
        "frame {frame}: {entities} entities, {pending} chunks pending, {} integrated, {} evicted, {} drawn, {} skipped",
        report.streaming.integrated,
        report.streaming.evicted,
        report.render.frame.drawn,
        report.render.frame.skipped,
    );
}

/// Runs the frame loop without a window until the configured frame count is reached.
#[cfg(not(target_family = "wasm"))]
fn run_frames<C: GpuContext>(config: &EngineConfig, context: C) -> EngineResult<()> {
    let mut engine = EngineState::new(config, context)?;
    engine.resize(config.surface_width, config.surface_height);
    let frame_budget = web_time::Duration::from_secs_f64(1.0 / f64::from(config.target_fps.max(1)));
    let mut last = web_time::Instant::now();

    while config.frames.map_or(true, |frames| engine.frame() < frames) {
        let now = web_time::Instant::now();
        let dt = now - last;
        last = now;

        let report = engine.tick(dt)?;
        if config.stats_interval > 0 && engine.frame() % config.stats_interval == 0 {
            log_stats(engine.frame(), &report, engine.chunks.pending(), engine.scene.len());
        }

        let elapsed = now.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }

    info!("Finished after {} frames", engine.frame());
    Ok(())
}

/// Creates the event loop the window and the GPU context are delivered to.
fn event_loop() -> EngineResult<EventLoop<Graphics>> {
    EventLoop::with_user_event()
        .build()
        .map_err(|e| EngineError::Window(e.to_string()))
}

/// Native entry point: initialises logging, loads the configuration and runs the
/// engine in a window, or on the headless backend when configured so or when no
/// display or adapter is available.
#[cfg(not(target_family = "wasm"))]
pub fn run() -> EngineResult<()> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    let config = EngineConfig::from_env_and_args()?;

    if config.headless {
        info!("Rendering headless");
        return run_frames(&config, engine_state::rendering::HeadlessContext::new());
    }

    let windowed = event_loop().and_then(|event_loop| {
        let mut state = ApplicationState::new(config.clone(), event_loop.create_proxy());
        event_loop
            .run_app(&mut state)
            .map_err(|e| EngineError::Window(e.to_string()))?;
        state.finish()
    });

    match windowed {
        Err(
            err @ (EngineError::Window(_)
            | EngineError::Surface(_)
            | EngineError::Adapter(_)
            | EngineError::Device(_)),
        ) => {
            warn!("{err}, falling back to the headless backend");
            run_frames(&config, engine_state::rendering::HeadlessContext::new())
        }
        outcome => outcome,
    }
}

/// Web entry point: initialises panic reporting and logging, then runs the engine
/// in the page's canvas with the default configuration.
#[cfg(target_family = "wasm")]
#[wasm_bindgen]
pub fn run_web() {
    use winit::platform::web::EventLoopExtWebSys;

    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    console_log::init_with_level(log::Level::Info).expect("Couldn't initialize logger");
    info!("Logger initialized");

    match event_loop() {
        Ok(event_loop) => {
            let state = ApplicationState::new(EngineConfig::default(), event_loop.create_proxy());
            event_loop.spawn_app(state);
        }
        Err(err) => log::error!("{err}"),
    }
}
