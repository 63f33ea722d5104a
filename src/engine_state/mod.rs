//! # Engine State Module
//!
//! The core engine module: owns the scene and every system that runs on it.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container for the engine
//! * `camera_state` - Camera following the player
//! * `noise` - Seeded noise fields used by terrain generation
//! * `rendering` - Mesh model, forward pipeline and GPU backends
//! * `scene` - Entities, their components and lifecycle events
//! * `task_management` - Worker pool for chunk generation
//! * `voxels` - Biomes, chunk generation and streaming
//!
//! ## Tick
//!
//! 1. The scripted player moves
//! 2. `ChunkSystem::update` integrates finished chunks and streams the window
//! 3. The camera follows the player
//! 4. `RenderingSystem::late_update` syncs GPU resources with the scene and draws

use cgmath::Vector3;
use log::info;
use web_time::Duration;

use camera_state::CameraState;
use rendering::{
    material::{Material, MaterialValue, Program, Shader, ShaderStage},
    texture::Texture,
    DirectionalLight, GpuContext, RenderReport, RenderingSystem,
};
use scene::{EntityConfig, EntityId, MaterialComponent, Scene};
use voxels::{ChunkSystem, StreamingReport};

use crate::{config::EngineConfig, error::EngineResult};

pub mod camera_state;
pub mod noise;
pub mod rendering;
pub mod scene;
pub mod task_management;
pub mod voxels;

/// The entity chunks stream around, moving at a constant velocity.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedPlayer {
    pub entity: EntityId,
    /// Units per second.
    pub velocity: Vector3<f32>,
}

impl ScriptedPlayer {
    /// Moves the player by `velocity * dt`.
    pub fn advance(&self, scene: &mut Scene, dt: Duration) -> EngineResult<()> {
        scene.translate(self.entity, self.velocity * dt.as_secs_f32())
    }
}

/// Chunk program and atlas, loaded from the configured files on a loader thread.
#[cfg(not(target_family = "wasm"))]
fn chunk_assets(config: &EngineConfig) -> EngineResult<(Program, Texture)> {
    let program = Program::new(
        Shader::from_file(&config.assets.vertex_shader, ShaderStage::Vertex),
        Shader::from_file(&config.assets.fragment_shader, ShaderStage::Fragment),
    );
    Ok((program, Texture::from_file(&config.assets.atlas)))
}

/// Chunk program and atlas, embedded in the module since the browser has no file
/// system.
#[cfg(target_family = "wasm")]
fn chunk_assets(_config: &EngineConfig) -> EngineResult<(Program, Texture)> {
    let program = Program::new(
        Shader::inline(
            "chunk.vert",
            ShaderStage::Vertex,
            include_str!("../../assets/shaders/chunk.vert.wgsl"),
        ),
        Shader::inline(
            "chunk.frag",
            ShaderStage::Fragment,
            include_str!("../../assets/shaders/chunk.frag.wgsl"),
        ),
    );
    let atlas = Texture::from_bytes("atlas", include_bytes!("../../assets/textures/atlas.png"))?;
    Ok((program, atlas))
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub streaming: StreamingReport,
    pub render: RenderReport,
}

/// The main state container for the engine.
pub struct EngineState<C: GpuContext> {
    pub scene: Scene,
    pub chunks: ChunkSystem,
    pub rendering: RenderingSystem<C>,
    pub camera: CameraState,
    pub player: ScriptedPlayer,
    frame: u64,
}

impl<C: GpuContext> EngineState<C> {
    /// Creates the scene, the player, one chunk manager per configured world and the
    /// rendering system around `context`.
    ///
    /// # Arguments
    /// * `config` - Engine configuration
    /// * `context` - GPU backend
    ///
    /// # Returns
    /// The engine, or an error if a chunk manager configuration is invalid.
    pub fn new(config: &EngineConfig, context: C) -> EngineResult<Self> {
        let mut scene = Scene::new();
        let [x, y, z] = config.player.start;
        let entity = scene.instantiate(
            EntityConfig::default()
                .with_tag(config.player.tag.clone())
                .with_translation(x, y, z),
        )?;
        let player = ScriptedPlayer {
            entity,
            velocity: Vector3::from(config.player.velocity),
        };

        let (program, atlas) = chunk_assets(config)?;

        let mut chunks = ChunkSystem::new(config.workers);
        for manager in &config.chunk_managers {
            let template = MaterialComponent {
                program: program.clone(),
                material: Material::new()
                    .with("albedo", MaterialValue::Texture(atlas.clone()))
                    .with("atlasColumns", MaterialValue::Int(manager.atlas_columns as i32))
                    .with("atlasRows", MaterialValue::Int(manager.atlas_rows as i32)),
            };
            let index = chunks.add_manager(manager, Some(template))?;
            info!(
                "Chunk manager {index}: {}x{} chunks, radius {}, following `{}`",
                manager.width, manager.depth, manager.radius, manager.target_name
            );
        }

        let mut rendering = RenderingSystem::new(context, config.sky_color);
        rendering.add_light(DirectionalLight::new(
            Vector3::from(config.light.direction),
            config.light.color,
        ));

        Ok(Self {
            scene,
            chunks,
            rendering,
            camera: CameraState::new(&config.camera, config.surface_width, config.surface_height),
            player,
            frame: 0,
        })
    }

    /// Adapts the render target and the camera projection to a new surface size.
    /// A zero-sized (minimised) surface is ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.rendering.pipeline_mut().context_mut().resize(width, height);
        self.camera.projection.resize(width, height);
        info!("Resized to {width}x{height}");
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Runs one frame.
    ///
    /// # Arguments
    /// * `dt` - Time elapsed since the previous frame
    ///
    /// # Returns
    /// Streaming and rendering counts, or a fatal shader or program error.
    pub fn tick(&mut self, dt: Duration) -> EngineResult<TickReport> {
        self.player.advance(&mut self.scene, dt)?;
        let streaming = self.chunks.update(&mut self.scene);
        self.camera
            .follow(&self.scene, self.player.entity, self.player.velocity);
        let render = self
            .rendering
            .late_update(&mut self.scene, &self.camera.view())?;
        self.frame += 1;
        Ok(TickReport { streaming, render })
    }
}
