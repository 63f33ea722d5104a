//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration
//! and a configuration file only needs the values it changes. The file is taken
//! from the first command line argument, else from `VOXEL_WORLD_CONFIG`; without
//! either the defaults are used.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    engine_state::voxels::{biome::BiomeTable, chunk::generator::ChunkParameters},
    error::{EngineError, EngineResult},
};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "VOXEL_WORLD_CONFIG";

/// Streaming and generation settings of one chunk manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkManagerConfig {
    /// Tag of the entity chunks are streamed around.
    pub target_name: String,
    pub width: u32,
    pub depth: u32,
    /// World height; the terrain oscillates around half of it.
    pub height: u32,
    /// Window radius in chunks; `2 * radius - 1` chunks per side are kept.
    pub radius: u32,
    /// World seed; random when absent.
    pub seed: Option<u32>,
    pub tree_speed: f64,
    pub biome_speed: f64,
    pub terrain_speed: f64,
    pub tree_threshold: f64,
    #[serde(flatten)]
    pub biome_table: BiomeTable,
    /// Vertical offset applied to every chunk on top of `-height / 2`.
    pub y_offset: f32,
    /// Re-dispatch requests older than this many ticks; never when absent.
    pub retry_after_ticks: Option<u64>,
    /// Atlas tiles per row.
    pub atlas_columns: u32,
    /// Atlas tiles per column.
    pub atlas_rows: u32,
}

impl Default for ChunkManagerConfig {
    fn default() -> Self {
        Self {
            target_name: "player".to_owned(),
            width: 32,
            depth: 32,
            height: 256,
            radius: 8,
            seed: None,
            tree_speed: 0.75,
            biome_speed: 0.005,
            terrain_speed: 0.01,
            tree_threshold: 0.998,
            biome_table: BiomeTable::default(),
            y_offset: -16.0,
            retry_after_ticks: None,
            atlas_columns: 32,
            atlas_rows: 16,
        }
    }
}

impl ChunkManagerConfig {
    /// Rejects zero sizes and an inconsistent biome table.
    pub fn validate(&self) -> EngineResult<()> {
        let sizes = [
            ("width", self.width),
            ("depth", self.depth),
            ("height", self.height),
            ("radius", self.radius),
            ("atlasColumns", self.atlas_columns),
            ("atlasRows", self.atlas_rows),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(EngineError::ChunkConfiguration(format!(
                "`{name}` must be at least 1"
            )));
        }
        self.biome_table.validate()
    }

    /// Generation parameters with the seed resolved.
    pub fn parameters(&self, seed: u32) -> ChunkParameters {
        ChunkParameters {
            width: self.width,
            depth: self.depth,
            half_height: f64::from(self.height) / 2.0,
            seed,
            tree_speed: self.tree_speed,
            biome_speed: self.biome_speed,
            terrain_speed: self.terrain_speed,
            tree_threshold: self.tree_threshold,
            biome_table: self.biome_table.clone(),
        }
    }
}

/// The scripted player chunks stream around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    pub tag: String,
    pub start: [f32; 3],
    /// Units per second.
    pub velocity: [f32; 3],
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tag: "player".to_owned(),
            start: [0.0, 0.0, 0.0],
            velocity: [8.0, 0.0, 4.0],
        }
    }
}

/// Camera projection and placement relative to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Eye offset from the player position.
    pub offset: [f32; 3],
    /// Pitch below the horizon, in degrees.
    pub pitch_degrees: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fovy_degrees: 70.0,
            znear: 0.1,
            zfar: 1000.0,
            offset: [0.0, 24.0, 0.0],
            pitch_degrees: -20.0,
        }
    }
}

/// The directional sun light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightConfig {
    pub direction: [f32; 3],
    pub color: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [-0.4, -1.0, -0.3],
            color: [1.0, 0.97, 0.9],
        }
    }
}

/// Asset locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetConfig {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub atlas: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::from("assets/shaders/chunk.vert.wgsl"),
            fragment_shader: PathBuf::from("assets/shaders/chunk.frag.wgsl"),
            atlas: PathBuf::from("assets/textures/atlas.png"),
        }
    }
}

/// Top level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Worker threads generating chunks.
    pub workers: usize,
    /// Frames to run before exiting; runs forever when absent.
    pub frames: Option<u64>,
    pub target_fps: u32,
    /// Offscreen render target size.
    pub surface_width: u32,
    pub surface_height: u32,
    /// Clear color.
    pub sky_color: [f32; 4],
    /// Log streaming and frame stats every this many frames.
    pub stats_interval: u64,
    /// Skip GPU acquisition and render with the headless backend.
    pub headless: bool,
    pub player: PlayerConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub assets: AssetConfig,
    pub chunk_managers: Vec<ChunkManagerConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            frames: Some(600),
            target_fps: 60,
            surface_width: 1280,
            surface_height: 720,
            sky_color: [0.53, 0.81, 0.92, 1.0],
            stats_interval: 60,
            headless: false,
            player: PlayerConfig::default(),
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            assets: AssetConfig::default(),
            chunk_managers: vec![ChunkManagerConfig::default()],
        }
    }
}

#[cfg(not(target_family = "wasm"))]
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(2)
}

#[cfg(target_family = "wasm")]
fn default_workers() -> usize {
    2
}

impl EngineConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> EngineResult<Self> {
        info!("Loading configuration from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Loads the file named by the first command line argument, else by
    /// `VOXEL_WORLD_CONFIG`, else returns the defaults.
    pub fn from_env_and_args() -> EngineResult<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from);
        match path {
            Some(path) => Self::load(&path),
            None => {
                info!("No configuration given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Checks every chunk manager.
    pub fn validate(&self) -> EngineResult<()> {
        self.chunk_managers
            .iter()
            .try_for_each(ChunkManagerConfig::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        let manager = &config.chunk_managers[0];
        assert_eq!((manager.width, manager.depth, manager.height, manager.radius), (32, 32, 256, 8));
        assert_eq!(manager.tree_threshold, 0.998);
        assert_eq!(manager.y_offset, -16.0);
        assert_eq!(manager.retry_after_ticks, None);
    }

    #[test]
    fn partial_manager_keeps_other_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "workers": 2, "chunkManagers": [ { "seed": 42, "radius": 2, "retryAfterTicks": 30 } ] }"#,
        )
        .unwrap();
        let manager = &config.chunk_managers[0];
        assert_eq!(config.workers, 2);
        assert_eq!(manager.seed, Some(42));
        assert_eq!(manager.retry_after_ticks, Some(30));
        assert_eq!(manager.biome_table, BiomeTable::default());

        let parameters = manager.parameters(42);
        assert_eq!(parameters.half_height, 128.0);
        assert_eq!(parameters.seed, 42);
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(matches!(EngineConfig::from_json("{ nope"), Err(EngineError::Json(_))));
        let broken = r#"{ "chunkManagers": [ { "biomesConfiguration": [] } ] }"#;
        assert!(matches!(
            EngineConfig::from_json(broken),
            Err(EngineError::BiomeConfiguration(_))
        ));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        for field in ["width", "depth", "height", "radius", "atlasColumns"] {
            let json = format!(r#"{{ "chunkManagers": [ {{ "seed": 1, "{field}": 0 }} ] }}"#);
            assert!(
                matches!(
                    EngineConfig::from_json(&json),
                    Err(EngineError::ChunkConfiguration(message)) if message.contains(field)
                ),
                "{field} = 0 was accepted"
            );
        }
        assert!(EngineConfig::from_json(r#"{ "chunkManagers": [ { "radius": 1 } ] }"#).is_ok());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            EngineConfig::load(Path::new("/nonexistent/voxel-world.json")),
            Err(EngineError::Io(_))
        ));
    }
}
