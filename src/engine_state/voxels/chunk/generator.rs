//! # Chunk Generator
//!
//! Turns a chunk coordinate into one triangle mesh. Every column of the chunk is
//! voxelized from a terrain height field: the surface height decides where the top
//! face goes, the four neighbouring heights decide which side faces are exposed,
//! and a biome lookup decides the atlas tiles. A per-chunk random stream scatters
//! trees over forest columns.
//!
//! Generation is a pure function of its inputs. The random stream for trees is
//! re-seeded from `(seed, x, z)` for every chunk, so the resulting mesh does not
//! depend on which worker ran it or on what that worker generated before.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ChunkCoordinate;
use crate::{
    engine_state::{
        noise::{FractalNoise, LinearMap, Noise, NoiseField, PerlinNoise, SharedNoise, TranslatedNoise},
        rendering::{mesh::Mesh, mesh_builder::MeshBuilder},
        voxels::biome::{Biome, BiomeTable},
    },
    error::{EngineError, EngineResult},
};

/// Atlas tile of tree trunks.
pub const TRUNK_INDEX: u32 = 92;
/// Atlas tile of the top of a trunk.
pub const TRUNK_TOP_INDEX: u32 = 93;
/// Atlas tile of leaves.
pub const LEAVES_INDEX: u32 = 150;
/// Canopy radius around the trunk.
pub const CANOPY_RADIUS: i32 = 2;

/// Lattice size of the terrain and biome gradient fields.
const LATTICE: [usize; 2] = [256, 256];
/// Offset of the interleaved octaves, half a lattice cell.
const OCTAVE_SHIFT: [f64; 2] = [0.5, 0.5];

/// Tunables shared by every chunk of a chunk manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkParameters {
    /// Chunk size along x.
    pub width: u32,
    /// Chunk size along z.
    pub depth: u32,
    /// Half of the world height; the terrain oscillates around it.
    pub half_height: f64,
    /// World seed.
    pub seed: u32,
    /// Frequency of the tree layer. Placement draws from the per-chunk stream, so
    /// generation does not read it.
    pub tree_speed: f64,
    /// Biome noise frequency.
    pub biome_speed: f64,
    /// Terrain noise frequency; also the neighbour sampling step.
    pub terrain_speed: f64,
    /// Random draws above this value grow a tree.
    pub tree_threshold: f64,
    /// Biome definitions and height ranges.
    #[serde(flatten)]
    pub biome_table: BiomeTable,
}

/// Immutable noise fields derived from a world seed.
///
/// Built once per chunk manager and shared by every request it sends, so workers
/// never rebuild the gradient lattices.
#[derive(Debug)]
pub struct GenerationContext {
    seed: u32,
    terrain: FractalNoise,
    biome: FractalNoise,
}

impl GenerationContext {
    /// Builds the terrain and biome fields for `seed`.
    ///
    /// Both fields are four octaves alternating a 256×256 gradient lattice with the
    /// same lattice shifted by half a cell.
    pub fn new(seed: u32) -> EngineResult<Self> {
        Ok(Self {
            seed,
            terrain: Self::layered(seed)?,
            biome: Self::layered(seed)?,
        })
    }

    fn layered(seed: u32) -> EngineResult<FractalNoise> {
        let perlin: SharedNoise = Arc::new(PerlinNoise::new(seed, &LATTICE)?);
        let shifted: SharedNoise = Arc::new(TranslatedNoise::new(perlin.clone(), &OCTAVE_SHIFT)?);
        FractalNoise::new(vec![perlin.clone(), shifted.clone(), perlin, shifted])
    }

    /// Seed the fields were built from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Terrain height field.
    pub fn terrain(&self) -> &FractalNoise {
        &self.terrain
    }

    /// Biome selection field.
    pub fn biome(&self) -> &FractalNoise {
        &self.biome
    }
}

/// Mesh and placement produced for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedChunk {
    /// Chunk geometry in chunk-local coordinates.
    pub mesh: Mesh,
    /// World x of the chunk origin.
    pub translation_x: f32,
    /// World z of the chunk origin.
    pub translation_z: f32,
}

/// Seed of the tree stream of one chunk.
///
/// Mixes the world seed with both chunk coordinates so neighbouring chunks draw
/// unrelated streams.
pub fn tree_seed(seed: u32, coordinate: ChunkCoordinate) -> u32 {
    let mut hash = u64::from(seed);
    for value in [coordinate.x as u32, coordinate.z as u32] {
        hash = (hash ^ u64::from(value)).wrapping_add(0x9e37_79b9_7f4a_7c15);
        hash = (hash ^ (hash >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        hash = (hash ^ (hash >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        hash ^= hash >> 31;
    }
    (hash ^ (hash >> 32)) as u32
}

/// Surface heights of a column and of its four axis neighbours.
#[derive(Debug, Clone, Copy)]
struct ColumnHeights {
    /// The column itself.
    center: i32,
    /// Neighbour at +x.
    right: i32,
    /// Neighbour at +z.
    front: i32,
    /// Neighbour at -x.
    left: i32,
    /// Neighbour at -z.
    back: i32,
}

/// Generates the mesh of the chunk at `coordinate`.
///
/// # Arguments
/// * `coordinate` - Grid position of the chunk
/// * `parameters` - Chunk size, speeds, thresholds and biome tables
/// * `context` - Terrain and biome fields built from `parameters.seed`
///
/// # Returns
/// The chunk mesh in local coordinates together with its world translation, or an
/// error if the biome table cannot resolve a column.
pub fn generate_chunk(
    coordinate: ChunkCoordinate,
    parameters: &ChunkParameters,
    context: &GenerationContext,
) -> EngineResult<GeneratedChunk> {
    let terrain = context.terrain();
    let biome_field = context.biome();
    let table = &parameters.biome_table;

    let mut trees = Noise::new(tree_seed(parameters.seed, coordinate));
    let mut builder = MeshBuilder::default();

    let offset_x = f64::from(coordinate.x) * f64::from(parameters.width);
    let offset_z = f64::from(coordinate.z) * f64::from(parameters.depth);

    let tree_height_map = LinearMap::new(parameters.tree_threshold, 1.0, 3.0, 7.0);
    let biome_map = biome_field.mapper(0.0, 1.0);
    let normalized_height_map = terrain.mapper(0.0, 1.0);
    let deviance = parameters.half_height / 2.0;
    let terrain_map = terrain.mapper(-deviance, deviance);
    let step = parameters.terrain_speed;

    let surface = |raw: f64| (parameters.half_height + terrain_map.apply(raw)).floor() as i32;
    let height_at = |x: f64, z: f64| surface(terrain.sample(&[x, z]));

    for z in 0..parameters.depth as i32 {
        for x in 0..parameters.width as i32 {
            let base_x = f64::from(x) + offset_x;
            let base_z = f64::from(z) + offset_z;

            let terrain_x = base_x * parameters.terrain_speed;
            let terrain_z = base_z * parameters.terrain_speed;
            let raw_height = terrain.sample(&[terrain_x, terrain_z]);

            let heights = ColumnHeights {
                center: surface(raw_height),
                right: height_at(terrain_x + step, terrain_z),
                front: height_at(terrain_x, terrain_z + step),
                left: height_at(terrain_x - step, terrain_z),
                back: height_at(terrain_x, terrain_z - step),
            };

            let biome_value = biome_map.apply(biome_field.sample(&[
                base_x * parameters.biome_speed,
                base_z * parameters.biome_speed,
            ]));
            let name = table
                .select(normalized_height_map.apply(raw_height), biome_value)
                .ok_or_else(|| {
                    EngineError::BiomeConfiguration(format!(
                        "no biome for column ({x}, {z}) of chunk {coordinate}"
                    ))
                })?;
            let biome = table.biome(name).ok_or_else(|| {
                EngineError::BiomeConfiguration(format!("unknown biome `{name}`"))
            })?;

            // One draw per column keeps the stream aligned whatever the biome
            let draw = trees.next_float();
            if draw > parameters.tree_threshold && table.grows_trees(name) {
                let tree_height = tree_height_map.apply(draw).floor() as i32;
                add_tree(&mut builder, x, z, heights.center, tree_height);
            }

            add_column(&mut builder, x, z, heights, biome);
        }
    }

    Ok(GeneratedChunk {
        mesh: builder.build()?,
        translation_x: (coordinate.x as f32 - 0.5) * parameters.width as f32,
        translation_z: (coordinate.z as f32 - 0.5) * parameters.depth as f32,
    })
}

/// Trunk from the surface up, then a three layer canopy.
fn add_tree(builder: &mut MeshBuilder, x: i32, z: i32, surface: i32, tree_height: i32) {
    let top = surface + tree_height;
    let (fx, fz) = (x as f32, z as f32);

    for y in surface..top {
        let fy = y as f32;
        builder.add_front(fx, fy, fz, TRUNK_INDEX);
        builder.add_back(fx, fy, fz, TRUNK_INDEX);
        if y == top - 1 {
            builder.add_top(fx, fy, fz, TRUNK_TOP_INDEX);
        }
        builder.add_right(fx, fy, fz, TRUNK_INDEX);
        builder.add_left(fx, fy, fz, TRUNK_INDEX);
    }

    let r = CANOPY_RADIUS;

    // Full square around the trunk
    for y in top - r..top {
        for k in z - r..=z + r {
            for j in x - r..=x + r {
                if k != z || j != x {
                    builder.add_cube(j as f32, y as f32, k as f32, LEAVES_INDEX);
                }
            }
        }
    }

    // Inset square above the trunk
    for k in z - r + 1..=z + r - 1 {
        for j in x - r + 1..=x + r - 1 {
            builder.add_cube(j as f32, top as f32, k as f32, LEAVES_INDEX);
        }
    }

    // Plus-shaped cap
    for k in z - r + 1..=z + r - 1 {
        for j in x - r + 1..=x + r - 1 {
            if j == x || k == z {
                builder.add_cube(j as f32, (top + 1) as f32, k as f32, LEAVES_INDEX);
            }
        }
    }
}

/// Bottom face at y = 0 and every side face exposed above a lower neighbour.
fn add_column(builder: &mut MeshBuilder, x: i32, z: i32, heights: ColumnHeights, biome: &Biome) {
    let (fx, fz) = (x as f32, z as f32);
    builder.add_bottom(fx, 0.0, fz, biome.bottom_index);

    let lowest = (heights.center - 1)
        .min(heights.right)
        .min(heights.front)
        .min(heights.left)
        .min(heights.back);

    for y in lowest..heights.center {
        let fy = y as f32;
        if y >= heights.front {
            builder.add_front(fx, fy, fz, biome.side_index);
        }
        if y >= heights.back {
            builder.add_back(fx, fy, fz, biome.side_index);
        }
        if y == heights.center - 1 {
            builder.add_top(fx, fy, fz, biome.top_index);
        }
        if y >= heights.right {
            builder.add_right(fx, fy, fz, biome.side_index);
        }
        if y >= heights.left {
            builder.add_left(fx, fy, fz, biome.side_index);
        }
    }
}
