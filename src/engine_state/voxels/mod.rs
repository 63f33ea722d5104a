//! # Voxel World
//!
//! Terrain generation and chunk streaming.
//!
//! ## Architecture
//!
//! * **Biome**: atlas tiles per biome and the height bands that select them
//! * **Chunk**: grid coordinates, streaming records and the mesh generator
//! * **ChunkManager**: the window of chunks kept around one target entity
//! * **ChunkSystem**: ticks every manager and owns the generation workers
//! * **Tasks**: the request and result messages exchanged with workers
//!
//! ## Data Flow
//!
//! 1. The target moves; its manager requests the chunks entering the window
//! 2. Workers generate one mesh per request
//! 3. The next tick places each mesh in the scene as a chunk entity
//! 4. Chunks leaving the window are destroyed, and the rendering system releases
//!    their GPU resources

pub mod biome;
pub mod chunk;
pub mod chunk_manager;
pub mod chunk_system;
pub mod tasks;

pub use chunk_manager::{ChunkManager, ChunkTarget};
pub use chunk_system::{ChunkSystem, StreamingReport};
