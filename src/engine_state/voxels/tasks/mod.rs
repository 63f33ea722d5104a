//! # Voxel Task System
//!
//! Work sent from chunk managers to the generation workers.

pub mod chunk_generation_task;
