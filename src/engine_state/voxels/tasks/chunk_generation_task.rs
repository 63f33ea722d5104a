//! # Chunk Generation Task
//!
//! The message a chunk manager sends to a worker, and what comes back. Both sides
//! serialize with the camelCase field names of the worker message format, so a
//! request can cross any message boundary as JSON. The shared noise context is
//! not part of the message; a request that arrives without one builds it from
//! its seed on the worker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    engine_state::{
        rendering::mesh::Mesh,
        task_management::task::Task,
        voxels::chunk::{
            generator::{generate_chunk, ChunkParameters, GeneratedChunk, GenerationContext},
            ChunkCoordinate,
        },
    },
    error::EngineResult,
};

/// Request to generate one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    /// Grid position of the chunk.
    pub chunk: ChunkCoordinate,
    /// Size, speeds, thresholds and biome tables.
    #[serde(flatten)]
    pub parameters: ChunkParameters,
    /// Index of the requesting chunk manager.
    pub chunk_manager_index: usize,
    /// Noise fields built from `parameters.seed`, shared by the manager.
    #[serde(skip)]
    pub context: Option<Arc<GenerationContext>>,
}

impl ChunkRequest {
    /// The request's context, or a new one if it has none or it was built from
    /// another seed.
    fn resolve_context(&self) -> EngineResult<Arc<GenerationContext>> {
        match &self.context {
            Some(context) if context.seed() == self.parameters.seed => Ok(context.clone()),
            _ => Ok(Arc::new(GenerationContext::new(self.parameters.seed)?)),
        }
    }
}

/// A finished request, successful or not.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub request: ChunkRequest,
    pub result: EngineResult<GeneratedChunk>,
}

impl ChunkOutcome {
    /// The wire form of a successful outcome.
    pub fn into_response(self) -> EngineResult<ChunkResponse> {
        let generated = self.result?;
        Ok(ChunkResponse {
            request: self.request,
            mesh: generated.mesh,
            translation_x: generated.translation_x,
            translation_z: generated.translation_z,
        })
    }
}

impl Task for ChunkRequest {
    type Output = ChunkOutcome;

    fn process(self) -> ChunkOutcome {
        let result = self
            .resolve_context()
            .and_then(|context| generate_chunk(self.chunk, &self.parameters, &context));
        ChunkOutcome {
            request: self,
            result,
        }
    }
}

/// Worker response: the request fields followed by the generated mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    #[serde(flatten)]
    pub request: ChunkRequest,
    pub mesh: Mesh,
    pub translation_x: f32,
    pub translation_z: f32,
}

impl From<ChunkResponse> for ChunkOutcome {
    fn from(response: ChunkResponse) -> Self {
        ChunkOutcome {
            request: response.request,
            result: Ok(GeneratedChunk {
                mesh: response.mesh,
                translation_x: response.translation_x,
                translation_z: response.translation_z,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::engine_state::voxels::biome::BiomeTable;

    fn request(context: Option<Arc<GenerationContext>>) -> ChunkRequest {
        ChunkRequest {
            chunk: ChunkCoordinate::new(1, -2),
            parameters: ChunkParameters {
                width: 4,
                depth: 4,
                half_height: 16.0,
                seed: 7,
                tree_speed: 0.75,
                biome_speed: 0.005,
                terrain_speed: 0.01,
                tree_threshold: 0.998,
                biome_table: BiomeTable::default(),
            },
            chunk_manager_index: 3,
            context,
        }
    }

    #[test]
    fn request_uses_worker_field_names() {
        let json = serde_json::to_value(request(None)).unwrap();
        assert_eq!(json["chunk"], serde_json::json!([1, -2]));
        assert_eq!(json["halfHeight"], Value::from(16.0));
        assert_eq!(json["chunkManagerIndex"], Value::from(3));
        assert_eq!(json["treeBiomes"], serde_json::json!(["default", "forest"]));
        assert!(json["biomesConfiguration"].is_array());
        assert!(json["biomes"]["snowy"]["topIndex"].is_number());
        assert!(json.get("context").is_none());
    }

    #[test]
    fn missing_context_is_built_on_the_worker() {
        let shared = Arc::new(GenerationContext::new(7).unwrap());
        let with_context = request(Some(shared)).process();
        let without_context = request(None).process();
        assert_eq!(with_context.result.unwrap(), without_context.result.unwrap());
    }

    #[test]
    fn response_flattens_the_request() {
        let response = request(None).process().into_response().unwrap();
        let json = serde_json::to_string(&response).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["translationX"], Value::from(2.0));
        assert_eq!(value["chunkManagerIndex"], Value::from(3));

        let back: ChunkResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request.chunk, ChunkCoordinate::new(1, -2));
        assert_eq!(back.mesh, response.mesh);
    }
}
