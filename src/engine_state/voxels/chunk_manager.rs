//! # Chunk Manager
//!
//! Keeps the chunks of one world around one target entity. The manager owns the
//! record of every coordinate it has touched:
//!
//! ```text
//! Absent ──request──▶ Requested ──integrate──▶ Materialized ──evict──▶ Absent
//! ```
//!
//! A coordinate holds at most one record, so no second request is sent while one
//! is in flight, and a duplicate result replaces the entity it would otherwise
//! leak. `Requested` records are never evicted.
//!
//! The manager never talks to workers itself; `ChunkSystem` sends the requests it
//! plans and hands back the results.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::{
    config::ChunkManagerConfig,
    engine_state::{
        scene::{EntityConfig, EntityId, MaterialComponent, Scene},
        voxels::{
            chunk::{
                generator::{ChunkParameters, GeneratedChunk, GenerationContext},
                window_coordinates, ChunkCoordinate, ChunkRecord,
            },
            tasks::chunk_generation_task::ChunkRequest,
        },
    },
    error::EngineResult,
};

/// Entity the streaming window follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkTarget {
    /// A known entity.
    Entity(EntityId),
    /// The first entity, in creation order, carrying this tag.
    Tag(String),
}

/// Streaming state of one world.
#[derive(Debug)]
pub struct ChunkManager {
    index: usize,
    target: ChunkTarget,
    parameters: ChunkParameters,
    radius: u32,
    y_offset: f32,
    retry_after_ticks: Option<u64>,
    template: Option<MaterialComponent>,
    context: Arc<GenerationContext>,
    chunks: HashMap<ChunkCoordinate, ChunkRecord>,
}

impl ChunkManager {
    /// Creates a manager following the entity tagged `config.target_name`.
    ///
    /// # Arguments
    /// * `index` - Position of the manager in its `ChunkSystem`, echoed by every result
    /// * `config` - Sizes, noise tunables and biome tables
    /// * `template` - Program and material every chunk is drawn with
    ///
    /// # Returns
    /// The manager, or an error if a size is zero or the biome table is inconsistent.
    pub fn new(
        index: usize,
        config: &ChunkManagerConfig,
        template: Option<MaterialComponent>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(|| fastrand::u32(..));
        let context = Arc::new(GenerationContext::new(seed)?);
        debug!("Chunk manager {index} uses seed {seed}");

        Ok(Self {
            index,
            target: ChunkTarget::Tag(config.target_name.clone()),
            parameters: config.parameters(seed),
            radius: config.radius,
            y_offset: config.y_offset,
            retry_after_ticks: config.retry_after_ticks,
            template,
            context,
            chunks: HashMap::new(),
        })
    }

    /// Follows `target` instead of the configured tag.
    pub fn with_target(mut self, target: ChunkTarget) -> Self {
        self.target = target;
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn target(&self) -> &ChunkTarget {
        &self.target
    }

    pub fn parameters(&self) -> &ChunkParameters {
        &self.parameters
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn context(&self) -> &Arc<GenerationContext> {
        &self.context
    }

    /// Record of `coordinate`, `None` when absent.
    pub fn record(&self, coordinate: ChunkCoordinate) -> Option<ChunkRecord> {
        self.chunks.get(&coordinate).copied()
    }

    /// Every record.
    pub fn records(&self) -> impl Iterator<Item = (ChunkCoordinate, ChunkRecord)> + '_ {
        self.chunks.iter().map(|(coordinate, record)| (*coordinate, *record))
    }

    /// Coordinates currently in the scene, sorted.
    pub fn materialized(&self) -> Vec<ChunkCoordinate> {
        let mut coordinates: Vec<_> = self
            .chunks
            .iter()
            .filter(|(_, record)| matches!(record, ChunkRecord::Materialized(_)))
            .map(|(coordinate, _)| *coordinate)
            .collect();
        coordinates.sort_unstable();
        coordinates
    }

    /// Number of requests in flight.
    pub fn requested_count(&self) -> usize {
        self.chunks
            .values()
            .filter(|record| matches!(record, ChunkRecord::Requested { .. }))
            .count()
    }

    /// Resolves the target entity.
    pub fn resolve_target(&self, scene: &Scene) -> Option<EntityId> {
        match &self.target {
            ChunkTarget::Entity(id) => scene.contains(*id).then_some(*id),
            ChunkTarget::Tag(tag) => scene.find_by_tag(tag),
        }
    }

    /// Chunk containing the target, or `None` without a target.
    pub fn center(&self, scene: &Scene) -> Option<ChunkCoordinate> {
        let position = scene.world_position(self.resolve_target(scene)?)?;
        Some(ChunkCoordinate::containing(
            position.x,
            position.z,
            self.parameters.width,
            self.parameters.depth,
        ))
    }

    /// Generation request for `coordinate`, sharing the manager's noise context.
    pub fn request(&self, coordinate: ChunkCoordinate) -> ChunkRequest {
        ChunkRequest {
            chunk: coordinate,
            parameters: self.parameters.clone(),
            chunk_manager_index: self.index,
            context: Some(self.context.clone()),
        }
    }

    /// Destroys every materialized chunk outside the window around `center`.
    ///
    /// # Returns
    /// The number of chunks evicted.
    pub fn evict_outside(&mut self, center: ChunkCoordinate, scene: &mut Scene) -> usize {
        let radius = self.radius;
        let evicted: Vec<(ChunkCoordinate, EntityId)> = self
            .chunks
            .iter()
            .filter_map(|(coordinate, record)| match record {
                ChunkRecord::Materialized(id) if !coordinate.within(center, radius) => {
                    Some((*coordinate, *id))
                }
                _ => None,
            })
            .collect();

        for (coordinate, id) in &evicted {
            scene.destroy(*id);
            self.chunks.remove(coordinate);
            debug!("Evicted chunk {coordinate} ({id})");
        }
        evicted.len()
    }

    /// Marks every absent coordinate of the window as requested, ring by ring from
    /// the center outwards.
    ///
    /// # Returns
    /// The requests to send, in walk order.
    pub fn plan_requests(&mut self, center: ChunkCoordinate, tick: u64) -> Vec<ChunkRequest> {
        let mut requests = Vec::new();
        for coordinate in window_coordinates(center, self.radius) {
            if self.chunks.contains_key(&coordinate) {
                continue;
            }
            self.chunks
                .insert(coordinate, ChunkRecord::Requested { requested_at: tick });
            requests.push(self.request(coordinate));
        }
        requests
    }

    /// Requests that have waited `retry_after_ticks` or more, refreshed to `tick`.
    /// Empty when retries are disabled.
    pub fn stale_requests(&mut self, tick: u64) -> Vec<ChunkRequest> {
        let Some(retry_after) = self.retry_after_ticks else {
            return Vec::new();
        };

        let mut stale: Vec<ChunkCoordinate> = Vec::new();
        for (coordinate, record) in self.chunks.iter_mut() {
            if let ChunkRecord::Requested { requested_at } = record {
                if tick.saturating_sub(*requested_at) >= retry_after {
                    *requested_at = tick;
                    stale.push(*coordinate);
                }
            }
        }
        stale.sort_unstable();
        stale.into_iter().map(|c| self.request(c)).collect()
    }

    /// Places a generated chunk in the scene and records it as materialized.
    ///
    /// An entity already recorded for the coordinate is destroyed first. A chunk
    /// for a coordinate outside the window is placed all the same and evicted by
    /// the next window check.
    ///
    /// # Returns
    /// The new entity.
    pub fn integrate(
        &mut self,
        coordinate: ChunkCoordinate,
        generated: GeneratedChunk,
        scene: &mut Scene,
    ) -> EngineResult<EntityId> {
        if let Some(ChunkRecord::Materialized(previous)) = self.chunks.get(&coordinate) {
            debug!("Duplicate chunk {coordinate}, replacing {previous}");
            scene.destroy(*previous);
        }

        let mesh = scene.add_mesh(generated.mesh);
        let mut config = EntityConfig::default()
            .with_tag(format!("chunk {},{}", coordinate.x, coordinate.z))
            .with_translation(
                generated.translation_x,
                self.y_offset - self.parameters.half_height as f32,
                generated.translation_z,
            )
            .with_mesh(mesh);
        if let Some(template) = &self.template {
            config = config.with_material(template.clone());
        }

        let id = scene.instantiate(config)?;
        self.chunks.insert(coordinate, ChunkRecord::Materialized(id));
        debug!("Materialized chunk {coordinate} as {id}");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::engine_state::task_management::Task;

    fn config() -> ChunkManagerConfig {
        ChunkManagerConfig {
            width: 4,
            depth: 4,
            height: 32,
            radius: 2,
            seed: Some(42),
            ..ChunkManagerConfig::default()
        }
    }

    fn generate(manager: &ChunkManager, coordinate: ChunkCoordinate) -> GeneratedChunk {
        manager.request(coordinate).process().result.unwrap()
    }

    #[test]
    fn without_target_there_is_no_center() {
        let manager = ChunkManager::new(0, &config(), None).unwrap();
        let mut scene = Scene::new();
        assert_eq!(manager.center(&scene), None);

        let player = scene
            .instantiate(EntityConfig::default().with_tag("player").with_translation(9.0, 5.0, -3.0))
            .unwrap();
        assert_eq!(manager.center(&scene), Some(ChunkCoordinate::new(2, -1)));

        let manager = manager.with_target(ChunkTarget::Entity(player));
        assert_eq!(manager.resolve_target(&scene), Some(player));
        scene.destroy(player);
        assert_eq!(manager.center(&scene), None);
    }

    #[test]
    fn window_is_requested_once() {
        let mut manager = ChunkManager::new(0, &config(), None).unwrap();
        let center = ChunkCoordinate::new(0, 0);

        let requests = manager.plan_requests(center, 1);
        assert_eq!(requests.len(), 9);
        assert_eq!(requests[0].chunk, center);
        assert!(requests.iter().all(|r| r.chunk_manager_index == 0));
        assert!(requests.iter().all(|r| r.context.is_some()));
        assert!(manager.plan_requests(center, 2).is_empty());
        assert_eq!(manager.requested_count(), 9);
    }

    #[test]
    fn integrate_places_the_chunk() {
        let mut manager = ChunkManager::new(0, &config(), None).unwrap();
        let mut scene = Scene::new();
        let coordinate = ChunkCoordinate::new(1, -1);
        manager.plan_requests(ChunkCoordinate::new(0, 0), 1);

        let id = manager
            .integrate(coordinate, generate(&manager, coordinate), &mut scene)
            .unwrap();
        let entity = scene.get(id).unwrap();
        assert_eq!(entity.tag(), Some("chunk 1,-1"));
        assert_eq!(entity.translation(), Vector3::new(2.0, -32.0, -6.0));
        assert!(entity.mesh().is_some());
        assert_eq!(manager.record(coordinate), Some(ChunkRecord::Materialized(id)));
    }

    #[test]
    fn duplicate_result_replaces_the_entity() {
        let mut manager = ChunkManager::new(0, &config(), None).unwrap();
        let mut scene = Scene::new();
        let coordinate = ChunkCoordinate::new(0, 0);

        let first = manager
            .integrate(coordinate, generate(&manager, coordinate), &mut scene)
            .unwrap();
        let second = manager
            .integrate(coordinate, generate(&manager, coordinate), &mut scene)
            .unwrap();
        assert!(!scene.contains(first));
        assert!(scene.contains(second));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn eviction_spares_requests() {
        let mut manager = ChunkManager::new(0, &config(), None).unwrap();
        let mut scene = Scene::new();
        manager.plan_requests(ChunkCoordinate::new(0, 0), 1);
        let far = ChunkCoordinate::new(1, 1);
        manager.integrate(far, generate(&manager, far), &mut scene).unwrap();

        let evicted = manager.evict_outside(ChunkCoordinate::new(-2, -2), &mut scene);
        assert_eq!(evicted, 1);
        assert_eq!(manager.record(far), None);
        assert!(scene.is_empty());
        assert_eq!(manager.requested_count(), 8);
    }

    #[test]
    fn stale_requests_need_a_retry_window() {
        let mut manager = ChunkManager::new(0, &config(), None).unwrap();
        manager.plan_requests(ChunkCoordinate::new(0, 0), 1);
        assert!(manager.stale_requests(100).is_empty());

        let mut retrying = ChunkManager::new(
            0,
            &ChunkManagerConfig {
                retry_after_ticks: Some(5),
                ..config()
            },
            None,
        )
        .unwrap();
        retrying.plan_requests(ChunkCoordinate::new(0, 0), 1);
        assert!(retrying.stale_requests(5).is_empty());
        assert_eq!(retrying.stale_requests(6).len(), 9);
        assert!(retrying.stale_requests(7).is_empty());
        assert_eq!(
            retrying.record(ChunkCoordinate::new(0, 0)),
            Some(ChunkRecord::Requested { requested_at: 6 })
        );
    }

    #[test]
    fn invalid_biome_table_is_rejected() {
        let mut broken = config();
        broken.biome_table.ranges.clear();
        assert!(ChunkManager::new(0, &broken, None).is_err());
    }
}
