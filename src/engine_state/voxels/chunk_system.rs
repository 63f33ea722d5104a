//! # Chunk System
//!
//! Drives every `ChunkManager` once per tick and owns the worker pool that
//! generates their chunks.
//!
//! ## Tick
//! 1. Integrate every result that has arrived since the last tick
//! 2. For each manager, in index order: resolve the target, evict chunks that left
//!    the window, request the chunks that entered it and re-send stale requests
//! 3. Hand queued requests to workers with spare capacity
//!
//! Results are only ever applied here, on the main loop, so the coordinate records
//! need no synchronization.

use log::{debug, error, warn};

use crate::{
    config::ChunkManagerConfig,
    engine_state::{
        scene::{EntityId, MaterialComponent, Scene},
        task_management::TaskManager,
        voxels::{
            chunk_manager::ChunkManager,
            tasks::chunk_generation_task::{ChunkOutcome, ChunkRequest},
        },
    },
    error::{EngineError, EngineResult},
};

/// What one `update` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingReport {
    /// Results placed in the scene.
    pub integrated: usize,
    /// New requests sent or queued.
    pub requested: usize,
    /// Chunks destroyed for leaving the window.
    pub evicted: usize,
    /// Stale requests sent again.
    pub retried: usize,
    /// Results addressed to no known manager.
    pub dropped: usize,
    /// Results whose generation or placement failed.
    pub failed: usize,
}

impl StreamingReport {
    /// Whether the tick changed anything.
    pub fn is_quiet(&self) -> bool {
        *self == Self::default()
    }
}

/// Chunk managers and their worker pool.
pub struct ChunkSystem {
    managers: Vec<ChunkManager>,
    tasks: TaskManager<ChunkRequest>,
    tick: u64,
}

impl ChunkSystem {
    /// Creates a system without managers.
    ///
    /// # Arguments
    /// * `workers` - Number of generation workers
    pub fn new(workers: usize) -> Self {
        Self {
            managers: Vec::new(),
            tasks: TaskManager::new(workers),
            tick: 0,
        }
    }

    /// Adds a manager built from `config`.
    ///
    /// # Returns
    /// The manager's index, echoed by its results.
    pub fn add_manager(
        &mut self,
        config: &ChunkManagerConfig,
        template: Option<MaterialComponent>,
    ) -> EngineResult<usize> {
        let index = self.managers.len();
        self.managers.push(ChunkManager::new(index, config, template)?);
        Ok(index)
    }

    pub fn managers(&self) -> &[ChunkManager] {
        &self.managers
    }

    pub fn manager(&self, index: usize) -> Option<&ChunkManager> {
        self.managers.get(index)
    }

    pub fn manager_mut(&mut self, index: usize) -> Option<&mut ChunkManager> {
        self.managers.get_mut(index)
    }

    /// Ticks run so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Requests queued or being generated.
    pub fn pending(&self) -> usize {
        self.tasks.queued() + self.tasks.in_flight()
    }

    /// Whether every sent request has come back.
    pub fn is_idle(&self) -> bool {
        self.tasks.is_idle()
    }

    /// Runs one streaming tick.
    pub fn update(&mut self, scene: &mut Scene) -> StreamingReport {
        self.tick += 1;
        let mut report = StreamingReport::default();

        for outcome in self.tasks.process_completed_tasks() {
            match self.on_chunk_generated(outcome, scene) {
                Ok(_) => report.integrated += 1,
                Err(EngineError::UnknownChunkManager(_)) => report.dropped += 1,
                Err(_) => report.failed += 1,
            }
        }

        for manager in &mut self.managers {
            let Some(center) = manager.center(scene) else {
                continue;
            };
            report.evicted += manager.evict_outside(center, scene);

            for request in manager.plan_requests(center, self.tick) {
                self.tasks.publish_task(request);
                report.requested += 1;
            }
            for request in manager.stale_requests(self.tick) {
                debug!("Re-sending chunk {} of manager {}", request.chunk, manager.index());
                self.tasks.publish_task(request);
                report.retried += 1;
            }
        }

        self.tasks.process_queued_tasks();
        report
    }

    /// Applies one worker result.
    ///
    /// # Returns
    /// The new chunk entity, `UnknownChunkManager` if no manager has the result's
    /// index, or the generation error. A failed coordinate stays requested.
    pub fn on_chunk_generated(
        &mut self,
        outcome: ChunkOutcome,
        scene: &mut Scene,
    ) -> EngineResult<EntityId> {
        let ChunkOutcome { request, result } = outcome;
        let index = request.chunk_manager_index;
        let Some(manager) = self.managers.get_mut(index) else {
            warn!("Dropping chunk {} for unknown manager {index}", request.chunk);
            return Err(EngineError::UnknownChunkManager(index));
        };

        match result {
            Ok(generated) => manager.integrate(request.chunk, generated, scene),
            Err(err) => {
                error!("Chunk {} of manager {index} failed: {err}", request.chunk);
                Err(err)
            }
        }
    }
}
