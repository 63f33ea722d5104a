//! Rendering system for the voxel engine.
//!
//! This module contains the mesh model, the forward pipeline with its GPU resource
//! registry, and the `RenderingSystem` that ties the pipeline to the scene. It
//! renders through any `GpuContext`: `WgpuContext` presenting to a window, or
//! `HeadlessContext` when no window or adapter is available.

use std::collections::BTreeSet;

use log::debug;

use crate::{
    engine_state::scene::{EntityId, Scene, SceneEvent},
    error::EngineResult,
};

pub mod assets;
pub mod context;
pub mod material;
pub mod mesh;
pub mod mesh_builder;
pub mod pipeline;
pub mod registry;
pub mod texture;
pub mod uniforms;
pub mod validation;
pub mod vertex;
pub mod wgpu_context;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use context::{GpuContext, HeadlessContext};
pub use pipeline::{CameraView, ForwardPipeline, FrameStats};
pub use registry::CleanupReport;
pub use uniforms::DirectionalLight;
pub use wgpu_context::WgpuContext;

/// What one `late_update` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Entities registered from `Created` events.
    pub registered: usize,
    /// Entities unregistered from `Destroyed` events.
    pub unregistered: usize,
    pub cleanup: CleanupReport,
    pub frame: FrameStats,
}

/// Keeps the forward pipeline in sync with the scene and renders it.
///
/// Renderables are entities carrying a mesh or a material. Each one is registered
/// exactly once when its `Created` event is seen and unregistered exactly once
/// when its `Destroyed` event is seen.
pub struct RenderingSystem<C: GpuContext> {
    pipeline: ForwardPipeline<C>,
    renderables: BTreeSet<EntityId>,
    lights: Vec<DirectionalLight>,
}

impl<C: GpuContext> RenderingSystem<C> {
    /// Creates the system around a backend.
    ///
    /// # Arguments
    /// * `context` - GPU backend
    /// * `sky_color` - Clear color of every frame
    pub fn new(context: C, sky_color: [f32; 4]) -> Self {
        Self {
            pipeline: ForwardPipeline::new(context, sky_color),
            renderables: BTreeSet::new(),
            lights: Vec::new(),
        }
    }

    pub fn add_light(&mut self, light: DirectionalLight) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[DirectionalLight] {
        &self.lights
    }

    pub fn renderables(&self) -> &BTreeSet<EntityId> {
        &self.renderables
    }

    pub fn pipeline(&self) -> &ForwardPipeline<C> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut ForwardPipeline<C> {
        &mut self.pipeline
    }

    /// Runs after every other system of the tick: consumes the scene events, sweeps
    /// orphaned resources and renders one frame.
    ///
    /// # Returns
    /// Registration, cleanup and draw counts, or a fatal shader or program error.
    pub fn late_update(&mut self, scene: &mut Scene, camera: &CameraView) -> EngineResult<RenderReport> {
        let mut report = RenderReport::default();

        for event in scene.drain_events() {
            match event {
                SceneEvent::Created(id) => {
                    // Already gone if it was destroyed in the same tick
                    let Some(entity) = scene.get(id) else {
                        continue;
                    };
                    if entity.mask().is_renderable() && self.renderables.insert(id) {
                        self.pipeline.register(entity);
                        report.registered += 1;
                    }
                }
                SceneEvent::Destroyed(entity) => {
                    if self.renderables.remove(&entity.id()) {
                        self.pipeline.unregister(&entity);
                        report.unregistered += 1;
                    }
                }
            }
        }
        if report.registered + report.unregistered > 0 {
            debug!(
                "Registered {} and unregistered {} renderables",
                report.registered, report.unregistered
            );
        }

        report.cleanup = self.pipeline.cleanup();
        self.pipeline.prepare();
        report.frame = self
            .pipeline
            .render(camera, &self.lights, scene, &self.renderables)?;
        self.pipeline.present()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Matrix4, Point3, SquareMatrix};

    use super::*;
    use crate::engine_state::{
        rendering::{
            test_support::{quad_mesh, textured},
            texture::Texture,
        },
        scene::EntityConfig,
    };

    fn camera() -> CameraView {
        CameraView {
            view_proj: Matrix4::identity(),
            position: Point3::new(0.0, 0.0, 0.0),
        }
    }

    #[test]
    fn events_register_and_unregister_once() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad_mesh());
        let chunk = scene
            .instantiate(
                EntityConfig::default()
                    .with_mesh(mesh.clone())
                    .with_material(textured(Texture::solid("atlas", [255; 4]))),
            )
            .unwrap();
        scene.instantiate(EntityConfig::default().with_tag("player")).unwrap();

        let mut system = RenderingSystem::new(HeadlessContext::new(), [0.0; 4]);
        let report = system.late_update(&mut scene, &camera()).unwrap();
        assert_eq!(report.registered, 1);
        assert_eq!(report.frame.drawn, 1);
        assert_eq!(system.renderables().len(), 1);

        scene.destroy(chunk);
        let report = system.late_update(&mut scene, &camera()).unwrap();
        assert_eq!(report.unregistered, 1);
        assert_eq!(report.cleanup.meshes, 1);
        assert_eq!(report.frame.drawn, 0);
        assert!(!system.pipeline().context().has_mesh(mesh.id()));
    }

    #[test]
    fn entity_created_and_destroyed_in_one_tick_is_ignored() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad_mesh());
        let id = scene.instantiate(EntityConfig::default().with_mesh(mesh)).unwrap();
        scene.destroy(id);

        let mut system = RenderingSystem::new(HeadlessContext::new(), [0.0; 4]);
        let report = system.late_update(&mut scene, &camera()).unwrap();
        assert_eq!((report.registered, report.unregistered), (0, 0));
        assert!(system.pipeline().registry().meshes.is_empty());
    }
}
