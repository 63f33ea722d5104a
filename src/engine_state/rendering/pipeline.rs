//! Forward rendering over a `GpuContext`.
//!
//! The pipeline owns the backend and the resource registry. Per frame the
//! rendering system calls `cleanup`, `prepare`, `render` and `present` in that
//! order. Uploads are lazy: a mesh reaches the GPU on its first draw, and a draw
//! whose program or textures are not ready yet is skipped for the frame.

use std::collections::{BTreeSet, HashSet};

use cgmath::{Matrix4, Point3, SquareMatrix};
use log::{trace, warn};

use super::{
    assets::AssetState,
    context::{DrawCall, GpuContext},
    registry::{CleanupReport, ResourceRegistry},
    texture::TextureId,
    uniforms::{DirectionalLight, FrameUniforms},
};
use crate::{
    engine_state::scene::{Entity, EntityId, MaterialComponent, Scene},
    error::EngineResult,
};

/// Camera data the pipeline needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// Projection times view, in wgpu clip space.
    pub view_proj: Matrix4<f32>,
    /// Eye position in world space.
    pub position: Point3<f32>,
}

/// Draw counts of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draws issued.
    pub drawn: usize,
    /// Members with a mesh that were not drawn because something was not ready
    /// or no material applied.
    pub skipped: usize,
}

/// Forward renderer with reference counted resources.
#[derive(Debug)]
pub struct ForwardPipeline<C: GpuContext> {
    context: C,
    registry: ResourceRegistry,
    sky_color: [f32; 4],
    failed_textures: HashSet<TextureId>,
}

impl<C: GpuContext> ForwardPipeline<C> {
    /// Creates a pipeline drawing through `context`, clearing to `sky_color`.
    pub fn new(context: C, sky_color: [f32; 4]) -> Self {
        Self {
            context,
            registry: ResourceRegistry::new(),
            sky_color,
            failed_textures: HashSet::new(),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn sky_color(&self) -> [f32; 4] {
        self.sky_color
    }

    /// Textures whose image failed to load. Their draws are skipped every frame.
    pub fn failed_textures(&self) -> &HashSet<TextureId> {
        &self.failed_textures
    }

    /// Tracks the resources of a new renderable entity.
    pub fn register(&mut self, entity: &Entity) {
        self.registry.register(entity);
    }

    /// Releases the resources of a removed renderable entity.
    pub fn unregister(&mut self, entity: &Entity) {
        self.registry.unregister(entity);
    }

    /// Destroys resources nobody owns any more.
    pub fn cleanup(&mut self) -> CleanupReport {
        self.registry.cleanup(&mut self.context)
    }

    /// Starts the frame by clearing to the sky color.
    pub fn prepare(&mut self) {
        self.context.begin_frame(self.sky_color);
    }

    /// Draws every renderable family.
    ///
    /// A family is a renderable entity without a renderable ancestor, plus all of
    /// its descendants. Members inherit the material of their nearest ancestor
    /// that has one (their own first).
    ///
    /// # Arguments
    /// * `camera` - View and eye position
    /// * `lights` - Directional lights of the frame
    /// * `scene` - Entity store
    /// * `renderables` - Entities with a mesh or a material
    ///
    /// # Returns
    /// Draw counts, or the first shader compile or program link failure.
    pub fn render(
        &mut self,
        camera: &CameraView,
        lights: &[DirectionalLight],
        scene: &Scene,
        renderables: &BTreeSet<EntityId>,
    ) -> EngineResult<FrameStats> {
        let frame = FrameUniforms::new(camera.view_proj, camera.position, self.sky_color, lights);
        self.context.set_frame(&frame);

        let mut stats = FrameStats::default();
        for &root in renderables {
            if has_renderable_ancestor(scene, root, renderables) {
                continue;
            }
            let Some(entity) = scene.get(root) else {
                continue;
            };
            let parent_world = entity
                .parent()
                .and_then(|parent| scene.world_transform(parent))
                .unwrap_or_else(Matrix4::identity);
            self.render_family(scene, entity, parent_world, &mut stats)?;
        }
        Ok(stats)
    }

    /// Submits the frame.
    pub fn present(&mut self) -> EngineResult<()> {
        self.context.end_frame()
    }

    fn render_family(
        &mut self,
        scene: &Scene,
        root: &Entity,
        parent_world: Matrix4<f32>,
        stats: &mut FrameStats,
    ) -> EngineResult<()> {
        // (entity, parent world, material stack depth on entry)
        let mut stack = vec![(root, parent_world, 0usize)];
        let mut materials: Vec<&MaterialComponent> = Vec::new();

        while let Some((entity, parent_world, depth)) = stack.pop() {
            materials.truncate(depth);
            if let Some(material) = entity.material() {
                materials.push(material);
            }
            let world = parent_world * *entity.transform();

            if let Some(mesh) = entity.mesh() {
                match materials.last() {
                    Some(material) => {
                        let call = DrawCall {
                            entity: entity.id(),
                            mesh,
                            program: &material.program,
                            material: &material.material,
                            world,
                        };
                        if self.draw(&call)? {
                            stats.drawn += 1;
                        } else {
                            stats.skipped += 1;
                        }
                    }
                    None => stats.skipped += 1,
                }
            }

            let depth = materials.len();
            for child in entity.children().iter().rev() {
                if let Some(child) = scene.get(*child) {
                    stack.push((child, world, depth));
                }
            }
        }
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> EngineResult<bool> {
        if !self.context.prepare_program(call.program)? {
            trace!("Skipping {}: program {} not ready", call.entity, call.program.id());
            return Ok(false);
        }
        for texture in call.material.textures() {
            if texture.state() == AssetState::Failed
                && self.failed_textures.insert(texture.id().clone())
            {
                warn!(
                    "Texture {} failed to load: {}",
                    texture.id(),
                    texture.load_error().unwrap_or("unknown error")
                );
            }
            if !self.context.prepare_texture(texture) {
                trace!("Skipping {}: texture {} not ready", call.entity, texture.id());
                return Ok(false);
            }
        }
        self.context.prepare_mesh(call.mesh)?;
        self.context.draw(call)?;
        Ok(true)
    }
}

fn has_renderable_ancestor(scene: &Scene, id: EntityId, renderables: &BTreeSet<EntityId>) -> bool {
    let mut current = scene.get(id).and_then(Entity::parent);
    while let Some(parent) = current {
        if renderables.contains(&parent) {
            return true;
        }
        current = scene.get(parent).and_then(Entity::parent);
    }
    false
}
