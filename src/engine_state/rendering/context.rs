//! # GPU Context
//!
//! The seam between the forward pipeline and a graphics backend. The pipeline
//! decides *what* to upload, draw and destroy; a `GpuContext` decides *how*.
//!
//! ## Readiness
//! - `prepare_program` answers `Ok(false)` while a shader source is still loading
//!   and `Err` when compiling or linking fails.
//! - `prepare_texture` answers `false` until the image is decoded.
//! - `destroy_shader` answers `false` while the shader is still loading, so the
//!   registry keeps it pending and retries next frame.
//!
//! Destroying something that was never uploaded succeeds.
//!
//! `HeadlessContext` implements the same contract in memory. It backs the engine
//! when no adapter is available and is what the tests observe.

use std::collections::{BTreeMap, BTreeSet};

use cgmath::Matrix4;
use log::debug;

use super::{
    assets::AssetState,
    material::{Material, Program, ProgramId, Shader, ShaderId},
    texture::{Texture, TextureId},
    uniforms::FrameUniforms,
};
use crate::{
    engine_state::scene::{EntityId, MeshHandle, MeshId},
    error::{EngineError, EngineResult},
};

/// Everything needed to issue one draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    /// Entity being drawn.
    pub entity: EntityId,
    pub mesh: &'a MeshHandle,
    pub program: &'a Program,
    pub material: &'a Material,
    /// Parent chain composed with the entity transform.
    pub world: Matrix4<f32>,
}

/// Graphics backend used by the forward pipeline.
pub trait GpuContext {
    /// Starts a frame cleared to `clear_color`.
    fn begin_frame(&mut self, clear_color: [f32; 4]);

    /// Sets camera and lights for the draws that follow.
    fn set_frame(&mut self, frame: &FrameUniforms);

    /// Compiles both shaders and links the program if not done yet.
    ///
    /// # Returns
    /// `Ok(true)` when the program can be used, `Ok(false)` while a shader source
    /// is loading, `Err` on compile or link failure.
    fn prepare_program(&mut self, program: &Program) -> EngineResult<bool>;

    /// Uploads the texture if its image is decoded. Returns whether it is usable.
    fn prepare_texture(&mut self, texture: &Texture) -> bool;

    /// Uploads vertex and index buffers if not done yet.
    fn prepare_mesh(&mut self, mesh: &MeshHandle) -> EngineResult<()>;

    /// Records a draw. Program, textures and mesh must have been prepared.
    fn draw(&mut self, call: &DrawCall<'_>) -> EngineResult<()>;

    /// Finishes and submits the frame.
    fn end_frame(&mut self) -> EngineResult<()>;

    /// Adapts the render target to a new surface size. Zero sizes are ignored.
    fn resize(&mut self, width: u32, height: u32);

    fn destroy_mesh(&mut self, mesh: &MeshHandle) -> bool;

    fn destroy_texture(&mut self, texture: &Texture) -> bool;

    fn destroy_program(&mut self, program: &Program) -> bool;

    fn destroy_shader(&mut self, shader: &Shader) -> bool;
}

/// A draw as recorded by `HeadlessContext`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub entity: EntityId,
    pub mesh: MeshId,
    pub program: ProgramId,
    /// Texture units in material order.
    pub textures: Vec<(u32, TextureId)>,
    pub world: Matrix4<f32>,
    pub triangles: usize,
}

/// Upload and destroy counters of `HeadlessContext`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub mesh_uploads: usize,
    pub texture_uploads: usize,
    pub programs_linked: usize,
    pub shaders_compiled: usize,
    pub meshes_destroyed: usize,
    pub textures_destroyed: usize,
    pub programs_destroyed: usize,
    pub shaders_destroyed: usize,
    pub frames: usize,
}

/// In-memory backend with the same readiness rules as the wgpu one.
#[derive(Debug, Default)]
pub struct HeadlessContext {
    meshes: BTreeMap<MeshId, usize>,
    textures: BTreeSet<TextureId>,
    programs: BTreeSet<ProgramId>,
    shaders: BTreeSet<ShaderId>,
    failing_shaders: BTreeSet<ShaderId>,
    failing_programs: BTreeSet<ProgramId>,
    clear_color: [f32; 4],
    size: (u32, u32),
    frame: Option<FrameUniforms>,
    recording: Vec<DrawRecord>,
    last_frame: Vec<DrawRecord>,
    stats: HeadlessStats,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes compilation of `id` fail.
    pub fn fail_shader(&mut self, id: ShaderId) {
        self.failing_shaders.insert(id);
    }

    /// Makes linking of `id` fail.
    pub fn fail_program(&mut self, id: ProgramId) {
        self.failing_programs.insert(id);
    }

    /// Draws of the last completed frame.
    pub fn last_frame(&self) -> &[DrawRecord] {
        &self.last_frame
    }

    /// Last size given to `resize`.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Clear color of the current or last frame.
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Frame uniforms last set.
    pub fn frame_uniforms(&self) -> Option<&FrameUniforms> {
        self.frame.as_ref()
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    pub fn has_mesh(&self, id: MeshId) -> bool {
        self.meshes.contains_key(&id)
    }

    pub fn has_texture(&self, id: &TextureId) -> bool {
        self.textures.contains(id)
    }

    pub fn has_program(&self, id: &ProgramId) -> bool {
        self.programs.contains(id)
    }

    pub fn has_shader(&self, id: &ShaderId) -> bool {
        self.shaders.contains(id)
    }

    /// Number of meshes currently uploaded.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    fn compile(&mut self, shader: &Shader) -> EngineResult<()> {
        if self.shaders.contains(shader.id()) {
            return Ok(());
        }
        if let Some(message) = shader.load_error() {
            return Err(EngineError::ShaderCompilation {
                id: shader.id().to_string(),
                message: message.to_owned(),
            });
        }
        if self.failing_shaders.contains(shader.id()) {
            return Err(EngineError::ShaderCompilation {
                id: shader.id().to_string(),
                message: "rejected by headless backend".to_owned(),
            });
        }
        self.shaders.insert(shader.id().clone());
        self.stats.shaders_compiled += 1;
        Ok(())
    }
}

impl GpuContext for HeadlessContext {
    fn begin_frame(&mut self, clear_color: [f32; 4]) {
        self.clear_color = clear_color;
        self.recording.clear();
    }

    fn set_frame(&mut self, frame: &FrameUniforms) {
        self.frame = Some(*frame);
    }

    fn prepare_program(&mut self, program: &Program) -> EngineResult<bool> {
        let id = program.id();
        if self.programs.contains(&id) {
            return Ok(true);
        }
        if program.shaders().iter().any(|s| s.state() == AssetState::Pending) {
            return Ok(false);
        }
        for shader in program.shaders() {
            self.compile(shader)?;
        }
        if self.failing_programs.contains(&id) {
            return Err(EngineError::ProgramLink {
                id: id.to_string(),
                message: "rejected by headless backend".to_owned(),
            });
        }
        self.programs.insert(id);
        self.stats.programs_linked += 1;
        Ok(true)
    }

    fn prepare_texture(&mut self, texture: &Texture) -> bool {
        if self.textures.contains(texture.id()) {
            return true;
        }
        if !texture.is_ready() {
            return false;
        }
        self.textures.insert(texture.id().clone());
        self.stats.texture_uploads += 1;
        true
    }

    fn prepare_mesh(&mut self, mesh: &MeshHandle) -> EngineResult<()> {
        if !self.meshes.contains_key(&mesh.id()) {
            self.meshes.insert(mesh.id(), mesh.mesh().triangle_count());
            self.stats.mesh_uploads += 1;
        }
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> EngineResult<()> {
        let triangles = *self
            .meshes
            .get(&call.mesh.id())
            .ok_or_else(|| EngineError::MalformedMesh(format!("mesh {:?} was not uploaded", call.mesh.id())))?;
        let textures = call
            .material
            .textures()
            .enumerate()
            .map(|(unit, texture)| (unit as u32, texture.id().clone()))
            .collect();
        self.recording.push(DrawRecord {
            entity: call.entity,
            mesh: call.mesh.id(),
            program: call.program.id(),
            textures,
            world: call.world,
            triangles,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> EngineResult<()> {
        self.last_frame = std::mem::take(&mut self.recording);
        self.stats.frames += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = (width, height);
        }
    }

    fn destroy_mesh(&mut self, mesh: &MeshHandle) -> bool {
        if self.meshes.remove(&mesh.id()).is_some() {
            self.stats.meshes_destroyed += 1;
        }
        true
    }

    fn destroy_texture(&mut self, texture: &Texture) -> bool {
        if self.textures.remove(texture.id()) {
            self.stats.textures_destroyed += 1;
        }
        true
    }

    fn destroy_program(&mut self, program: &Program) -> bool {
        if self.programs.remove(&program.id()) {
            self.stats.programs_destroyed += 1;
        }
        true
    }

    fn destroy_shader(&mut self, shader: &Shader) -> bool {
        if shader.is_loading() {
            debug!("Shader {} is still loading, deferring destruction", shader.id());
            return false;
        }
        if self.shaders.remove(shader.id()) {
            self.stats.shaders_destroyed += 1;
        }
        true
    }
}
