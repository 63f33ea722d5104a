//! Fixtures shared by the rendering unit tests.

use std::sync::Arc;

use super::{
    material::{Material, MaterialValue, Program, Shader, ShaderStage},
    mesh::Mesh,
    mesh_builder::MeshBuilder,
    texture::Texture,
};
use crate::engine_state::scene::{MaterialComponent, MeshHandle, MeshId};

pub fn flat_program() -> Program {
    Program::new(
        Shader::inline("flat.vert", ShaderStage::Vertex, ""),
        Shader::inline("flat.frag", ShaderStage::Fragment, ""),
    )
}

pub fn quad_mesh() -> Mesh {
    let mut builder = MeshBuilder::default();
    builder.add_top(0.0, 0.0, 0.0, 1);
    builder.build().unwrap()
}

pub fn quad_handle(id: u64) -> MeshHandle {
    MeshHandle::new(MeshId(id), Arc::new(quad_mesh()))
}

pub fn textured(texture: Texture) -> MaterialComponent {
    MaterialComponent {
        program: flat_program(),
        material: Material::new().with("albedo", MaterialValue::Texture(texture)),
    }
}
