use std::sync::Arc;

use crate::engine_state::rendering::{
    material::{Material, Program},
    mesh::Mesh,
};

/// Scene-unique identifier of an uploaded-or-uploadable mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

/// A mesh registered with the scene, shared between entities and the pipeline.
#[derive(Debug, Clone)]
pub struct MeshHandle {
    id: MeshId,
    mesh: Arc<Mesh>,
}

impl MeshHandle {
    pub(crate) fn new(id: MeshId, mesh: Arc<Mesh>) -> Self {
        Self { id, mesh }
    }

    /// Identifier used as the GPU resource key.
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// The geometry.
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }
}

/// Shader program and surface properties of an entity.
#[derive(Debug, Clone)]
pub struct MaterialComponent {
    /// Vertex and fragment stages.
    pub program: Program,
    /// Textures and values bound when drawing.
    pub material: Material,
}

/// Which optional components an entity carries.
///
/// Computed once when the entity is created so systems can filter entities without
/// inspecting their components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u8);

impl ComponentMask {
    /// No optional components.
    pub const EMPTY: Self = Self(0);
    /// The entity carries a mesh.
    pub const MESH: Self = Self(1 << 0);
    /// The entity carries a material.
    pub const MATERIAL: Self = Self(1 << 1);
    /// The entity has a tag.
    pub const TAG: Self = Self(1 << 2);

    /// Union of two masks.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Entities with a mesh or a material take part in rendering.
    pub const fn is_renderable(self) -> bool {
        self.intersects(Self::MESH.union(Self::MATERIAL))
    }
}

impl std::ops::BitOr for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
