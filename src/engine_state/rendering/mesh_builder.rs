//! Per-face geometry emission for voxel meshes.
//!
//! Each primitive appends one axis-aligned quad (two triangles, six vertices) on
//! the matching side of a voxel. Calls are independent and order-preserving; the
//! builder never culls, so callers decide which faces are visible.

use std::collections::BTreeMap;

use super::mesh::{Mesh, MeshAttribute, COORDINATES, INDICES, NORMALS, VERTICES};
use crate::error::EngineResult;

/// Texture coordinates shared by every face except the back face.
const QUAD_UVS: [[f32; 2]; 6] = [[0.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
/// The back face walks its corners from the bottom, so its layout is rotated.
const BACK_UVS: [[f32; 2]; 6] = [[1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

/// Side of a voxel a face is emitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceDirection {
    /// +z
    Front,
    /// -z
    Back,
    /// +y
    Top,
    /// -y
    Bottom,
    /// +x
    Right,
    /// -x
    Left,
}

impl FaceDirection {
    /// Outward unit normal.
    pub fn normal(self) -> [f32; 3] {
        match self {
            FaceDirection::Front => [0.0, 0.0, 1.0],
            FaceDirection::Back => [0.0, 0.0, -1.0],
            FaceDirection::Top => [0.0, 1.0, 0.0],
            FaceDirection::Bottom => [0.0, -1.0, 0.0],
            FaceDirection::Right => [1.0, 0.0, 0.0],
            FaceDirection::Left => [-1.0, 0.0, 0.0],
        }
    }
}

/// Accumulates voxel faces into flat attribute buffers.
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    scale: f32,
    vertices: Vec<f32>,
    normals: Vec<f32>,
    coordinates: Vec<f32>,
    indices: Vec<f32>,
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl MeshBuilder {
    /// Creates an empty builder.
    ///
    /// # Arguments
    /// * `scale` - Half the voxel edge length
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            vertices: Vec::new(),
            normals: Vec::new(),
            coordinates: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Emits a face on the given side of the voxel centered at `(x, y, z)`.
    pub fn add_face(&mut self, direction: FaceDirection, x: f32, y: f32, z: f32, index: u32) {
        let s = self.scale;
        let corners = match direction {
            FaceDirection::Front => {
                let p = z + s;
                [
                    [x - s, y + s, p], [x - s, y - s, p], [x + s, y - s, p],
                    [x + s, y - s, p], [x + s, y + s, p], [x - s, y + s, p],
                ]
            }
            FaceDirection::Back => {
                let p = z - s;
                [
                    [x - s, y - s, p], [x - s, y + s, p], [x + s, y + s, p],
                    [x + s, y + s, p], [x + s, y - s, p], [x - s, y - s, p],
                ]
            }
            FaceDirection::Top => {
                let p = y + s;
                [
                    [x - s, p, z - s], [x - s, p, z + s], [x + s, p, z + s],
                    [x + s, p, z + s], [x + s, p, z - s], [x - s, p, z - s],
                ]
            }
            FaceDirection::Bottom => {
                let p = y - s;
                [
                    [x - s, p, z + s], [x - s, p, z - s], [x + s, p, z - s],
                    [x + s, p, z - s], [x + s, p, z + s], [x - s, p, z + s],
                ]
            }
            FaceDirection::Right => {
                let p = x + s;
                [
                    [p, y + s, z + s], [p, y - s, z + s], [p, y - s, z - s],
                    [p, y - s, z - s], [p, y + s, z - s], [p, y + s, z + s],
                ]
            }
            FaceDirection::Left => {
                let p = x - s;
                [
                    [p, y + s, z - s], [p, y - s, z - s], [p, y - s, z + s],
                    [p, y - s, z + s], [p, y + s, z + s], [p, y + s, z - s],
                ]
            }
        };
        let uvs = if direction == FaceDirection::Back {
            &BACK_UVS
        } else {
            &QUAD_UVS
        };
        let normal = direction.normal();

        for (corner, uv) in corners.iter().zip(uvs) {
            self.vertices.extend_from_slice(corner);
            self.coordinates.extend_from_slice(uv);
            self.normals.extend_from_slice(&normal);
            self.indices.push(index as f32);
        }
    }

    /// Emits the +z face.
    pub fn add_front(&mut self, x: f32, y: f32, z: f32, index: u32) {
        self.add_face(FaceDirection::Front, x, y, z, index);
    }

    /// Emits the -z face.
    pub fn add_back(&mut self, x: f32, y: f32, z: f32, index: u32) {
        self.add_face(FaceDirection::Back, x, y, z, index);
    }

    /// Emits the +y face.
    pub fn add_top(&mut self, x: f32, y: f32, z: f32, index: u32) {
        self.add_face(FaceDirection::Top, x, y, z, index);
    }

    /// Emits the -y face.
    pub fn add_bottom(&mut self, x: f32, y: f32, z: f32, index: u32) {
        self.add_face(FaceDirection::Bottom, x, y, z, index);
    }

    /// Emits the +x face.
    pub fn add_right(&mut self, x: f32, y: f32, z: f32, index: u32) {
        self.add_face(FaceDirection::Right, x, y, z, index);
    }

    /// Emits the -x face.
    pub fn add_left(&mut self, x: f32, y: f32, z: f32, index: u32) {
        self.add_face(FaceDirection::Left, x, y, z, index);
    }

    /// Emits all six faces of a voxel in top, bottom, front, back, right, left order.
    pub fn add_cube(&mut self, x: f32, y: f32, z: f32, index: u32) {
        self.add_top(x, y, z, index);
        self.add_bottom(x, y, z, index);
        self.add_front(x, y, z, index);
        self.add_back(x, y, z, index);
        self.add_right(x, y, z, index);
        self.add_left(x, y, z, index);
    }

    /// Number of faces emitted so far.
    pub fn face_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Atlas indices emitted so far, one per vertex.
    pub fn atlas_indices(&self) -> &[f32] {
        &self.indices
    }

    /// Turns the buffers into a validated mesh.
    pub fn build(self) -> EngineResult<Mesh> {
        let attributes = BTreeMap::from([
            (VERTICES.to_owned(), MeshAttribute::new(3, self.vertices)),
            (COORDINATES.to_owned(), MeshAttribute::new(2, self.coordinates)),
            (INDICES.to_owned(), MeshAttribute::new(1, self.indices)),
            (NORMALS.to_owned(), MeshAttribute::new(3, self.normals)),
        ]);
        Mesh::new(attributes)
    }
}
