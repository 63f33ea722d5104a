//! Triangle meshes with named per-vertex attributes.
//!
//! A `Mesh` is validated on construction: every attribute must describe the same
//! number of vertices, the vertex count of an unindexed mesh must form whole
//! triangles, and every face index must resolve to a stored vertex. Identical
//! vertices (equal across every attribute) are merged and referenced through the
//! face list, so uploads carry each distinct vertex once.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Position attribute, three components per vertex.
pub const VERTICES: &str = "vertices";
/// Normal attribute, three components per vertex.
pub const NORMALS: &str = "normals";
/// Texture coordinate attribute, two components per vertex.
pub const COORDINATES: &str = "coordinates";
/// Atlas index attribute, one component per vertex.
pub const INDICES: &str = "indices";

/// Vertices per face; only triangle lists are supported.
pub const FACE_SIZE: usize = 3;

/// Flat data for one vertex attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshAttribute {
    /// Number of components per vertex.
    pub item_size: usize,
    /// Component data, `item_size` values per vertex.
    pub data: Vec<f32>,
}

impl MeshAttribute {
    /// Creates an attribute.
    pub fn new(item_size: usize, data: Vec<f32>) -> Self {
        Self { item_size, data }
    }

    /// Number of vertices described by this attribute.
    pub fn count(&self) -> usize {
        self.data.len() / self.item_size
    }

    fn item(&self, vertex: usize) -> &[f32] {
        &self.data[vertex * self.item_size..(vertex + 1) * self.item_size]
    }
}

/// An immutable, validated triangle mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMesh", into = "RawMesh")]
pub struct Mesh {
    attributes: BTreeMap<String, MeshAttribute>,
    faces: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct RawMesh {
    attributes: BTreeMap<String, MeshAttribute>,
    faces: Vec<u32>,
}

impl TryFrom<RawMesh> for Mesh {
    type Error = EngineError;

    fn try_from(raw: RawMesh) -> EngineResult<Self> {
        Mesh::with_faces(raw.attributes, raw.faces)
    }
}

impl From<Mesh> for RawMesh {
    fn from(mesh: Mesh) -> Self {
        RawMesh {
            attributes: mesh.attributes,
            faces: mesh.faces,
        }
    }
}

impl Mesh {
    /// Builds a mesh from unindexed triangle attributes.
    ///
    /// Normals are computed per triangle when the `normals` attribute is missing,
    /// then identical vertices are merged into the face list.
    ///
    /// # Arguments
    /// * `attributes` - Named attributes; `vertices` is mandatory
    ///
    /// # Returns
    /// A validated mesh, or `MalformedMesh` describing the first violated invariant.
    pub fn new(mut attributes: BTreeMap<String, MeshAttribute>) -> EngineResult<Self> {
        let count = validate_attributes(&attributes)?;
        if count % FACE_SIZE != 0 {
            return Err(EngineError::MalformedMesh(format!(
                "{count} vertices do not form whole triangles"
            )));
        }

        if !attributes.contains_key(NORMALS) {
            let normals = compute_normals(&attributes[VERTICES]);
            attributes.insert(NORMALS.to_owned(), normals);
        }

        Ok(merge_vertices(attributes, count))
    }

    /// Builds a mesh from indexed attributes, keeping the given face list.
    pub fn with_faces(
        attributes: BTreeMap<String, MeshAttribute>,
        faces: Vec<u32>,
    ) -> EngineResult<Self> {
        let count = validate_attributes(&attributes)?;
        if faces.len() % FACE_SIZE != 0 {
            return Err(EngineError::MalformedMesh(format!(
                "{} face indices do not form whole triangles",
                faces.len()
            )));
        }
        if let Some(face) = faces.iter().find(|face| **face as usize >= count) {
            return Err(EngineError::MalformedMesh(format!(
                "face index {face} out of range for {count} vertices"
            )));
        }
        Ok(Self { attributes, faces })
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&MeshAttribute> {
        self.attributes.get(name)
    }

    /// All attributes, ordered by name.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &MeshAttribute)> {
        self.attributes.iter().map(|(name, a)| (name.as_str(), a))
    }

    /// Indices into the vertex attributes, three per triangle.
    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    /// Number of distinct stored vertices.
    pub fn vertex_count(&self) -> usize {
        self.attributes[VERTICES].count()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.faces.len() / FACE_SIZE
    }

    /// Iterates over the attribute values of every triangle corner, in face order.
    pub fn corners<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a [f32]> + 'a {
        let attribute = self.attributes.get(name);
        self.faces
            .iter()
            .filter_map(move |face| attribute.map(|a| a.item(*face as usize)))
    }
}

fn validate_attributes(attributes: &BTreeMap<String, MeshAttribute>) -> EngineResult<usize> {
    let vertices = attributes.get(VERTICES).ok_or_else(|| {
        EngineError::MalformedMesh("mesh must have its vertices defined".to_owned())
    })?;

    let mut count = None;
    for (name, attribute) in attributes {
        if attribute.item_size == 0 || attribute.data.len() % attribute.item_size != 0 {
            return Err(EngineError::MalformedMesh(format!(
                "attribute `{name}` holds {} values, not a multiple of item size {}",
                attribute.data.len(),
                attribute.item_size
            )));
        }
        match count {
            None => count = Some(attribute.count()),
            Some(expected) if expected != attribute.count() => {
                return Err(EngineError::MalformedMesh(format!(
                    "attribute `{name}` describes {} vertices, expected {expected}",
                    attribute.count()
                )));
            }
            Some(_) => {}
        }
    }

    if vertices.item_size < 2 {
        return Err(EngineError::MalformedMesh(format!(
            "vertex positions need at least 2 components, got {}",
            vertices.item_size
        )));
    }

    Ok(vertices.count())
}

fn compute_normals(vertices: &MeshAttribute) -> MeshAttribute {
    let point = |i: usize| {
        let item = vertices.item(i);
        [item[0], item[1], item.get(2).copied().unwrap_or(0.0)]
    };

    let mut data = Vec::with_capacity(vertices.count() * 3);
    for triangle in 0..vertices.count() / FACE_SIZE {
        let [a, b, c] = [
            point(triangle * 3),
            point(triangle * 3 + 1),
            point(triangle * 3 + 2),
        ];
        let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let mut n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        let length = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if length > 0.0 {
            // Adding zero folds -0.0 into 0.0 so equal normals merge
            n.iter_mut().for_each(|c| *c = *c / length + 0.0);
        }
        for _ in 0..FACE_SIZE {
            data.extend_from_slice(&n);
        }
    }
    MeshAttribute::new(3, data)
}

fn merge_vertices(attributes: BTreeMap<String, MeshAttribute>, count: usize) -> Mesh {
    let mut seen: HashMap<Vec<u32>, u32> = HashMap::with_capacity(count);
    let mut merged: BTreeMap<String, MeshAttribute> = attributes
        .iter()
        .map(|(name, a)| (name.clone(), MeshAttribute::new(a.item_size, Vec::new())))
        .collect();
    let mut faces = Vec::with_capacity(count);
    let mut key = Vec::new();

    for vertex in 0..count {
        key.clear();
        for attribute in attributes.values() {
            key.extend(attribute.item(vertex).iter().map(|v| (v + 0.0).to_bits()));
        }
        let next = seen.len() as u32;
        let face = *seen.entry(key.clone()).or_insert_with(|| {
            for (target, source) in merged.values_mut().zip(attributes.values()) {
                target.data.extend_from_slice(source.item(vertex));
            }
            next
        });
        faces.push(face);
    }

    Mesh {
        attributes: merged,
        faces,
    }
}
