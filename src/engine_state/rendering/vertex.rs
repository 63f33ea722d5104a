//! Vertex buffer layouts for mesh rendering.
//!
//! Meshes are uploaded as one tightly packed buffer per attribute rather than one
//! interleaved buffer, mirroring the attribute map of `Mesh`.
//!
//! # Shader Attributes
//! - `location = 0`: position (`vec3<f32>`, attribute `vertices`)
//! - `location = 1`: normal (`vec3<f32>`, attribute `normals`)
//! - `location = 2`: tile uv (`vec2<f32>`, attribute `coordinates`)
//! - `location = 3`: atlas index (`f32`, attribute `indices`)

use super::mesh::{COORDINATES, INDICES, NORMALS, VERTICES};

/// One vertex stream: which mesh attribute feeds it and how it is laid out.
#[derive(Debug, Clone, Copy)]
pub struct VertexStream {
    /// Mesh attribute name.
    pub attribute: &'static str,
    /// Shader input location.
    pub location: u32,
    /// Components per vertex.
    pub components: usize,
    pub format: wgpu::VertexFormat,
}

impl VertexStream {
    /// Bytes per vertex.
    pub const fn stride(&self) -> wgpu::BufferAddress {
        (self.components * std::mem::size_of::<f32>()) as wgpu::BufferAddress
    }
}

/// Streams in buffer slot order.
pub const STREAMS: [VertexStream; 4] = [
    VertexStream {
        attribute: VERTICES,
        location: 0,
        components: 3,
        format: wgpu::VertexFormat::Float32x3,
    },
    VertexStream {
        attribute: NORMALS,
        location: 1,
        components: 3,
        format: wgpu::VertexFormat::Float32x3,
    },
    VertexStream {
        attribute: COORDINATES,
        location: 2,
        components: 2,
        format: wgpu::VertexFormat::Float32x2,
    },
    VertexStream {
        attribute: INDICES,
        location: 3,
        components: 1,
        format: wgpu::VertexFormat::Float32,
    },
];

static POSITION: [wgpu::VertexAttribute; 1] = [attribute(&STREAMS[0])];
static NORMAL: [wgpu::VertexAttribute; 1] = [attribute(&STREAMS[1])];
static COORDINATE: [wgpu::VertexAttribute; 1] = [attribute(&STREAMS[2])];
static ATLAS_INDEX: [wgpu::VertexAttribute; 1] = [attribute(&STREAMS[3])];

const fn attribute(stream: &VertexStream) -> wgpu::VertexAttribute {
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: stream.location,
        format: stream.format,
    }
}

/// Returns the vertex buffer layouts, one per stream, in slot order.
pub fn layouts() -> [wgpu::VertexBufferLayout<'static>; 4] {
    let layout = |stream: &VertexStream, attributes: &'static [wgpu::VertexAttribute]| {
        wgpu::VertexBufferLayout {
            array_stride: stream.stride(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    };
    [
        layout(&STREAMS[0], &POSITION),
        layout(&STREAMS[1], &NORMAL),
        layout(&STREAMS[2], &COORDINATE),
        layout(&STREAMS[3], &ATLAS_INDEX),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::mesh_builder::MeshBuilder;

    #[test]
    fn streams_match_built_mesh_attributes() {
        let mut builder = MeshBuilder::default();
        builder.add_cube(0.0, 0.0, 0.0, 1);
        let mesh = builder.build().unwrap();
        for stream in STREAMS {
            let attribute = mesh.attribute(stream.attribute).unwrap();
            assert_eq!(attribute.item_size, stream.components, "{}", stream.attribute);
        }
    }

    #[test]
    fn layouts_use_distinct_locations() {
        let layouts = layouts();
        let mut locations: Vec<u32> = layouts
            .iter()
            .flat_map(|l| l.attributes.iter().map(|a| a.shader_location))
            .collect();
        locations.dedup();
        assert_eq!(locations, vec![0, 1, 2, 3]);
        assert_eq!(layouts[2].array_stride, 8);
    }
}
