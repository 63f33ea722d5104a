//! Uniform blocks shared with the WGSL shaders.
//!
//! Group 0 holds one `FrameUniforms` per frame (camera, sky color and directional
//! lights); group 1 holds one `ObjectUniforms` per draw (world matrix, lighting
//! coefficients and atlas layout) next to the albedo texture.

use cgmath::{InnerSpace, Matrix4, Point3, Vector3};
use log::warn;

use super::material::Material;

/// Number of directional lights a frame can carry.
pub const MAX_LIGHTS: usize = 4;

/// A light shining along `direction` from infinitely far away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in.
    pub direction: Vector3<f32>,
    /// Linear RGB color.
    pub color: [f32; 3],
}

impl DirectionalLight {
    pub fn new(direction: Vector3<f32>, color: [f32; 3]) -> Self {
        Self { direction, color }
    }
}

/// Per-frame block, bind group 0 binding 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view_position: [f32; 4],
    pub sky_color: [f32; 4],
    pub light_directions: [[f32; 4]; MAX_LIGHTS],
    pub light_colors: [[f32; 4]; MAX_LIGHTS],
    /// Only `x` is used; the rest pads the block to 16 bytes.
    pub light_count: [u32; 4],
}

impl FrameUniforms {
    /// Builds the frame block.
    ///
    /// # Arguments
    /// * `view_proj` - Combined projection and view matrix in wgpu clip space
    /// * `view_position` - Camera position in world space
    /// * `sky_color` - Clear color, also used for distance fog
    /// * `lights` - Directional lights; lights past `MAX_LIGHTS` are dropped
    pub fn new(
        view_proj: Matrix4<f32>,
        view_position: Point3<f32>,
        sky_color: [f32; 4],
        lights: &[DirectionalLight],
    ) -> Self {
        if lights.len() > MAX_LIGHTS {
            warn!(
                "{} directional lights requested, only the first {MAX_LIGHTS} are used",
                lights.len()
            );
        }

        let mut light_directions = [[0.0; 4]; MAX_LIGHTS];
        let mut light_colors = [[0.0; 4]; MAX_LIGHTS];
        let count = lights.len().min(MAX_LIGHTS);
        for (i, light) in lights.iter().take(count).enumerate() {
            let direction = if light.direction.magnitude2() > 0.0 {
                light.direction.normalize()
            } else {
                light.direction
            };
            light_directions[i] = direction.extend(0.0).into();
            light_colors[i] = [light.color[0], light.color[1], light.color[2], 1.0];
        }

        Self {
            view_proj: view_proj.into(),
            view_position: [view_position.x, view_position.y, view_position.z, 1.0],
            sky_color,
            light_directions,
            light_colors,
            light_count: [count as u32, 0, 0, 0],
        }
    }
}

/// Per-draw block, bind group 1 binding 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    pub world: [[f32; 4]; 4],
    /// Ambient, diffuse, specular, shininess.
    pub lighting: [f32; 4],
    /// Atlas columns, atlas rows, 1 if a texture is bound, unused.
    pub atlas: [f32; 4],
}

impl ObjectUniforms {
    /// Reads the lighting and atlas properties of `material`, falling back to an
    /// untextured, mostly diffuse surface.
    pub fn new(world: Matrix4<f32>, material: &Material) -> Self {
        let value = |name: &str, default: f32| material.float(name).unwrap_or(default);
        let has_texture = material.textures().next().is_some();

        Self {
            world: world.into(),
            lighting: [
                value("ambient", 0.35),
                value("diffuse", 0.65),
                value("specular", 0.0),
                value("shininess", 1.0),
            ],
            atlas: [
                value("atlasColumns", 1.0).max(1.0),
                value("atlasRows", 1.0).max(1.0),
                if has_texture { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::SquareMatrix;

    use super::*;
    use crate::engine_state::rendering::material::MaterialValue;

    #[test]
    fn block_sizes_match_the_shader_layout() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 240);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 96);
    }

    #[test]
    fn lights_are_normalized_and_capped() {
        let light = DirectionalLight::new(Vector3::new(0.0, -2.0, 0.0), [1.0, 0.5, 0.25]);
        let frame = FrameUniforms::new(
            Matrix4::identity(),
            Point3::new(1.0, 2.0, 3.0),
            [0.5, 0.7, 1.0, 1.0],
            &[light; 6],
        );
        assert_eq!(frame.light_count[0], MAX_LIGHTS as u32);
        assert_eq!(frame.light_directions[0], [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(frame.light_colors[3], [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(frame.view_position, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn object_block_reads_material_values() {
        let material = Material::new()
            .with("shininess", MaterialValue::Float(8.0))
            .with("atlasColumns", MaterialValue::Int(32))
            .with("atlasRows", MaterialValue::Int(16));
        let object = ObjectUniforms::new(Matrix4::identity(), &material);
        assert_eq!(object.lighting, [0.35, 0.65, 0.0, 8.0]);
        assert_eq!(object.atlas, [32.0, 16.0, 0.0, 0.0]);
    }
}
