//! # Camera State Management
//!
//! A camera that follows an entity of the scene at a fixed offset and turns to
//! face its direction of travel. Each frame it produces the `CameraView` the
//! forward pipeline renders with.

use cgmath::{Deg, EuclideanSpace, Point3, Vector3};

use crate::{
    config::CameraConfig,
    engine_state::{
        rendering::CameraView,
        scene::{EntityId, Scene},
    },
};

pub mod camera;

use camera::{Camera, Projection};

/// Camera placement and projection.
///
/// # Fields
/// - `camera`: The current camera state (position, orientation)
/// - `projection`: Perspective projection for the render target
/// - `offset`: Eye position relative to the followed entity
#[derive(Debug, Clone)]
pub struct CameraState {
    pub camera: Camera,
    pub projection: Projection,
    pub offset: Vector3<f32>,
}

impl CameraState {
    /// Creates a camera for a `width × height` render target.
    pub fn new(config: &CameraConfig, width: u32, height: u32) -> Self {
        let offset = Vector3::from(config.offset);
        Self {
            camera: Camera::new(Point3::from_vec(offset), Deg(0.0), Deg(config.pitch_degrees)),
            projection: Projection::new(
                width,
                height,
                Deg(config.fovy_degrees),
                config.znear,
                config.zfar,
            ),
            offset,
        }
    }

    /// Moves the camera to the followed entity and faces `heading`.
    ///
    /// # Returns
    /// `false` if the entity is gone, leaving the camera where it was.
    pub fn follow(&mut self, scene: &Scene, target: EntityId, heading: Vector3<f32>) -> bool {
        let Some(position) = scene.world_position(target) else {
            return false;
        };
        self.camera.position = position + self.offset;
        self.camera.face(heading);
        true
    }

    /// View-projection and eye position for this frame.
    pub fn view(&self) -> CameraView {
        CameraView {
            view_proj: self.projection.calc_matrix() * self.camera.calc_matrix(),
            position: self.camera.position,
        }
    }
}
