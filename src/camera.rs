//! Monitor-view camera helpers.
//!
//! Matrices follow the OpenGL clip convention; the shader remaps depth for
//! `wgpu`, so nothing here needs an `OPENGL_TO_WGPU` correction.

use cgmath::{Deg, InnerSpace, Matrix4, One, Quaternion, Vector3};

/// Right-handed perspective projection.
pub fn perspective(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    cgmath::perspective(Deg(fov_deg), aspect, near, far)
}

/// Position and orientation of the viewer in render space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
}

impl CameraPose {
    pub fn new(position: Vector3<f32>, rotation: Quaternion<f32>) -> Self {
        Self { position, rotation }
    }

    /// World-to-view transform, the inverse of the pose.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let rotation = self.rotation.normalize();
        // conjugate of a unit quaternion is its inverse
        Matrix4::from(rotation.conjugate()) * Matrix4::from_translation(-self.position)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
        }
    }
}
