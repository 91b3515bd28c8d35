//! Physics-space to render-space transforms.
//!
//! The physics world is Y-up with Z forward; the renderer expects the Y and Z
//! axes swapped with the new Z negated. Every scene object goes through
//! [`physics_to_render`], so the correction lives in exactly one place.

use cgmath::{Matrix4, Quaternion, Vector3};
use rapier3d::prelude::Isometry;

/// Rigid transform as reported by the physics engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsTransform {
    pub position: [f32; 3],
    /// Unit quaternion, `[x, y, z, w]`.
    pub rotation: [f32; 4],
}

impl PhysicsTransform {
    pub fn identity() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl From<&Isometry<f32>> for PhysicsTransform {
    fn from(iso: &Isometry<f32>) -> Self {
        let t = iso.translation.vector;
        let q = iso.rotation.quaternion();
        Self {
            position: [t.x, t.y, t.z],
            rotation: [q.i, q.j, q.k, q.w],
        }
    }
}

/// Rigid transform in the renderer's coordinate system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTransform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
}

impl RenderTransform {
    /// Column-major model matrix: rotate, then translate.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position) * Matrix4::from(self.rotation)
    }
}

impl From<PhysicsTransform> for RenderTransform {
    fn from(physics: PhysicsTransform) -> Self {
        let [x, y, z] = physics.position;
        let [qx, qy, qz, qw] = physics.rotation;
        Self {
            position: Vector3::new(x, z, -y),
            rotation: Quaternion::new(qw, qx, qz, -qy),
        }
    }
}

/// Converts a physics transform into the render-space model matrix.
pub fn physics_to_render(transform: PhysicsTransform) -> Matrix4<f32> {
    RenderTransform::from(transform).to_matrix()
}

/// Matrix as the column-major float array handed to the GPU.
pub fn to_columns(matrix: &Matrix4<f32>) -> [[f32; 4]; 4] {
    (*matrix).into()
}
