//! Rigid body registry on top of `rapier3d`.
//!
//! [`PhysicsWorld`] owns the whole dynamics world. Bodies come in through
//! descriptor files ([`descriptor`]) and are addressed through
//! [`BodyHandle`]s afterwards.

use std::path::Path;

use rapier3d::{
    na::{Quaternion, Translation3, UnitQuaternion},
    prelude::*,
};

use crate::{data_structures::transform::PhysicsTransform, resources::AssetSource};

pub mod descriptor;

use descriptor::{BodyDescriptor, JointKind, PhysicsDescriptor, ShapeDescriptor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub RigidBodyHandle);

/// Everything one descriptor put into the world.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedBodies {
    /// In creation order.
    pub bodies: Vec<BodyHandle>,
    pub joints: Vec<ImpulseJointHandle>,
}

impl LoadedBodies {
    /// The most recently created body.
    pub fn last(&self) -> Option<BodyHandle> {
        self.bodies.last().copied()
    }
}

pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub gravity: Vector<f32>,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: BroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    fixed_timestep: f32,
    accumulated: f32,
}

impl PhysicsWorld {
    pub fn new(gravity: [f32; 3], fixed_timestep: f32) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: fixed_timestep,
            ..Default::default()
        };
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vector![gravity[0], gravity[1], gravity[2]],
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            fixed_timestep,
            accumulated: 0.0,
        }
    }

    /// Loads a descriptor file and returns every body and joint it created.
    pub fn add_from_file(&mut self, source: &AssetSource, file: impl AsRef<Path>) -> anyhow::Result<LoadedBodies> {
        let path = source.resolve(file);
        let descriptor = descriptor::read_descriptor(&path)?;
        let loaded = self.add_descriptor(&descriptor)?;
        log::debug!("{} added {} bodies and {} joints", path.display(), loaded.bodies.len(), loaded.joints.len());
        Ok(loaded)
    }

    /// Inserts every body and joint of the descriptor. Joints must reference bodies of the
    /// same descriptor; nothing is inserted otherwise.
    pub fn add_descriptor(&mut self, descriptor: &PhysicsDescriptor) -> anyhow::Result<LoadedBodies> {
        descriptor.validate()?;
        let bodies: Vec<BodyHandle> = descriptor.bodies.iter().map(|body| self.add_body(body)).collect();
        let joints = descriptor
            .joints
            .iter()
            .map(|joint| {
                let anchor_a = point![joint.anchor_a[0], joint.anchor_a[1], joint.anchor_a[2]];
                let anchor_b = point![joint.anchor_b[0], joint.anchor_b[1], joint.anchor_b[2]];
                let data: GenericJoint = match joint.kind {
                    JointKind::Fixed => FixedJointBuilder::new()
                        .local_anchor1(anchor_a)
                        .local_anchor2(anchor_b)
                        .build()
                        .into(),
                    JointKind::Spherical => SphericalJointBuilder::new()
                        .local_anchor1(anchor_a)
                        .local_anchor2(anchor_b)
                        .build()
                        .into(),
                };
                self.impulse_joint_set
                    .insert(bodies[joint.body_a].0, bodies[joint.body_b].0, data, true)
            })
            .collect();
        Ok(LoadedBodies { bodies, joints })
    }

    pub fn add_body(&mut self, body: &BodyDescriptor) -> BodyHandle {
        let position = isometry(body.translation, body.rotation);
        let rigid_body = if body.is_static() {
            RigidBodyBuilder::fixed().position(position).build()
        } else {
            RigidBodyBuilder::dynamic()
                .position(position)
                .linvel(vector![body.linear_velocity[0], body.linear_velocity[1], body.linear_velocity[2]])
                .build()
        };
        let collider = match body.shape {
            ShapeDescriptor::Cuboid { half_extents: [hx, hy, hz] } => ColliderBuilder::cuboid(hx, hy, hz),
            ShapeDescriptor::Ball { radius } => ColliderBuilder::ball(radius),
            ShapeDescriptor::Capsule { half_height, radius } => ColliderBuilder::capsule_y(half_height, radius),
            ShapeDescriptor::Cylinder { half_height, radius } => ColliderBuilder::cylinder(half_height, radius),
        }
        .restitution(body.restitution)
        .friction(body.friction);
        let collider = if body.is_static() { collider } else { collider.mass(body.mass) };

        let body_handle = self.rigid_body_set.insert(rigid_body);
        self.collider_set
            .insert_with_parent(collider.build(), body_handle, &mut self.rigid_body_set);
        BodyHandle(body_handle)
    }

    /// Takes everything a descriptor added back out of the world.
    pub fn remove(&mut self, loaded: &LoadedBodies) {
        for joint in &loaded.joints {
            self.impulse_joint_set.remove(*joint, true);
        }
        for body in &loaded.bodies {
            self.rigid_body_set.remove(
                body.0,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.rigid_body_set.contains(handle.0)
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Teleports the body and resets its orientation.
    pub fn set_position(&mut self, handle: BodyHandle, x: f32, y: f32, z: f32) -> bool {
        match self.rigid_body_set.get_mut(handle.0) {
            Some(body) => {
                body.set_position(Isometry::translation(x, y, z), true);
                true
            }
            None => false,
        }
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, x: f32, y: f32, z: f32) -> bool {
        match self.rigid_body_set.get_mut(handle.0) {
            Some(body) => {
                body.set_linvel(vector![x, y, z], true);
                true
            }
            None => false,
        }
    }

    /// Sets the restitution of every collider attached to the body.
    pub fn set_elasticity(&mut self, handle: BodyHandle, elasticity: f32) -> bool {
        let Some(body) = self.rigid_body_set.get(handle.0) else {
            return false;
        };
        for collider in body.colliders() {
            if let Some(collider) = self.collider_set.get_mut(*collider) {
                collider.set_restitution(elasticity);
            }
        }
        true
    }

    pub fn transform(&self, handle: BodyHandle) -> Option<PhysicsTransform> {
        self.rigid_body_set
            .get(handle.0)
            .map(|body| PhysicsTransform::from(body.position()))
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<[f32; 3]> {
        self.rigid_body_set.get(handle.0).map(|body| {
            let v = body.linvel();
            [v.x, v.y, v.z]
        })
    }

    pub fn elasticity(&self, handle: BodyHandle) -> Option<f32> {
        let body = self.rigid_body_set.get(handle.0)?;
        let collider = body.colliders().first()?;
        self.collider_set.get(*collider).map(|c| c.restitution())
    }

    pub fn fixed_timestep(&self) -> f32 {
        self.fixed_timestep
    }

    /// Advances the world by exactly one fixed tick.
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /**
     * Accumulates `dt` and runs as many whole fixed ticks as fit, but never more than
     * `max_substeps`. Returns the number of ticks run.
     *
     * Backlog beyond `max_substeps` is dropped.
     */
    pub fn step_simulation(&mut self, dt: f32, max_substeps: u32) -> u32 {
        if !dt.is_finite() {
            log::warn!("Ignoring non-finite frame time {dt}");
            return 0;
        }
        self.accumulated += dt.max(0.0);
        let mut steps = 0;
        while self.accumulated >= self.fixed_timestep && steps < max_substeps {
            self.step();
            self.accumulated -= self.fixed_timestep;
            steps += 1;
        }
        if self.accumulated >= self.fixed_timestep {
            log::warn!(
                "Physics is {:.3}s behind, dropping the backlog after {} ticks",
                self.accumulated,
                steps
            );
            self.accumulated %= self.fixed_timestep;
        }
        steps
    }
}

fn isometry(translation: [f32; 3], rotation: [f32; 4]) -> Isometry<f32> {
    let [x, y, z, w] = rotation;
    Isometry::from_parts(
        Translation3::new(translation[0], translation[1], translation[2]),
        UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
    )
}
