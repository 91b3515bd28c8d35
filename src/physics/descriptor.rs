//! Binary physics-scene descriptions.
//!
//! A descriptor file holds any number of rigid bodies and the joints between
//! them. On disk it is a bincode stream: the `HPHY` magic, a format version and
//! the [`PhysicsDescriptor`] itself.

use std::path::Path;

use anyhow::{Context, bail, ensure};
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"HPHY";
pub const VERSION: u16 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapeDescriptor {
    Cuboid { half_extents: [f32; 3] },
    Ball { radius: f32 },
    /// Y aligned.
    Capsule { half_height: f32, radius: f32 },
    /// Y aligned.
    Cylinder { half_height: f32, radius: f32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    pub name: String,
    /// Zero makes the body static.
    pub mass: f32,
    pub translation: [f32; 3],
    /// `[x, y, z, w]`.
    pub rotation: [f32; 4],
    pub linear_velocity: [f32; 3],
    pub restitution: f32,
    pub friction: f32,
    pub shape: ShapeDescriptor,
}

impl BodyDescriptor {
    pub fn new(name: impl Into<String>, mass: f32, shape: ShapeDescriptor) -> Self {
        Self {
            name: name.into(),
            mass,
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            linear_velocity: [0.0; 3],
            restitution: 0.0,
            friction: 0.5,
            shape,
        }
    }

    pub fn with_translation(mut self, translation: [f32; 3]) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_linear_velocity(mut self, linear_velocity: [f32; 3]) -> Self {
        self.linear_velocity = linear_velocity;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointKind {
    Fixed,
    Spherical,
}

/// Joint between two bodies of the same descriptor, referenced by index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointDescriptor {
    pub kind: JointKind,
    pub body_a: usize,
    pub body_b: usize,
    pub anchor_a: [f32; 3],
    pub anchor_b: [f32; 3],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsDescriptor {
    pub bodies: Vec<BodyDescriptor>,
    pub joints: Vec<JointDescriptor>,
}

impl PhysicsDescriptor {
    pub fn single(body: BodyDescriptor) -> Self {
        Self {
            bodies: vec![body],
            joints: Vec::new(),
        }
    }

    /// Checks that every joint references bodies of this descriptor.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (idx, joint) in self.joints.iter().enumerate() {
            ensure!(
                joint.body_a < self.bodies.len() && joint.body_b < self.bodies.len(),
                "joint {} references body {} / {} but only {} bodies exist",
                idx,
                joint.body_a,
                joint.body_b,
                self.bodies.len()
            );
        }
        Ok(())
    }
}

pub fn encode(descriptor: &PhysicsDescriptor) -> anyhow::Result<Vec<u8>> {
    Ok(bincode::serialize(&(MAGIC, VERSION, descriptor))?)
}

pub fn decode(bytes: &[u8]) -> anyhow::Result<PhysicsDescriptor> {
    let (magic, version): ([u8; 4], u16) =
        bincode::deserialize(bytes).context("descriptor header is truncated")?;
    if magic != MAGIC {
        bail!("not a physics descriptor (magic {:?})", magic);
    }
    if version != VERSION {
        bail!("unsupported physics descriptor version {version}");
    }
    let (_, _, descriptor): ([u8; 4], u16, PhysicsDescriptor) = bincode::deserialize(bytes)?;
    descriptor.validate()?;
    Ok(descriptor)
}

pub fn read_descriptor(path: impl AsRef<Path>) -> anyhow::Result<PhysicsDescriptor> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode(&bytes).with_context(|| format!("decoding {}", path.display()))
}

pub fn write_descriptor(path: impl AsRef<Path>, descriptor: &PhysicsDescriptor) -> anyhow::Result<()> {
    let path = path.as_ref();
    let bytes = encode(descriptor)?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}
