//! holo-ngin
//!
//! Scene layer for small VR applications. A [`scene::Scene`] owns a set of
//! named objects, each bound to a shared GPU model and its own rigid body.
//! Physics runs at a fixed tick, model matrices are re-derived from the
//! bodies after every tick and every object is drawn with its own `mvp`,
//! once per eye.
//!
//! High-level modules
//! - `camera`: perspective and pose based view matrices for the monitor view
//! - `config`: scene configuration (gravity, tick, topology, asset root)
//! - `data_structures`: models, sub-shapes and the physics to render transform
//! - `error`: errors surfaced by the scene
//! - `frame`: stereo driver boundary and the per-frame update/draw sequence
//! - `gpu`: GPU boundary traits plus a headless and a `wgpu` backend
//! - `physics`: rigid body registry and the physics descriptor format
//! - `resources`: asset loading and the mesh cache
//! - `scene`: the scene itself
//!

pub mod camera;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod physics;
pub mod resources;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use config::{SceneConfig, Topology};
pub use error::SceneError;
pub use scene::Scene;
