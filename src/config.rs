//! Scene configuration.
//!
//! [`SceneConfig`] gathers the knobs every demo sets once at startup: the
//! physics constants, the fixed tick, the draw topology the demo's meshes were
//! authored for and where assets are read from. Nothing in here changes while a
//! scene is running.

use std::path::PathBuf;

/// Primitive topology used for every indexed draw of a scene.
///
/// This is a per-demo convention and not per-mesh data: pick the one that
/// matches how the demo's meshes were authored. OBJ files loaded with
/// triangulation are triangle lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    #[default]
    TriangleList,
    TriangleStrip,
    /// Not supported natively by the GPU API; index lists are expanded into
    /// triangle lists at upload time.
    TriangleFan,
}

impl Topology {
    /// Topology the pipeline has to be created with.
    pub fn pipeline_topology(self) -> wgpu::PrimitiveTopology {
        match self {
            Topology::TriangleList | Topology::TriangleFan => wgpu::PrimitiveTopology::TriangleList,
            Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }

    /// Rewrites an authored index list into what is uploaded for this topology.
    pub fn prepare_indices(self, indices: &[u32]) -> Vec<u32> {
        match self {
            Topology::TriangleList | Topology::TriangleStrip => indices.to_vec(),
            Topology::TriangleFan => {
                let Some((&hub, rest)) = indices.split_first() else {
                    return Vec::new();
                };
                rest.windows(2)
                    .flat_map(|pair| [hub, pair[0], pair[1]])
                    .collect()
            }
        }
    }
}

/// Startup configuration for a [`crate::scene::Scene`].
#[derive(Clone, Debug)]
pub struct SceneConfig {
    /// Gravity in physics space (Y up).
    pub gravity: [f32; 3],
    /// Length of one physics tick in seconds.
    pub timestep: f32,
    /// Upper bound of fixed ticks run by one accumulated step.
    pub max_substeps: u32,
    pub topology: Topology,
    /// Directory model, texture and physics files are resolved against.
    pub asset_root: PathBuf,
    /// When set, [`crate::scene::Scene::update_elapsed`] catches up on slow
    /// frames. [`crate::scene::Scene::update`] always runs exactly one tick.
    pub accumulate: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            timestep: 1.0 / 60.0,
            max_substeps: 10,
            topology: Topology::TriangleList,
            asset_root: PathBuf::from("./assets"),
            accumulate: false,
        }
    }
}

impl SceneConfig {
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_gravity(mut self, gravity: [f32; 3]) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_timestep(mut self, timestep: f32, max_substeps: u32) -> Self {
        self.timestep = timestep;
        self.max_substeps = max_substeps;
        self
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_accumulator(mut self, accumulate: bool) -> Self {
        self.accumulate = accumulate;
        self
    }
}
