//! The scene: named objects bound to a shared model and an owned rigid body.
//!
//! Every frame runs the same pipeline. [`Scene::update`] advances physics by
//! one fixed tick and re-derives each object's model matrix from its body.
//! [`Scene::draw`] then issues one draw per sub-shape with
//! `projection * view * model` as its `mvp`, in insertion order. Drawing never
//! touches physics, so the two eyes of a stereo frame see the same matrices.

use std::{collections::HashMap, path::Path, rc::Rc};

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    config::SceneConfig,
    data_structures::{
        model::Model,
        transform::{physics_to_render, to_columns},
    },
    error::SceneError,
    gpu::{DrawSubmitter, GpuResources},
    physics::{BodyHandle, LoadedBodies, PhysicsWorld},
    resources::{AssetSource, cache::MeshCache},
};

pub struct SceneObject {
    name: String,
    model: Rc<Model>,
    body: BodyHandle,
    loaded: LoadedBodies,
    model_matrix: Matrix4<f32>,
}

impl SceneObject {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The model, shared with every object loaded from the same file.
    pub fn model(&self) -> &Rc<Model> {
        &self.model
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    /// Every body and joint the object's descriptor created.
    pub fn loaded_bodies(&self) -> &LoadedBodies {
        &self.loaded
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.model_matrix
    }
}

pub struct Scene {
    config: SceneConfig,
    physics: PhysicsWorld,
    cache: MeshCache,
    objects: Vec<SceneObject>,
    index: HashMap<String, usize>,
    projection: Option<Matrix4<f32>>,
    view: Option<Matrix4<f32>>,
    ticks: u64,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        let physics = PhysicsWorld::new(config.gravity, config.timestep);
        let cache = MeshCache::new(AssetSource::new(config.asset_root.clone()), config.topology);
        log::info!(
            "Scene created: gravity {:?}, timestep {}s, assets in {}",
            config.gravity,
            config.timestep,
            config.asset_root.display()
        );
        Self {
            config,
            physics,
            cache,
            objects: Vec::new(),
            index: HashMap::new(),
            projection: None,
            view: None,
            ticks: 0,
        }
    }

    /// Adds a named object.
    ///
    /// The descriptor's bodies go into the world first and the last one
    /// becomes the object's body. The model comes from the mesh cache, so
    /// objects naming the same file share it. If the model cannot be loaded
    /// the descriptor's bodies are removed again and the scene is unchanged.
    pub fn add_object(
        &mut self,
        gpu: &mut dyn GpuResources,
        name: &str,
        model_name: &str,
        physics_file: impl AsRef<Path>,
    ) -> Result<(), SceneError> {
        if self.index.contains_key(name) {
            return Err(SceneError::DuplicateObject(name.to_string()));
        }

        let physics_file = physics_file.as_ref();
        let loaded = self
            .physics
            .add_from_file(self.cache.source(), physics_file)
            .map_err(|e| SceneError::load(format!("physics descriptor {}", physics_file.display()), e))?;
        let Some(body) = loaded.last() else {
            return Err(SceneError::EmptyDescriptor(physics_file.to_path_buf()));
        };

        let model = match self.cache.get_or_load(gpu, model_name) {
            Ok(model) => model,
            Err(e) => {
                self.physics.remove(&loaded);
                return Err(SceneError::load(format!("model {model_name}"), e));
            }
        };

        log::info!("Added object {name} ({model_name}, {})", physics_file.display());
        self.index.insert(name.to_string(), self.objects.len());
        self.objects.push(SceneObject {
            name: name.to_string(),
            model,
            body,
            loaded,
            model_matrix: Matrix4::identity(),
        });
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&SceneObject, SceneError> {
        self.index
            .get(name)
            .map(|&idx| &self.objects[idx])
            .ok_or_else(|| SceneError::ObjectNotFound(name.to_string()))
    }

    /// Moves the object's body in physics space and resets its orientation.
    pub fn set_object_position(&mut self, name: &str, x: f32, y: f32, z: f32) -> Result<(), SceneError> {
        let body = self.lookup(name)?.body;
        if self.physics.set_position(body, x, y, z) {
            Ok(())
        } else {
            Err(SceneError::ObjectNotFound(name.to_string()))
        }
    }

    pub fn set_object_velocity(&mut self, name: &str, x: f32, y: f32, z: f32) -> Result<(), SceneError> {
        let body = self.lookup(name)?.body;
        if self.physics.set_velocity(body, x, y, z) {
            Ok(())
        } else {
            Err(SceneError::ObjectNotFound(name.to_string()))
        }
    }

    pub fn set_object_elasticity(&mut self, name: &str, elasticity: f32) -> Result<(), SceneError> {
        let body = self.lookup(name)?.body;
        if self.physics.set_elasticity(body, elasticity) {
            Ok(())
        } else {
            Err(SceneError::ObjectNotFound(name.to_string()))
        }
    }

    pub fn set_projection_matrix(&mut self, projection: Matrix4<f32>) {
        self.projection = Some(projection);
    }

    pub fn set_view_matrix(&mut self, view: Matrix4<f32>) {
        self.view = Some(view);
    }

    /// Runs exactly one fixed physics step, whatever the frame time was.
    pub fn update(&mut self) {
        self.physics.step();
        self.ticks += 1;
        self.harvest();
    }

    /// Advances by elapsed wall time.
    ///
    /// With the accumulator enabled in [`SceneConfig`] this runs as many whole
    /// fixed steps as `dt` covers, at most `max_substeps`. Otherwise it is
    /// [`Self::update`]. Returns the number of steps run.
    pub fn update_elapsed(&mut self, dt: f32) -> u32 {
        if !self.config.accumulate {
            self.update();
            return 1;
        }
        let steps = self.physics.step_simulation(dt, self.config.max_substeps);
        if steps > 0 {
            self.ticks += u64::from(steps);
            self.harvest();
        }
        steps
    }

    fn harvest(&mut self) {
        for object in &mut self.objects {
            match self.physics.transform(object.body) {
                Some(transform) => object.model_matrix = physics_to_render(transform),
                None => log::warn!("Body of {} vanished from the world", object.name),
            }
        }
    }

    /// Draws every object with the current projection and view.
    ///
    /// Returns the number of draw calls issued.
    pub fn draw(&self, target: &mut dyn DrawSubmitter, mvp_location: u32) -> Result<usize, SceneError> {
        let projection = self.projection.ok_or(SceneError::MissingMatrix("projection"))?;
        let view = self.view.ok_or(SceneError::MissingMatrix("view"))?;
        let view_projection = projection * view;

        let mut calls = 0;
        for object in &self.objects {
            let mvp = view_projection * object.model_matrix;
            target.set_mvp(mvp_location, to_columns(&mvp));
            object.model.draw(target, self.config.topology);
            calls += object.model.shapes.len();
        }
        Ok(calls)
    }

    pub fn object(&self, name: &str) -> Result<&SceneObject, SceneError> {
        self.lookup(name)
    }

    pub fn model_matrix(&self, name: &str) -> Result<Matrix4<f32>, SceneError> {
        Ok(self.lookup(name)?.model_matrix)
    }

    /// Physics-space position of the object's body.
    pub fn body_position(&self, name: &str) -> Result<[f32; 3], SceneError> {
        let object = self.lookup(name)?;
        self.physics
            .transform(object.body)
            .map(|t| t.position)
            .ok_or_else(|| SceneError::ObjectNotFound(name.to_string()))
    }

    /// Object names in insertion order.
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Fixed steps run since creation.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn mesh_cache(&self) -> &MeshCache {
        &self.cache
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Drops every object and frees every GPU resource the cache holds.
    pub fn teardown(mut self, gpu: &mut dyn GpuResources) {
        log::info!("Tearing down scene with {} objects and {} models", self.objects.len(), self.cache.len());
        self.objects.clear();
        self.index.clear();
        self.cache.release_all(gpu);
    }
}
