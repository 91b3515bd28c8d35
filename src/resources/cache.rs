//! Model deduplication.
//!
//! [`MeshCache`] turns a model file name into a shared [`Model`]. The first
//! request parses and uploads, every later request for the same name hands
//! out the same `Rc` without touching the GPU. Entries live until
//! [`MeshCache::release_all`].

use std::{collections::HashMap, rc::Rc};

use crate::{
    config::Topology,
    data_structures::model::Model,
    gpu::GpuResources,
    resources::{AssetSource, mesh},
};

pub struct MeshCache {
    source: AssetSource,
    topology: Topology,
    models: HashMap<String, Rc<Model>>,
}

impl MeshCache {
    pub fn new(source: AssetSource, topology: Topology) -> Self {
        Self {
            source,
            topology,
            models: HashMap::new(),
        }
    }

    pub fn get_or_load(&mut self, gpu: &mut dyn GpuResources, model_name: &str) -> anyhow::Result<Rc<Model>> {
        if let Some(model) = self.models.get(model_name) {
            log::debug!("Model {model_name} served from cache");
            return Ok(Rc::clone(model));
        }

        let shapes = mesh::parse_obj(&self.source, model_name)?;
        let model = Rc::new(mesh::upload_model(gpu, &self.source, model_name, shapes, self.topology));
        log::info!("Loaded model {} with {} shape(s)", model_name, model.shapes.len());
        self.models.insert(model_name.to_string(), Rc::clone(&model));
        Ok(model)
    }

    pub fn get(&self, model_name: &str) -> Option<Rc<Model>> {
        self.models.get(model_name).cloned()
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.models.contains_key(model_name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    /// Frees the GPU resources of every cached model and empties the cache.
    ///
    /// Models still referenced elsewhere keep their handles, but those handles are dead.
    pub fn release_all(&mut self, gpu: &mut dyn GpuResources) {
        for (name, model) in self.models.drain() {
            log::debug!("Releasing model {name}");
            model.release(gpu);
        }
    }
}
