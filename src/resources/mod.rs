use std::path::{Path, PathBuf};

use anyhow::Context;

/**
 * This module contains all logic for loading meshes, textures and physics descriptions from
 * external files and turning them into GPU resources.
 */
pub mod cache;
pub mod mesh;
pub mod texture;

/// Resolves asset names against a root directory.
#[derive(Clone, Debug)]
pub struct AssetSource {
    root: PathBuf,
}

impl AssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute names are used as they are, everything else is taken relative to the root.
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.root.join(name)
        }
    }

    pub fn load_string(&self, name: impl AsRef<Path>) -> anyhow::Result<String> {
        let path = self.resolve(name);
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    pub fn load_binary(&self, name: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
        let path = self.resolve(name);
        std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }
}
