//! Errors surfaced by the scene layer.
//!
//! Loader internals speak `anyhow`; everything a caller of [`crate::scene::Scene`]
//! can get wrong is a [`SceneError`] variant they can match on.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("no object named {0:?} in the scene")]
    ObjectNotFound(String),
    #[error("an object named {0:?} already exists")]
    DuplicateObject(String),
    #[error("{0} matrix was not set before drawing")]
    MissingMatrix(&'static str),
    #[error("physics descriptor {0:?} contains no rigid body")]
    EmptyDescriptor(PathBuf),
    #[error("failed to load {what}: {source:#}")]
    Load {
        what: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SceneError {
    pub(crate) fn load(what: impl Into<String>, source: anyhow::Error) -> Self {
        SceneError::Load {
            what: what.into(),
            source,
        }
    }
}
