//! Scene data structures.
//!
//! - `model` holds the GPU residency of loaded models and their draw contract
//! - `transform` converts physics transforms into render-space model matrices

pub mod model;
pub mod transform;
