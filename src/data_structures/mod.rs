//! GPU-side data: textures, meshes and materials.
//!
//! - `model` contains meshes, the three portal materials and the draw helper
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod model;
pub mod texture;
