//! portal-scene
//!
//! A baked "portal" scene rendered with wgpu on native targets and in the
//! browser (WebGL through WASM). A pre-lit glTF model gets one baked texture
//! and two flat colours assigned to its named sub-meshes, a small cloud of
//! additive "fireflies" floats above it, the camera orbits with damping, and a
//! debug panel tunes the firefly size and the clear colour at runtime.
//!
//! High-level modules
//! - `camera`: perspective projection, view uniforms and damped orbit controls
//! - `colour`: sRGB hex colours and their linear/wgpu conversions
//! - `context`: GPU and window context that owns surface, device, queue and pipelines
//! - `data_structures`: GPU textures, meshes and materials
//! - `debug`: egui debug panel bound to the firefly size and the clear colour
//! - `error`: typed errors for scene assembly
//! - `flow`: application event loop, asset loading and the per-frame render loop
//! - `particles`: firefly generation, uniforms and GPU resources
//! - `pipelines`: render pipelines for baked, flat and firefly draws
//! - `render`: batches scene nodes into pipeline order
//! - `resources`: loaders for the baked texture and the glTF model
//! - `scene`: named sub-mesh lookup, material binding and the scene graph
//! - `settings`: start-up configuration of the scene
//!

pub mod camera;
pub mod colour;
pub mod context;
pub mod data_structures;
pub mod debug;
pub mod error;
pub mod flow;
pub mod particles;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod settings;

pub use flow::run;
pub use settings::Settings;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Browser entry point. Renders into the `canvas.webgl` element of the host page.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    run(Settings::default()).map_err(|e| JsValue::from_str(&e.to_string()))
}
