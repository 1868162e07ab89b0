//! Start-up configuration of the portal scene.
//!
//! There is no config file; [`Settings::default`] describes the scene as it
//! ships and callers can tweak fields before handing it to [`crate::run`].

use cgmath::Point3;

use crate::colour::Srgb;

#[derive(Clone, Debug)]
pub struct Settings {
    pub title: String,
    /// Paths are relative to the `assets/` directory (or URL on the web).
    pub baked_texture: String,
    pub model: String,
    pub camera_position: Point3<f32>,
    pub camera_target: Point3<f32>,
    pub fov_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    pub damping_factor: f32,
    pub firefly_count: usize,
    pub firefly_size: f32,
    pub clear_colour: Srgb,
    pub portal_colour: Srgb,
    pub pole_light_colour: Srgb,
    pub panel_width: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "Portal".to_string(),
            baked_texture: "mymodels/baked3.jpg".to_string(),
            model: "mymodels/land5.glb".to_string(),
            camera_position: Point3::new(4.0, 2.0, 4.0),
            camera_target: Point3::new(0.0, 0.0, 0.0),
            fov_degrees: 45.0,
            znear: 0.1,
            zfar: 100.0,
            damping_factor: 0.05,
            firefly_count: 30,
            firefly_size: 100.0,
            clear_colour: Srgb::from_hex(0x201919),
            portal_colour: Srgb::WHITE,
            pole_light_colour: Srgb::from_hex(0xffffe5),
            panel_width: 400.0,
        }
    }
}
