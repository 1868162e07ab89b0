//! Camera, projection and damped orbit controls.
//!
//! The camera always looks at a target point. [`OrbitControls`] owns the
//! spherical offset between target and camera and turns pointer input into
//! rotate/pan/zoom deltas. The deltas are applied gradually by
//! [`OrbitControls::update`], which has to run once per frame even when no
//! input arrives so the inertia can settle.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

// Keeps the polar angle off the poles where look_at degenerates.
const POLAR_EPSILON: f32 = 1e-6;

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }
}

/// Perspective projection; the aspect ratio follows the viewport.
#[derive(Clone, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
    // The firefly shader needs view-space depth for its size attenuation.
    view: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            view: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        let view = camera.calc_matrix();
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * view).into();
        self.view = view.into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU side of the camera plus the controls that drive it.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controls: OrbitControls,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl CameraResources {
    /// Advance the controls by one step and upload the resulting view.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection) {
        self.controls.update(&mut self.camera);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

/// Radius, polar angle from +Y (`phi`) and azimuth around +Y (`theta`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    pub fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Orbit-style camera controls with inertia.
///
/// Left drag rotates around the target, right drag pans the target in the
/// screen plane and the wheel zooms. Every call to [`update`](Self::update)
/// applies `damping_factor` of the pending motion and keeps the rest for the
/// next frame, so the residual motion decays geometrically once input stops.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    spherical: Spherical,
    spherical_delta: Spherical,
    pan_offset: Vector3<f32>,
    zoom_delta: f32,
    fovy: Rad<f32>,
    viewport_height: f32,
    drag: Drag,
    cursor: Option<PhysicalPosition<f64>>,
}

impl OrbitControls {
    pub fn new(camera: &Camera, fovy: Rad<f32>, viewport_height: u32, damping_factor: f32) -> Self {
        let spherical = Spherical::from_offset(camera.position - camera.target);
        Self {
            target: camera.target,
            damping_factor,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.1,
            max_distance: 100.0,
            spherical,
            spherical_delta: Spherical {
                radius: 0.0,
                phi: 0.0,
                theta: 0.0,
            },
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            zoom_delta: 0.0,
            fovy,
            viewport_height: viewport_height.max(1) as f32,
            drag: Drag::None,
            cursor: None,
        }
    }

    pub fn spherical(&self) -> Spherical {
        self.spherical
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Rotate by a pointer movement given in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let scale = TAU * self.rotate_speed / self.viewport_height;
        self.spherical_delta.theta -= dx * scale;
        self.spherical_delta.phi -= dy * scale;
    }

    /// Pan the target by a pointer movement given in pixels.
    ///
    /// The movement is scaled so that the point under the cursor at the
    /// target's depth follows the pointer.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let offset = self.spherical.to_offset();
        let forward = -offset.normalize();
        let right = forward.cross(Vector3::unit_y());
        if right.magnitude2() == 0.0 {
            return;
        }
        let right = right.normalize();
        let up = right.cross(forward);
        let target_distance = self.spherical.radius * (self.fovy.0 / 2.0).tan();
        let pixels_to_world = 2.0 * target_distance / self.viewport_height * self.pan_speed;
        self.pan_offset += -right * dx * pixels_to_world + up * dy * pixels_to_world;
    }

    /// Zoom by wheel steps; positive steps move the camera closer.
    pub fn zoom(&mut self, steps: f32) {
        self.zoom_delta += 0.95_f32.powf(self.zoom_speed).ln() * steps;
    }

    /// Magnitude of the motion that has not been applied yet.
    pub fn residual_velocity(&self) -> f32 {
        self.spherical_delta.theta.abs()
            + self.spherical_delta.phi.abs()
            + self.pan_offset.magnitude()
            + self.zoom_delta.abs()
    }

    /// Apply one damped step of pending motion and move `camera` accordingly.
    pub fn update(&mut self, camera: &mut Camera) {
        let damping = self.damping_factor;

        self.spherical.theta += self.spherical_delta.theta * damping;
        self.spherical.phi += self.spherical_delta.phi * damping;
        self.spherical.phi = self.spherical.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        self.spherical.radius *= (self.zoom_delta * damping).exp();
        self.spherical.radius = self
            .spherical
            .radius
            .clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset * damping;

        camera.target = self.target;
        camera.position = self.target + self.spherical.to_offset();

        let decay = 1.0 - damping;
        self.spherical_delta.theta *= decay;
        self.spherical_delta.phi *= decay;
        self.pan_offset *= decay;
        self.zoom_delta *= decay;
    }

    /// Feed a window event into the controls. Returns `true` if it was used.
    ///
    /// `captured` is set when an overlay above the scene already handled the
    /// event. The cursor is still tracked and releases still end a drag, but
    /// captured presses, moves and wheel steps do not move the camera.
    pub fn handle_window_event(&mut self, event: &WindowEvent, captured: bool) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (button, state) {
                    (_, ElementState::Released) => Drag::None,
                    _ if captured => return false,
                    (MouseButton::Left, ElementState::Pressed) => Drag::Rotate,
                    (MouseButton::Right, ElementState::Pressed) => Drag::Pan,
                    _ => self.drag,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace(*position);
                let Some(previous) = previous else {
                    return false;
                };
                if captured {
                    return false;
                }
                let dx = (position.x - previous.x) as f32;
                let dy = (position.y - previous.y) as f32;
                match self.drag {
                    Drag::Rotate => self.rotate(dx, dy),
                    Drag::Pan => self.pan(dx, dy),
                    Drag::None => return false,
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
                false
            }
            WindowEvent::MouseWheel { .. } if captured => false,
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 100.0) as f32,
                };
                self.zoom(steps);
                true
            }
            _ => false,
        }
    }
}
