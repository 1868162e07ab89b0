//! Fireflies: a fixed cloud of glowing sprites above the portal.
//!
//! Positions and scales are generated once and uploaded once as an instance
//! buffer. Everything that changes afterwards (time, pixel ratio, size) goes
//! through [`FireflyUniform`], so tuning the size never touches the geometry.

use rand::Rng;
use wgpu::util::DeviceExt;

use crate::{context::Viewport, data_structures::model::Vertex, pipelines::Layouts};

/// Half extent of the square the fireflies spawn over, centred on the origin.
pub const HALF_EXTENT: f32 = 2.0;
/// Highest spawn height.
pub const MAX_HEIGHT: f32 = 1.5;

/// Per-firefly data read by the vertex shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FireflyInstance {
    pub position: [f32; 3],
    pub scale: f32,
}

impl Vertex for FireflyInstance {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<FireflyInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

/// The generated positions and scales. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
pub struct FireflyField {
    instances: Vec<FireflyInstance>,
}

impl FireflyField {
    /// Scatter `count` fireflies: x and z uniform over [-2, 2], y over [0, 1.5],
    /// scale over [0, 1].
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Self {
        let instances = (0..count)
            .map(|_| FireflyInstance {
                position: [
                    (rng.random::<f32>() - 0.5) * HALF_EXTENT * 2.0,
                    rng.random::<f32>() * MAX_HEIGHT,
                    (rng.random::<f32>() - 0.5) * HALF_EXTENT * 2.0,
                ],
                scale: rng.random::<f32>(),
            })
            .collect();
        Self { instances }
    }

    pub fn instances(&self) -> &[FireflyInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FireflyUniform {
    time: f32,
    pixel_ratio: f32,
    size: f32,
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: f32,
    resolution: [f32; 2],
    _padding2: [f32; 2],
}

impl FireflyUniform {
    pub fn new(size: f32, pixel_ratio: f32, resolution: [u32; 2]) -> Self {
        Self {
            time: 0.0,
            pixel_ratio,
            size,
            _padding: 0.0,
            resolution: [resolution[0].max(1) as f32, resolution[1].max(1) as f32],
            _padding2: [0.0; 2],
        }
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn resolution(&self) -> [f32; 2] {
        self.resolution
    }

    pub fn set_time(&mut self, elapsed_secs: f32) {
        self.time = elapsed_secs;
    }

    pub fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    /// Size sprites for the viewport's capped pixel ratio and render size.
    pub fn set_viewport(&mut self, viewport: &Viewport) {
        let [width, height] = viewport.resolution();
        self.pixel_ratio = viewport.pixel_ratio;
        self.resolution = [width.max(1) as f32, height.max(1) as f32];
    }
}

/// GPU resources of the firefly cloud.
#[derive(Debug)]
pub struct Fireflies {
    pub field: FireflyField,
    pub uniform: FireflyUniform,
    pub instance_buffer: wgpu::Buffer,
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Fireflies {
    pub fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        field: FireflyField,
        uniform: FireflyUniform,
    ) -> Self {
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Firefly Instance Buffer"),
            contents: bytemuck::cast_slice(field.instances()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Firefly Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layouts.fireflies,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("fireflies_bind_group"),
        });
        log::info!("Spawned {} fireflies", field.len());
        Self {
            field,
            uniform,
            instance_buffer,
            uniform_buffer,
            bind_group,
        }
    }

    pub fn write_to_buffer(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}
