//! Meshes and materials as they live on the GPU.

use wgpu::util::DeviceExt;

use crate::{colour::Srgb, data_structures::texture::Texture, resources::model::MeshData};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl Mesh {
    pub fn new(device: &wgpu::Device, name: &str, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: data.indices.len() as u32,
        }
    }
}

/// Which of the three portal materials a mesh is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialSlot {
    Baked,
    PoleLight,
    Portal,
}

/// Unlit material sampling the baked lighting texture.
#[derive(Debug)]
pub struct BakedMaterial {
    pub texture: Texture,
    pub bind_group: wgpu::BindGroup,
    layout: wgpu::BindGroupLayout,
}

impl BakedMaterial {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, texture: Texture) -> Self {
        let bind_group = mk_texture_bind_group(device, layout, &texture);
        Self {
            texture,
            bind_group,
            layout: layout.clone(),
        }
    }

    /// Swap in a newly loaded texture. Meshes pick it up on the next draw.
    pub fn set_texture(&mut self, device: &wgpu::Device, texture: Texture) {
        self.bind_group = mk_texture_bind_group(device, &self.layout, &texture);
        self.texture = texture;
    }
}

fn mk_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &Texture,
) -> wgpu::BindGroup {
    let fallback;
    let sampler = match &texture.sampler {
        Some(sampler) => sampler,
        None => {
            fallback = crate::data_structures::texture::create_default_sampler(device);
            &fallback
        }
    };
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("baked_bind_group"),
    })
}

/// Unlit single-colour material.
#[derive(Debug)]
pub struct FlatMaterial {
    pub colour: Srgb,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl FlatMaterial {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        colour: Srgb,
        label: &str,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[colour.to_linear_rgba()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some(label),
        });
        Self {
            colour,
            buffer,
            bind_group,
        }
    }
}

/// The three materials of the portal scene. They exist before the model loads.
#[derive(Debug)]
pub struct Materials {
    pub baked: BakedMaterial,
    pub pole_light: FlatMaterial,
    pub portal: FlatMaterial,
}

impl Materials {
    pub fn bind_group(&self, slot: MaterialSlot) -> &wgpu::BindGroup {
        match slot {
            MaterialSlot::Baked => &self.baked.bind_group,
            MaterialSlot::PoleLight => &self.pole_light.bind_group,
            MaterialSlot::Portal => &self.portal.bind_group,
        }
    }
}

pub trait DrawModel {
    fn draw_mesh(&mut self, mesh: &Mesh, material: &wgpu::BindGroup, camera: &wgpu::BindGroup);
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_mesh(&mut self, mesh: &Mesh, material: &wgpu::BindGroup, camera: &wgpu::BindGroup) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, camera, &[]);
        self.set_bind_group(1, material, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, 0..1);
    }
}
