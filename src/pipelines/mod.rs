//! Render pipelines and the bind group layouts they share.

pub mod basic;
pub mod fireflies;

/// Bind group layouts, created once per device.
#[derive(Debug, Clone)]
pub struct Layouts {
    /// Camera uniform, group 0 of every pipeline.
    pub camera: wgpu::BindGroupLayout,
    /// Baked texture and sampler.
    pub texture: wgpu::BindGroupLayout,
    /// Flat material colour.
    pub colour: wgpu::BindGroupLayout,
    /// Firefly time/pixel-ratio/size uniform.
    pub fireflies: wgpu::BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            camera: mk_uniform_layout(
                device,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                "camera_bind_group_layout",
            ),
            texture: mk_texture_layout(device),
            colour: mk_uniform_layout(device, wgpu::ShaderStages::FRAGMENT, "colour_bind_group_layout"),
            fireflies: mk_uniform_layout(
                device,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                "fireflies_bind_group_layout",
            ),
        }
    }
}

pub fn mk_uniform_layout(
    device: &wgpu::Device,
    visibility: wgpu::ShaderStages,
    label: &str,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some(label),
    })
}

pub fn mk_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("baked_texture_bind_group_layout"),
    })
}

/// All pipelines of the scene, created for one surface format and sample count.
#[derive(Debug)]
pub struct Pipelines {
    pub baked: wgpu::RenderPipeline,
    pub flat: wgpu::RenderPipeline,
    pub fireflies: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sample_count: u32,
        layouts: &Layouts,
    ) -> Self {
        Self {
            baked: basic::mk_baked_pipeline(device, format, sample_count, layouts),
            flat: basic::mk_flat_pipeline(device, format, sample_count, layouts),
            fireflies: fireflies::mk_fireflies_pipeline(device, format, sample_count, layouts),
        }
    }
}
