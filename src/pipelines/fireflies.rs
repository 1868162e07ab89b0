use crate::{
    data_structures::{model::Vertex, texture::Texture},
    particles::FireflyInstance,
    pipelines::{Layouts, basic::mk_render_pipeline},
};

/// Additive blending: the firefly colour, weighted by its alpha, is added to the frame.
pub const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/**
 * Pipeline for the firefly sprites.
 *
 * Sprites are depth-tested against the scene but never write depth, so overlapping
 * fireflies all add up instead of hiding each other.
 */
pub fn mk_fireflies_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    sample_count: u32,
    layouts: &Layouts,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Fireflies Pipeline Layout"),
        bind_group_layouts: &[&layouts.camera, &layouts.fireflies],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Fireflies Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("fireflies.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &render_pipeline_layout,
        format,
        sample_count,
        Some(ADDITIVE_BLENDING),
        Some(Texture::DEPTH_FORMAT),
        false,
        &[FireflyInstance::desc()],
        shader,
    )
}
