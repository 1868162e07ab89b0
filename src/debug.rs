//! Debug panel with the two live-tunable values of the scene.
//!
//! [`DebugValues`] holds the firefly size and the clear colour and knows how to
//! push them into the firefly uniform and the renderer. [`DebugPanel`] is the
//! egui window that edits them; it draws on top of the finished frame.

use std::ops::RangeInclusive;

use winit::{event::WindowEvent, window::Window};

use crate::{colour::Srgb, context::Viewport, particles::FireflyUniform};

pub const FIREFLY_SIZE_RANGE: RangeInclusive<f32> = 0.1..=200.0;
pub const FIREFLY_SIZE_STEP: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugValues {
    firefly_size: f32,
    clear_colour: Srgb,
}

impl DebugValues {
    pub fn new(firefly_size: f32, clear_colour: Srgb) -> Self {
        Self {
            firefly_size: clamp_size(firefly_size),
            clear_colour,
        }
    }

    pub fn firefly_size(&self) -> f32 {
        self.firefly_size
    }

    pub fn clear_colour(&self) -> Srgb {
        self.clear_colour
    }

    /// Values outside the slider range are clamped into it. Returns the stored size.
    pub fn set_firefly_size(&mut self, size: f32) -> f32 {
        self.firefly_size = clamp_size(size);
        self.firefly_size
    }

    pub fn set_clear_colour(&mut self, colour: Srgb) {
        self.clear_colour = colour;
    }

    /// Only the size uniform changes; particle positions and scales are left alone.
    pub fn apply_to_fireflies(&self, fireflies: &mut FireflyUniform) {
        fireflies.set_size(self.firefly_size);
    }

    pub fn clear_colour_wgpu(&self) -> wgpu::Color {
        self.clear_colour.to_wgpu()
    }
}

fn clamp_size(size: f32) -> f32 {
    let (min, max) = (*FIREFLY_SIZE_RANGE.start(), *FIREFLY_SIZE_RANGE.end());
    if size.is_nan() { min } else { size.clamp(min, max) }
}

fn debug_window(ctx: &egui::Context, width: f32, values: &mut DebugValues) {
    egui::Window::new("Debug")
        .default_width(width)
        .resizable(false)
        .show(ctx, |ui| {
            let mut size = values.firefly_size();
            let slider = egui::Slider::new(&mut size, FIREFLY_SIZE_RANGE)
                .step_by(FIREFLY_SIZE_STEP)
                .text("fireFliesSize");
            if ui.add(slider).changed() {
                values.set_firefly_size(size);
            }

            ui.horizontal(|ui| {
                let mut rgb = values.clear_colour().0;
                if ui.color_edit_button_srgb(&mut rgb).changed() {
                    values.set_clear_colour(Srgb(rgb));
                }
                ui.label(format!("clearColor {}", values.clear_colour()));
            });
        });
}

/// egui context, its winit glue and its wgpu renderer.
pub struct DebugPanel {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    values: DebugValues,
    width: f32,
}

impl std::fmt::Debug for DebugPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugPanel")
            .field("values", &self.values)
            .field("width", &self.width)
            .finish()
    }
}

impl DebugPanel {
    pub fn new(
        window: &Window,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sample_count: u32,
        values: DebugValues,
        width: f32,
    ) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(
            device,
            format,
            egui_wgpu::RendererOptions {
                msaa_samples: sample_count,
                depth_stencil_format: None,
                ..Default::default()
            },
        );
        Self {
            ctx,
            state,
            renderer,
            values,
            width,
        }
    }

    pub fn values(&self) -> DebugValues {
        self.values
    }

    /// Feed a window event to egui. Returns `true` if the panel consumed it
    /// and the camera controls should not see it.
    pub fn handle_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Run the panel for this frame and record its draw on top of `target`,
    /// resolving into `resolve_target` when the target is multisampled.
    ///
    /// Returns `true` if one of the values was edited.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &Window,
        target: &wgpu::TextureView,
        resolve_target: Option<&wgpu::TextureView>,
        viewport: &Viewport,
    ) -> bool {
        let raw_input = self.state.take_egui_input(window);
        let mut values = self.values;
        let width = self.width;
        let full_output = self
            .ctx
            .run(raw_input, |ctx| debug_window(ctx, width, &mut values));
        let changed = values != self.values;
        self.values = values;

        self.state
            .handle_platform_output(window, full_output.platform_output);

        // A capped surface has fewer pixels per point than the window.
        let pixels_per_point = full_output.pixels_per_point * viewport.render_scale();
        let paint_jobs = self.ctx.tessellate(full_output.shapes, pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: viewport.resolution(),
            pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer
                .update_texture(device, queue, *id, image_delta);
        }
        self.renderer
            .update_buffers(device, queue, encoder, &paint_jobs, &screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Debug Panel Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.renderer
                .render(&mut render_pass.forget_lifetime(), &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        changed
    }
}
