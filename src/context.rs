use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, CameraUniform, OrbitControls, Projection},
    data_structures::{
        model::{BakedMaterial, FlatMaterial, Materials},
        texture::Texture,
    },
    pipelines::{Layouts, Pipelines},
    settings::Settings,
};

/// Device pixel ratios above this are rendered as if they were this.
pub const MAX_PIXEL_RATIO: f32 = 2.0;

/// Multisample count of the scene when the adapter supports it.
pub const MSAA_SAMPLES: u32 = 4;

/// Pixel ratio used for rendering; caps dense displays to bound fragment cost.
pub fn capped_pixel_ratio(device_ratio: f64) -> f32 {
    (device_ratio as f32).min(MAX_PIXEL_RATIO)
}

/// Render size for a window, with the pixel ratio capped.
///
/// Below [`MAX_PIXEL_RATIO`] the surface matches the window pixel for pixel.
/// Above it the surface is rendered at the capped ratio and stretched over
/// the window, which bounds the number of fragments on dense displays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Window size in device pixels.
    pub window: [u32; 2],
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Viewport {
    /// `width` and `height` are the window's inner size in device pixels and
    /// `device_ratio` its scale factor.
    pub fn new(width: u32, height: u32, device_ratio: f64) -> Self {
        let pixel_ratio = capped_pixel_ratio(device_ratio);
        let render = |length: u32| {
            if device_ratio > f64::from(pixel_ratio) {
                let scaled = (f64::from(length) * f64::from(pixel_ratio) / device_ratio).round();
                (scaled as u32).clamp(1, length.max(1))
            } else {
                length.max(1)
            }
        };
        Self {
            window: [width, height],
            width: render(width),
            height: render(height),
            pixel_ratio,
        }
    }

    /// Width over height of the window.
    pub fn aspect(&self) -> f32 {
        self.window[0] as f32 / self.window[1].max(1) as f32
    }

    /// Surface size in pixels, also the resolution the fireflies are sized for.
    pub fn resolution(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    /// Surface pixels per window pixel.
    pub fn render_scale(&self) -> f32 {
        self.width as f32 / self.window[0].max(1) as f32
    }
}

/// GPU and window context: surface, device, queue, pipelines, materials and camera.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: Texture,
    /// Multisampled colour target, resolved into the surface. `None` without MSAA.
    pub(crate) msaa_framebuffer: Option<Texture>,
    pub sample_count: u32,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub layouts: Layouts,
    pub pipelines: Pipelines,
    pub materials: Materials,
    pub camera: CameraResources,
    pub projection: Projection,
    pub viewport: Viewport,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>, settings: &Settings) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let viewport = Viewport::new(size.width, size.height, window.scale_factor());
        let [width, height] = viewport.resolution();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
                } else {
                    wgpu::Limits::default().using_resolution(adapter.limits())
                },
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Colours are authored in sRGB and converted to linear before they reach the GPU,
        // so an sRGB surface is needed for them to come out as authored.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface is not supported by the adapter"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let sample_count = supported_sample_count(&adapter, surface_format);
        log::info!("Rendering with {sample_count}x multisampling");
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let layouts = Layouts::new(&device);
        let pipelines = Pipelines::new(&device, config.format, sample_count, &layouts);

        let materials = Materials {
            baked: BakedMaterial::new(&device, &layouts.texture, Texture::placeholder(&device, &queue)),
            pole_light: FlatMaterial::new(
                &device,
                &layouts.colour,
                settings.pole_light_colour,
                "pole_light_material",
            ),
            portal: FlatMaterial::new(&device, &layouts.colour, settings.portal_colour, "portal_material"),
        };

        let camera = Camera::new(settings.camera_position, settings.camera_target);
        let projection = Projection::new(
            viewport.window[0].max(1),
            viewport.window[1],
            cgmath::Deg(settings.fov_degrees),
            settings.znear,
            settings.zfar,
        );
        let mut controls =
            OrbitControls::new(&camera, projection.fovy(), viewport.window[1], settings.damping_factor);
        controls.max_distance = settings.zfar;

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layouts.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let camera = CameraResources {
            camera,
            controls,
            uniform: camera_uniform,
            buffer: camera_buffer,
            bind_group: camera_bind_group,
        };

        let depth_texture =
            Texture::create_depth_texture(&device, [width, height], sample_count, "depth_texture");
        let msaa_framebuffer = (sample_count > 1).then(|| {
            Texture::create_msaa_framebuffer(
                &device,
                config.format,
                [width, height],
                sample_count,
                "msaa_framebuffer",
            )
        });

        Ok(Self {
            window,
            depth_texture,
            msaa_framebuffer,
            sample_count,
            surface,
            device,
            queue,
            config,
            layouts,
            pipelines,
            materials,
            camera,
            projection,
            viewport,
            clear_colour: settings.clear_colour.to_wgpu(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Colour attachment of the scene and overlay passes for a surface view.
    ///
    /// With MSAA the passes draw into the multisampled framebuffer and resolve
    /// into `surface_view`; without it they draw into the surface directly.
    pub fn colour_target<'a>(
        &'a self,
        surface_view: &'a wgpu::TextureView,
    ) -> (&'a wgpu::TextureView, Option<&'a wgpu::TextureView>) {
        match &self.msaa_framebuffer {
            Some(framebuffer) => (&framebuffer.view, Some(surface_view)),
            None => (surface_view, None),
        }
    }

    /// Follow a new window size and scale factor.
    ///
    /// Reconfigures the surface, the depth buffer and the multisampled
    /// framebuffer at the viewport's render size, updates the projection's
    /// aspect ratio and returns the new viewport. Zero-sized windows
    /// (minimised) are ignored and return `None`.
    pub fn resize(&mut self, width: u32, height: u32, scale_factor: f64) -> Option<Viewport> {
        if width == 0 || height == 0 {
            return None;
        }
        self.viewport = Viewport::new(width, height, scale_factor);
        let [render_width, render_height] = self.viewport.resolution();
        self.config.width = render_width;
        self.config.height = render_height;
        self.surface.configure(&self.device, &self.config);
        self.projection.resize(width, height);
        self.camera.controls.set_viewport_height(height);
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [render_width, render_height],
            self.sample_count,
            "depth_texture",
        );
        if self.msaa_framebuffer.is_some() {
            self.msaa_framebuffer = Some(Texture::create_msaa_framebuffer(
                &self.device,
                self.config.format,
                [render_width, render_height],
                self.sample_count,
                "msaa_framebuffer",
            ));
        }
        log::debug!(
            "Resized to {}x{}, rendering {}x{} at pixel ratio {}",
            width,
            height,
            render_width,
            render_height,
            self.viewport.pixel_ratio
        );
        Some(self.viewport)
    }
}

/// [`MSAA_SAMPLES`] if both the surface and the depth format support it, 1 otherwise.
fn supported_sample_count(adapter: &wgpu::Adapter, surface_format: wgpu::TextureFormat) -> u32 {
    let supported = [surface_format, Texture::DEPTH_FORMAT].into_iter().all(|format| {
        adapter
            .get_texture_format_features(format)
            .flags
            .sample_count_supported(MSAA_SAMPLES)
    });
    if supported { MSAA_SAMPLES } else { 1 }
}
