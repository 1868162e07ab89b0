//! Application event loop.
//!
//! This module owns the winit event loop and the per-frame flow of the scene.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and the GPU [`Context`], spawns the
//!    firefly cloud and starts loading the baked texture and the model
//! 2. Load results come back as [`PortalEvent`]s through the event loop proxy
//!    and are uploaded to the GPU on the event loop thread
//! 3. Window events go to the debug panel first, then to the orbit controls,
//!    which only track the cursor for events the panel consumed
//! 4. Every redraw advances the clock, steps the controls, draws the scene and
//!    the panel, presents and requests the next redraw
//!
//! Failed loads are logged and leave the rest of the scene rendering.

use std::{iter, sync::Arc};

use image::RgbaImage;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    context::Context,
    data_structures::texture::Texture,
    debug::{DebugPanel, DebugValues},
    particles::{Fireflies, FireflyField, FireflyUniform},
    render::draw_scene,
    resources::{load_baked_image, load_gltf_scene, model::ModelScene},
    scene::{self, SceneGraph, SceneNode},
    settings::Settings,
};

/// Monotonic time since the scene started.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}

/// Results of asynchronous work, delivered back to the event loop.
#[derive(Debug)]
pub enum PortalEvent {
    /// GPU setup finished. Only the browser sets up asynchronously.
    #[cfg(target_arch = "wasm32")]
    Initialized(anyhow::Result<AppState>),
    BakedTexture(anyhow::Result<RgbaImage>),
    Model(anyhow::Result<ModelScene>),
}

/// Everything that exists once the GPU is up.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    scene: SceneGraph,
    debug: DebugPanel,
    clock: Clock,
}

impl AppState {
    async fn new(window: Arc<Window>, settings: &Settings) -> anyhow::Result<Self> {
        let ctx = Context::new(window, settings).await?;

        let field = FireflyField::generate(&mut rand::rng(), settings.firefly_count);
        let uniform = FireflyUniform::new(
            settings.firefly_size,
            ctx.viewport.pixel_ratio,
            ctx.viewport.resolution(),
        );
        let mut scene = SceneGraph::default();
        scene.add(SceneNode::Points(Fireflies::new(
            &ctx.device,
            &ctx.layouts,
            field,
            uniform,
        )));

        let debug = DebugPanel::new(
            &ctx.window,
            &ctx.device,
            ctx.config.format,
            ctx.sample_count,
            DebugValues::new(settings.firefly_size, settings.clear_colour),
            settings.panel_width,
        );

        Ok(Self {
            ctx,
            scene,
            debug,
            clock: Clock::start(),
        })
    }

    fn resize(&mut self, width: u32, height: u32, scale_factor: f64) {
        let Some(viewport) = self.ctx.resize(width, height, scale_factor) else {
            return;
        };
        for fireflies in self.scene.fireflies_mut() {
            fireflies.uniform.set_viewport(&viewport);
            fireflies.write_to_buffer(&self.ctx.queue);
        }
    }

    fn resize_to_window(&mut self) {
        let size = self.ctx.window.inner_size();
        let scale_factor = self.ctx.window.scale_factor();
        self.resize(size.width, size.height, scale_factor);
    }

    fn on_baked_texture(&mut self, image: RgbaImage) {
        let texture = Texture::from_image(
            &self.ctx.device,
            &self.ctx.queue,
            &image,
            Some("baked_texture"),
        );
        self.ctx
            .materials
            .baked
            .set_texture(&self.ctx.device, texture);
        log::info!(
            "Baked texture uploaded ({}x{})",
            image.width(),
            image.height()
        );
    }

    fn on_model(&mut self, model: ModelScene) {
        match scene::assemble(&self.ctx.device, &model) {
            Ok(assembled) => {
                log::info!("Model assembled with {} meshes", assembled.meshes.len());
                self.scene.add(SceneNode::Model(assembled));
            }
            Err(e) => log::error!("Model not added to the scene: {}", e),
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let elapsed = self.clock.elapsed_secs();
        for fireflies in self.scene.fireflies_mut() {
            fireflies.uniform.set_time(elapsed);
            fireflies.write_to_buffer(&self.ctx.queue);
        }
        self.ctx.camera.update(&self.ctx.queue, &self.ctx.projection);

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        // With MSAA the scene stays multisampled until the panel pass resolves it.
        let (target, resolve_target) = self.ctx.colour_target(&view);
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            draw_scene(
                &mut render_pass,
                &self.ctx.pipelines,
                &self.ctx.materials,
                &self.ctx.camera.bind_group,
                &self.scene,
            );
        }

        let changed = self.debug.render(
            &self.ctx.device,
            &self.ctx.queue,
            &mut encoder,
            &self.ctx.window,
            target,
            resolve_target,
            &self.ctx.viewport,
        );

        self.ctx.queue.submit(iter::once(encoder.finish()));
        self.ctx.window.pre_present_notify();
        output.present();

        // Edits show up on the next frame.
        if changed {
            let values = self.debug.values();
            self.ctx.clear_colour = values.clear_colour_wgpu();
            for fireflies in self.scene.fireflies_mut() {
                values.apply_to_fireflies(&mut fireflies.uniform);
            }
            log::debug!(
                "Debug values changed: size {} clear colour {}",
                values.firefly_size(),
                values.clear_colour()
            );
        }

        Ok(())
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<PortalEvent>,
    settings: Settings,
    state: Option<AppState>,
}

impl App {
    fn new(event_loop: &EventLoop<PortalEvent>, settings: Settings) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            settings,
            state: None,
        })
    }

    /// Start loading the baked texture and the model. Both run concurrently and
    /// land in `user_event` in whatever order they finish.
    fn spawn_loads(&self) {
        let texture = self.settings.baked_texture.clone();
        self.spawn_load(async move { PortalEvent::BakedTexture(load_baked_image(&texture).await) });
        let model = self.settings.model.clone();
        self.spawn_load(async move { PortalEvent::Model(load_gltf_scene(&model).await) });
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn spawn_load<F>(&self, load: F)
    where
        F: Future<Output = PortalEvent> + Send + 'static,
    {
        let proxy = self.proxy.clone();
        self.async_runtime.spawn(async move {
            if proxy.send_event(load.await).is_err() {
                log::warn!("Event loop closed before a load finished");
            }
        });
    }

    #[cfg(target_arch = "wasm32")]
    fn spawn_load<F>(&self, load: F)
    where
        F: Future<Output = PortalEvent> + 'static,
    {
        let proxy = self.proxy.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if proxy.send_event(load.await).is_err() {
                log::warn!("Event loop closed before a load finished");
            }
        });
    }

    fn start(&mut self, event_loop: &ActiveEventLoop, state: anyhow::Result<AppState>) {
        match state {
            Ok(mut state) => {
                state.resize_to_window();
                state.ctx.window.request_redraw();
                self.state = Some(state);
                self.spawn_loads();
            }
            Err(e) => {
                log::error!("Cannot create the rendering context: {:#}", e);
                event_loop.exit();
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn webgl_canvas() -> anyhow::Result<web_sys::HtmlCanvasElement> {
    use wasm_bindgen::JsCast;

    const CANVAS_SELECTOR: &str = "canvas.webgl";

    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| anyhow::anyhow!("no document"))?;
    let element = document
        .query_selector(CANVAS_SELECTOR)
        .map_err(|e| anyhow::anyhow!("invalid selector: {e:?}"))?
        .ok_or_else(|| anyhow::anyhow!("no element matches {CANVAS_SELECTOR}"))?;
    element
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(|_| anyhow::anyhow!("{CANVAS_SELECTOR} is not a canvas"))
}

impl ApplicationHandler<PortalEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.settings.title);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            match webgl_canvas() {
                Ok(canvas) => window_attributes = window_attributes.with_canvas(Some(canvas)),
                Err(e) => {
                    log::error!("Cannot find the render target: {:#}", e);
                    event_loop.exit();
                    return;
                }
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let state = self
                .async_runtime
                .block_on(AppState::new(window, &self.settings));
            self.start(event_loop, state);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let settings = self.settings.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let state = AppState::new(window, &settings).await;
                if proxy.send_event(PortalEvent::Initialized(state)).is_err() {
                    log::error!("Event loop closed before the context was ready");
                }
            });
        }
    }

    #[cfg_attr(not(target_arch = "wasm32"), allow(unused_variables))]
    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: PortalEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            PortalEvent::Initialized(state) => self.start(event_loop, state),
            PortalEvent::BakedTexture(result) => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match result {
                    Ok(image) => state.on_baked_texture(image),
                    Err(e) => log::error!(
                        "Failed to load baked texture {}: {:#}",
                        self.settings.baked_texture,
                        e
                    ),
                }
            }
            PortalEvent::Model(result) => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match result {
                    Ok(model) => state.on_model(model),
                    Err(e) => log::error!("Failed to load model {}: {:#}", self.settings.model, e),
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        let consumed = state.debug.handle_window_event(&state.ctx.window, &event);
        state
            .ctx
            .camera
            .controls
            .handle_window_event(&event, consumed);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let scale_factor = state.ctx.window.scale_factor();
                state.resize(size.width, size.height, scale_factor);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = state.ctx.window.inner_size();
                state.resize(size.width, size.height, scale_factor);
            }
            WindowEvent::RedrawRequested => {
                // invoke main render loop
                state.ctx.window.request_redraw();
                match state.render() {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.resize_to_window();
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Open the window and run the scene until it is closed.
pub fn run(settings: Settings) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)?;
    }

    log::info!("Starting {}", settings.title);

    let event_loop: EventLoop<PortalEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, settings)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
