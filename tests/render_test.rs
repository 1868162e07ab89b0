#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod gpu {
    use std::iter;

    use cgmath::Deg;
    use portal_scene::{
        camera::{Camera, CameraUniform, Projection},
        colour::Srgb,
        data_structures::{
            model::{BakedMaterial, FlatMaterial, Materials},
            texture::Texture,
        },
        particles::{Fireflies, FireflyField, FireflyUniform},
        pipelines::{Layouts, Pipelines},
        render::draw_scene,
        resources::model::ModelScene,
        scene::{self, SceneGraph, SceneNode},
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use wgpu::util::DeviceExt;

    use crate::common::test_utils::{GlbBuilder, PORTAL_CHILDREN, headless_device, read_texture};

    // 64 * 4 bytes keeps rows aligned for the readback copy.
    const SIZE: u32 = 64;
    const SAMPLES: u32 = 4;
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
    const CLEAR: Srgb = Srgb::from_hex(0x201919);

    struct Offscreen {
        device: wgpu::Device,
        queue: wgpu::Queue,
        layouts: Layouts,
        pipelines: Pipelines,
        materials: Materials,
        camera_bind_group: wgpu::BindGroup,
        msaa: Texture,
        target: wgpu::Texture,
        depth: Texture,
    }

    impl Offscreen {
        fn new() -> Option<Self> {
            let (device, queue) = headless_device()?;
            let layouts = Layouts::new(&device);
            let pipelines = Pipelines::new(&device, FORMAT, SAMPLES, &layouts);
            let materials = Materials {
                baked: BakedMaterial::new(
                    &device,
                    &layouts.texture,
                    Texture::placeholder(&device, &queue),
                ),
                pole_light: FlatMaterial::new(
                    &device,
                    &layouts.colour,
                    Srgb::from_hex(0xffffe5),
                    "pole_light_material",
                ),
                portal: FlatMaterial::new(&device, &layouts.colour, Srgb::WHITE, "portal_material"),
            };

            let camera = Camera::new([4.0, 2.0, 4.0], [0.0, 0.0, 0.0]);
            let projection = Projection::new(SIZE, SIZE, Deg(45.0), 0.1, 100.0);
            let mut uniform = CameraUniform::new();
            uniform.update_view_proj(&camera, &projection);
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Camera Buffer"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &layouts.camera,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
                label: Some("camera_bind_group"),
            });

            let target = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Test Output Texture"),
                size: wgpu::Extent3d {
                    width: SIZE,
                    height: SIZE,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: FORMAT,
                usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let msaa = Texture::create_msaa_framebuffer(
                &device,
                FORMAT,
                [SIZE, SIZE],
                SAMPLES,
                "msaa_framebuffer",
            );
            let depth = Texture::create_depth_texture(&device, [SIZE, SIZE], SAMPLES, "depth_texture");

            Some(Self {
                device,
                queue,
                layouts,
                pipelines,
                materials,
                camera_bind_group,
                msaa,
                target,
                depth,
            })
        }

        fn fireflies(&self, size: f32) -> Fireflies {
            let field = FireflyField::generate(&mut ChaCha8Rng::seed_from_u64(11), 30);
            let uniform = FireflyUniform::new(size, 1.0, [SIZE, SIZE]);
            Fireflies::new(&self.device, &self.layouts, field, uniform)
        }

        fn render(&self, scene: &SceneGraph) -> image::RgbaImage {
            let view = self
                .target
                .create_view(&wgpu::TextureViewDescriptor::default());
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Test Encoder"),
                });
            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Test Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.msaa.view,
                        depth_slice: None,
                        resolve_target: Some(&view),
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(CLEAR.to_wgpu()),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth.view,
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
                    &self.pipelines,
                    &self.materials,
                    &self.camera_bind_group,
                    scene,
                );
            }
            self.queue.submit(iter::once(encoder.finish()));
            read_texture(&self.device, &self.queue, &self.target, SIZE, SIZE)
        }
    }

    fn is_clear(pixel: &image::Rgba<u8>) -> bool {
        pixel
            .0
            .iter()
            .zip(CLEAR.0)
            .all(|(&actual, expected)| actual.abs_diff(expected) <= 1)
    }

    #[test]
    fn should_render_clear_colour() {
        let Some(gpu) = Offscreen::new() else {
            eprintln!("No adapter available, skipping");
            return;
        };

        let image = gpu.render(&SceneGraph::default());

        for pixel in image.pixels() {
            assert!(is_clear(pixel), "unexpected pixel {pixel:?}");
        }
    }

    #[test]
    fn should_create_depth_buffers_as_attachments_only() {
        let Some((device, _queue)) = headless_device() else {
            eprintln!("No adapter available, skipping");
            return;
        };

        let depth = Texture::create_depth_texture(&device, [SIZE, SIZE], SAMPLES, "depth_texture");

        assert_eq!(depth.texture.usage(), wgpu::TextureUsages::RENDER_ATTACHMENT);
        assert_eq!(depth.texture.sample_count(), SAMPLES);
        assert_eq!(depth.texture.format(), Texture::DEPTH_FORMAT);
    }

    #[test]
    fn should_add_fireflies_on_top_of_the_background() {
        let Some(gpu) = Offscreen::new() else {
            eprintln!("No adapter available, skipping");
            return;
        };
        let mut scene = SceneGraph::default();
        scene.add(SceneNode::Points(gpu.fireflies(200.0)));

        let image = gpu.render(&scene);

        let brightest = image.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        assert!(brightest > CLEAR.0[0] + 40, "brightest red {brightest}");
        let background = image.pixels().filter(|p| is_clear(p)).count();
        assert!(background > (SIZE * SIZE / 2) as usize);
    }

    #[test]
    fn should_draw_the_assembled_model() {
        let Some(gpu) = Offscreen::new() else {
            eprintln!("No adapter available, skipping");
            return;
        };
        let bytes = PORTAL_CHILDREN
            .iter()
            .fold(GlbBuilder::new(), |builder, name| builder.child(name))
            .build();
        let model = pollster::block_on(ModelScene::from_slice(&bytes)).unwrap();
        let mut scene = SceneGraph::default();
        scene.add(SceneNode::Model(scene::assemble(&gpu.device, &model).unwrap()));

        let image = gpu.render(&scene);

        assert!(image.pixels().any(|p| !is_clear(p)));
    }

    #[test]
    fn should_blend_triangle_edges_into_the_background() {
        let Some(gpu) = Offscreen::new() else {
            eprintln!("No adapter available, skipping");
            return;
        };
        let bytes = GlbBuilder::new().child("baked").build();
        let model = pollster::block_on(ModelScene::from_slice(&bytes)).unwrap();
        let mut scene = SceneGraph::default();
        scene.add(SceneNode::Model(scene::assemble(&gpu.device, &model).unwrap()));

        let image = gpu.render(&scene);

        // The placeholder texture is white, so only resolved edge samples land in between.
        let blended = image
            .pixels()
            .filter(|p| p.0[1] > CLEAR.0[1] + 8 && p.0[1] < 247)
            .count();
        assert!(blended > 0);
    }
}
