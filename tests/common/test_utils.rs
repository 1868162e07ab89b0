use portal_scene::resources::model::{MeshData, ModelNode, ModelScene};

const JSON_CHUNK: u32 = 0x4E4F_534A;
const BIN_CHUNK: u32 = 0x004E_4942;

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

const TRIANGLE_POSITIONS: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const TRIANGLE_UVS: [[f32; 2]; 3] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];

fn push_floats<'a>(out: &mut Vec<u8>, values: impl IntoIterator<Item = &'a f32>) {
    values
        .into_iter()
        .for_each(|v| out.extend_from_slice(&v.to_le_bytes()));
}

/// The builder's triangle as a Draco 2.2 bitstream.
///
/// Sequential encoding with raw connectivity and raw float attributes:
/// POSITION has unique id 0 and TEXCOORD_0 has unique id 1.
pub fn draco_triangle() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"DRACO");
    // version 2.2, triangular mesh, sequential method, no flags
    out.extend_from_slice(&[2, 2, 1, 0, 0, 0]);
    // one face, three points, raw connectivity with u8 indices
    out.extend_from_slice(&[1, 3, 1, 0, 1, 2]);
    // one attribute decoder holding two attributes
    out.extend_from_slice(&[1, 2]);
    // type, data type (float32), components, normalized, unique id
    out.extend_from_slice(&[0, 9, 3, 0, 0]);
    out.extend_from_slice(&[3, 9, 2, 0, 1]);
    // generic (uncompressed) value decoders
    out.extend_from_slice(&[0, 0]);
    push_floats(&mut out, TRIANGLE_POSITIONS.iter().flatten());
    push_floats(&mut out, TRIANGLE_UVS.iter().flatten());
    out
}

/// Builds small binary glTF files in memory.
///
/// Every child is a top-level node that references the same single-triangle
/// mesh: positions (0,0,0), (1,0,0), (0,1,0) with one UV per corner. With
/// [`GlbBuilder::draco`] the triangle is stored as a Draco payload instead.
#[derive(Default)]
pub struct GlbBuilder {
    children: Vec<(String, [f32; 3])>,
    extensions_required: Vec<String>,
    draco: Option<Vec<u8>>,
}

impl GlbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(self, name: &str) -> Self {
        self.child_at(name, [0.0; 3])
    }

    pub fn child_at(mut self, name: &str, translation: [f32; 3]) -> Self {
        self.children.push((name.to_string(), translation));
        self
    }

    pub fn require_extension(mut self, extension: &str) -> Self {
        self.extensions_required.push(extension.to_string());
        self
    }

    /// Compress the triangle with [`draco_triangle`].
    pub fn draco(self) -> Self {
        self.draco_payload(draco_triangle())
    }

    /// Store `payload` where the compressed triangle would go.
    pub fn draco_payload(mut self, payload: Vec<u8>) -> Self {
        self.draco = Some(payload);
        self.require_extension(DRACO_EXTENSION)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bin: Vec<u8> = Vec::new();
        let (accessors, views, compression) = match &self.draco {
            None => {
                push_floats(&mut bin, TRIANGLE_POSITIONS.iter().flatten());
                push_floats(&mut bin, TRIANGLE_UVS.iter().flatten());
                for i in [0u16, 1, 2] {
                    bin.extend_from_slice(&i.to_le_bytes());
                }
                (
                    r#"[{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]},{"bufferView":1,"componentType":5126,"count":3,"type":"VEC2"},{"bufferView":2,"componentType":5123,"count":3,"type":"SCALAR"}]"#.to_string(),
                    r#"[{"buffer":0,"byteOffset":0,"byteLength":36,"target":34962},{"buffer":0,"byteOffset":36,"byteLength":24,"target":34962},{"buffer":0,"byteOffset":60,"byteLength":6,"target":34963}]"#.to_string(),
                    String::new(),
                )
            }
            Some(payload) => {
                bin.extend_from_slice(payload);
                (
                    r#"[{"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]},{"componentType":5126,"count":3,"type":"VEC2"},{"componentType":5123,"count":3,"type":"SCALAR"}]"#.to_string(),
                    format!(r#"[{{"buffer":0,"byteOffset":0,"byteLength":{}}}]"#, payload.len()),
                    format!(
                        r#","extensions":{{"{DRACO_EXTENSION}":{{"bufferView":0,"attributes":{{"POSITION":0,"TEXCOORD_0":1}}}}}}"#
                    ),
                )
            }
        };
        let byte_length = bin.len();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let nodes = self
            .children
            .iter()
            .map(|(name, [x, y, z])| {
                format!(r#"{{"name":"{name}","mesh":0,"translation":[{x},{y},{z}]}}"#)
            })
            .collect::<Vec<_>>()
            .join(",");
        let scene_nodes = (0..self.children.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let extensions = if self.extensions_required.is_empty() {
            String::new()
        } else {
            let list = self
                .extensions_required
                .iter()
                .map(|ext| format!("\"{ext}\""))
                .collect::<Vec<_>>()
                .join(",");
            format!(r#""extensionsUsed":[{list}],"extensionsRequired":[{list}],"#)
        };

        let json = format!(
            r#"{{"asset":{{"version":"2.0"}},{extensions}"scene":0,"scenes":[{{"nodes":[{scene_nodes}]}}],"nodes":[{nodes}],"meshes":[{{"primitives":[{{"attributes":{{"POSITION":0,"TEXCOORD_0":1}},"indices":2{compression}}}]}}],"accessors":{accessors},"bufferViews":{views},"buffers":[{{"byteLength":{byte_length}}}]}}"#
        );
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(&JSON_CHUNK.to_le_bytes());
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(&BIN_CHUNK.to_le_bytes());
        glb.extend_from_slice(&bin);
        glb
    }
}

/// The four children the portal scene binds materials to.
pub const PORTAL_CHILDREN: [&str; 4] = ["baked", "LightRIght", "LightLEft", "POrtal"];

/// A CPU-side model with one empty child per name.
pub fn scene_with_children(names: &[&str]) -> ModelScene {
    ModelScene {
        children: names
            .iter()
            .map(|name| ModelNode::new(name, vec![MeshData::default()]))
            .collect(),
    }
}

#[cfg(feature = "integration-tests")]
pub fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .ok()
    })
}

#[cfg(feature = "integration-tests")]
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> image::RgbaImage {
    let u32_size = std::mem::size_of::<u32>() as u32;
    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        size: (u32_size * width * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        label: Some("Readback Buffer"),
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(u32_size * width),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = output_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .expect("device poll failed");
    rx.recv()
        .expect("map callback dropped")
        .expect("buffer mapping failed");

    let data = slice.get_mapped_range().to_vec();
    output_buffer.unmap();
    image::RgbaImage::from_raw(width, height, data).expect("readback size mismatch")
}
