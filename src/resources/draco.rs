//! `KHR_draco_mesh_compression` support.
//!
//! Compressed primitives point at a buffer view holding a Draco bitstream
//! instead of plain accessors. They are decoded up front, before the scene
//! is walked, so the walk itself stays synchronous.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, bail};
use draco_decoder::{AttributeDataType, DracoDecodeConfig, MeshDecodeResult};
use gltf::json::{Path, Value};

pub const EXTENSION: &str = "KHR_draco_mesh_compression";

const MAGIC: &[u8] = b"DRACO";

/// Geometry of one compressed primitive, in mesh space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedPrimitive {
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
}

/// Decoded primitives keyed by `(mesh index, primitive index)`.
pub type DecodedPrimitives = HashMap<(usize, usize), DecodedPrimitive>;

struct Compressed {
    buffer_view: usize,
    position: u32,
    tex_coord: Option<u32>,
}

impl Compressed {
    fn from_primitive(primitive: &gltf::Primitive) -> anyhow::Result<Option<Self>> {
        let Some(extension) = primitive.extension_value(EXTENSION) else {
            return Ok(None);
        };
        let buffer_view = extension
            .get("bufferView")
            .and_then(Value::as_u64)
            .with_context(|| format!("{EXTENSION} has no bufferView"))?;
        let attribute = |name: &str| {
            extension
                .get("attributes")
                .and_then(|attributes| attributes.get(name))
                .and_then(Value::as_u64)
                .map(|id| id as u32)
        };
        Ok(Some(Self {
            buffer_view: buffer_view as usize,
            position: attribute("POSITION")
                .with_context(|| format!("{EXTENSION} does not compress POSITION"))?,
            tex_coord: attribute("TEXCOORD_0"),
        }))
    }
}

/// Validation reports a Draco model raises only because the library does not
/// know the extension: the `extensionsRequired` entry, and the accessors of
/// compressed primitives, which carry no buffer view.
pub fn tolerated_validation_paths(root: &gltf::json::Root) -> HashSet<String> {
    let mut paths = HashSet::new();
    for (i, ext) in root.extensions_required.iter().enumerate() {
        if ext == EXTENSION {
            paths.insert(
                Path::new()
                    .field("extensionsRequired")
                    .index(i)
                    .value_str(ext)
                    .0,
            );
        }
    }
    let compressed = root
        .meshes
        .iter()
        .flat_map(|mesh| mesh.primitives.iter())
        .filter(|primitive| {
            primitive
                .extensions
                .as_ref()
                .is_some_and(|extensions| extensions.others.contains_key(EXTENSION))
        });
    for primitive in compressed {
        let accessors = primitive.attributes.values().chain(primitive.indices.iter());
        for accessor in accessors {
            paths.insert(
                Path::new()
                    .field("accessors")
                    .index(accessor.value())
                    .field("bufferView")
                    .0,
            );
        }
    }
    paths
}

/// Decode every compressed primitive of the document.
pub async fn decode_primitives(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
) -> anyhow::Result<DecodedPrimitives> {
    let mut decoded = HashMap::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let Some(compressed) = Compressed::from_primitive(&primitive)? else {
                continue;
            };
            let bytes = view_bytes(document, buffers, compressed.buffer_view)?;
            let geometry = decode(bytes, &compressed).await.with_context(|| {
                format!(
                    "could not decode primitive {} of mesh {:?}",
                    primitive.index(),
                    mesh.name()
                )
            })?;
            log::debug!(
                "Decoded {} Draco vertices for mesh {:?}.",
                geometry.positions.len(),
                mesh.name()
            );
            decoded.insert((mesh.index(), primitive.index()), geometry);
        }
    }
    Ok(decoded)
}

fn view_bytes<'a>(
    document: &gltf::Document,
    buffers: &'a [Vec<u8>],
    index: usize,
) -> anyhow::Result<&'a [u8]> {
    let view = document
        .views()
        .nth(index)
        .with_context(|| format!("buffer view {index} does not exist"))?;
    let buffer = buffers
        .get(view.buffer().index())
        .with_context(|| format!("buffer view {index} refers to a missing buffer"))?;
    buffer
        .get(view.offset()..view.offset() + view.length())
        .with_context(|| format!("buffer view {index} runs past the end of its buffer"))
}

async fn decode(bytes: &[u8], compressed: &Compressed) -> anyhow::Result<DecodedPrimitive> {
    if !bytes.starts_with(MAGIC) {
        bail!("payload is not a Draco bitstream");
    }
    let MeshDecodeResult { data, config } = decode_mesh(bytes)
        .await
        .context("the Draco decoder rejected the payload")?;

    let positions = read_attribute::<3>(&data, &config, compressed.position)?;
    let tex_coords = compressed
        .tex_coord
        .map(|id| read_attribute::<2>(&data, &config, id))
        .transpose()?;
    Ok(DecodedPrimitive {
        positions,
        tex_coords,
        indices: read_indices(&data, &config)?,
    })
}

#[cfg(not(target_arch = "wasm32"))]
async fn decode_mesh(bytes: &[u8]) -> Option<MeshDecodeResult> {
    // The native binding panics on bitstreams it cannot parse.
    std::panic::catch_unwind(|| draco_decoder::decode_mesh_with_config_sync(bytes))
        .ok()
        .flatten()
}

#[cfg(target_arch = "wasm32")]
async fn decode_mesh(bytes: &[u8]) -> Option<MeshDecodeResult> {
    draco_decoder::decode_mesh_with_config(bytes).await
}

fn read_indices(data: &[u8], config: &DracoDecodeConfig) -> anyhow::Result<Vec<u32>> {
    let count = config.index_count() as usize;
    if count == 0 {
        return Ok(Vec::new());
    }
    let length = config.index_length() as usize;
    let raw = data.get(..length).context("decoded indices are truncated")?;
    let indices = match length / count {
        2 => raw
            .chunks_exact(2)
            .map(|bytes| u32::from(bytemuck::pod_read_unaligned::<u16>(bytes)))
            .collect(),
        4 => raw
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<u32>)
            .collect(),
        width => bail!("decoded indices are {width} bytes wide"),
    };
    Ok(indices)
}

fn read_attribute<const N: usize>(
    data: &[u8],
    config: &DracoDecodeConfig,
    unique_id: u32,
) -> anyhow::Result<Vec<[f32; N]>> {
    let attribute = config
        .attributes()
        .into_iter()
        .find(|attribute| attribute.unique_id() == unique_id)
        .with_context(|| format!("the bitstream has no attribute {unique_id}"))?;
    if attribute.data_type() != AttributeDataType::Float32 || attribute.dim() as usize != N {
        bail!(
            "attribute {unique_id} holds {} {:?} components, expected {N} Float32",
            attribute.dim(),
            attribute.data_type()
        );
    }
    let start = attribute.offset() as usize;
    let raw = data
        .get(start..start + attribute.lenght() as usize)
        .with_context(|| format!("attribute {unique_id} is truncated"))?;
    Ok(raw
        .chunks_exact(4 * N)
        .map(|vertex| {
            std::array::from_fn(|i| bytemuck::pod_read_unaligned::<f32>(&vertex[4 * i..4 * i + 4]))
        })
        .collect())
}
