//! glTF model loading.
//!
//! A loaded model is kept as plain CPU data: the direct children of the
//! scene root, each with its name and the triangles of its whole subtree in
//! world space. Scene assembly and GPU upload happen elsewhere.

use anyhow::{Context, bail};
use cgmath::{Matrix4, Point3, SquareMatrix, Transform};
use gltf::json::validation::Validate;

use crate::{
    data_structures::model::ModelVertex,
    resources::{
        draco::{self, DecodedPrimitives},
        load_binary,
    },
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

/// A direct child of the model's scene root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelNode {
    pub name: String,
    pub meshes: Vec<MeshData>,
}

impl ModelNode {
    pub fn new(name: &str, meshes: Vec<MeshData>) -> Self {
        Self {
            name: name.to_string(),
            meshes,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelScene {
    pub children: Vec<ModelNode>,
}

impl ModelScene {
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|child| child.name.as_str())
    }

    /// Parse a self-contained model (`.glb`, or `.gltf` without external buffers).
    pub async fn from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        let gltf = parse(bytes)?;
        let mut buffers = Vec::new();
        for buffer in gltf.buffers() {
            match buffer.source() {
                gltf::buffer::Source::Bin => buffers.push(
                    gltf.blob
                        .clone()
                        .context("model references a binary chunk it does not have")?,
                ),
                gltf::buffer::Source::Uri(uri) => {
                    bail!("buffer {uri:?} is external; load the model with load_gltf_scene")
                }
            }
        }
        Self::from_gltf(&gltf, &buffers).await
    }

    /// Collect the default scene (or the first one) of an already parsed document.
    ///
    /// Draco compressed primitives are decoded first.
    pub async fn from_gltf(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> anyhow::Result<Self> {
        let decoded = draco::decode_primitives(&gltf.document, buffers).await?;
        let scene = gltf
            .default_scene()
            .or_else(|| gltf.scenes().next())
            .context("model contains no scene")?;
        let children = scene
            .nodes()
            .map(|node| {
                let mut meshes = Vec::new();
                collect_meshes(&node, Matrix4::identity(), buffers, &decoded, &mut meshes)?;
                Ok(ModelNode::new(node.name().unwrap_or_default(), meshes))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { children })
    }
}

/// Parse and validate a document, letting through what Draco compression
/// legitimately leaves out.
fn parse(bytes: &[u8]) -> anyhow::Result<gltf::Gltf> {
    let gltf = gltf::Gltf::from_slice_without_validation(bytes).context("not a glTF model")?;
    let root = gltf.as_json();
    let tolerated = draco::tolerated_validation_paths(root);
    let mut errors = Vec::new();
    root.validate(root, gltf::json::Path::new, &mut |path, error| {
        let path = path();
        if !tolerated.contains(path.as_str()) {
            errors.push((path, error));
        }
    });
    if !errors.is_empty() {
        return Err(gltf::Error::Validation(errors)).context("invalid glTF model");
    }
    Ok(gltf)
}

/// Positions, UVs and indices of one primitive, read from its accessors or
/// taken from its decoded Draco payload.
fn read_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    decoded: &DecodedPrimitives,
) -> Option<(Vec<[f32; 3]>, Option<Vec<[f32; 2]>>, Option<Vec<u32>>)> {
    if let Some(geometry) = decoded.get(&(mesh.index(), primitive.index())) {
        return Some((
            geometry.positions.clone(),
            geometry.tex_coords.clone(),
            Some(geometry.indices.clone()),
        ));
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions = reader.read_positions()?.collect();
    let tex_coords = reader
        .read_tex_coords(0)
        .map(|tex_coords| tex_coords.into_f32().collect());
    let indices = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect());
    Some((positions, tex_coords, indices))
}

fn collect_meshes(
    node: &gltf::Node,
    parent: Matrix4<f32>,
    buffers: &[Vec<u8>],
    decoded: &DecodedPrimitives,
    out: &mut Vec<MeshData>,
) -> anyhow::Result<()> {
    let world = parent * Matrix4::from(node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping a {:?} primitive of mesh {:?}; only triangles are drawn.",
                    primitive.mode(),
                    mesh.name()
                );
                continue;
            }
            let Some((positions, tex_coords, indices)) =
                read_primitive(&mesh, &primitive, buffers, decoded)
            else {
                log::warn!("Skipping a primitive of mesh {:?} without positions.", mesh.name());
                continue;
            };
            let mut vertices: Vec<ModelVertex> = positions
                .into_iter()
                .map(|position| ModelVertex {
                    position: world.transform_point(Point3::from(position)).into(),
                    tex_coords: [0.0; 2],
                })
                .collect();
            if let Some(tex_coords) = tex_coords {
                vertices
                    .iter_mut()
                    .zip(tex_coords)
                    .for_each(|(vertex, uv)| vertex.tex_coords = uv);
            }
            let mut indices = indices.unwrap_or_else(|| (0..vertices.len() as u32).collect());
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                bail!(
                    "mesh {:?} indexes vertex {bad} but only has {}",
                    mesh.name(),
                    vertices.len()
                );
            }
            // Mirroring transforms flip the winding order.
            if world.determinant() < 0.0 {
                indices.chunks_exact_mut(3).for_each(|tri| tri.swap(1, 2));
            }
            if indices.len() < 3 {
                continue;
            }
            out.push(MeshData { vertices, indices });
        }
    }
    for child in node.children() {
        collect_meshes(&child, world, buffers, decoded, out)?;
    }
    Ok(())
}

fn resolve_uri(file_name: &str, uri: &str) -> String {
    match file_name.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{uri}"),
        None => uri.to_string(),
    }
}

/// Fetch and parse a model, following external buffer files next to it.
pub async fn load_gltf_scene(file_name: &str) -> anyhow::Result<ModelScene> {
    let bytes = load_binary(file_name).await?;
    let gltf = parse(&bytes).with_context(|| format!("could not load {file_name}"))?;

    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .context("model references a binary chunk it does not have")?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                bail!("{file_name} embeds its buffers as data URIs, which are not supported")
            }
            gltf::buffer::Source::Uri(uri) => load_binary(&resolve_uri(file_name, uri)).await?,
        };
        buffers.push(data);
    }
    ModelScene::from_gltf(&gltf, &buffers).await
}
