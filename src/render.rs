//! Render composition and pipeline batching.
//!
//! Scene nodes describe themselves as a [`Render`]; the frame collects all of
//! them into per-pipeline batches and draws opaque meshes before the additive
//! fireflies, regardless of the order nodes were added to the scene graph.

use crate::{
    data_structures::model::{DrawModel, MaterialSlot, Materials, Mesh},
    particles::Fireflies,
    pipelines::Pipelines,
    scene::{SceneGraph, SceneNode},
};

/// Specifies how a scene object should be rendered.
///
/// - `None` renders nothing
/// - `Mesh` renders one opaque mesh with one of the portal materials
/// - `Points` renders a firefly cloud with additive blending
/// - `Composed` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Mesh {
        mesh: &'a Mesh,
        material: MaterialSlot,
    },
    Points(&'a Fireflies),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(
        self,
        baked: &mut Vec<&'a Mesh>,
        flat: &mut Vec<(&'a Mesh, MaterialSlot)>,
        points: &mut Vec<&'a Fireflies>,
    ) {
        match self {
            Render::Mesh {
                mesh,
                material: MaterialSlot::Baked,
            } => baked.push(mesh),
            Render::Mesh { mesh, material } => flat.push((mesh, material)),
            Render::Points(fireflies) => points.push(fireflies),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(baked, flat, points)),
            Render::None => (),
        }
    }
}

impl<'a> From<&'a SceneNode> for Render<'a> {
    fn from(node: &'a SceneNode) -> Self {
        match node {
            SceneNode::Model(model) => Render::Composed(
                model
                    .meshes
                    .iter()
                    .map(|(mesh, material)| Render::Mesh {
                        mesh,
                        material: *material,
                    })
                    .collect(),
            ),
            SceneNode::Points(fireflies) if fireflies.field.is_empty() => Render::None,
            SceneNode::Points(fireflies) => Render::Points(fireflies),
        }
    }
}

/// Record the draw calls for the whole scene graph into `render_pass`.
pub fn draw_scene(
    render_pass: &mut wgpu::RenderPass<'_>,
    pipelines: &Pipelines,
    materials: &Materials,
    camera_bind_group: &wgpu::BindGroup,
    scene: &SceneGraph,
) {
    let mut baked: Vec<&Mesh> = Vec::new();
    let mut flat: Vec<(&Mesh, MaterialSlot)> = Vec::new();
    let mut points: Vec<&Fireflies> = Vec::new();
    scene
        .nodes()
        .iter()
        .for_each(|node| Render::from(node).set_pipelines(&mut baked, &mut flat, &mut points));

    render_pass.set_pipeline(&pipelines.baked);
    for mesh in baked {
        render_pass.draw_mesh(mesh, materials.bind_group(MaterialSlot::Baked), camera_bind_group);
    }

    render_pass.set_pipeline(&pipelines.flat);
    for (mesh, material) in flat {
        render_pass.draw_mesh(mesh, materials.bind_group(material), camera_bind_group);
    }

    render_pass.set_pipeline(&pipelines.fireflies);
    for fireflies in points {
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        render_pass.set_bind_group(1, &fireflies.bind_group, &[]);
        render_pass.set_vertex_buffer(0, fireflies.instance_buffer.slice(..));
        // six vertices per sprite quad
        render_pass.draw(0..6, 0..fireflies.field.len() as u32);
    }
}
