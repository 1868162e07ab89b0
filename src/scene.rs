//! Scene assembly and the scene graph.
//!
//! The portal model is expected to carry four top-level children with fixed
//! names. [`MeshBindings::resolve`] validates all of them up front and either
//! returns the full binding or an [`AssemblyError`]; nothing is bound when any
//! name is missing, and the rest of the scene keeps rendering.

use std::collections::HashMap;

use crate::{
    data_structures::model::{MaterialSlot, Mesh},
    error::AssemblyError,
    particles::Fireflies,
    resources::model::ModelScene,
};

/// What a named sub-mesh stands for in the portal scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshRole {
    Baked,
    PoleLightRight,
    PoleLightLeft,
    Portal,
}

impl MeshRole {
    pub const ALL: [MeshRole; 4] = [
        MeshRole::Baked,
        MeshRole::PoleLightRight,
        MeshRole::PoleLightLeft,
        MeshRole::Portal,
    ];

    /// Node name as exported from the modelling tool.
    pub fn node_name(self) -> &'static str {
        match self {
            MeshRole::Baked => "baked",
            MeshRole::PoleLightRight => "LightRIght",
            MeshRole::PoleLightLeft => "LightLEft",
            MeshRole::Portal => "POrtal",
        }
    }

    pub fn material(self) -> MaterialSlot {
        match self {
            MeshRole::Baked => MaterialSlot::Baked,
            MeshRole::PoleLightRight | MeshRole::PoleLightLeft => MaterialSlot::PoleLight,
            MeshRole::Portal => MaterialSlot::Portal,
        }
    }
}

/// Validated mapping from each role to the index of its top-level child.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshBindings {
    by_role: HashMap<MeshRole, usize>,
}

impl MeshBindings {
    pub fn resolve(scene: &ModelScene) -> Result<Self, AssemblyError> {
        let mut by_role = HashMap::new();
        let mut missing = Vec::new();
        for role in MeshRole::ALL {
            let name = role.node_name();
            let mut matches = scene
                .children
                .iter()
                .enumerate()
                .filter(|(_, child)| child.name == name)
                .map(|(idx, _)| idx);
            match (matches.next(), matches.count()) {
                (Some(idx), 0) => {
                    by_role.insert(role, idx);
                }
                (Some(_), others) => {
                    return Err(AssemblyError::DuplicateMesh {
                        name: name.to_string(),
                        count: others + 1,
                    });
                }
                (None, _) => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(AssemblyError::MissingMesh { names: missing });
        }
        Ok(Self { by_role })
    }

    pub fn child(&self, role: MeshRole) -> Option<usize> {
        self.by_role.get(&role).copied()
    }

    /// Material for the top-level child at `idx`. Children without a role keep
    /// the baked material.
    pub fn material_for(&self, idx: usize) -> MaterialSlot {
        self.by_role
            .iter()
            .find(|(_, child)| **child == idx)
            .map(|(role, _)| role.material())
            .unwrap_or(MaterialSlot::Baked)
    }
}

/// The portal model on the GPU with every mesh tagged by its material.
#[derive(Debug)]
pub struct AssembledModel {
    pub meshes: Vec<(Mesh, MaterialSlot)>,
}

impl AssembledModel {
    pub fn upload(device: &wgpu::Device, scene: &ModelScene, bindings: &MeshBindings) -> Self {
        let meshes = scene
            .children
            .iter()
            .enumerate()
            .flat_map(|(idx, child)| {
                let slot = bindings.material_for(idx);
                child
                    .meshes
                    .iter()
                    .map(move |data| (Mesh::new(device, &child.name, data), slot))
            })
            .collect();
        Self { meshes }
    }
}

/// Resolve the bindings of a freshly loaded model and upload it.
pub fn assemble(
    device: &wgpu::Device,
    scene: &ModelScene,
) -> Result<AssembledModel, AssemblyError> {
    let bindings = MeshBindings::resolve(scene)?;
    Ok(AssembledModel::upload(device, scene, &bindings))
}

#[derive(Debug)]
pub enum SceneNode {
    Model(AssembledModel),
    Points(Fireflies),
}

/// Ordered set of everything that gets drawn.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn add(&mut self, node: SceneNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn fireflies_mut(&mut self) -> impl Iterator<Item = &mut Fireflies> {
        self.nodes.iter_mut().filter_map(|node| match node {
            SceneNode::Points(fireflies) => Some(fireflies),
            SceneNode::Model(_) => None,
        })
    }
}
