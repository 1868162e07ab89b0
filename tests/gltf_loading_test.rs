use pollster::block_on;
use portal_scene::resources::model::ModelScene;

use crate::common::test_utils::{GlbBuilder, PORTAL_CHILDREN, draco_triangle};

mod common;

#[test]
fn should_keep_top_level_children_in_order() {
    let bytes = PORTAL_CHILDREN
        .iter()
        .fold(GlbBuilder::new(), |builder, name| builder.child(name))
        .build();

    let scene = block_on(ModelScene::from_slice(&bytes)).expect("model should parse");

    let names: Vec<_> = scene.child_names().collect();
    assert_eq!(names, PORTAL_CHILDREN);
}

#[test]
fn should_read_triangles_and_uvs() {
    let bytes = GlbBuilder::new().child("baked").build();

    let scene = block_on(ModelScene::from_slice(&bytes)).unwrap();

    let meshes = &scene.children[0].meshes;
    assert_eq!(meshes.len(), 1);
    assert_eq!(meshes[0].indices, vec![0, 1, 2]);
    let positions: Vec<_> = meshes[0].vertices.iter().map(|v| v.position).collect();
    assert_eq!(
        positions,
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
    );
    assert_eq!(meshes[0].vertices[2].tex_coords, [0.0, 0.0]);
    assert_eq!(meshes[0].vertices[1].tex_coords, [1.0, 1.0]);
}

#[test]
fn should_bake_node_transforms_into_positions() {
    let bytes = GlbBuilder::new()
        .child_at("POrtal", [0.0, 2.0, -1.0])
        .build();

    let scene = block_on(ModelScene::from_slice(&bytes)).unwrap();

    let first = scene.children[0].meshes[0].vertices[0].position;
    assert_eq!(first, [0.0, 2.0, -1.0]);
}

#[test]
fn should_decode_draco_compressed_models() {
    let plain = PORTAL_CHILDREN
        .iter()
        .fold(GlbBuilder::new(), |builder, name| builder.child(name))
        .build();
    let compressed = PORTAL_CHILDREN
        .iter()
        .fold(GlbBuilder::new().draco(), |builder, name| builder.child(name))
        .build();

    let plain = block_on(ModelScene::from_slice(&plain)).unwrap();
    let scene = block_on(ModelScene::from_slice(&compressed)).expect("Draco model should parse");

    assert_eq!(scene.child_names().collect::<Vec<_>>(), PORTAL_CHILDREN);
    let mesh = &scene.children[3].meshes[0];
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
    assert_eq!(mesh.vertices[0].tex_coords, [0.0, 1.0]);
    assert_eq!(scene, plain);
}

#[test]
fn should_bake_node_transforms_into_draco_positions() {
    let bytes = GlbBuilder::new()
        .draco()
        .child_at("POrtal", [0.0, 2.0, -1.0])
        .build();

    let scene = block_on(ModelScene::from_slice(&bytes)).unwrap();

    let top = scene.children[0].meshes[0].vertices[2].position;
    assert_eq!(top, [0.0, 3.0, -1.0]);
}

#[test]
fn should_fail_on_a_payload_that_is_not_draco() {
    let bytes = GlbBuilder::new()
        .child("baked")
        .draco_payload(b"not a draco bitstream".to_vec())
        .build();

    let err = block_on(ModelScene::from_slice(&bytes)).unwrap_err();

    assert!(
        format!("{err:#}").contains("not a Draco bitstream"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn should_fail_on_a_truncated_draco_payload() {
    let mut payload = draco_triangle();
    payload.truncate(20);
    let bytes = GlbBuilder::new()
        .child("baked")
        .draco_payload(payload)
        .build();

    assert!(block_on(ModelScene::from_slice(&bytes)).is_err());
}

#[test]
fn should_still_reject_unknown_required_extensions() {
    let bytes = GlbBuilder::new()
        .child("baked")
        .require_extension("EXT_meshopt_compression")
        .build();

    let err = block_on(ModelScene::from_slice(&bytes)).unwrap_err();

    assert!(
        format!("{err:#}").contains("EXT_meshopt_compression"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn should_fail_on_garbage() {
    assert!(block_on(ModelScene::from_slice(b"definitely not a model")).is_err());
}
