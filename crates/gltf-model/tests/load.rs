mod common;

use common::{floats, glb, load, load_with};
use gltf_model::{ErrorKind, LoadOptions, LoadStage, MemoryArchive, ModelState};

fn minimal() -> serde_json::Value {
    serde_json::json!({
        "asset": { "version": "2.0" },
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
        "buffers": [{ "byteLength": 36 }]
    })
}

#[test]
fn minimal_glb() {
    let bytes = glb(&minimal(), Some(&[0; 36]));
    let model = load("minimal.glb", &bytes);
    assert_eq!(*model.state(), ModelState::Valid);

    let scene = model.scene();
    assert_eq!(scene.meshes.len(), 1);
    assert_eq!(scene.meshes[0].vertices.len(), 3);
    assert!(scene.meshes[0]
        .vertices
        .iter()
        .all(|vertex| vertex.position == [0.0; 3]));
    assert_eq!(scene.meshes[0].indices, vec![0, 1, 2]);
    assert_eq!(scene.nodes.len(), 1);
    assert_eq!(scene.roots, vec![0]);
    assert_eq!(model.bone_count(), 0);
    assert!(!model.has_skinning());
    assert_eq!(model.diagnostics().total_failures(), 0);
}

#[test]
fn declared_length_exceeds_slice() {
    let mut bytes = glb(&minimal(), Some(&[0; 36]));
    let declared = bytes.len() as u32 + 64;
    bytes[8..12].copy_from_slice(&declared.to_le_bytes());

    let model = load("minimal.glb", &bytes);
    assert_eq!(model.error().map(|error| error.kind()), Some(ErrorKind::CorruptedBuffer));
    assert_eq!(model.error().and_then(|error| error.offset()), Some(8));
    assert!(model.diagnostics().stage_time(LoadStage::Parse).is_none());
    assert!(model.scene().nodes.is_empty());
}

#[test]
fn unsupported_glb_version() {
    let mut bytes = glb(&minimal(), Some(&[0; 36]));
    bytes[4..8].copy_from_slice(&1u32.to_le_bytes());
    let model = load("minimal.glb", &bytes);
    assert_eq!(
        model.error().map(|error| error.kind()),
        Some(ErrorKind::UnsupportedVersion)
    );
}

#[test]
fn json_with_external_buffer() {
    let mut json = minimal();
    json["buffers"][0]["uri"] = "meshes/triangle.bin".into();
    json["nodes"][0]["translation"] = serde_json::json!([1.0, 2.0, 3.0]);
    let bytes = serde_json::to_vec(&json).unwrap();

    let positions = floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let mut archive = MemoryArchive::new().with_entry("assets/meshes/triangle.bin", positions);
    let model = load_with(
        "assets/triangle.gltf",
        &bytes,
        &mut archive,
        LoadOptions::default(),
    );
    assert!(model.is_valid());
    let mesh = &model.scene().meshes[0];
    assert_eq!(mesh.vertices[2].position, [0.0, 1.0, 0.0]);
    let global = model.scene().nodes[0].global_matrix;
    assert_eq!(global.w_axis.truncate().to_array(), [1.0, 2.0, 3.0]);
}

#[test]
fn json_with_data_uri_buffer() {
    let mut json = minimal();
    json["buffers"][0]["uri"] =
        format!("data:application/octet-stream;base64,{}", "A".repeat(48)).into();
    let bytes = serde_json::to_vec(&json).unwrap();
    let model = load("triangle.gltf", &bytes);
    assert!(model.is_valid());
    assert_eq!(model.scene().vertex_count(), 3);
}

#[test]
fn unsupported_buffer_source_is_not_fatal() {
    let mut json = minimal();
    json["buffers"][0]["uri"] = "https://example.com/triangle.bin".into();
    let bytes = serde_json::to_vec(&json).unwrap();
    let options = LoadOptions {
        validate_on_load: false,
        ..Default::default()
    };
    let model = load_with("triangle.gltf", &bytes, &mut MemoryArchive::new(), options);
    assert!(model.is_valid());
    assert!(model.scene().meshes.is_empty());
    assert_eq!(model.scene().nodes.len(), 1);
    assert_eq!(model.diagnostics().failures(ErrorKind::CorruptedBuffer), 2);
}

#[test]
fn unresolved_buffer_fails_validation() {
    let mut json = minimal();
    json["buffers"][0]["uri"] = "missing.bin".into();
    let bytes = serde_json::to_vec(&json).unwrap();
    let model = load("triangle.gltf", &bytes);
    assert_eq!(
        model.error().map(|error| error.kind()),
        Some(ErrorKind::ValidationFailure)
    );
}

#[test]
fn missing_position_skips_only_that_primitive() {
    let mut json = minimal();
    json["meshes"] = serde_json::json!([{
        "primitives": [
            { "attributes": { "NORMAL": 0 } },
            { "attributes": { "POSITION": 0 } }
        ]
    }]);
    let bytes = glb(&json, Some(&[0; 36]));
    let model = load("minimal.glb", &bytes);
    assert!(model.is_valid());
    assert_eq!(model.scene().meshes.len(), 1);
    assert_eq!(
        model.diagnostics().failures(ErrorKind::MissingRequiredData),
        1
    );
}

#[test]
fn cyclic_hierarchy_fails() {
    let mut json = minimal();
    json["nodes"] = serde_json::json!([{ "mesh": 0, "children": [1] }, { "children": [0] }]);
    let bytes = glb(&json, Some(&[0; 36]));
    let model = load("minimal.glb", &bytes);
    assert_eq!(
        model.error().map(|error| error.kind()),
        Some(ErrorKind::ValidationFailure)
    );
    assert!(model.diagnostics().stage_time(LoadStage::Transforms).is_none());
}

#[test]
fn back_edge_to_a_child_fails() {
    let mut json = minimal();
    json["nodes"] = serde_json::json!([
        { "mesh": 0, "children": [1] },
        { "children": [2] },
        { "children": [1] }
    ]);
    let bytes = glb(&json, Some(&[0; 36]));
    let model = load("minimal.glb", &bytes);
    assert_eq!(
        model.error().map(|error| error.kind()),
        Some(ErrorKind::ValidationFailure)
    );
    assert!(model.diagnostics().stage_time(LoadStage::Transforms).is_none());
}

#[test]
fn material_with_unknown_texture_fails_validation() {
    let mut json = minimal();
    json["materials"] = serde_json::json!([{ "emissiveTexture": { "index": 3 } }]);
    json["meshes"][0]["primitives"][0]["material"] = 0.into();
    let bytes = glb(&json, Some(&[0; 36]));

    let model = load("minimal.glb", &bytes);
    assert_eq!(
        model.error().map(|error| error.kind()),
        Some(ErrorKind::ValidationFailure)
    );

    let options = LoadOptions {
        validate_on_load: false,
        ..Default::default()
    };
    let model = load_with("minimal.glb", &bytes, &mut MemoryArchive::new(), options);
    assert!(model.is_valid());
    assert_eq!(model.scene().meshes[0].material_index, Some(0));
}

#[test]
fn triangle_limit() {
    let bytes = glb(&minimal(), Some(&[0; 36]));
    let options = LoadOptions {
        max_triangle_count: 0,
        ..Default::default()
    };
    let model = load_with("minimal.glb", &bytes, &mut MemoryArchive::new(), options);
    assert_eq!(
        model.error().map(|error| error.kind()),
        Some(ErrorKind::OutOfMemory)
    );
}
