use gltf::json::{
    self,
    mesh::{Mode, Semantic},
    validation::Checked,
};
use log::{debug, warn};

use crate::{
    accessor::AccessorReader,
    diagnostics::Diagnostics,
    error::{ErrorKind, LoadError},
    material::PbrMaterialProperties,
    mesh::{GltfMesh, Vertex},
};

/// Meshes decoded from every primitive of the document, and whether any
/// primitive carries skinning attributes.
#[derive(Debug, Clone, Default)]
pub struct LoadedMeshes {
    pub meshes: Vec<GltfMesh>,
    pub has_skinning: bool,
}

#[inline]
fn attribute(primitive: &json::mesh::Primitive, semantic: Semantic) -> Option<usize> {
    primitive
        .attributes
        .get(&Checked::Valid(semantic))
        .map(|accessor| accessor.value())
}

/// Decode an optional attribute and apply it only when it has one entry per
/// vertex.
fn apply_attribute<T>(
    name: &str,
    vertices: &mut [Vertex],
    data: Option<Result<Vec<T>, LoadError>>,
    mut apply: impl FnMut(&mut Vertex, T),
) {
    match data {
        Some(Ok(data)) if data.len() == vertices.len() => {
            for (vertex, item) in vertices.iter_mut().zip(data) {
                apply(vertex, item);
            }
        }
        Some(Ok(data)) => debug!(
            "Skip {} with {} entries for {} vertices",
            name,
            data.len(),
            vertices.len()
        ),
        Some(Err(error)) => warn!("Skip {}: {}", name, error),
        None => {}
    }
}

fn load_primitive(
    reader: &AccessorReader,
    materials: &[PbrMaterialProperties],
    mesh: &json::Mesh,
    mesh_index: usize,
    primitive: &json::mesh::Primitive,
    has_skinning: &mut bool,
) -> Result<GltfMesh, LoadError> {
    if !matches!(primitive.mode, Checked::Valid(Mode::Triangles)) {
        debug!(
            "Mesh #{} has a {:?} primitive, loading it as a triangle list",
            mesh_index, primitive.mode
        );
    }

    let position = attribute(primitive, Semantic::Positions)
        .ok_or_else(|| LoadError::missing_data("Primitive has no POSITION attribute"))?;
    let mut vertices: Vec<Vertex> = reader
        .read_vec3(position)?
        .into_iter()
        .map(|position| Vertex {
            position,
            ..Default::default()
        })
        .collect();

    apply_attribute(
        "NORMAL",
        &mut vertices,
        attribute(primitive, Semantic::Normals).map(|index| reader.read_vec3(index)),
        |vertex, normal| vertex.normal = normal,
    );
    apply_attribute(
        "TEXCOORD_0",
        &mut vertices,
        attribute(primitive, Semantic::TexCoords(0)).map(|index| reader.read_tex_coords(index)),
        |vertex, uv| vertex.uv = uv,
    );
    apply_attribute(
        "TANGENT",
        &mut vertices,
        attribute(primitive, Semantic::Tangents).map(|index| reader.read_vec4(index)),
        |vertex, tangent| vertex.tangent = tangent,
    );
    apply_attribute(
        "COLOR_0",
        &mut vertices,
        attribute(primitive, Semantic::Colors(0)).map(|index| reader.read_colors(index)),
        |vertex, color| vertex.color = color,
    );

    let joints = attribute(primitive, Semantic::Joints(0));
    let weights = attribute(primitive, Semantic::Weights(0));
    if let (Some(joints), Some(weights)) = (joints, weights) {
        *has_skinning = true;
        let skinning = reader.read_joints(joints).and_then(|joints| {
            let weights = reader.read_weights(weights)?;
            Ok(joints.into_iter().zip(weights).collect::<Vec<_>>())
        });
        apply_attribute(
            "JOINTS_0/WEIGHTS_0",
            &mut vertices,
            Some(skinning),
            |vertex, (joints, weights)| {
                vertex.joints = u32::to_le_bytes(joints);
                vertex.weights = weights;
            },
        );
    } else if joints.is_some() || weights.is_some() {
        debug!("Mesh #{} has unpaired JOINTS_0 and WEIGHTS_0", mesh_index);
    }

    let indices = match primitive.indices {
        Some(indices) => reader.read_indices(indices.value())?,
        None => (0..vertices.len() as u32).collect(),
    };

    let material_index = primitive.material.map(|material| material.value());
    let material = match material_index {
        Some(index) => materials.get(index).cloned().unwrap_or_else(|| {
            warn!("Mesh #{} refers to unknown material #{}", mesh_index, index);
            PbrMaterialProperties::default()
        }),
        None => PbrMaterialProperties::default(),
    };

    Ok(GltfMesh {
        name: mesh.name.clone(),
        source_mesh: mesh_index,
        vertices,
        indices,
        material,
        material_index,
    })
}

/// Decode every primitive of every mesh into its own [`GltfMesh`].
///
/// A primitive that cannot be decoded is skipped. The rest of its mesh and
/// the other meshes still load.
pub fn load_meshes<D: Diagnostics>(
    root: &json::Root,
    reader: &AccessorReader,
    materials: &[PbrMaterialProperties],
    diagnostics: &mut D,
) -> LoadedMeshes {
    let mut loaded = LoadedMeshes::default();
    for (mesh_index, mesh) in root.meshes.iter().enumerate() {
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            match load_primitive(
                reader,
                materials,
                mesh,
                mesh_index,
                primitive,
                &mut loaded.has_skinning,
            ) {
                Ok(mesh) => loaded.meshes.push(mesh),
                Err(error) => {
                    let message = format!(
                        "Skip primitive #{} of mesh #{}: {}",
                        primitive_index, mesh_index, error
                    );
                    warn!("{}", message);
                    diagnostics.resource_failed(error.kind(), &message);
                }
            }
        }
    }
    loaded
}
