use std::sync::Arc;

use gltf::{json, Gltf};
use log::{debug, info, warn};

use crate::{
    accessor::AccessorReader,
    animation::load_animations,
    archive::ByteLoader,
    buffer::resolve_buffers,
    diagnostics::{Diagnostics, LoadStage, StageTimer},
    error::LoadError,
    format::{detect_format, validate_binary_header, validate_json_structure, Format},
    material::load_materials,
    node::{build_nodes, check_hierarchy, compute_transforms, find_roots},
    primitive::load_meshes,
    scene::GltfScene,
    skin::{load_skins, BoneSet},
    texture::{resolve_textures, TextureResolver},
    validate::validate,
};

use super::LoadOptions;

pub mod scheme;

/// The parsed document and the binary chunk of a GLB container.
#[derive(Debug)]
pub struct GltfAsset {
    pub root: json::Root,
    pub blob: Option<Vec<u8>>,
}

/// Check the raw bytes and parse them into a document.
///
/// Format errors are returned before the parser sees the bytes. References
/// inside the document are not validated by the parser; every consumer checks
/// its own indices.
pub fn parse_asset<D: Diagnostics>(bytes: &[u8], diagnostics: &mut D) -> Result<GltfAsset, LoadError> {
    let timer = StageTimer::start(LoadStage::Format);
    match detect_format(bytes)? {
        Format::Binary => {
            let header = validate_binary_header(bytes)?;
            debug!("GLB container of {} bytes", header.length);
        }
        Format::Json => validate_json_structure(bytes)?,
    }
    timer.finish(diagnostics);

    let timer = StageTimer::start(LoadStage::Parse);
    let Gltf { document, blob } = Gltf::from_slice_without_validation(bytes)?;
    let root = document.into_json();
    timer.finish(diagnostics);

    Ok(GltfAsset { root, blob })
}

/// Result of a successful load.
#[derive(Debug)]
pub struct LoadedModel<T> {
    pub scene: GltfScene,
    /// Parallel to the document's textures. Failed textures are `None`.
    pub textures: Vec<Option<Arc<T>>>,
    /// Bones of the active skin, when any primitive is skinned.
    pub bones: Option<BoneSet>,
    pub has_skinning: bool,
}

/// Run the whole pipeline over the bytes of a `.gltf` or `.glb` file.
///
/// `path` is the location of the model as seen by `loader`. External
/// resources are resolved relative to it.
pub fn load_model<L, R, D>(
    path: &str,
    bytes: &[u8],
    loader: &mut L,
    resolver: &mut R,
    options: &LoadOptions,
    diagnostics: &mut D,
) -> Result<LoadedModel<R::Texture>, LoadError>
where
    L: ByteLoader,
    R: TextureResolver,
    D: Diagnostics,
{
    let GltfAsset { root, blob } = parse_asset(bytes, diagnostics)?;
    let base_path = scheme::base_path(path);

    let timer = StageTimer::start(LoadStage::Buffers);
    let buffers = resolve_buffers(&root, blob.as_deref(), base_path, loader, diagnostics);
    timer.finish(diagnostics);
    let reader = AccessorReader::new(&root, &buffers);

    let timer = StageTimer::start(LoadStage::Textures);
    let textures = resolve_textures(&root, &buffers, base_path, resolver, diagnostics);
    timer.finish(diagnostics);

    let timer = StageTimer::start(LoadStage::Meshes);
    let materials = load_materials(&root);
    let loaded = load_meshes(&root, &reader, &materials, diagnostics);
    timer.finish(diagnostics);

    let mut scene = GltfScene {
        meshes: loaded.meshes,
        materials,
        ..Default::default()
    };
    let vertex_count = scene.vertex_count();
    if vertex_count > options.max_vertex_count {
        return Err(LoadError::out_of_memory(format!(
            "{} vertices exceed the limit of {}",
            vertex_count, options.max_vertex_count
        )));
    }
    let triangle_count = scene.triangle_count();
    if triangle_count > options.max_triangle_count {
        return Err(LoadError::out_of_memory(format!(
            "{} triangles exceed the limit of {}",
            triangle_count, options.max_triangle_count
        )));
    }

    let timer = StageTimer::start(LoadStage::Nodes);
    scene.nodes = build_nodes(&root);
    scene.roots = find_roots(&scene.nodes);
    check_hierarchy(&scene.nodes)?;
    timer.finish(diagnostics);

    let timer = StageTimer::start(LoadStage::Skins);
    scene.skins = load_skins(&root, &reader, scene.nodes.len(), diagnostics);
    timer.finish(diagnostics);

    let timer = StageTimer::start(LoadStage::Animations);
    scene.animations = load_animations(&root, &reader, scene.nodes.len(), diagnostics);
    timer.finish(diagnostics);

    let timer = StageTimer::start(LoadStage::Transforms);
    compute_transforms(&mut scene.nodes, &scene.roots);
    timer.finish(diagnostics);

    let timer = StageTimer::start(LoadStage::Bones);
    let bones = if loaded.has_skinning {
        match scene.skins.get(options.active_skin) {
            Some(skin) => Some(BoneSet::build(skin, &mut scene.nodes)),
            None => {
                warn!(
                    "Model is skinned but has no skin #{} among {} skins",
                    options.active_skin,
                    scene.skins.len()
                );
                None
            }
        }
    } else {
        None
    };
    timer.finish(diagnostics);

    if options.validate_on_load {
        let timer = StageTimer::start(LoadStage::Validation);
        validate(&root, &buffers, &scene, textures.len())?;
        timer.finish(diagnostics);
    }

    info!(
        "Loaded {}: {} meshes, {} vertices, {} triangles, {} nodes, {} bones, {} animations",
        path,
        scene.meshes.len(),
        vertex_count,
        triangle_count,
        scene.nodes.len(),
        bones.as_ref().map_or(0, BoneSet::len),
        scene.animations.len()
    );

    Ok(LoadedModel {
        scene,
        textures,
        bones,
        has_skinning: loaded.has_skinning,
    })
}
