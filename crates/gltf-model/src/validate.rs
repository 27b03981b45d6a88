use gltf::json;
use log::debug;

use crate::{
    accessor::AccessorReader,
    animation::Animation,
    buffer::check_buffers,
    error::LoadError,
    node::check_hierarchy,
    scene::GltfScene,
};

fn check_animation(index: usize, animation: &Animation, node_count: usize) -> Result<(), LoadError> {
    if !animation.channels.is_empty() && animation.samplers.is_empty() {
        return Err(LoadError::animation(format!(
            "Animation #{} has channels but no samplers",
            index
        )));
    }
    for (channel_index, channel) in animation.channels.iter().enumerate() {
        if channel.sampler >= animation.samplers.len() {
            return Err(LoadError::animation(format!(
                "Channel #{} of animation #{} refers to unknown sampler #{}",
                channel_index, index, channel.sampler
            )));
        }
        match channel.target {
            Some(target) if target < node_count => {}
            _ => {
                return Err(LoadError::animation(format!(
                    "Channel #{} of animation #{} has no valid target node",
                    channel_index, index
                )))
            }
        }
    }
    Ok(())
}

/// Consistency pass over a fully built scene.
///
/// Animations that already failed to load are not checked again; they are
/// reported on their own.
pub fn validate(
    root: &json::Root,
    buffers: &[Vec<u8>],
    scene: &GltfScene,
    texture_count: usize,
) -> Result<(), LoadError> {
    check_buffers(root, buffers)?;

    let reader = AccessorReader::new(root, buffers);
    for index in 0..reader.len() {
        reader.check(index).map_err(|error| {
            LoadError::validation(format!("Accessor #{}: {}", index, error.message()))
        })?;
    }

    if scene.nodes.len() != root.nodes.len() {
        return Err(LoadError::validation(format!(
            "Expected {} nodes, built {}",
            root.nodes.len(),
            scene.nodes.len()
        )));
    }
    check_hierarchy(&scene.nodes)?;

    for (index, skin) in scene.skins.iter().enumerate() {
        if let Some(slot) = skin.joints.iter().position(Option::is_none) {
            return Err(LoadError::validation(format!(
                "Joint #{} of skin #{} refers to an unknown node",
                slot, index
            )));
        }
    }

    for (index, material) in scene.materials.iter().enumerate() {
        if let Some(texture) = material
            .textures()
            .find(|texture| texture.texture >= texture_count)
        {
            return Err(LoadError::validation(format!(
                "Material #{} refers to unknown texture #{}",
                index, texture.texture
            )));
        }
    }

    for (index, animation) in scene.animations.iter().enumerate() {
        if animation.is_valid() {
            check_animation(index, animation, scene.nodes.len())?;
        }
    }

    debug!(
        "Validated {} buffers, {} accessors, {} nodes",
        buffers.len(),
        reader.len(),
        scene.nodes.len()
    );
    Ok(())
}
