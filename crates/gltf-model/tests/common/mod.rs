#![allow(dead_code)]

use gltf_model::{
    ByteLoader, GltfModel, LoadOptions, LoadStatistics, MemoryArchive, NullTextureResolver,
};

pub const GLB_MAGIC: u32 = 0x46546C67;
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F534A;
pub const CHUNK_TYPE_BIN: u32 = 0x004E4942;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn floats(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|item| item.to_le_bytes()).collect()
}

/// Assemble a GLB container. The JSON chunk is padded with spaces and the
/// binary chunk with zeros, as the container format requires.
pub fn glb(json: &serde_json::Value, bin: Option<&[u8]>) -> Vec<u8> {
    let mut json = serde_json::to_vec(json).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let bin = bin.map(|bin| {
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        bin
    });

    let length = 12 + 8 + json.len() + bin.as_ref().map_or(0, |bin| 8 + bin.len());
    let mut data = Vec::with_capacity(length);
    data.extend(GLB_MAGIC.to_le_bytes());
    data.extend(2u32.to_le_bytes());
    data.extend((length as u32).to_le_bytes());
    data.extend((json.len() as u32).to_le_bytes());
    data.extend(CHUNK_TYPE_JSON.to_le_bytes());
    data.extend(json);
    if let Some(bin) = bin {
        data.extend((bin.len() as u32).to_le_bytes());
        data.extend(CHUNK_TYPE_BIN.to_le_bytes());
        data.extend(bin);
    }
    data
}

/// Load `bytes` into a model that records its diagnostics.
pub fn load_with<L: ByteLoader>(
    path: &str,
    bytes: &[u8],
    loader: &mut L,
    options: LoadOptions,
) -> GltfModel<(), LoadStatistics> {
    init_logger();
    let mut model = GltfModel::with_diagnostics(options, LoadStatistics::default());
    let _ = model.load(path, bytes, loader, &mut NullTextureResolver);
    model
}

pub fn load(path: &str, bytes: &[u8]) -> GltfModel<(), LoadStatistics> {
    load_with(path, bytes, &mut MemoryArchive::new(), LoadOptions::default())
}
