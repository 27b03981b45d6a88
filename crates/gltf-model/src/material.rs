use gltf::json::{self, material::AlphaMode, validation::Checked};

/// Reference to an entry of the model's texture list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub texture: usize,
    /// Index of the `TEXCOORD_n` set used for this texture.
    pub tex_coord: u32,
}

impl TextureInfo {
    fn from_json(info: &json::texture::Info) -> Self {
        Self {
            texture: info.index.value(),
            tex_coord: info.tex_coord,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MaterialAlphaMode {
    #[default]
    Opaque,
    // Alpha cutoff
    Mask(f32),
    Blend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PbrMaterialProperties {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
    pub normal_texture: Option<TextureInfo>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<TextureInfo>,
    pub occlusion_strength: f32,
    pub emissive_factor: [f32; 3],
    pub emissive_texture: Option<TextureInfo>,
    pub alpha_mode: MaterialAlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

impl Default for PbrMaterialProperties {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive_factor: [0.0; 3],
            emissive_texture: None,
            alpha_mode: MaterialAlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

impl PbrMaterialProperties {
    pub fn textures(&self) -> impl Iterator<Item = TextureInfo> {
        [
            self.base_color_texture,
            self.metallic_roughness_texture,
            self.normal_texture,
            self.occlusion_texture,
            self.emissive_texture,
        ]
        .into_iter()
        .flatten()
    }
}

pub fn load_material(material: &json::Material) -> PbrMaterialProperties {
    let pbr = &material.pbr_metallic_roughness;
    let alpha_cutoff = material
        .alpha_cutoff
        .map(|cutoff| cutoff.0)
        .unwrap_or(0.5);
    let alpha_mode = match material.alpha_mode {
        Checked::Valid(AlphaMode::Mask) => MaterialAlphaMode::Mask(alpha_cutoff),
        Checked::Valid(AlphaMode::Blend) => MaterialAlphaMode::Blend,
        _ => MaterialAlphaMode::Opaque,
    };
    PbrMaterialProperties {
        name: material.name.clone(),
        base_color_factor: pbr.base_color_factor.0,
        base_color_texture: pbr.base_color_texture.as_ref().map(TextureInfo::from_json),
        metallic_factor: pbr.metallic_factor.0,
        roughness_factor: pbr.roughness_factor.0,
        metallic_roughness_texture: pbr
            .metallic_roughness_texture
            .as_ref()
            .map(TextureInfo::from_json),
        normal_texture: material.normal_texture.as_ref().map(|texture| TextureInfo {
            texture: texture.index.value(),
            tex_coord: texture.tex_coord,
        }),
        normal_scale: material
            .normal_texture
            .as_ref()
            .map(|texture| texture.scale)
            .unwrap_or(1.0),
        occlusion_texture: material.occlusion_texture.as_ref().map(|texture| TextureInfo {
            texture: texture.index.value(),
            tex_coord: texture.tex_coord,
        }),
        occlusion_strength: material
            .occlusion_texture
            .as_ref()
            .map(|texture| texture.strength.0)
            .unwrap_or(1.0),
        emissive_factor: material.emissive_factor.0,
        emissive_texture: material.emissive_texture.as_ref().map(TextureInfo::from_json),
        alpha_mode,
        alpha_cutoff,
        double_sided: material.double_sided,
    }
}

pub fn load_materials(root: &json::Root) -> Vec<PbrMaterialProperties> {
    root.materials.iter().map(load_material).collect()
}
