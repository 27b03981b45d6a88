use std::{sync::Arc, time::Duration};

use glam::Mat4;
use log::{debug, warn};
use web_time::Instant;

use crate::{
    archive::ByteLoader,
    diagnostics::{Diagnostics, NoopDiagnostics},
    error::LoadError,
    loader::{gltf::load_model, LoadOptions},
    node::Transform,
    scene::GltfScene,
    skin::BoneSet,
    texture::TextureResolver,
};

/// Lifetime of a [`GltfModel`].
///
/// `Loading` only lasts for the duration of [`GltfModel::load`]. `Valid` and
/// `Failed` are final; a failed model has to be replaced by a new instance.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Valid,
    Failed(LoadError),
}

/// A loaded glTF model with its skeleton and animation playback state.
#[derive(Debug)]
pub struct GltfModel<T, D = NoopDiagnostics> {
    state: ModelState,
    options: LoadOptions,
    diagnostics: D,
    scene: GltfScene,
    textures: Vec<Option<Arc<T>>>,
    bones: BoneSet,
    has_skinning: bool,
    pose: Vec<Transform>,
    current_animation: Option<usize>,
    load_time: Duration,
}

impl<T> GltfModel<T> {
    pub fn new() -> Self {
        Self::with_options(LoadOptions::default())
    }

    pub fn with_options(options: LoadOptions) -> Self {
        Self::with_diagnostics(options, NoopDiagnostics)
    }
}

impl<T> Default for GltfModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, D: Diagnostics> GltfModel<T, D> {
    pub fn with_diagnostics(options: LoadOptions, diagnostics: D) -> Self {
        Self {
            state: ModelState::Unloaded,
            options,
            diagnostics,
            scene: GltfScene::default(),
            textures: Vec::new(),
            bones: BoneSet::default(),
            has_skinning: false,
            pose: Vec::new(),
            current_animation: None,
            load_time: Duration::ZERO,
        }
    }

    /// Load the model from the bytes of the file at `path`.
    ///
    /// External buffers are read from `loader` relative to `path`. A model can
    /// only be loaded once. On failure the model stays [`ModelState::Failed`].
    pub fn load<L, R>(
        &mut self,
        path: &str,
        bytes: &[u8],
        loader: &mut L,
        resolver: &mut R,
    ) -> Result<(), LoadError>
    where
        L: ByteLoader,
        R: TextureResolver<Texture = T>,
    {
        if self.state != ModelState::Unloaded {
            return Err(LoadError::validation(format!(
                "Model is {:?}, only unloaded models can be loaded",
                self.state
            )));
        }
        self.state = ModelState::Loading;

        let start = Instant::now();
        let result = load_model(
            path,
            bytes,
            loader,
            resolver,
            &self.options,
            &mut self.diagnostics,
        );
        self.load_time = start.elapsed();

        match result {
            Ok(loaded) => {
                self.scene = loaded.scene;
                self.textures = loaded.textures;
                self.bones = loaded.bones.unwrap_or_default();
                self.has_skinning = loaded.has_skinning;
                self.pose = self.bones.base_pose().to_vec();
                self.state = ModelState::Valid;
                debug!("Loaded {} in {:?}", path, self.load_time);
                Ok(())
            }
            Err(error) => {
                warn!("Failed to load {}: {}", path, error);
                self.state = ModelState::Failed(error.clone());
                Err(error)
            }
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_valid(&self) -> bool {
        self.state == ModelState::Valid
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            ModelState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn scene(&self) -> &GltfScene {
        &self.scene
    }

    /// Texture handles parallel to the document's textures.
    pub fn textures(&self) -> &[Option<Arc<T>>] {
        &self.textures
    }

    pub fn has_skinning(&self) -> bool {
        self.has_skinning
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone_name(&self, bone: usize) -> Option<&str> {
        self.bones.name(bone)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.find(name)
    }

    /// Local transform of the bone in the rest pose.
    pub fn bone_base_transform(&self, bone: usize) -> Option<Transform> {
        self.bones.base_pose().get(bone).copied()
    }

    /// Global matrix of the bone's node in the rest pose.
    pub fn bone_world_transform(&self, bone: usize) -> Option<Mat4> {
        let joint = (*self.bones.joints().get(bone)?)?;
        self.scene.nodes.get(joint).map(|node| node.global_matrix)
    }

    /// Skinning matrices of the last sampled pose, indexed by bone.
    pub fn bone_matrices(&self) -> &[Mat4] {
        self.bones.matrices()
    }

    pub fn animation_count(&self) -> usize {
        self.scene.animations.len()
    }

    pub fn animation_name(&self, animation: usize) -> Option<&str> {
        self.scene.animations.get(animation)?.name.as_deref()
    }

    pub fn animation_duration(&self, animation: usize) -> Option<f32> {
        self.scene
            .animations
            .get(animation)
            .map(|animation| animation.duration)
    }

    pub fn find_animation(&self, name: &str) -> Option<usize> {
        self.scene.find_animation(name)
    }

    pub fn current_animation(&self) -> Option<usize> {
        self.current_animation
    }

    /// Select the animation played by [`update_animation`](Self::update_animation).
    /// `None` returns the bones to the rest pose on the next update.
    pub fn set_current_animation(&mut self, animation: Option<usize>) -> Result<(), LoadError> {
        if let Some(index) = animation {
            let Some(selected) = self.scene.animations.get(index) else {
                return Err(LoadError::animation(format!(
                    "No animation #{} among {}",
                    index,
                    self.scene.animations.len()
                )));
            };
            if let Some(error) = selected.error() {
                return Err(LoadError::animation(format!(
                    "Animation #{} failed to load: {}",
                    index,
                    error.message()
                )));
            }
        }
        self.current_animation = animation;
        Ok(())
    }

    /// Sample the current animation at `time` seconds and recompute the
    /// skinning matrices. Time wraps around the animation's duration.
    pub fn update_animation(&mut self, time: f32) -> &[Mat4] {
        if !self.is_valid() || self.bones.is_empty() {
            return self.bones.matrices();
        }

        self.pose.clear();
        self.pose.extend_from_slice(self.bones.base_pose());
        if let Some(animation) = self
            .current_animation
            .and_then(|index| self.scene.animations.get(index))
        {
            let time = if animation.duration > 0.0 {
                time.rem_euclid(animation.duration)
            } else {
                0.0
            };
            animation.sample(time, &self.bones, &mut self.pose);
        }
        self.bones.apply_pose(&self.scene.nodes, &self.pose)
    }

    /// Bytes held by decoded vertices, indices and bone matrices.
    pub fn memory_usage(&self) -> usize {
        self.scene.memory_usage() + self.bones.len() * std::mem::size_of::<Mat4>()
    }

    pub fn load_time(&self) -> Duration {
        self.load_time
    }
}

#[cfg(test)]
mod test {
    use super::{GltfModel, ModelState};
    use crate::{
        archive::MemoryArchive, diagnostics::LoadStatistics, error::ErrorKind,
        loader::LoadOptions, texture::NullTextureResolver,
    };

    fn triangle() -> String {
        serde_json::json!({
            "asset": { "version": "2.0" },
            "nodes": [{ "mesh": 0 }],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3" }],
            "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
            "buffers": [{
                "byteLength": 36,
                "uri": format!("data:application/octet-stream;base64,{}", "A".repeat(48))
            }],
        })
        .to_string()
    }

    #[test]
    fn load_once() {
        let mut model = GltfModel::<()>::new();
        assert_eq!(*model.state(), ModelState::Unloaded);
        model
            .load(
                "triangle.gltf",
                triangle().as_bytes(),
                &mut MemoryArchive::new(),
                &mut NullTextureResolver,
            )
            .unwrap();
        assert!(model.is_valid());
        assert_eq!(model.scene().meshes.len(), 1);
        assert_eq!(model.bone_count(), 0);
        assert!(model.update_animation(1.0).is_empty());

        let error = model
            .load(
                "triangle.gltf",
                triangle().as_bytes(),
                &mut MemoryArchive::new(),
                &mut NullTextureResolver,
            )
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
        assert!(model.is_valid());
    }

    #[test]
    fn failed_is_terminal() {
        let mut model = GltfModel::<()>::new();
        let error = model
            .load(
                "broken.glb",
                b"glTF",
                &mut MemoryArchive::new(),
                &mut NullTextureResolver,
            )
            .unwrap_err();
        assert_eq!(model.error(), Some(&error));
        assert!(model.scene().meshes.is_empty());

        let retry = model
            .load(
                "triangle.gltf",
                triangle().as_bytes(),
                &mut MemoryArchive::new(),
                &mut NullTextureResolver,
            )
            .unwrap_err();
        assert_eq!(retry.kind(), ErrorKind::ValidationFailure);
        assert_eq!(model.error(), Some(&error));
    }

    #[test]
    fn diagnostics_are_injected() {
        let mut model = GltfModel::<(), _>::with_diagnostics(
            LoadOptions::default(),
            LoadStatistics::default(),
        );
        model
            .load(
                "triangle.gltf",
                triangle().as_bytes(),
                &mut MemoryArchive::new(),
                &mut NullTextureResolver,
            )
            .unwrap();
        assert!(!model.diagnostics().stages().is_empty());
        assert!(model.diagnostics().total_time() <= model.load_time());
    }

    #[test]
    fn unknown_animation() {
        let mut model = GltfModel::<()>::new();
        model
            .load(
                "triangle.gltf",
                triangle().as_bytes(),
                &mut MemoryArchive::new(),
                &mut NullTextureResolver,
            )
            .unwrap();
        let error = model.set_current_animation(Some(0)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AnimationError);
        model.set_current_animation(None).unwrap();
        assert_eq!(model.current_animation(), None);
    }
}
