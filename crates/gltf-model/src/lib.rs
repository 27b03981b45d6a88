//! Load glTF 2.0 models into a scene ready for rendering and animation.
//!
//! This library checks and parses `.gltf` and `.glb` files, decodes their
//! buffers into flat meshes and a node hierarchy, derives bone matrices from
//! the first skin and samples animations into skinning poses. External
//! buffers and images are read through a [`ByteLoader`], so that models can
//! be loaded from a directory, from memory or from an archive file.
//!
pub mod accessor;
pub mod animation;
pub mod archive;
pub mod buffer;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod model;
pub mod node;
pub mod primitive;
pub mod scene;
pub mod skin;
pub mod texture;
pub mod validate;

pub use archive::{ByteLoader, DirectoryArchive, MemoryArchive};
pub use diagnostics::{Diagnostics, LoadStage, LoadStatistics, NoopDiagnostics};
pub use error::{ErrorKind, LoadError};
pub use loader::{ImageTextureResolver, LoadOptions};
pub use model::{GltfModel, ModelState};
pub use scene::GltfScene;
pub use texture::{DecodedTexture, NullTextureResolver, TextureResolver};
