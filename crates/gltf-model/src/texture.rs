use std::sync::Arc;

use gltf::json;
use log::{debug, warn};

use crate::{
    diagnostics::Diagnostics,
    error::{ErrorKind, LoadError},
    loader::gltf::scheme::Scheme,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Ru8,
    Rgu8,
    Rgbu8,
    Rgbau8,
    Ru16,
    Rgu16,
    Rgbu16,
    Rgbau16,
}

/// Pixels decoded by [`ImageTextureResolver`](crate::loader::ImageTextureResolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    pub size: (u32, u32),
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

/// Where the image of one texture comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureSource<'a> {
    /// Path resolved against the model's base path.
    Uri(String),
    /// Bytes of a buffer view with an optional MIME type.
    BufferView {
        data: &'a [u8],
        mime_type: Option<&'a str>,
    },
    Unsupported(String),
}

impl<'a> TextureSource<'a> {
    pub fn classify(
        root: &'a json::Root,
        buffers: &'a [Vec<u8>],
        texture: &json::Texture,
        base_path: &str,
    ) -> Self {
        let image_index = texture.source.value();
        let Some(image) = root.images.get(image_index) else {
            return TextureSource::Unsupported(format!("unknown image #{}", image_index));
        };
        let mime_type = image.mime_type.as_ref().map(|mime| mime.0.as_str());

        if let Some(uri) = image.uri.as_deref() {
            return match Scheme::try_from(uri) {
                Ok(Scheme::Data(..)) => {
                    TextureSource::Unsupported("data URI images are not supported".to_string())
                }
                Ok(scheme) => match scheme.resolve_path(base_path) {
                    Some(path) => TextureSource::Uri(path),
                    None => TextureSource::Unsupported(uri.to_string()),
                },
                Err(error) => TextureSource::Unsupported(format!("{}: {}", uri, error)),
            };
        }

        let Some(view_index) = image.buffer_view else {
            return TextureSource::Unsupported(format!("image #{} has no source", image_index));
        };
        let data = root.buffer_views.get(view_index.value()).and_then(|view| {
            let buffer = buffers.get(view.buffer.value())?;
            let start = usize::try_from(view.byte_offset.map(|offset| offset.0).unwrap_or(0)).ok()?;
            let length = usize::try_from(view.byte_length.0).ok()?;
            buffer.get(start..start.checked_add(length)?)
        });
        match data {
            Some(data) => TextureSource::BufferView { data, mime_type },
            None => TextureSource::Unsupported(format!(
                "buffer view #{} of image #{} is out of bounds",
                view_index.value(),
                image_index
            )),
        }
    }
}

/// Turns image references into renderable texture handles.
///
/// Handles are shared. The resolver may cache them and hand the same handle to
/// several models.
pub trait TextureResolver {
    type Texture;

    fn resolve_uri(&mut self, path: &str) -> Result<Arc<Self::Texture>, LoadError>;

    fn resolve_bytes(
        &mut self,
        data: &[u8],
        mime_type: Option<&str>,
    ) -> Result<Arc<Self::Texture>, LoadError>;
}

impl<R: TextureResolver + ?Sized> TextureResolver for &mut R {
    type Texture = R::Texture;

    fn resolve_uri(&mut self, path: &str) -> Result<Arc<Self::Texture>, LoadError> {
        (**self).resolve_uri(path)
    }

    fn resolve_bytes(
        &mut self,
        data: &[u8],
        mime_type: Option<&str>,
    ) -> Result<Arc<Self::Texture>, LoadError> {
        (**self).resolve_bytes(data, mime_type)
    }
}

/// Resolver for callers that do not need textures. Every texture fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTextureResolver;

impl TextureResolver for NullTextureResolver {
    type Texture = ();

    fn resolve_uri(&mut self, path: &str) -> Result<Arc<Self::Texture>, LoadError> {
        Err(LoadError::texture(format!("No texture resolver for {}", path)))
    }

    fn resolve_bytes(
        &mut self,
        data: &[u8],
        _mime_type: Option<&str>,
    ) -> Result<Arc<Self::Texture>, LoadError> {
        Err(LoadError::texture(format!(
            "No texture resolver for {} embedded bytes",
            data.len()
        )))
    }
}

/// Resolve every texture of the document, in index order. Failed textures
/// are `None`.
pub fn resolve_textures<R: TextureResolver, D: Diagnostics>(
    root: &json::Root,
    buffers: &[Vec<u8>],
    base_path: &str,
    resolver: &mut R,
    diagnostics: &mut D,
) -> Vec<Option<Arc<R::Texture>>> {
    root.textures
        .iter()
        .enumerate()
        .map(|(index, texture)| {
            let result = match TextureSource::classify(root, buffers, texture, base_path) {
                TextureSource::Uri(path) => resolver.resolve_uri(&path),
                TextureSource::BufferView { data, mime_type } => {
                    resolver.resolve_bytes(data, mime_type)
                }
                TextureSource::Unsupported(reason) => Err(LoadError::texture(format!(
                    "Unsupported source: {}",
                    reason
                ))),
            };
            match result {
                Ok(texture) => {
                    debug!("Resolved texture #{}", index);
                    Some(texture)
                }
                Err(error) => {
                    let message = format!("Failed to load texture #{}: {}", index, error);
                    warn!("{}", message);
                    diagnostics.resource_failed(ErrorKind::TextureLoadFailure, &message);
                    None
                }
            }
        })
        .collect()
}
