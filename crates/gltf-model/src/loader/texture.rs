use std::{collections::HashMap, io::Cursor, sync::Arc};

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use log::debug;

use crate::{
    archive::ByteLoader,
    error::LoadError,
    texture::{DecodedTexture, TextureFormat, TextureResolver},
};

fn into_le_bytes(data: Vec<u16>) -> Vec<u8> {
    data.into_iter().flat_map(|item| item.to_le_bytes()).collect()
}

fn decode_image(image: DynamicImage) -> DecodedTexture {
    let (size, data, format) = match image {
        DynamicImage::ImageLuma8(image) => (image.dimensions(), image.into_vec(), TextureFormat::Ru8),
        DynamicImage::ImageLumaA8(image) => {
            (image.dimensions(), image.into_vec(), TextureFormat::Rgu8)
        }
        DynamicImage::ImageRgb8(image) => {
            (image.dimensions(), image.into_vec(), TextureFormat::Rgbu8)
        }
        DynamicImage::ImageRgba8(image) => {
            (image.dimensions(), image.into_vec(), TextureFormat::Rgbau8)
        }
        DynamicImage::ImageLuma16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureFormat::Ru16,
        ),
        DynamicImage::ImageLumaA16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureFormat::Rgu16,
        ),
        DynamicImage::ImageRgb16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureFormat::Rgbu16,
        ),
        DynamicImage::ImageRgba16(image) => (
            image.dimensions(),
            into_le_bytes(image.into_vec()),
            TextureFormat::Rgbau16,
        ),
        DynamicImage::ImageRgb32F(image) => {
            let converted: DynamicImage = image.into();
            (
                converted.dimensions(),
                into_le_bytes(converted.into_rgb16().into_vec()),
                TextureFormat::Rgbu16,
            )
        }
        DynamicImage::ImageRgba32F(image) => {
            let converted: DynamicImage = image.into();
            (
                converted.dimensions(),
                into_le_bytes(converted.into_rgba16().into_vec()),
                TextureFormat::Rgbau16,
            )
        }
        image => (
            image.dimensions(),
            image.into_rgba8().into_vec(),
            TextureFormat::Rgbau8,
        ),
    };
    DecodedTexture { size, format, data }
}

fn decode(data: &[u8], mime_type: Option<&str>) -> Result<DecodedTexture, LoadError> {
    let mut reader = ImageReader::new(Cursor::new(data));
    match mime_type.and_then(ImageFormat::from_mime_type) {
        Some(format) => reader.set_format(format),
        None => {
            reader = reader.with_guessed_format().map_err(|error| {
                LoadError::texture(format!("Cannot guess image format: {}", error))
            })?
        }
    }
    Ok(decode_image(reader.decode()?))
}

/// Decodes images with the `image` crate. External images are read through a
/// [`ByteLoader`] and cached by path, so models sharing a resolver share
/// their textures.
#[derive(Debug)]
pub struct ImageTextureResolver<L> {
    loader: L,
    cache: HashMap<String, Arc<DecodedTexture>>,
}

impl<L: ByteLoader> ImageTextureResolver<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: HashMap::new(),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn into_inner(self) -> L {
        self.loader
    }
}

impl<L: ByteLoader> TextureResolver for ImageTextureResolver<L> {
    type Texture = DecodedTexture;

    fn resolve_uri(&mut self, path: &str) -> Result<Arc<DecodedTexture>, LoadError> {
        if let Some(texture) = self.cache.get(path) {
            return Ok(texture.clone());
        }

        let data = self
            .loader
            .load(path)
            .map_err(|error| LoadError::texture(format!("Failed to read {}: {}", path, error)))?
            .ok_or_else(|| LoadError::texture(format!("Image {} not found", path)))?;
        let texture = Arc::new(decode(&data, None)?);
        debug!(
            "Decoded {} as {:?} {}x{}",
            path, texture.format, texture.size.0, texture.size.1
        );

        self.cache.insert(path.to_string(), texture.clone());
        Ok(texture)
    }

    fn resolve_bytes(
        &mut self,
        data: &[u8],
        mime_type: Option<&str>,
    ) -> Result<Arc<DecodedTexture>, LoadError> {
        Ok(Arc::new(decode(data, mime_type)?))
    }
}
