use gltf::json;
use log::{debug, warn};

use crate::{
    archive::ByteLoader,
    diagnostics::Diagnostics,
    error::{ErrorKind, LoadError},
    loader::gltf::scheme::Scheme,
};

/// Where the bytes of one buffer come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferSource {
    /// The binary chunk of a GLB container.
    Binary,
    /// Bytes decoded from a `data:` URI.
    DataUri(Vec<u8>),
    /// A path resolved against the model's base path, to be fetched through
    /// the byte loader.
    External(String),
    /// Anything else. Resolves to an empty buffer.
    Unsupported(String),
}

impl BufferSource {
    pub fn classify(buffer: &json::Buffer, base_path: &str) -> Self {
        let Some(uri) = buffer.uri.as_deref() else {
            return BufferSource::Binary;
        };
        match Scheme::try_from(uri) {
            Ok(Scheme::Data(Some(mime), _))
                if !mime.eq_ignore_ascii_case("application/octet-stream")
                    && !mime.eq_ignore_ascii_case("application/gltf-buffer") =>
            {
                BufferSource::Unsupported(format!("data URI of type {}", mime))
            }
            Ok(Scheme::Data(_, data)) => BufferSource::DataUri(data),
            Ok(scheme) => match scheme.resolve_path(base_path) {
                Some(path) => BufferSource::External(path),
                None => BufferSource::Unsupported(uri.to_string()),
            },
            Err(error) => BufferSource::Unsupported(format!("{}: {}", uri, error)),
        }
    }
}

fn declared_length(buffer: &json::Buffer) -> usize {
    usize::try_from(buffer.byte_length.0).unwrap_or(usize::MAX)
}

/// Materialize the bytes of every buffer in the document, in index order.
///
/// A buffer that cannot be resolved is left empty. Accessors that read from it
/// fail their own bounds checks later.
pub fn resolve_buffers<L: ByteLoader, D: Diagnostics>(
    root: &json::Root,
    blob: Option<&[u8]>,
    base_path: &str,
    loader: &mut L,
    diagnostics: &mut D,
) -> Vec<Vec<u8>> {
    let mut report = |message: String| {
        warn!("{}", message);
        diagnostics.resource_failed(ErrorKind::CorruptedBuffer, &message);
    };

    root.buffers
        .iter()
        .enumerate()
        .map(|(index, buffer)| {
            let length = declared_length(buffer);
            let data = match BufferSource::classify(buffer, base_path) {
                BufferSource::Binary => match blob {
                    Some(blob) if index == 0 => {
                        // The binary chunk is padded to four bytes
                        let end = blob.len().min(length);
                        blob[..end].to_vec()
                    }
                    Some(_) => {
                        report(format!(
                            "Buffer #{} has no URI and is not the first buffer",
                            index
                        ));
                        Vec::new()
                    }
                    None => {
                        report(format!("Buffer #{} refers to a missing binary chunk", index));
                        Vec::new()
                    }
                },
                BufferSource::DataUri(data) => data,
                BufferSource::External(path) => match loader.load(&path) {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        report(format!("Buffer #{} not found at {}", index, path));
                        Vec::new()
                    }
                    Err(error) => {
                        report(format!("Failed to load buffer #{} from {}: {}", index, path, error));
                        Vec::new()
                    }
                },
                BufferSource::Unsupported(reason) => {
                    report(format!("Buffer #{} has an unsupported source {}", index, reason));
                    Vec::new()
                }
            };
            debug!(
                "Resolved buffer #{}: {} of {} bytes",
                index,
                data.len(),
                length
            );
            data
        })
        .collect()
}

/// Check the resolved buffers against the document's declarations.
pub fn check_buffers(root: &json::Root, buffers: &[Vec<u8>]) -> Result<(), LoadError> {
    if root.buffers.len() != buffers.len() {
        return Err(LoadError::validation(format!(
            "Expected {} buffers, resolved {}",
            root.buffers.len(),
            buffers.len()
        )));
    }
    for (index, (buffer, data)) in root.buffers.iter().zip(buffers).enumerate() {
        let length = declared_length(buffer);
        if data.len() != length {
            return Err(LoadError::validation(format!(
                "Buffer #{} has {} bytes, declared {}",
                index,
                data.len(),
                length
            )));
        }
    }
    Ok(())
}
