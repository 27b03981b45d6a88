//! Cheap checks run over the raw input before it reaches the glTF parser.
//!
//! Nothing here allocates or parses JSON. The binary header checks only look
//! at the 12-byte file header and the header of the first chunk.

use crate::error::LoadError;

/// `glTF` in little-endian.
pub const GLB_MAGIC: u32 = 0x4654_6C67;
/// `JSON` in little-endian.
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
/// `BIN\0` in little-endian.
pub const CHUNK_TYPE_BIN: u32 = 0x004E_4942;

pub const GLB_HEADER_LENGTH: usize = 12;
pub const CHUNK_HEADER_LENGTH: usize = 8;

const MIN_JSON_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Binary,
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let slice = bytes.get(offset..end)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[inline]
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbHeader {
    pub magic: u32,
    pub version: u32,
    pub length: u32,
}

impl GlbHeader {
    pub fn read(bytes: &[u8]) -> Result<Self, LoadError> {
        match (read_u32(bytes, 0), read_u32(bytes, 4), read_u32(bytes, 8)) {
            (Some(magic), Some(version), Some(length)) => Ok(Self {
                magic,
                version,
                length,
            }),
            _ => Err(LoadError::invalid_format(format!(
                "GLB header needs {} bytes, got {}",
                GLB_HEADER_LENGTH,
                bytes.len()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub length: u32,
    pub chunk_type: u32,
}

impl ChunkHeader {
    pub fn read(bytes: &[u8], offset: usize) -> Result<Self, LoadError> {
        match (read_u32(bytes, offset), read_u32(bytes, offset + 4)) {
            (Some(length), Some(chunk_type)) => Ok(Self { length, chunk_type }),
            _ => Err(
                LoadError::corrupted_buffer("Truncated chunk header").with_offset(offset),
            ),
        }
    }
}

/// Classify the input as JSON glTF or binary GLB.
///
/// Anything that is neither is an [`InvalidFormat`](crate::ErrorKind::InvalidFormat)
/// error. JSON-looking input without the `"asset"` and `"version"` keys is
/// reported as missing required data instead.
pub fn detect_format(bytes: &[u8]) -> Result<Format, LoadError> {
    if bytes.len() < 4 {
        return Err(LoadError::invalid_format(format!(
            "Input of {} bytes is too short",
            bytes.len()
        )));
    }

    if bytes.len() >= GLB_HEADER_LENGTH && read_u32(bytes, 0) == Some(GLB_MAGIC) {
        return Ok(Format::Binary);
    }

    let first = bytes.iter().position(|byte| !byte.is_ascii_whitespace());
    match first {
        Some(position) if bytes[position] == b'{' => {
            if bytes.len() < MIN_JSON_LENGTH {
                return Err(LoadError::invalid_format(format!(
                    "JSON input of {} bytes is too short",
                    bytes.len()
                )));
            }
            if !contains(bytes, b"\"asset\"") || !contains(bytes, b"\"version\"") {
                return Err(LoadError::missing_data(
                    "JSON input has no \"asset\" or \"version\" key",
                ));
            }
            Ok(Format::Json)
        }
        _ => Err(LoadError::invalid_format("Unrecognized file format")),
    }
}

/// Check that braces outside of string literals are balanced.
pub fn validate_json_structure(bytes: &[u8]) -> Result<(), LoadError> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    LoadError::invalid_format("Unmatched closing brace").with_offset(offset)
                })?;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(
            LoadError::invalid_format(format!("{} unclosed brace(s)", depth))
                .with_offset(bytes.len()),
        );
    }
    Ok(())
}

/// Check the GLB file header and the header of its first chunk.
pub fn validate_binary_header(bytes: &[u8]) -> Result<GlbHeader, LoadError> {
    let header = GlbHeader::read(bytes)?;
    if header.magic != GLB_MAGIC {
        return Err(LoadError::invalid_format("Bad GLB magic").with_offset(0));
    }
    if header.version != 2 {
        return Err(LoadError::unsupported_version(format!(
            "GLB version {} is not supported",
            header.version
        ))
        .with_offset(4));
    }

    let total_length = header.length as usize;
    if total_length > bytes.len() {
        return Err(LoadError::corrupted_buffer(format!(
            "Declared length {} exceeds the {} bytes available",
            total_length,
            bytes.len()
        ))
        .with_offset(8));
    }
    if total_length < GLB_HEADER_LENGTH + CHUNK_HEADER_LENGTH {
        return Err(LoadError::corrupted_buffer(format!(
            "Declared length {} leaves no room for a chunk",
            total_length
        ))
        .with_offset(8));
    }

    let chunk = ChunkHeader::read(bytes, GLB_HEADER_LENGTH)?;
    if chunk.chunk_type != CHUNK_TYPE_JSON {
        return Err(LoadError::invalid_format(format!(
            "First chunk has type {:#010x}, expected JSON",
            chunk.chunk_type
        ))
        .with_offset(GLB_HEADER_LENGTH + 4));
    }
    let chunk_end = (chunk.length as usize).saturating_add(GLB_HEADER_LENGTH + CHUNK_HEADER_LENGTH);
    if chunk_end > total_length {
        return Err(LoadError::corrupted_buffer(format!(
            "JSON chunk of {} bytes overruns the declared length {}",
            chunk.length, total_length
        ))
        .with_offset(GLB_HEADER_LENGTH));
    }

    Ok(header)
}
