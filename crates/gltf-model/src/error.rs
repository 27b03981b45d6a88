use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Category of a load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFormat,
    UnsupportedVersion,
    MissingRequiredData,
    CorruptedBuffer,
    OutOfMemory,
    LibraryError,
    TextureLoadFailure,
    AnimationError,
    ValidationFailure,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidFormat => write!(f, "Invalid file format"),
            ErrorKind::UnsupportedVersion => write!(f, "Unsupported glTF version"),
            ErrorKind::MissingRequiredData => write!(f, "Missing required data"),
            ErrorKind::CorruptedBuffer => write!(f, "Corrupted buffer data"),
            ErrorKind::OutOfMemory => write!(f, "Out of memory"),
            ErrorKind::LibraryError => write!(f, "Library error"),
            ErrorKind::TextureLoadFailure => write!(f, "Texture load failure"),
            ErrorKind::AnimationError => write!(f, "Animation error"),
            ErrorKind::ValidationFailure => write!(f, "Validation failure"),
        }
    }
}

/// A failure with its kind, a message and optionally the byte offset in the
/// input where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    kind: ErrorKind,
    message: String,
    offset: Option<usize>,
}

impl LoadError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFormat, message)
    }

    pub fn unsupported_version(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedVersion, message)
    }

    pub fn missing_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingRequiredData, message)
    }

    pub fn corrupted_buffer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptedBuffer, message)
    }

    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfMemory, message)
    }

    pub fn texture(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TextureLoadFailure, message)
    }

    pub fn animation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AnimationError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailure, message)
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " (offset {})", offset)?;
        }
        Ok(())
    }
}

impl Error for LoadError {}

impl From<gltf::Error> for LoadError {
    fn from(value: gltf::Error) -> Self {
        Self::new(ErrorKind::LibraryError, value.to_string())
    }
}

impl From<base64::DecodeError> for LoadError {
    fn from(value: base64::DecodeError) -> Self {
        Self::corrupted_buffer(format!("Bad data URI: {}", value))
    }
}

impl From<image::ImageError> for LoadError {
    fn from(value: image::ImageError) -> Self {
        Self::texture(value.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::{ErrorKind, LoadError};

    #[test]
    fn display_includes_offset() {
        let error = LoadError::invalid_format("Unmatched closing brace").with_offset(17);
        assert_eq!(error.kind(), ErrorKind::InvalidFormat);
        assert_eq!(
            error.to_string(),
            "Invalid file format: Unmatched closing brace (offset 17)"
        );
    }

    #[test]
    fn display_without_offset() {
        let error = LoadError::animation("Missing keyframe times");
        assert_eq!(error.offset(), None);
        assert_eq!(error.to_string(), "Animation error: Missing keyframe times");
    }
}
