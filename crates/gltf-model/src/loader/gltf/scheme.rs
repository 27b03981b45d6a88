use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use base64::{engine::general_purpose::STANDARD, Engine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    Unsupported(String),
    BadDataUri,
}

impl Display for SchemeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchemeError::Unsupported(scheme) => write!(f, "Unsupported scheme {}", scheme),
            SchemeError::BadDataUri => write!(f, "Bad data URI"),
        }
    }
}

impl Error for SchemeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Scheme<'a> {
    // Data uri with optional mime type
    Data(Option<&'a str>, Vec<u8>),
    // Relative to the model file
    Relative(&'a str),
    // Absolute path
    Absolute(&'a str),
}

#[inline]
fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

impl<'a> TryFrom<&'a str> for Scheme<'a> {
    type Error = SchemeError;

    fn try_from(uri: &'a str) -> Result<Self, Self::Error> {
        let Some((scheme, _)) = uri.split_once(':') else {
            return Ok(Scheme::Relative(uri));
        };

        if let Some(content) = strip_prefix_ignore_case(uri, "data:") {
            // Data URI: rfc2397
            let Some((param, value)) = content.split_once(',') else {
                return Err(SchemeError::BadDataUri);
            };
            if let Some((mime, encoding)) = param.rsplit_once(';') {
                if encoding.eq_ignore_ascii_case("base64") {
                    let data = STANDARD
                        .decode(value)
                        .map_err(|_| SchemeError::BadDataUri)?;
                    let mime = (!mime.is_empty()).then_some(mime);
                    Ok(Scheme::Data(mime, data))
                } else {
                    Err(SchemeError::BadDataUri)
                }
            } else {
                // Percent-encoded text, kept as is
                let mime = (!param.is_empty()).then_some(param);
                Ok(Scheme::Data(mime, Vec::from(value.as_bytes())))
            }
        } else if let Some(path) = strip_prefix_ignore_case(uri, "file://") {
            Ok(Scheme::Absolute(path))
        } else if let Some(path) = strip_prefix_ignore_case(uri, "file:") {
            Ok(Scheme::Absolute(path))
        } else {
            Err(SchemeError::Unsupported(scheme.to_string()))
        }
    }
}

/// Directory part of a load path, including the trailing `/`.
///
/// A path without any `/` has an empty base.
pub fn base_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..=index],
        None => "",
    }
}

impl Scheme<'_> {
    /// Path handed to the byte loader, or `None` for inline data.
    pub(crate) fn resolve_path(&self, base: &str) -> Option<String> {
        match self {
            Scheme::Data(..) => None,
            Scheme::Relative(path) => Some(format!("{}{}", base, path)),
            Scheme::Absolute(path) => Some(path.to_string()),
        }
    }
}
