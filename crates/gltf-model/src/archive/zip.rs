use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::{self, Read, Seek},
};

use zip::ZipArchive;

use super::ByteLoader;

#[derive(Debug)]
pub enum ZipError {
    Zip(zip::result::ZipError),
    EntryTooLarge { path: String, size: u64 },
}

impl Display for ZipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ZipError::Zip(error) => Display::fmt(error, f),
            ZipError::EntryTooLarge { path, size } => {
                write!(f, "Package entry {} of {} bytes does not fit in memory", path, size)
            }
        }
    }
}

impl Error for ZipError {}

impl From<zip::result::ZipError> for ZipError {
    fn from(value: zip::result::ZipError) -> Self {
        Self::Zip(value)
    }
}

impl From<io::Error> for ZipError {
    fn from(value: io::Error) -> Self {
        Self::Zip(zip::result::ZipError::Io(value))
    }
}

/// PK3 and other zip packages. Entry names use `/` separators.
impl<R: Read + Seek> ByteLoader for ZipArchive<R> {
    type Error = ZipError;

    fn load(&mut self, path: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut entry = match self.by_name(path) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let size = entry.size();
        let capacity = usize::try_from(size).map_err(|_| ZipError::EntryTooLarge {
            path: path.to_string(),
            size,
        })?;
        let mut buffer = Vec::with_capacity(capacity);
        entry.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }
}
