//! Byte loading for resources referenced by a model.
//!
//! The loader never touches the file system on its own. External buffers and
//! images are fetched through a [`ByteLoader`], so a model and its resources
//! can live in a directory, an in-memory table or a packed archive.
use std::{
    error::Error,
    fs, io,
    path::{Component, Path, PathBuf},
};

mod memory;
#[cfg(feature = "zip")]
pub mod zip;

pub use memory::MemoryArchive;

pub trait ByteLoader {
    type Error: Error;

    /// Return the full content at `path`, or `None` when there is no such
    /// entry.
    fn load(&mut self, path: &str) -> Result<Option<Vec<u8>>, Self::Error>;
}

impl<L: ByteLoader + ?Sized> ByteLoader for &mut L {
    type Error = L::Error;

    fn load(&mut self, path: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).load(path)
    }
}

/// Loads resources from a directory on the local file system.
///
/// Paths are joined onto the root directory. Paths that try to leave the root
/// with `..` or that are absolute are treated as not found.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ByteLoader for DirectoryArchive {
    type Error = io::Error;

    fn load(&mut self, path: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Ok(None);
        }
        match fs::read(self.root.join(relative)) {
            Ok(data) => Ok(Some(data)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }
}
