use std::{collections::HashMap, convert::Infallible};

use super::ByteLoader;

/// Byte loader backed by a table of paths to contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P: Into<String>>(&mut self, path: P, data: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(path.into(), data)
    }

    pub fn with_entry<P: Into<String>>(mut self, path: P, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ByteLoader for MemoryArchive {
    type Error = Infallible;

    fn load(&mut self, path: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.entries.get(path).cloned())
    }
}
