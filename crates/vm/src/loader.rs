//! Bytecode image loader.
//!
//! The only part of the machine that touches the filesystem. The whole
//! file is read into an owned buffer that stays immutable for the
//! machine's lifetime.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::LoadError;

/// Raw bytes of an image, not yet materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    bytes: Box<[u8]>,
}

impl Image {
    /// Read an image file. Missing, unreadable and empty files are all
    /// `ImageUnreadable`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let unreadable = |reason: String| LoadError::ImageUnreadable {
            path: path.display().to_string(),
            reason,
        };

        let bytes = fs::read(path).map_err(|e| unreadable(e.to_string()))?;
        if bytes.is_empty() {
            return Err(unreadable("file is empty".to_string()));
        }

        debug!(path = %path.display(), size = bytes.len(), "image loaded");
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Wrap bytes already in memory.
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
