//! LC-3 program image (`.obj`) format.
//!
//! An image is a sequence of big-endian 16-bit words:
//! - Word 0 is the origin: the load address and the initial PC
//! - Every following word is stored at origin, origin + 1, ...
//!
//! There is no length field; the image ends with the byte stream.

use std::io::Read;
use std::path::Path;

use crate::cpu::registers::DEFAULT_ORIGIN;
use thiserror::Error;

/// A parsed program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    /// Load address and initial program counter.
    pub origin: u16,
    /// Words to place at consecutive addresses from `origin`.
    pub words: Vec<u16>,
}

impl ProgramImage {
    /// Create an image from an origin and its words.
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        Self { origin, words }
    }

    /// Parse an image from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        let len = bytes.len();
        let mut words = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));

        let Some(origin) = words.next() else {
            return Err(ImageError::MissingOrigin { len });
        };
        if len % 2 != 0 {
            return Err(ImageError::Truncated { len });
        }

        let image = Self::new(origin, words.collect());

        log::debug!(
            "parsed image: origin {:#06x}, {} words",
            image.origin,
            image.len()
        );
        Ok(image)
    }

    /// Read an entire image from `reader`.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ImageError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ImageError::IoError(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Number of words after the origin.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if the image carries no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Address one past the last loaded word (wrapping).
    pub fn end(&self) -> u16 {
        self.origin.wrapping_add(self.words.len() as u16)
    }
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN, Vec::new())
    }
}

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| ImageError::IoError(format!("{}: {}", path.display(), e)))?;
    ProgramImage::from_reader(std::io::BufReader::new(file))
}

/// Errors that can occur while loading a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("image of {len} bytes has no origin word")]
    MissingOrigin { len: usize },

    #[error("image of {len} bytes ends in the middle of a word")]
    Truncated { len: usize },

    #[error("I/O error: {0}")]
    IoError(String),
}
