use std::fs;
use std::path::Path;

use miette::Result;

use crate::error;
use crate::memory::MEMORY_MAX;

/// A decoded program image: payload words and the address they load at.
///
/// On disk an image is a stream of big-endian 16-bit words; the first word
/// is the origin, the rest are content. Words are normalized to host order
/// on decode.
pub struct Image {
    origin: u16,
    words: Vec<u16>,
}

impl Image {
    pub fn load_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| error::image_unreadable(path, &err))?;
        Self::from_bytes(path, &bytes)
    }

    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(error::image_empty(path));
        }
        if bytes.len() % 2 != 0 {
            return Err(error::image_misaligned(path));
        }

        let origin = u16::from_be_bytes([bytes[0], bytes[1]]);
        let words = bytes[2..]
            .chunks_exact(2)
            .take(MEMORY_MAX - origin as usize)
            .map(|word| u16::from_be_bytes([word[0], word[1]]))
            .collect();

        Ok(Self { origin, words })
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }
}
