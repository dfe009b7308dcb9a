//! PNG snapshots of captured frames

use super::frame_size;
use crate::error::{Error, Result};
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes `<dir>/<prefix><n>.png`, `n` counting up from 0 for the life of the writer
///
/// The writer lives in the server, not the session, so numbering continues
/// across reconnects.
pub struct SnapshotWriter {
    dir: PathBuf,
    prefix: String,
    next_index: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            next_index: 0,
        }
    }

    /// Encode one bottom-up RGB frame as a top-down PNG
    ///
    /// The counter only advances once the file is written.
    pub fn save(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<PathBuf> {
        let size_mismatch = Error::FrameSize {
            len: pixels.len(),
            width,
            height,
        };
        if pixels.len() != frame_size(width, height) {
            return Err(size_mismatch);
        }
        let path = self.path_for(self.next_index);
        let image = RgbImage::from_raw(width, height, flip_rows(pixels, width as usize * 3))
            .ok_or(size_mismatch)?;

        fs::create_dir_all(&self.dir)?;
        image.save_with_format(&path, ImageFormat::Png)?;
        self.next_index += 1;
        log::debug!("Saved snapshot {}", path.display());
        Ok(path)
    }

    /// Index the next snapshot will use
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}{}.png", self.prefix, index))
    }
}

/// Reverse row order (bottom-up read-back to top-down image)
fn flip_rows(pixels: &[u8], stride: usize) -> Vec<u8> {
    if stride == 0 {
        return pixels.to_vec();
    }
    pixels
        .chunks_exact(stride)
        .rev()
        .flatten()
        .copied()
        .collect()
}
