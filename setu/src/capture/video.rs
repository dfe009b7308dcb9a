//! Raw append-only video stream

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Raw RGB24 frames appended back to back, no container or header
///
/// Opened lazily on the first `SaveVideoFrame` of a session (truncating any
/// previous file) and closed at teardown.
pub struct VideoSink {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
}

impl VideoSink {
    /// Create or truncate the video file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        log::info!("Recording video frames to {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            frames: 0,
        })
    }

    pub fn append(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.write_all(frame)?;
        self.frames += 1;
        Ok(())
    }

    /// Frames appended so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file
    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        log::info!(
            "Closed video {} ({} frames)",
            self.path.display(),
            self.frames
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_frames_appended_raw() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video.raw");

        let mut sink = VideoSink::create(&path).unwrap();
        sink.append(&[1, 2, 3]).unwrap();
        sink.append(&[4, 5, 6]).unwrap();
        assert_eq!(sink.frames(), 2);
        sink.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_create_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video.raw");
        std::fs::write(&path, [9u8; 32]).unwrap();

        let sink = VideoSink::create(&path).unwrap();
        sink.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 0);
    }
}
