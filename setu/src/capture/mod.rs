//! Frame capture pipeline
//!
//! Renders the active camera into the session's offscreen target, reads the
//! result back into a CPU mirror and hands the bytes to one of three sinks:
//!
//! | Sink | Command | Row order |
//! |------|---------|-----------|
//! | Socket | `GetImage` | bottom-up (raw read-back) |
//! | [`SnapshotWriter`] | `SaveSnapshot` | top-down PNG |
//! | [`VideoSink`] | `SaveVideoFrame` | bottom-up (raw read-back) |
//!
//! Pixels are RGB24, `width * height * 3` bytes, fixed for the process.

mod snapshot;
mod video;

pub use snapshot::SnapshotWriter;
pub use video::VideoSink;

use crate::engine::{Renderer, TargetHandle};
use crate::error::{Error, Result};
use crate::protocol::codec::BYTES_PER_PIXEL;

/// Engine-side offscreen surface plus its CPU mirror
///
/// Owned by the session; released exactly once, at teardown.
pub struct OffscreenTarget {
    handle: TargetHandle,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl OffscreenTarget {
    /// Create the engine surface and size the mirror to one RGB frame
    pub fn allocate<R: Renderer + ?Sized>(renderer: &mut R, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::RenderTarget(format!(
                "invalid offscreen size {}x{}",
                width, height
            )));
        }
        let handle = renderer.create_target(width, height).map_err(|e| match e {
            Error::RenderTarget(msg) => Error::RenderTarget(msg),
            other => Error::RenderTarget(other.to_string()),
        })?;
        log::debug!("Allocated offscreen target {:?} ({}x{})", handle, width, height);
        Ok(Self {
            handle,
            width,
            height,
            pixels: vec![0u8; frame_size(width, height)],
        })
    }

    /// Give the surface back to the engine
    pub fn release<R: Renderer + ?Sized>(self, renderer: &mut R) {
        log::debug!("Releasing offscreen target {:?}", self.handle);
        renderer.release_target(self.handle);
    }

    pub fn handle(&self) -> TargetHandle {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Last captured frame, rows bottom-up
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Bytes in one RGB24 frame
pub fn frame_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Render into `target` and read the frame back into its mirror
///
/// The camera output is redirected to the target for the duration of the
/// call and restored on every path, including render or read-back failure.
pub fn capture_frame<'t, R: Renderer + ?Sized>(
    renderer: &mut R,
    target: &'t mut OffscreenTarget,
) -> Result<&'t [u8]> {
    renderer.set_camera_target(Some(target.handle));
    let result = renderer
        .render()
        .and_then(|()| renderer.read_pixels(target.handle, &mut target.pixels));
    renderer.set_camera_target(None);
    result?;
    Ok(&target.pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MockEngine;

    #[test]
    fn test_allocate_sizes_mirror() {
        let mut engine = MockEngine::with_resolution(8, 4);
        let target = OffscreenTarget::allocate(&mut engine, 8, 4).unwrap();
        assert_eq!(target.pixels().len(), 8 * 4 * 3);
        assert_eq!(engine.live_targets(), 1);
        target.release(&mut engine);
        assert_eq!(engine.live_targets(), 0);
    }

    #[test]
    fn test_allocation_failure() {
        let mut engine = MockEngine::with_resolution(8, 4);
        engine.fail_target_allocation(true);
        let result = OffscreenTarget::allocate(&mut engine, 8, 4);
        assert!(matches!(result, Err(Error::RenderTarget(_))));
        assert!(matches!(
            OffscreenTarget::allocate(&mut engine, 0, 4),
            Err(Error::RenderTarget(_))
        ));
    }

    #[test]
    fn test_capture_restores_camera_target() {
        let mut engine = MockEngine::with_resolution(8, 4);
        let mut target = OffscreenTarget::allocate(&mut engine, 8, 4).unwrap();

        let frame = capture_frame(&mut engine, &mut target).unwrap();
        assert_eq!(frame.len(), 96);
        assert_eq!(engine.camera_target(), None);
    }

    #[test]
    fn test_capture_restores_camera_target_on_failure() {
        let mut engine = MockEngine::with_resolution(8, 4);
        let mut target = OffscreenTarget::allocate(&mut engine, 8, 4).unwrap();
        engine.fail_render(true);

        assert!(capture_frame(&mut engine, &mut target).is_err());
        assert_eq!(engine.camera_target(), None);
    }
}
