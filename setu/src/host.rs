//! Host-side state shared across sessions
//!
//! Values the host loop feeds in (key presses, controller telemetry) and
//! values the client sets that outlive a single connection (active camera,
//! target marker).

use crate::engine::{CameraIndex, FREE_CAMERA, TargetMarker};
use crate::protocol::ControllerState;

#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    /// Last key code, cleared when reported through GetInput
    pub last_key: i32,
    /// Latest hand-controller telemetry
    pub controller: ControllerState,
    /// Camera rendered by GetImage / SaveSnapshot / SaveVideoFrame
    pub camera: CameraIndex,
    /// Scene target marker
    pub target: TargetMarker,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            last_key: 0,
            controller: ControllerState::default(),
            camera: FREE_CAMERA,
            target: TargetMarker::default(),
        }
    }
}

impl HostState {
    /// Report-and-clear the last key
    pub fn take_key(&mut self) -> i32 {
        std::mem::take(&mut self.last_key)
    }
}
