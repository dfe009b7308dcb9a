//! Engine collaborator interface
//!
//! The physics/rendering engine owns simulation state and offscreen
//! rendering. The protocol core reaches it only through [`Simulation`] and
//! [`Renderer`], and only from the tick thread.
//!
//! Camera indices follow the engine convention: `-1` is the free camera,
//! `0..ncamera` are the model's fixed cameras.

use crate::error::Result;

/// Camera index, [`FREE_CAMERA`] or a fixed camera
pub type CameraIndex = i32;

/// The user-controlled free camera
pub const FREE_CAMERA: CameraIndex = -1;

/// Model dimensions reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelSize {
    /// Generalized coordinates
    pub nqpos: usize,
    /// Mocap bodies
    pub nmocap: usize,
    /// Fixed cameras
    pub ncamera: usize,
    /// Renderable objects
    pub nobject: usize,
}

/// Rigid transform with per-axis scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    pub xaxis: [f32; 3],
    pub yaxis: [f32; 3],
    pub zaxis: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            xaxis: [1.0, 0.0, 0.0],
            yaxis: [0.0, 1.0, 0.0],
            zaxis: [0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

/// Renderable object state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObjectState {
    pub transform: Transform,
    pub visible: bool,
    pub selected: bool,
}

/// Camera intrinsics; width/height are the offscreen resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub znear: f32,
    pub zfar: f32,
    pub width: u32,
    pub height: u32,
}

/// Interactive perturbation state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Perturbation {
    /// Selected body id, 0 when nothing is selected
    pub select: i32,
    /// Active mode as reported on the wire (see [`PerturbMode`])
    pub active: i32,
    pub reference_position: [f32; 3],
    pub reference_orientation: [f32; 4],
}

/// Perturbation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PerturbMode {
    Off = 0,
    Move = 1,
    Rotate = 2,
}

impl PerturbMode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Opaque handle of an engine-side offscreen surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(pub u32);

/// Scene marker driven by the remote client
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TargetMarker {
    pub position: [f32; 3],
    pub highlighted: bool,
}

/// Simulation side of the engine
pub trait Simulation {
    fn query_size(&self) -> ModelSize;

    /// State of renderable object `index`, `None` if out of range
    fn object_state(&self, index: usize) -> Option<ObjectState>;

    fn camera_state(&self, camera: CameraIndex) -> Transform;

    fn camera(&self, camera: CameraIndex) -> CameraInfo;

    /// Overwrite generalized coordinates (`qpos.len() == nqpos`)
    fn set_pose(&mut self, qpos: &[f32]) -> Result<()>;

    /// Overwrite mocap targets: `3*nmocap` positions, `4*nmocap` quaternions
    fn set_mocap(&mut self, positions: &[f32], orientations: &[f32]) -> Result<()>;

    /// Forward kinematics from the current pose
    fn recompute_kinematics(&mut self) -> Result<()>;

    fn perturbation(&self) -> Perturbation;
    fn set_perturbation_active(&mut self, mode: PerturbMode);
    /// Align the perturbation reference with the selected body
    fn perturb_synchronize(&mut self);
    fn perturb_rotate(&mut self, dx: f32, dy: f32, modifier: bool);
    fn perturb_move(&mut self, dx: f32, dy: f32, modifier: bool);
    /// Select the body under a relative screen point
    fn perturb_select(&mut self, relx: f32, rely: f32, aspect: f32);

    fn camera_rotate(&mut self, dx: f32, dy: f32);
    fn camera_move(&mut self, dx: f32, dy: f32, modifier: bool);
    fn camera_zoom(&mut self, delta: f32);
    fn camera_look_at(&mut self, relx: f32, rely: f32, aspect: f32);
}

/// Rendering side of the engine
pub trait Renderer {
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetHandle>;
    fn release_target(&mut self, target: TargetHandle);

    /// Redirect the scene camera to `target`, `None` restores normal output
    fn set_camera_target(&mut self, target: Option<TargetHandle>);

    /// Render one frame to the current camera target
    fn render(&mut self) -> Result<()>;

    /// Copy `target` into `pixels` as RGB24 rows, bottom row first
    fn read_pixels(&mut self, target: TargetHandle, pixels: &mut [u8]) -> Result<()>;

    fn update_object(&mut self, index: usize, state: &ObjectState);
    fn update_camera(&mut self, transform: &Transform, fov: f32);
    fn set_target_marker(&mut self, marker: &TargetMarker);
}

/// Full engine collaborator
pub trait Engine: Simulation + Renderer {}

impl<T: Simulation + Renderer + ?Sized> Engine for T {}
