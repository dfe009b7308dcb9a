//! Simulation bridge
//!
//! The only code path that talks to the engine. Command handlers, session
//! setup and teardown all go through a [`SimBridge`] borrowed for the
//! duration of one call, so every engine interaction happens synchronously on
//! the tick thread.

use crate::capture::{self, OffscreenTarget};
use crate::engine::{
    CameraIndex, Engine, FREE_CAMERA, ModelSize, ObjectState, PerturbMode, Perturbation,
    TargetMarker, Transform,
};
use crate::error::Result;
use crate::protocol::InputReport;

/// Per-camera field of view and the shared offscreen resolution
///
/// Queried once at session start. Slot 0 is the free camera (`-1`), slot
/// `i + 1` is fixed camera `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTable {
    fov: Vec<f32>,
    width: u32,
    height: u32,
}

impl CameraTable {
    /// Read every camera from the engine; the resolution is the same for all
    pub fn query<E: Engine + ?Sized>(engine: &E, ncamera: usize) -> Self {
        let mut fov = Vec::with_capacity(ncamera + 1);
        let mut width = 0;
        let mut height = 0;
        for index in std::iter::once(FREE_CAMERA).chain((0..ncamera).map(|i| i as CameraIndex)) {
            let info = engine.camera(index);
            fov.push(info.fov);
            width = info.width;
            height = info.height;
        }
        Self { fov, width, height }
    }

    /// Field of view for `camera`, falling back to the free camera when out of range
    pub fn fov(&self, camera: CameraIndex) -> f32 {
        usize::try_from(camera + 1)
            .ok()
            .and_then(|slot| self.fov.get(slot))
            .or_else(|| self.fov.first())
            .copied()
            .unwrap_or(45.0)
    }

    /// Offscreen width and height
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of fixed cameras
    pub fn count(&self) -> usize {
        self.fov.len().saturating_sub(1)
    }

    /// Clamp a requested index into `[-1, ncamera - 1]`
    pub fn clamp(&self, requested: i32) -> CameraIndex {
        let last = i32::try_from(self.count()).unwrap_or(i32::MAX) - 1;
        // Not `i32::clamp`: with no fixed cameras `last < FREE_CAMERA`
        requested.min(last).max(FREE_CAMERA)
    }
}

/// Borrowed view of the engine for one operation
pub struct SimBridge<'a, E: Engine + ?Sized> {
    engine: &'a mut E,
}

impl<'a, E: Engine + ?Sized> SimBridge<'a, E> {
    pub fn new(engine: &'a mut E) -> Self {
        Self { engine }
    }

    pub fn model_size(&self) -> ModelSize {
        self.engine.query_size()
    }

    pub fn camera_table(&self, ncamera: usize) -> CameraTable {
        CameraTable::query(&*self.engine, ncamera)
    }

    // ========================================================================
    // Pose injection
    // ========================================================================

    /// Overwrite qpos and recompute kinematics
    pub fn set_pose(&mut self, qpos: &[f32]) -> Result<()> {
        self.engine.set_pose(qpos)?;
        self.engine.recompute_kinematics()
    }

    /// Overwrite mocap targets and recompute kinematics
    pub fn set_mocap(&mut self, positions: &[f32], orientations: &[f32]) -> Result<()> {
        self.engine.set_mocap(positions, orientations)?;
        self.engine.recompute_kinematics()
    }

    // ========================================================================
    // Perturbation
    // ========================================================================

    pub fn perturbation(&self) -> Perturbation {
        self.engine.perturbation()
    }

    /// GetInput response from the current perturbation and `key`
    pub fn input_report(&self, key: i32) -> InputReport {
        InputReport::new(key, &self.engine.perturbation())
    }

    /// Switch perturbation mode, aligning the reference first when a drag starts
    pub fn begin_perturbation(&mut self, mode: PerturbMode) {
        if mode != PerturbMode::Off && self.engine.perturbation().active == 0 {
            self.engine.perturb_synchronize();
        }
        self.engine.set_perturbation_active(mode);
    }

    pub fn set_perturbation_active(&mut self, mode: PerturbMode) {
        self.engine.set_perturbation_active(mode);
    }

    pub fn perturb_rotate(&mut self, dx: f32, dy: f32, modifier: bool) {
        self.engine.perturb_rotate(dx, dy, modifier);
    }

    pub fn perturb_move(&mut self, dx: f32, dy: f32, modifier: bool) {
        self.engine.perturb_move(dx, dy, modifier);
    }

    pub fn perturb_select(&mut self, relx: f32, rely: f32, aspect: f32) {
        self.engine.perturb_select(relx, rely, aspect);
    }

    // ========================================================================
    // Free camera
    // ========================================================================

    pub fn camera_rotate(&mut self, dx: f32, dy: f32) {
        self.engine.camera_rotate(dx, dy);
    }

    pub fn camera_move(&mut self, dx: f32, dy: f32, modifier: bool) {
        self.engine.camera_move(dx, dy, modifier);
    }

    pub fn camera_zoom(&mut self, delta: f32) {
        self.engine.camera_zoom(delta);
    }

    pub fn camera_look_at(&mut self, relx: f32, rely: f32, aspect: f32) {
        self.engine.camera_look_at(relx, rely, aspect);
    }

    // ========================================================================
    // Scene state
    // ========================================================================

    pub fn camera_state(&self, camera: CameraIndex) -> Transform {
        self.engine.camera_state(camera)
    }

    pub fn object_state(&self, index: usize) -> Option<ObjectState> {
        self.engine.object_state(index)
    }

    /// Push every object and the active camera to the renderer
    pub fn refresh_scene(&mut self, camera: CameraIndex, cameras: &CameraTable) {
        let nobject = self.engine.query_size().nobject;
        for index in 0..nobject {
            if let Some(state) = self.engine.object_state(index) {
                self.engine.update_object(index, &state);
            }
        }
        self.refresh_camera(camera, cameras);
    }

    /// Push the active camera's transform and field of view to the renderer
    pub fn refresh_camera(&mut self, camera: CameraIndex, cameras: &CameraTable) {
        let transform = self.engine.camera_state(camera);
        self.engine.update_camera(&transform, cameras.fov(camera));
    }

    pub fn set_target_marker(&mut self, marker: &TargetMarker) {
        self.engine.set_target_marker(marker);
    }

    // ========================================================================
    // Offscreen rendering
    // ========================================================================

    pub fn allocate_target(&mut self, width: u32, height: u32) -> Result<OffscreenTarget> {
        OffscreenTarget::allocate(&mut *self.engine, width, height)
    }

    pub fn release_target(&mut self, target: OffscreenTarget) {
        target.release(&mut *self.engine);
    }

    /// Render `camera` into `target` and return the read-back frame
    pub fn capture<'t>(
        &mut self,
        camera: CameraIndex,
        cameras: &CameraTable,
        target: &'t mut OffscreenTarget,
    ) -> Result<&'t [u8]> {
        self.refresh_camera(camera, cameras);
        capture::capture_frame(&mut *self.engine, target)
    }
}
