//! Mock engine for hardware-free runs
//!
//! [`MockEngine`] stands in for the physics/rendering engine so the remote
//! server can be exercised without a GPU or a physics library. It keeps a
//! small but consistent model:
//!
//! | Part | Model |
//! |------|-------|
//! | Bodies `0..nqpos` | planar serial chain, joint angles from qpos |
//! | Bodies `nqpos..nqpos+nmocap` | free bodies placed by mocap positions |
//! | Free camera (`-1`) | orbit camera (look-at, distance, azimuth, elevation) |
//! | Fixed cameras `0..ncamera` | top-down, increasing height |
//! | Renderer | software rasterizer into RGB24 targets, rows bottom-up |
//!
//! The renderer only draws what was pushed through `update_object`,
//! `update_camera` and `set_target_marker`, like a real scene graph would.
//!
//! Failure switches ([`fail_target_allocation`](MockEngine::fail_target_allocation),
//! [`fail_render`](MockEngine::fail_render)) let tests drive error paths.

mod camera;
mod raster;

use crate::config::MockConfig;
use crate::engine::{
    CameraIndex, CameraInfo, FREE_CAMERA, ModelSize, ObjectState, PerturbMode, Perturbation,
    Renderer, Simulation, TargetHandle, TargetMarker, Transform,
};
use crate::error::{Error, Result};
use camera::{OrbitCamera, Vec3, add, dot, ground_hit, project, quat_axis_angle, quat_mul, sub};
use raster::Canvas;
use std::collections::HashMap;

/// Length of each chain link in meters
const LINK_LENGTH: f32 = 0.4;
/// Drawn half-size of chain bodies
const BODY_SIZE: f32 = 0.08;
/// Drawn half-size of mocap bodies
const MOCAP_SIZE: f32 = 0.06;
/// Free camera field of view in degrees
const FREE_FOV: f32 = 45.0;
/// Selection radius in relative screen units
const PICK_RADIUS: f32 = 0.08;

const IDENTITY_QUAT: [f32; 4] = [1.0, 0.0, 0.0, 0.0];

pub struct MockEngine {
    nqpos: usize,
    nmocap: usize,
    ncamera: usize,
    width: u32,
    height: u32,

    qpos: Vec<f32>,
    mocap_pos: Vec<Vec3>,
    mocap_quat: Vec<[f32; 4]>,
    /// Body positions from the last kinematics pass
    bodies: Vec<Vec3>,
    perturb: Perturbation,
    free_camera: OrbitCamera,

    // Renderer side
    targets: HashMap<TargetHandle, Canvas>,
    next_target: u32,
    camera_target: Option<TargetHandle>,
    scene: Vec<Option<ObjectState>>,
    view: Option<(Transform, f32)>,
    marker: Option<TargetMarker>,

    fail_alloc: bool,
    fail_render: bool,
}

impl MockEngine {
    pub fn new(config: &MockConfig) -> Self {
        let mut engine = Self {
            nqpos: config.nqpos,
            nmocap: config.nmocap,
            ncamera: config.ncamera,
            width: config.width,
            height: config.height,
            qpos: Vec::new(),
            mocap_pos: Vec::new(),
            mocap_quat: Vec::new(),
            bodies: Vec::new(),
            perturb: Perturbation {
                reference_orientation: IDENTITY_QUAT,
                ..Perturbation::default()
            },
            free_camera: OrbitCamera::new([0.0; 3]),
            targets: HashMap::new(),
            next_target: 1,
            camera_target: None,
            scene: Vec::new(),
            view: None,
            marker: None,
            fail_alloc: false,
            fail_render: false,
        };
        engine.resize_model(config.nqpos, config.nmocap);
        engine.free_camera = OrbitCamera::new(engine.chain_center());
        engine
    }

    /// Three-link chain, one mocap body, two fixed cameras
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self::new(&MockConfig {
            nqpos: 3,
            nmocap: 1,
            ncamera: 2,
            width,
            height,
        })
    }

    /// Change the model dimensions, resetting pose and mocap data
    pub fn resize_model(&mut self, nqpos: usize, nmocap: usize) {
        self.nqpos = nqpos;
        self.nmocap = nmocap;
        self.qpos = vec![0.0; nqpos];
        self.mocap_pos = (0..nmocap)
            .map(|i| [LINK_LENGTH * (i as f32 + 1.0), -0.5, 0.0])
            .collect();
        self.mocap_quat = vec![IDENTITY_QUAT; nmocap];
        self.perturb.select = 0;
        self.perturb.active = 0;
        self.run_kinematics();
    }

    fn run_kinematics(&mut self) {
        self.bodies.clear();
        let mut angle = 0.0f32;
        let mut position = [0.0f32; 3];
        for q in &self.qpos {
            angle += q;
            position = add(position, [LINK_LENGTH * angle.cos(), LINK_LENGTH * angle.sin(), 0.0]);
            self.bodies.push(position);
        }
        self.bodies.extend(self.mocap_pos.iter().copied());
    }

    fn chain_center(&self) -> Vec3 {
        let reach = LINK_LENGTH * self.nqpos.max(1) as f32;
        [reach * 0.5, 0.0, 0.0]
    }

    fn nobject(&self) -> usize {
        self.nqpos + self.nmocap
    }

    #[cfg(test)]
    fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Current view for picking: last camera pushed to the renderer, else the free camera
    fn pick_view(&self) -> (Transform, f32) {
        self.view
            .unwrap_or_else(|| (self.free_camera.transform(), FREE_FOV))
    }

    // ========================================================================
    // Inspection and failure injection
    // ========================================================================

    pub fn qpos(&self) -> &[f32] {
        &self.qpos
    }

    pub fn mocap_position(&self, index: usize) -> Option<[f32; 3]> {
        self.mocap_pos.get(index).copied()
    }

    pub fn mocap_orientation(&self, index: usize) -> Option<[f32; 4]> {
        self.mocap_quat.get(index).copied()
    }

    /// Select body `id` (1-based, 0 clears), as a pick would
    pub fn select_body(&mut self, id: i32) {
        let valid = usize::try_from(id).is_ok_and(|i| i <= self.nobject());
        self.perturb.select = if valid { id } else { 0 };
        self.perturb.active = 0;
    }

    /// Offscreen targets currently allocated
    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Where the camera currently renders, `None` for normal output
    pub fn camera_target(&self) -> Option<TargetHandle> {
        self.camera_target
    }

    /// Objects pushed to the renderer so far
    pub fn scene_objects(&self) -> usize {
        self.scene.iter().filter(|s| s.is_some()).count()
    }

    /// Field of view of the last camera pushed to the renderer
    pub fn view_fov(&self) -> Option<f32> {
        self.view.map(|(_, fov)| fov)
    }

    pub fn marker(&self) -> Option<TargetMarker> {
        self.marker
    }

    pub fn fail_target_allocation(&mut self, fail: bool) {
        self.fail_alloc = fail;
    }

    pub fn fail_render(&mut self, fail: bool) {
        self.fail_render = fail;
    }
}

impl Simulation for MockEngine {
    fn query_size(&self) -> ModelSize {
        ModelSize {
            nqpos: self.nqpos,
            nmocap: self.nmocap,
            ncamera: self.ncamera,
            nobject: self.nobject(),
        }
    }

    fn object_state(&self, index: usize) -> Option<ObjectState> {
        let position = *self.bodies.get(index)?;
        let size = if index < self.nqpos {
            BODY_SIZE
        } else {
            MOCAP_SIZE
        };
        Some(ObjectState {
            transform: Transform {
                position,
                scale: [size; 3],
                ..Transform::default()
            },
            visible: true,
            selected: usize::try_from(self.perturb.select).is_ok_and(|s| s == index + 1),
        })
    }

    fn camera_state(&self, camera: CameraIndex) -> Transform {
        match usize::try_from(camera) {
            Ok(index) if index < self.ncamera => {
                let center = self.chain_center();
                Transform {
                    position: [center[0], center[1], 2.0 + index as f32],
                    ..Transform::default()
                }
            }
            _ => self.free_camera.transform(),
        }
    }

    fn camera(&self, camera: CameraIndex) -> CameraInfo {
        let fov = if camera == FREE_CAMERA {
            FREE_FOV
        } else {
            60.0
        };
        CameraInfo {
            fov,
            znear: 0.01,
            zfar: 50.0,
            width: self.width,
            height: self.height,
        }
    }

    fn set_pose(&mut self, qpos: &[f32]) -> Result<()> {
        if qpos.len() != self.nqpos {
            return Err(Error::Engine(format!(
                "qpos has {} values, model expects {}",
                qpos.len(),
                self.nqpos
            )));
        }
        if qpos.iter().any(|q| !q.is_finite()) {
            return Err(Error::Engine("qpos contains non-finite values".to_string()));
        }
        self.qpos.copy_from_slice(qpos);
        Ok(())
    }

    fn set_mocap(&mut self, positions: &[f32], orientations: &[f32]) -> Result<()> {
        if positions.len() != 3 * self.nmocap || orientations.len() != 4 * self.nmocap {
            return Err(Error::Engine(format!(
                "mocap data has {}+{} values, model expects {}+{}",
                positions.len(),
                orientations.len(),
                3 * self.nmocap,
                4 * self.nmocap
            )));
        }
        for (pos, chunk) in self.mocap_pos.iter_mut().zip(positions.chunks_exact(3)) {
            pos.copy_from_slice(chunk);
        }
        for (quat, chunk) in self.mocap_quat.iter_mut().zip(orientations.chunks_exact(4)) {
            quat.copy_from_slice(chunk);
        }
        Ok(())
    }

    fn recompute_kinematics(&mut self) -> Result<()> {
        self.run_kinematics();
        Ok(())
    }

    fn perturbation(&self) -> Perturbation {
        self.perturb
    }

    fn set_perturbation_active(&mut self, mode: PerturbMode) {
        self.perturb.active = if self.perturb.select > 0 {
            mode.as_i32()
        } else {
            PerturbMode::Off.as_i32()
        };
    }

    fn perturb_synchronize(&mut self) {
        let Some(index) = usize::try_from(self.perturb.select - 1).ok() else {
            return;
        };
        if let Some(body) = self.bodies.get(index) {
            self.perturb.reference_position = *body;
            self.perturb.reference_orientation = IDENTITY_QUAT;
        }
    }

    fn perturb_rotate(&mut self, dx: f32, dy: f32, modifier: bool) {
        if self.perturb.active != PerturbMode::Rotate.as_i32() {
            return;
        }
        let (axis, amount) = if modifier {
            ([1.0, 0.0, 0.0], dy)
        } else {
            ([0.0, 0.0, 1.0], dx)
        };
        let turn = quat_axis_angle(axis, amount * std::f32::consts::PI);
        self.perturb.reference_orientation = quat_mul(turn, self.perturb.reference_orientation);
    }

    fn perturb_move(&mut self, dx: f32, dy: f32, modifier: bool) {
        if self.perturb.active != PerturbMode::Move.as_i32() {
            return;
        }
        let step = self.free_camera.distance;
        let delta = if modifier {
            [0.0, 0.0, dy * step]
        } else {
            [dx * step, dy * step, 0.0]
        };
        self.perturb.reference_position = add(self.perturb.reference_position, delta);
    }

    fn perturb_select(&mut self, relx: f32, rely: f32, aspect: f32) {
        let (view, fov) = self.pick_view();
        let mut best: Option<(usize, f32)> = None;
        for (index, body) in self.bodies.iter().enumerate() {
            let Some((x, y, _)) = project(&view, fov, aspect, *body) else {
                continue;
            };
            let offset = sub([x, y, 0.0], [relx, rely, 0.0]);
            let distance = dot(offset, offset).sqrt();
            if distance < PICK_RADIUS && best.is_none_or(|(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }
        self.perturb.select = best.map_or(0, |(index, _)| index as i32 + 1);
        self.perturb.active = PerturbMode::Off.as_i32();
        log::debug!("Mock: selected body {}", self.perturb.select);
    }

    fn camera_rotate(&mut self, dx: f32, dy: f32) {
        self.free_camera.rotate(dx, dy);
    }

    fn camera_move(&mut self, dx: f32, dy: f32, modifier: bool) {
        self.free_camera.pan(dx, dy, modifier);
    }

    fn camera_zoom(&mut self, delta: f32) {
        self.free_camera.zoom(delta);
    }

    fn camera_look_at(&mut self, relx: f32, rely: f32, aspect: f32) {
        let view = self.free_camera.transform();
        if let Some(point) = ground_hit(&view, FREE_FOV, aspect, relx, rely) {
            self.free_camera.lookat = point;
        }
    }
}

impl Renderer for MockEngine {
    fn create_target(&mut self, width: u32, height: u32) -> Result<TargetHandle> {
        if self.fail_alloc {
            return Err(Error::RenderTarget(format!(
                "mock: cannot allocate {}x{} target",
                width, height
            )));
        }
        let handle = TargetHandle(self.next_target);
        self.next_target += 1;
        self.targets.insert(handle, Canvas::new(width, height));
        Ok(handle)
    }

    fn release_target(&mut self, target: TargetHandle) {
        if self.targets.remove(&target).is_none() {
            log::warn!("Mock: release of unknown target {:?}", target);
        }
    }

    fn set_camera_target(&mut self, target: Option<TargetHandle>) {
        self.camera_target = target;
    }

    fn render(&mut self) -> Result<()> {
        if self.fail_render {
            return Err(Error::Engine("mock: render failed".to_string()));
        }
        let Some(handle) = self.camera_target else {
            return Ok(());
        };
        let canvas = self
            .targets
            .get_mut(&handle)
            .ok_or_else(|| Error::RenderTarget(format!("unknown target {:?}", handle)))?;
        canvas.draw(&self.scene, self.view.as_ref(), self.marker.as_ref());
        Ok(())
    }

    fn read_pixels(&mut self, target: TargetHandle, pixels: &mut [u8]) -> Result<()> {
        let canvas = self
            .targets
            .get(&target)
            .ok_or_else(|| Error::RenderTarget(format!("unknown target {:?}", target)))?;
        if pixels.len() != canvas.pixels.len() {
            return Err(Error::RenderTarget(format!(
                "read-back buffer is {} bytes, {}x{} target needs {}",
                pixels.len(),
                canvas.width,
                canvas.height,
                canvas.pixels.len()
            )));
        }
        pixels.copy_from_slice(&canvas.pixels);
        Ok(())
    }

    fn update_object(&mut self, index: usize, state: &ObjectState) {
        if self.scene.len() <= index {
            self.scene.resize(index + 1, None);
        }
        self.scene[index] = Some(*state);
    }

    fn update_camera(&mut self, transform: &Transform, fov: f32) {
        self.view = Some((*transform, fov));
    }

    fn set_target_marker(&mut self, marker: &TargetMarker) {
        self.marker = Some(*marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_from_config() {
        let engine = MockEngine::new(&MockConfig::default());
        let size = engine.query_size();
        assert_eq!(size.nqpos, 7);
        assert_eq!(size.nmocap, 1);
        assert_eq!(size.ncamera, 2);
        assert_eq!(size.nobject, 8);
        assert_eq!(engine.camera(0).width, 640);
    }

    #[test]
    fn test_chain_kinematics() {
        let mut engine = MockEngine::with_resolution(8, 8);
        engine
            .set_pose(&[std::f32::consts::FRAC_PI_2, 0.0, 0.0])
            .unwrap();
        engine.recompute_kinematics().unwrap();

        let tip = engine.object_state(2).unwrap().transform.position;
        assert!(tip[0].abs() < 1e-5);
        assert!((tip[1] - 3.0 * LINK_LENGTH).abs() < 1e-5);
    }

    #[test]
    fn test_mocap_bodies_follow_positions() {
        let mut engine = MockEngine::with_resolution(8, 8);
        engine
            .set_mocap(&[1.0, 2.0, 0.5], &[0.0, 0.0, 0.0, 1.0])
            .unwrap();
        engine.recompute_kinematics().unwrap();
        let body = engine.object_state(3).unwrap();
        assert_eq!(body.transform.position, [1.0, 2.0, 0.5]);
        assert_eq!(engine.object_state(4), None);
    }

    #[test]
    fn test_invalid_pose_rejected() {
        let mut engine = MockEngine::with_resolution(8, 8);
        assert!(matches!(
            engine.set_pose(&[0.0, f32::NAN, 0.0]),
            Err(Error::Engine(_))
        ));
        assert!(matches!(
            engine.set_mocap(&[0.0; 3], &[0.0; 3]),
            Err(Error::Engine(_))
        ));
    }

    #[test]
    fn test_pick_selects_body_under_cursor() {
        let mut engine = MockEngine::with_resolution(64, 48);
        let body = engine.object_state(1).unwrap().transform.position;
        let view = engine.free_camera.transform();
        let (x, y, _) = project(&view, FREE_FOV, engine.aspect(), body).unwrap();

        engine.perturb_select(x, y, engine.aspect());
        assert_eq!(engine.perturbation().select, 2);
        assert!(engine.object_state(1).unwrap().selected);

        engine.perturb_select(0.0, 0.0, engine.aspect());
        assert_eq!(engine.perturbation().select, 0);
    }

    #[test]
    fn test_perturb_requires_selection() {
        let mut engine = MockEngine::with_resolution(8, 8);
        engine.set_perturbation_active(PerturbMode::Move);
        assert_eq!(engine.perturbation().active, 0);

        engine.select_body(1);
        engine.set_perturbation_active(PerturbMode::Rotate);
        engine.perturb_rotate(0.5, 0.0, false);
        let q = engine.perturbation().reference_orientation;
        assert!((q[0] - (std::f32::consts::FRAC_PI_4).cos()).abs() < 1e-5);
    }

    #[test]
    fn test_look_at_moves_free_camera() {
        let mut engine = MockEngine::with_resolution(8, 8);
        let before = engine.camera_state(FREE_CAMERA);
        engine.camera_look_at(0.9, 0.5, 1.0);
        assert_ne!(engine.camera_state(FREE_CAMERA).position, before.position);
    }

    #[test]
    fn test_fixed_cameras_stack_upward() {
        let engine = MockEngine::with_resolution(8, 8);
        let low = engine.camera_state(0).position;
        let high = engine.camera_state(1).position;
        assert!(high[2] > low[2]);
        // Out of range falls back to the free camera
        assert_eq!(engine.camera_state(5), engine.camera_state(FREE_CAMERA));
    }

    #[test]
    fn test_read_pixels_checks_buffer() {
        let mut engine = MockEngine::with_resolution(4, 2);
        let target = engine.create_target(4, 2).unwrap();
        let mut short = vec![0u8; 5];
        assert!(engine.read_pixels(target, &mut short).is_err());
        let mut exact = vec![0u8; 24];
        assert!(engine.read_pixels(target, &mut exact).is_ok());
        engine.release_target(target);
        assert!(engine.read_pixels(target, &mut exact).is_err());
    }

    #[test]
    fn test_render_without_target_is_noop() {
        let mut engine = MockEngine::with_resolution(4, 2);
        assert!(engine.render().is_ok());
    }
}
