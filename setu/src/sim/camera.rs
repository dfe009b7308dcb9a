//! Free camera and projection math for the mock engine

use crate::engine::Transform;

pub(super) type Vec3 = [f32; 3];

#[inline]
pub(super) fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub(super) fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub(super) fn scale(a: Vec3, s: f32) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub(super) fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: Vec3) -> Vec3 {
    let len = dot(a, a).sqrt();
    if len > f32::EPSILON {
        scale(a, 1.0 / len)
    } else {
        a
    }
}

/// Hamilton product, quaternions stored w, x, y, z
pub(super) fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [
        a[0] * b[0] - a[1] * b[1] - a[2] * b[2] - a[3] * b[3],
        a[0] * b[1] + a[1] * b[0] + a[2] * b[3] - a[3] * b[2],
        a[0] * b[2] - a[1] * b[3] + a[2] * b[0] + a[3] * b[1],
        a[0] * b[3] + a[1] * b[2] - a[2] * b[1] + a[3] * b[0],
    ]
}

/// Rotation of `angle` radians about unit `axis`
pub(super) fn quat_axis_angle(axis: Vec3, angle: f32) -> [f32; 4] {
    let (s, c) = (angle * 0.5).sin_cos();
    [c, axis[0] * s, axis[1] * s, axis[2] * s]
}

/// Orbiting camera around a look-at point
///
/// Angles in degrees; negative elevation looks down onto the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct OrbitCamera {
    pub lookat: Vec3,
    pub distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
}

const MIN_DISTANCE: f32 = 0.2;
const MAX_DISTANCE: f32 = 50.0;

impl OrbitCamera {
    pub fn new(lookat: Vec3) -> Self {
        Self {
            lookat,
            distance: 3.0,
            azimuth: 90.0,
            elevation: -60.0,
        }
    }

    fn forward(&self) -> Vec3 {
        let az = self.azimuth.to_radians();
        let el = self.elevation.to_radians();
        [el.cos() * az.cos(), el.cos() * az.sin(), el.sin()]
    }

    /// Camera frame: looks along `-zaxis`, `xaxis` right, `yaxis` up
    pub fn transform(&self) -> Transform {
        let forward = self.forward();
        let right = normalize(cross(forward, [0.0, 0.0, 1.0]));
        let up = cross(right, forward);
        Transform {
            position: sub(self.lookat, scale(forward, self.distance)),
            xaxis: right,
            yaxis: up,
            zaxis: scale(forward, -1.0),
            scale: [1.0; 3],
        }
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.azimuth = (self.azimuth - dx * 180.0).rem_euclid(360.0);
        self.elevation = (self.elevation - dy * 90.0).clamp(-89.0, -5.0);
    }

    /// Pan in the view plane; with `modifier` the vertical delta moves along world z
    pub fn pan(&mut self, dx: f32, dy: f32, modifier: bool) {
        let frame = self.transform();
        let vertical = if modifier {
            [0.0, 0.0, 1.0]
        } else {
            let flat = [frame.yaxis[0], frame.yaxis[1], 0.0];
            normalize(flat)
        };
        let delta = add(
            scale(frame.xaxis, -dx * self.distance),
            scale(vertical, -dy * self.distance),
        );
        self.lookat = add(self.lookat, delta);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * delta.exp()).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }
}

/// Perspective projection of a world point to relative screen coordinates
///
/// Returns `(relx, rely, depth)` with `relx`/`rely` in `[0, 1]` for points
/// inside the frustum (`rely` grows upward), or `None` behind the camera.
pub(super) fn project(view: &Transform, fov_deg: f32, aspect: f32, point: Vec3) -> Option<(f32, f32, f32)> {
    let rel = sub(point, view.position);
    let depth = -dot(rel, view.zaxis);
    if depth <= 1e-3 {
        return None;
    }
    let half = (fov_deg.to_radians() * 0.5).tan();
    let ndc_x = dot(rel, view.xaxis) / (depth * half * aspect);
    let ndc_y = dot(rel, view.yaxis) / (depth * half);
    Some(((ndc_x + 1.0) * 0.5, (ndc_y + 1.0) * 0.5, depth))
}

/// Intersect the ray through a relative screen point with the ground plane `z = 0`
pub(super) fn ground_hit(view: &Transform, fov_deg: f32, aspect: f32, relx: f32, rely: f32) -> Option<Vec3> {
    let half = (fov_deg.to_radians() * 0.5).tan();
    let ndc_x = relx * 2.0 - 1.0;
    let ndc_y = rely * 2.0 - 1.0;
    let dir = add(
        add(
            scale(view.xaxis, ndc_x * half * aspect),
            scale(view.yaxis, ndc_y * half),
        ),
        scale(view.zaxis, -1.0),
    );
    if dir[2].abs() < 1e-6 {
        return None;
    }
    let t = -view.position[2] / dir[2];
    if t <= 0.0 {
        return None;
    }
    Some(add(view.position, scale(dir, t)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() < 1e-4)
    }

    #[test]
    fn test_lookat_projects_to_center() {
        let camera = OrbitCamera::new([0.5, 0.2, 0.0]);
        let view = camera.transform();
        let (x, y, depth) = project(&view, 45.0, 1.5, camera.lookat).unwrap();
        assert!((x - 0.5).abs() < 1e-4);
        assert!((y - 0.5).abs() < 1e-4);
        assert!((depth - camera.distance).abs() < 1e-4);
    }

    #[test]
    fn test_frame_is_right_handed() {
        let view = OrbitCamera::new([0.0; 3]).transform();
        assert!(close(cross(view.xaxis, view.yaxis), view.zaxis));
    }

    #[test]
    fn test_ground_hit_inverts_projection() {
        let camera = OrbitCamera::new([0.0; 3]);
        let view = camera.transform();
        let point = [0.3, -0.2, 0.0];
        let (x, y, _) = project(&view, 45.0, 1.0, point).unwrap();
        let hit = ground_hit(&view, 45.0, 1.0, x, y).unwrap();
        assert!(close(hit, point));
    }

    #[test]
    fn test_zoom_and_rotate_bounds() {
        let mut camera = OrbitCamera::new([0.0; 3]);
        camera.zoom(-100.0);
        assert_eq!(camera.distance, MIN_DISTANCE);
        camera.rotate(0.0, 10.0);
        assert_eq!(camera.elevation, -89.0);
        camera.rotate(2.0, 0.0);
        assert!((0.0..360.0).contains(&camera.azimuth));
    }

    #[test]
    fn test_quaternion_about_z() {
        let q = quat_axis_angle([0.0, 0.0, 1.0], std::f32::consts::PI);
        let r = quat_mul(q, q);
        // Two half turns: identity up to sign
        assert!((r[0].abs() - 1.0).abs() < 1e-5);
    }
}
