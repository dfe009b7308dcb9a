//! Software rasterizer for mock offscreen targets
//!
//! Draws bodies as filled squares and the target marker as a cross. Pixels
//! are RGB24 with row 0 at the bottom, matching GPU read-back order.

use super::camera::project;
use crate::engine::{ObjectState, TargetMarker, Transform};

const BACKGROUND_TOP: [u8; 3] = [70, 80, 100];
const BACKGROUND_BOTTOM: [u8; 3] = [20, 22, 28];
const MARKER_NORMAL: [u8; 3] = [40, 200, 90];
const MARKER_HIGHLIGHT: [u8; 3] = [255, 215, 40];

const PALETTE: [[u8; 3]; 6] = [
    [220, 80, 60],
    [70, 140, 230],
    [230, 190, 70],
    [150, 90, 210],
    [60, 200, 190],
    [230, 120, 180],
];

/// One offscreen surface
pub(super) struct Canvas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 3],
        }
    }

    fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    fn clear(&mut self) {
        let width = self.width as usize;
        let height = self.height.max(1) as usize;
        for (row, line) in self.pixels.chunks_exact_mut(width * 3).enumerate() {
            let t = row as f32 / height as f32;
            let color = lerp(BACKGROUND_BOTTOM, BACKGROUND_TOP, t);
            for px in line.chunks_exact_mut(3) {
                px.copy_from_slice(&color);
            }
        }
    }

    fn put(&mut self, x: i64, row: i64, color: [u8; 3]) {
        if x < 0 || row < 0 || x >= i64::from(self.width) || row >= i64::from(self.height) {
            return;
        }
        let offset = (row as usize * self.width as usize + x as usize) * 3;
        self.pixels[offset..offset + 3].copy_from_slice(&color);
    }

    fn fill_square(&mut self, cx: i64, cy: i64, radius: i64, color: [u8; 3]) {
        for row in cy - radius..=cy + radius {
            for x in cx - radius..=cx + radius {
                self.put(x, row, color);
            }
        }
    }

    fn cross(&mut self, cx: i64, cy: i64, arm: i64, color: [u8; 3]) {
        for d in -arm..=arm {
            self.put(cx + d, cy, color);
            self.put(cx, cy + d, color);
        }
    }

    /// Map a world point to pixel coordinates (row counted from the bottom)
    fn to_pixel(&self, view: &Transform, fov: f32, point: [f32; 3]) -> Option<(i64, i64, f32)> {
        let (relx, rely, depth) = project(view, fov, self.aspect(), point)?;
        let x = (relx * self.width as f32).floor() as i64;
        let row = (rely * self.height as f32).floor() as i64;
        Some((x, row, depth))
    }

    /// Pixels per world unit at `depth`
    fn focal(&self, fov: f32, depth: f32) -> f32 {
        let half = (fov.to_radians() * 0.5).tan();
        self.height as f32 * 0.5 / (half * depth)
    }

    /// Draw the scene as last pushed to the renderer
    pub fn draw(
        &mut self,
        objects: &[Option<ObjectState>],
        view: Option<&(Transform, f32)>,
        marker: Option<&TargetMarker>,
    ) {
        self.clear();
        let Some((camera, fov)) = view else {
            return;
        };

        // Far objects first so near ones overlap them
        let mut visible: Vec<(usize, &ObjectState, i64, i64, f32)> = objects
            .iter()
            .enumerate()
            .filter_map(|(index, state)| {
                let state = state.as_ref().filter(|s| s.visible)?;
                let (x, row, depth) = self.to_pixel(camera, *fov, state.transform.position)?;
                Some((index, state, x, row, depth))
            })
            .collect();
        visible.sort_by(|a, b| b.4.total_cmp(&a.4));

        for (index, state, x, row, depth) in visible {
            let size = state.transform.scale[0] * self.focal(*fov, depth);
            let radius = (size.round() as i64).max(1);
            let mut color = PALETTE[index % PALETTE.len()];
            if state.selected {
                color = lerp(color, [255, 255, 255], 0.5);
            }
            self.fill_square(x, row, radius, color);
        }

        if let Some(marker) = marker
            && let Some((x, row, _)) = self.to_pixel(camera, *fov, marker.position)
        {
            let color = if marker.highlighted {
                MARKER_HIGHLIGHT
            } else {
                MARKER_NORMAL
            };
            self.cross(x, row, 2, color);
        }
    }
}

fn lerp(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let mix = |i: usize| (f32::from(a[i]) + (f32::from(b[i]) - f32::from(a[i])) * t).round() as u8;
    [mix(0), mix(1), mix(2)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_down_view() -> (Transform, f32) {
        (
            Transform {
                position: [0.0, 0.0, 2.0],
                ..Transform::default()
            },
            60.0,
        )
    }

    fn object(position: [f32; 3]) -> Option<ObjectState> {
        Some(ObjectState {
            transform: Transform {
                position,
                scale: [0.1; 3],
                ..Transform::default()
            },
            visible: true,
            selected: false,
        })
    }

    fn pixel(canvas: &Canvas, x: usize, row: usize) -> [u8; 3] {
        let offset = (row * canvas.width as usize + x) * 3;
        [
            canvas.pixels[offset],
            canvas.pixels[offset + 1],
            canvas.pixels[offset + 2],
        ]
    }

    #[test]
    fn test_background_rows_bottom_up() {
        let mut canvas = Canvas::new(4, 4);
        canvas.draw(&[], None, None);
        assert_eq!(pixel(&canvas, 0, 0), BACKGROUND_BOTTOM);
        assert_ne!(pixel(&canvas, 0, 3), BACKGROUND_BOTTOM);
    }

    #[test]
    fn test_object_at_center() {
        let mut canvas = Canvas::new(16, 16);
        let view = top_down_view();
        canvas.draw(&[object([0.0, 0.0, 0.0])], Some(&view), None);
        assert_eq!(pixel(&canvas, 8, 8), PALETTE[0]);
    }

    #[test]
    fn test_object_above_center_lands_in_upper_rows() {
        let mut canvas = Canvas::new(16, 16);
        let view = top_down_view();
        canvas.draw(&[object([0.0, 0.6, 0.0])], Some(&view), None);
        let row = (0..16).find(|&r| pixel(&canvas, 8, r) == PALETTE[0]).unwrap();
        assert!(row > 8);
    }

    #[test]
    fn test_hidden_objects_skipped() {
        let mut canvas = Canvas::new(8, 8);
        let view = top_down_view();
        let mut hidden = object([0.0, 0.0, 0.0]);
        if let Some(state) = hidden.as_mut() {
            state.visible = false;
        }
        canvas.draw(&[hidden], Some(&view), None);
        assert!(canvas.pixels.chunks_exact(3).all(|p| p != PALETTE[0]));
    }

    #[test]
    fn test_marker_color_follows_highlight() {
        let mut canvas = Canvas::new(16, 16);
        let view = top_down_view();
        let mut marker = TargetMarker {
            position: [0.0, 0.0, 0.0],
            highlighted: false,
        };
        canvas.draw(&[], Some(&view), Some(&marker));
        assert_eq!(pixel(&canvas, 8, 8), MARKER_NORMAL);

        marker.highlighted = true;
        canvas.draw(&[], Some(&view), Some(&marker));
        assert_eq!(pixel(&canvas, 8, 8), MARKER_HIGHLIGHT);
    }
}
