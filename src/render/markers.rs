//! Annotation markers: the coordinate crosshair and prompt point dots.
//!
//! Marker positions follow the viewport, marker sizes do not.

use tiny_skia::{FillRule, Paint, PathBuilder, Stroke, Transform};

use super::frame::Frame;
use crate::annotation::AnnotationPoint;
use crate::model::Point;
use crate::zoom_math::ViewportTransform;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerRenderer {
    pub crosshair_size: f32,
    pub crosshair_thickness: f32,
    pub crosshair_color: [u8; 4],
    pub point_radius: f32,
    pub ring_width: f32,
    pub ring_color: [u8; 4],
    pub include_color: [u8; 4],
    pub exclude_color: [u8; 4],
}

impl Default for MarkerRenderer {
    fn default() -> Self {
        use crate::constants::overlay::*;
        Self {
            crosshair_size: CROSSHAIR_SIZE,
            crosshair_thickness: CROSSHAIR_THICKNESS,
            crosshair_color: CROSSHAIR_COLOR,
            point_radius: POINT_RADIUS,
            ring_width: POINT_RING_WIDTH,
            ring_color: POINT_RING_COLOR,
            include_color: INCLUDE_COLOR,
            exclude_color: EXCLUDE_COLOR,
        }
    }
}

fn solid(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    let [r, g, b, a] = rgba;
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

impl MarkerRenderer {
    /// Crosshair centered on an image-space point. Returns false if the
    /// point does not map to a finite screen position.
    pub fn draw_crosshair(&self, frame: &mut Frame, point: Point, viewport: &ViewportTransform) -> bool {
        let center = viewport.image_to_screen(point);
        if !center.is_finite() {
            return false;
        }
        let (cx, cy) = (center.x as f32, center.y as f32);
        let half = self.crosshair_size / 2.0;
        let half_thick = self.crosshair_thickness / 2.0;
        let paint = solid(self.crosshair_color);

        let horizontal = tiny_skia::Rect::from_xywh(cx - half, cy - half_thick, self.crosshair_size, self.crosshair_thickness);
        let vertical = tiny_skia::Rect::from_xywh(cx - half_thick, cy - half, self.crosshair_thickness, self.crosshair_size);
        let pixmap = frame.pixmap_mut();
        for rect in [horizontal, vertical].into_iter().flatten() {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
        true
    }

    /// Filled dot with a ring for each prompt point, green for include and
    /// red for exclude. Returns how many were drawn.
    pub fn draw_points(&self, frame: &mut Frame, points: &[AnnotationPoint], viewport: &ViewportTransform) -> usize {
        let ring_paint = solid(self.ring_color);
        let ring = Stroke {
            width: self.ring_width,
            ..Stroke::default()
        };

        let mut drawn = 0;
        for point in points {
            let center = viewport.image_to_screen(point.position());
            if !center.is_finite() {
                continue;
            }
            let Some(dot) = PathBuilder::from_circle(center.x as f32, center.y as f32, self.point_radius) else {
                continue;
            };
            let fill = solid(if point.include {
                self.include_color
            } else {
                self.exclude_color
            });
            let pixmap = frame.pixmap_mut();
            pixmap.fill_path(&dot, &fill, FillRule::Winding, Transform::identity(), None);
            pixmap.stroke_path(&dot, &ring_paint, &ring, Transform::identity(), None);
            drawn += 1;
        }
        drawn
    }
}
