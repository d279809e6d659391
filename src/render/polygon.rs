//! Vector polygon outlines.

use tiny_skia::{LineJoin, Paint, PathBuilder, Stroke, Transform};

use super::frame::Frame;
use crate::constants::overlay::{POLYGON_COLOR, POLYGON_STROKE_WIDTH};
use crate::model::Polygon;
use crate::zoom_math::ViewportTransform;

/// Strokes model polygons in screen space.
///
/// The viewport transform is applied to the path, not to the stroke, so the
/// outline keeps a constant width in screen pixels at any zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonRenderer {
    color: [u8; 4],
    stroke_width: f32,
}

impl Default for PolygonRenderer {
    fn default() -> Self {
        Self::new(POLYGON_COLOR, POLYGON_STROKE_WIDTH)
    }
}

impl PolygonRenderer {
    pub fn new(color: [u8; 4], stroke_width: f32) -> Self {
        Self {
            color,
            stroke_width,
        }
    }

    /// Closed screen-space path for a polygon, or `None` if it cannot be drawn.
    fn screen_path(polygon: &Polygon, viewport: &ViewportTransform) -> Option<tiny_skia::Path> {
        if !polygon.is_drawable() {
            return None;
        }
        let mut builder = PathBuilder::new();
        let mut vertices = polygon.vertices.iter();
        let first = vertices.next()?;
        builder.move_to(first.x as f32, first.y as f32);
        for vertex in vertices {
            builder.line_to(vertex.x as f32, vertex.y as f32);
        }
        builder.close();
        builder.finish()?.transform(viewport.to_affine())
    }

    /// Draw every drawable polygon. Returns how many were drawn.
    pub fn draw(&self, frame: &mut Frame, polygons: &[Polygon], viewport: &ViewportTransform) -> usize {
        let mut paint = Paint::default();
        let [r, g, b, a] = self.color;
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;

        let stroke = Stroke {
            width: self.stroke_width,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };

        let mut drawn = 0;
        for (index, polygon) in polygons.iter().enumerate() {
            let Some(path) = Self::screen_path(polygon, viewport) else {
                log::debug!(
                    "Skipping polygon {} with {} vertices",
                    index,
                    polygon.vertices.len()
                );
                continue;
            };
            frame
                .pixmap_mut()
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            drawn += 1;
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageSize, Point, Size};
    use crate::zoom_math::ZoomLimits;

    fn square(x: f64, y: f64, side: f64) -> Polygon {
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ])
    }

    fn viewport() -> ViewportTransform {
        ViewportTransform::fit(
            Size::new(800.0, 600.0),
            Some(ImageSize::new(1600, 1200)),
            ZoomLimits::default(),
        )
    }

    #[test]
    fn test_outline_follows_transform() {
        // Image square [400, 800] maps to screen [200, 400] at zoom 0.5
        let mut frame = Frame::new(800, 600).unwrap();
        let drawn = PolygonRenderer::default().draw(&mut frame, &[square(400.0, 400.0, 400.0)], &viewport());
        assert_eq!(drawn, 1);

        assert!(frame.pixel(300, 200).unwrap()[3] > 0);
        assert!(frame.pixel(200, 300).unwrap()[3] > 0);
        // Outline only: the interior stays empty
        assert_eq!(frame.pixel(300, 300).unwrap()[3], 0);
        // Nothing at the unscaled image position
        assert_eq!(frame.pixel(600, 500).unwrap()[3], 0);
    }

    #[test]
    fn test_stroke_width_is_constant_on_screen() {
        let mut zoomed = viewport();
        for _ in 0..5 {
            zoomed.zoom_at(Point::new(0.0, 0.0), -1.0);
        }
        let mut frame = Frame::new(800, 600).unwrap();
        PolygonRenderer::default().draw(&mut frame, &[square(100.0, 100.0, 200.0)], &zoomed);

        // Top edge at image y=100; count covered rows in one column
        let top = zoomed.image_to_screen(Point::new(200.0, 100.0));
        let column = top.x.round() as u32;
        let covered = (0..600)
            .filter(|&y| frame.pixel(column, y).is_some_and(|p| p[3] > 0))
            .count();
        // Two horizontal edges, each a few pixels thick whatever the zoom
        assert!((2..=10).contains(&covered), "covered {covered}");
    }

    #[test]
    fn test_degenerate_polygons_skipped() {
        let mut frame = Frame::new(100, 100).unwrap();
        let polygons = vec![
            Polygon::new(vec![Point::new(1.0, 1.0), Point::new(50.0, 50.0)]),
            Polygon::new(vec![Point::new(1.0, 1.0), Point::new(f64::NAN, 5.0), Point::new(9.0, 9.0)]),
            Polygon::new(Vec::new()),
        ];
        let drawn = PolygonRenderer::default().draw(&mut frame, &polygons, &ViewportTransform::default());
        assert_eq!(drawn, 0);
        assert_eq!(frame.visible_pixel_count(), 0);
    }
}
