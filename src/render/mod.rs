//! Software rendering of the current image and its annotation overlays.
//!
//! Every pass draws in screen space using the same [`ViewportTransform`], so
//! the image, mask, polygons and markers stay in registration at any zoom
//! and pan.

mod error;
mod frame;
mod markers;
mod mask;
mod polygon;

pub use error::{RenderError, RenderResult};
pub use frame::Frame;
pub use markers::MarkerRenderer;
pub use mask::MaskCompositor;
pub use polygon::PolygonRenderer;

use serde::{Deserialize, Serialize};

use crate::annotation::ImageAnnotations;
use crate::constants::overlay;
use crate::model::ImageSize;
use crate::zoom_math::ViewportTransform;

/// Overlay colors and sizes. Sizes are in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub mask_color: [u8; 4],
    pub polygon_color: [u8; 4],
    pub polygon_stroke_width: f32,
    pub crosshair_size: f32,
    pub crosshair_thickness: f32,
    pub crosshair_color: [u8; 4],
    pub point_radius: f32,
    pub point_ring_width: f32,
    pub point_ring_color: [u8; 4],
    pub include_color: [u8; 4],
    pub exclude_color: [u8; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            mask_color: overlay::MASK_COLOR,
            polygon_color: overlay::POLYGON_COLOR,
            polygon_stroke_width: overlay::POLYGON_STROKE_WIDTH,
            crosshair_size: overlay::CROSSHAIR_SIZE,
            crosshair_thickness: overlay::CROSSHAIR_THICKNESS,
            crosshair_color: overlay::CROSSHAIR_COLOR,
            point_radius: overlay::POINT_RADIUS,
            point_ring_width: overlay::POINT_RING_WIDTH,
            point_ring_color: overlay::POINT_RING_COLOR,
            include_color: overlay::INCLUDE_COLOR,
            exclude_color: overlay::EXCLUDE_COLOR,
        }
    }
}

/// What one call to [`OverlayRenderer::render`] drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayStats {
    pub mask: bool,
    pub polygons: usize,
    pub points: usize,
    pub crosshair: bool,
}

/// Runs the overlay passes in order: mask, polygons, prompt points, crosshair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlayRenderer {
    mask: MaskCompositor,
    polygons: PolygonRenderer,
    markers: MarkerRenderer,
}

impl OverlayRenderer {
    pub fn new(style: &OverlayStyle) -> Self {
        Self {
            mask: MaskCompositor::new(style.mask_color),
            polygons: PolygonRenderer::new(style.polygon_color, style.polygon_stroke_width),
            markers: MarkerRenderer {
                crosshair_size: style.crosshair_size,
                crosshair_thickness: style.crosshair_thickness,
                crosshair_color: style.crosshair_color,
                point_radius: style.point_radius,
                ring_width: style.point_ring_width,
                ring_color: style.point_ring_color,
                include_color: style.include_color,
                exclude_color: style.exclude_color,
            },
        }
    }

    /// Draw everything annotated on one image.
    pub fn render(
        &self,
        frame: &mut Frame,
        annotations: &ImageAnnotations,
        viewport: &ViewportTransform,
        image_size: Option<ImageSize>,
    ) -> OverlayStats {
        let stats = OverlayStats {
            mask: self
                .mask
                .composite(frame, annotations.mask.as_ref(), viewport, image_size),
            polygons: self.polygons.draw(frame, &annotations.polygons, viewport),
            points: self.markers.draw_points(frame, &annotations.points, viewport),
            crosshair: annotations
                .point
                .is_some_and(|p| self.markers.draw_crosshair(frame, p, viewport)),
        };
        log::debug!("Overlay pass: {:?}", stats);
        stats
    }
}
