//! Raster mask overlay.
//!
//! The mask grid has its own resolution. It is rasterized 1:1 into an
//! offscreen pixmap and then drawn with the viewport transform scaled by
//! `image / mask`, so each cell covers the same image-space rectangle at any
//! zoom or pan.

use tiny_skia::{ColorU8, FilterQuality, Pixmap, PixmapPaint, Transform};

use super::frame::Frame;
use crate::constants::overlay::MASK_COLOR;
use crate::model::{ImageSize, Mask, Point, Rect};
use crate::zoom_math::ViewportTransform;

/// Draws a model mask over the displayed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskCompositor {
    color: [u8; 4],
}

impl Default for MaskCompositor {
    fn default() -> Self {
        Self::new(MASK_COLOR)
    }
}

impl MaskCompositor {
    pub fn new(color: [u8; 4]) -> Self {
        Self { color }
    }

    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    /// One pixel per mask cell: set cells in the overlay color, others
    /// transparent. `None` for an empty mask.
    pub fn rasterize(&self, mask: &Mask) -> Option<Pixmap> {
        if mask.is_empty() {
            return None;
        }
        let width = u32::try_from(mask.width()).ok()?;
        let height = u32::try_from(mask.height()).ok()?;
        let mut pixmap = Pixmap::new(width, height)?;

        let [r, g, b, a] = self.color;
        let fill = ColorU8::from_rgba(r, g, b, a).premultiply();
        // Pixmap rows and the grid are both row-major
        for (pixel, &cell) in pixmap.pixels_mut().iter_mut().zip(mask.grid().iter()) {
            if cell != 0 {
                *pixel = fill;
            }
        }
        Some(pixmap)
    }

    /// Mask-cell space to screen space.
    pub fn overlay_transform(
        mask: &Mask,
        viewport: &ViewportTransform,
        image_size: ImageSize,
    ) -> Option<Transform> {
        if mask.is_empty() || image_size.is_empty() {
            return None;
        }
        let scale_x = image_size.width as f32 / mask.width() as f32;
        let scale_y = image_size.height as f32 / mask.height() as f32;
        Some(viewport.to_affine().pre_scale(scale_x, scale_y))
    }

    /// Screen rectangle covered by mask cell `(mx, my)`.
    pub fn cell_rect_on_screen(
        mask: &Mask,
        viewport: &ViewportTransform,
        image_size: ImageSize,
        mx: usize,
        my: usize,
    ) -> Option<Rect> {
        if mask.is_empty() || image_size.is_empty() || mx >= mask.width() || my >= mask.height() {
            return None;
        }
        let cell_w = f64::from(image_size.width) / mask.width() as f64;
        let cell_h = f64::from(image_size.height) / mask.height() as f64;
        let top_left = viewport.image_to_screen(Point::new(mx as f64 * cell_w, my as f64 * cell_h));
        let bottom_right = viewport.image_to_screen(Point::new(
            (mx + 1) as f64 * cell_w,
            (my + 1) as f64 * cell_h,
        ));
        Some(Rect::from_corners(top_left, bottom_right))
    }

    /// Draw `mask` onto the frame. Absent, empty or all-zero masks and an
    /// unknown image size draw nothing. Returns true if anything was drawn.
    pub fn composite(
        &self,
        frame: &mut Frame,
        mask: Option<&Mask>,
        viewport: &ViewportTransform,
        image_size: Option<ImageSize>,
    ) -> bool {
        let (Some(mask), Some(image_size)) = (mask, image_size) else {
            return false;
        };
        if !mask.has_coverage() {
            return false;
        }
        let Some(transform) = Self::overlay_transform(mask, viewport, image_size) else {
            return false;
        };
        let Some(overlay) = self.rasterize(mask) else {
            return false;
        };

        let paint = PixmapPaint {
            quality: FilterQuality::Nearest,
            ..PixmapPaint::default()
        };
        frame
            .pixmap_mut()
            .draw_pixmap(0, 0, overlay.as_ref(), &paint, transform, None);
        log::debug!(
            "Composited {}x{} mask ({} cells set)",
            mask.width(),
            mask.height(),
            mask.count_set()
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Size;
    use crate::zoom_math::ZoomLimits;

    const EPSILON: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn viewport() -> ViewportTransform {
        ViewportTransform::fit(
            Size::new(800.0, 600.0),
            Some(ImageSize::new(1600, 1200)),
            ZoomLimits::default(),
        )
    }

    fn single_cell_mask() -> Mask {
        let mut mask = Mask::zeros(4, 3);
        mask.set(2, 1, true);
        mask
    }

    #[test]
    fn test_cell_footprint_in_image_space() {
        let identity = ViewportTransform::fit(
            Size::new(1600.0, 1200.0),
            Some(ImageSize::new(1600, 1200)),
            ZoomLimits::default(),
        );
        let rect = MaskCompositor::cell_rect_on_screen(
            &single_cell_mask(),
            &identity,
            ImageSize::new(1600, 1200),
            2,
            1,
        )
        .unwrap();
        assert!(approx_eq(rect.x, 800.0));
        assert!(approx_eq(rect.right(), 1200.0));
        assert!(approx_eq(rect.y, 400.0));
        assert!(approx_eq(rect.bottom(), 800.0));
    }

    #[test]
    fn test_cell_footprint_on_screen_at_half_zoom() {
        let rect = MaskCompositor::cell_rect_on_screen(
            &single_cell_mask(),
            &viewport(),
            ImageSize::new(1600, 1200),
            2,
            1,
        )
        .unwrap();
        assert!(approx_eq(rect.x, 400.0));
        assert!(approx_eq(rect.right(), 600.0));
        assert!(approx_eq(rect.y, 200.0));
        assert!(approx_eq(rect.bottom(), 400.0));
    }

    #[test]
    fn test_composite_covers_cell_only() {
        let mut frame = Frame::new(800, 600).unwrap();
        let drawn = MaskCompositor::default().composite(
            &mut frame,
            Some(&single_cell_mask()),
            &viewport(),
            Some(ImageSize::new(1600, 1200)),
        );
        assert!(drawn);

        let inside = frame.pixel(500, 300).unwrap();
        assert!(inside[3] > 0);
        assert!(inside[1] > 200);
        assert_eq!(frame.pixel(300, 300).unwrap()[3], 0);
        assert_eq!(frame.pixel(700, 300).unwrap()[3], 0);
        assert_eq!(frame.pixel(500, 100).unwrap()[3], 0);
        assert_eq!(frame.pixel(500, 500).unwrap()[3], 0);
    }

    #[test]
    fn test_all_zero_mask_draws_nothing() {
        let mut frame = Frame::new(800, 600).unwrap();
        let drawn = MaskCompositor::default().composite(
            &mut frame,
            Some(&Mask::zeros(4, 3)),
            &viewport(),
            Some(ImageSize::new(1600, 1200)),
        );
        assert!(!drawn);
        assert_eq!(frame.visible_pixel_count(), 0);
    }

    #[test]
    fn test_missing_inputs_draw_nothing() {
        let mut frame = Frame::new(800, 600).unwrap();
        let compositor = MaskCompositor::default();
        assert!(!compositor.composite(&mut frame, None, &viewport(), Some(ImageSize::new(1600, 1200))));
        assert!(!compositor.composite(&mut frame, Some(&single_cell_mask()), &viewport(), None));
        assert!(!compositor.composite(
            &mut frame,
            Some(&Mask::empty()),
            &viewport(),
            Some(ImageSize::new(1600, 1200))
        ));
        assert_eq!(frame.visible_pixel_count(), 0);
    }

    #[test]
    fn test_rasterize_is_one_pixel_per_cell() {
        let pixmap = MaskCompositor::default().rasterize(&single_cell_mask()).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (4, 3));
        assert!(pixmap.pixel(2, 1).unwrap().alpha() > 0);
        assert_eq!(pixmap.pixel(1, 2).unwrap().alpha(), 0);
    }
}
