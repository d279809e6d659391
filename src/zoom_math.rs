//! Viewport transform: zoom and pan between screen space and image space.
//!
//! Screen space is the viewport container in on-screen pixels, origin top-left.
//! Image space is the natural pixel grid of the displayed image, origin
//! top-left. The mapping is a uniform scale followed by a translation:
//!
//! ```text
//! screen = image * zoom + pan
//! image  = (screen - pan) / zoom
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{ZOOM_IN_FACTOR, ZOOM_MAX, ZOOM_MIN, ZOOM_OUT_FACTOR};
use crate::model::{ImageSize, Point, Rect, Size};

/// Zoom bounds and per-notch wheel factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
    /// Multiplier for a zoom-in notch
    pub in_factor: f64,
    /// Multiplier for a zoom-out notch
    pub out_factor: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: ZOOM_MIN,
            max: ZOOM_MAX,
            in_factor: ZOOM_IN_FACTOR,
            out_factor: ZOOM_OUT_FACTOR,
        }
    }
}

impl ZoomLimits {
    /// Zoom after one wheel notch. Positive `delta_sign` (wheel towards the
    /// bottom of the page) zooms out, negative zooms in. Result is clamped.
    pub fn step(&self, zoom: f64, delta_sign: f64) -> f64 {
        let factor = if delta_sign > 0.0 {
            self.out_factor
        } else {
            self.in_factor
        };
        (zoom * factor).clamp(self.min, self.max)
    }

    /// Check that the limits describe a usable zoom range.
    pub fn is_valid(&self) -> bool {
        self.min > 0.0
            && self.min.is_finite()
            && self.max.is_finite()
            && self.max >= self.min
            && self.in_factor > 1.0
            && self.out_factor > 0.0
            && self.out_factor < 1.0
    }
}

/// Snapshot of the viewport, kept when switching images with "keep zoom/pan".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub zoom: f64,
    /// Screen position of the image origin
    pub pan: Point,
    pub container_size: Size,
    pub image_size: Size,
}

/// Invertible screen/image mapping with zoom-at-cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportTransform {
    zoom: f64,
    pan: Point,
    container: Size,
    image: Size,
    limits: ZoomLimits,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::new(ZoomLimits::default())
    }
}

impl ViewportTransform {
    /// Identity transform with no container or image yet.
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ZERO,
            container: Size::default(),
            image: Size::default(),
            limits,
        }
    }

    /// Transform that fits `image` inside `container`, centered.
    pub fn fit(container: Size, image: Option<ImageSize>, limits: ZoomLimits) -> Self {
        let mut transform = Self::new(limits);
        transform.container = container;
        transform.image = image.map(ImageSize::to_size).unwrap_or_default();
        transform.reset_to_fit();
        transform
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub fn container_size(&self) -> Size {
        self.container
    }

    pub fn image_size(&self) -> Size {
        self.image
    }

    pub fn state(&self) -> ViewportState {
        ViewportState {
            zoom: self.zoom,
            pan: self.pan,
            container_size: self.container,
            image_size: self.image,
        }
    }

    /// Restore zoom and pan from a snapshot. Sizes are left as they are.
    pub fn restore(&mut self, state: &ViewportState) {
        if state.zoom > 0.0 && state.zoom.is_finite() && state.pan.is_finite() {
            self.zoom = state.zoom;
            self.pan = state.pan;
        }
    }

    /// The image size is unknown or zero; every point is out of bounds.
    pub fn is_degenerate(&self) -> bool {
        self.image.is_degenerate()
    }

    pub fn set_container_size(&mut self, container: Size) {
        self.container = container;
    }

    /// Set (or forget, with `None`) the natural size of the displayed image.
    pub fn set_image_size(&mut self, image: Option<ImageSize>) {
        self.image = image.map(ImageSize::to_size).unwrap_or_default();
    }

    /// Fit the image into the container and center it.
    ///
    /// `zoom0 = min(cw / iw, ch / ih)`, `pan0 = (container - image * zoom0) / 2`.
    /// The fitted zoom is not clamped to the wheel limits. With an unknown
    /// image or an empty container the transform falls back to identity.
    pub fn reset_to_fit(&mut self) {
        if self.image.is_degenerate() || self.container.is_degenerate() {
            self.zoom = 1.0;
            self.pan = Point::ZERO;
            return;
        }

        let scale_x = self.container.width / self.image.width;
        let scale_y = self.container.height / self.image.height;
        self.zoom = scale_x.min(scale_y);
        self.pan = Point::new(
            (self.container.width - self.image.width * self.zoom) / 2.0,
            (self.container.height - self.image.height * self.zoom) / 2.0,
        );
        log::debug!(
            "Viewport fit: zoom {:.3}, pan ({:.1}, {:.1})",
            self.zoom,
            self.pan.x,
            self.pan.y
        );
    }

    /// Map a screen point to image space.
    pub fn screen_to_image(&self, screen: Point) -> Point {
        (screen - self.pan) / self.zoom
    }

    /// Map an image point to screen space.
    pub fn image_to_screen(&self, image: Point) -> Point {
        image * self.zoom + self.pan
    }

    /// Whether an image-space point lies on the image (edges inclusive).
    pub fn in_bounds(&self, image: Point) -> bool {
        if self.is_degenerate() || !image.is_finite() {
            return false;
        }
        image.x >= 0.0 && image.x <= self.image.width && image.y >= 0.0 && image.y <= self.image.height
    }

    /// Zoom one wheel notch while keeping the image point under `screen` fixed.
    ///
    /// The algorithm:
    /// 1. Step and clamp the zoom.
    /// 2. Solve `screen = image * new_zoom + new_pan` for the image point that
    ///    was under the cursor: `new_pan = screen - (screen - pan) * new_zoom / zoom`.
    ///
    /// Returns true if the zoom changed.
    pub fn zoom_at(&mut self, screen: Point, delta_sign: f64) -> bool {
        if delta_sign == 0.0 || !delta_sign.is_finite() || !screen.is_finite() {
            return false;
        }

        let new_zoom = self.limits.step(self.zoom, delta_sign);
        if new_zoom == self.zoom {
            return false;
        }

        let ratio = new_zoom / self.zoom;
        self.pan = screen - (screen - self.pan) * ratio;
        self.zoom = new_zoom;
        log::debug!(
            "Zoom-to-cursor: {:.3}x at ({:.1}, {:.1}), pan ({:.1}, {:.1})",
            self.zoom,
            screen.x,
            screen.y,
            self.pan.x,
            self.pan.y
        );
        true
    }

    /// Move the image by a screen-space delta. Not clamped: the image may be
    /// panned fully out of view.
    pub fn pan_by(&mut self, delta: Point) {
        if !delta.is_finite() {
            return;
        }
        self.pan = self.pan + delta;
    }

    /// Screen rectangle covered by the image, if its size is known.
    pub fn image_rect_on_screen(&self) -> Option<Rect> {
        if self.is_degenerate() {
            return None;
        }
        Some(Rect::new(
            self.pan.x,
            self.pan.y,
            self.image.width * self.zoom,
            self.image.height * self.zoom,
        ))
    }

    /// Image-to-screen mapping as a drawing transform.
    pub fn to_affine(&self) -> tiny_skia::Transform {
        let zoom = self.zoom as f32;
        tiny_skia::Transform::from_row(zoom, 0.0, 0.0, zoom, self.pan.x as f32, self.pan.y as f32)
    }
}
