//! RGBA drawing surface sized to the viewport container.

use std::path::Path;

use image::RgbaImage;
use tiny_skia::{Color, ColorU8, FilterQuality, Pixmap, PixmapPaint};

use super::error::{RenderError, RenderResult};
use crate::zoom_math::ViewportTransform;

/// The surface the image and its overlays are drawn onto.
#[derive(Debug, Clone)]
pub struct Frame {
    pixmap: Pixmap,
}

impl Frame {
    /// Create a transparent frame.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let pixmap = Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Fill the whole frame with one color.
    pub fn clear(&mut self, rgba: [u8; 4]) {
        let [r, g, b, a] = rgba;
        self.pixmap.fill(Color::from_rgba8(r, g, b, a));
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Draw the base image with the viewport's zoom and pan.
    ///
    /// Returns false if the image is empty and nothing was drawn.
    pub fn draw_image(&mut self, image: &RgbaImage, viewport: &ViewportTransform) -> bool {
        let Some(mut source) = Pixmap::new(image.width(), image.height()) else {
            log::debug!("Skipping empty source image");
            return false;
        };

        for (dst, src) in source.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }

        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, viewport.to_affine(), None);
        true
    }

    /// RGBA color (straight alpha) at a pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Number of pixels with any coverage.
    pub fn visible_pixel_count(&self) -> usize {
        self.pixmap.pixels().iter().filter(|p| p.alpha() > 0).count()
    }

    /// Convert to an `image` buffer with straight alpha.
    pub fn to_rgba_image(&self) -> RenderResult<RgbaImage> {
        let mut data = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let c = pixel.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(self.width(), self.height(), data).ok_or(RenderError::InvalidSize {
            width: self.width(),
            height: self.height(),
        })
    }

    /// Write the frame as a PNG file.
    pub fn save_png(&self, path: &Path) -> RenderResult<()> {
        let image = self.to_rgba_image()?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        log::info!("Wrote {}x{} frame to {:?}", self.width(), self.height(), path);
        Ok(())
    }
}
