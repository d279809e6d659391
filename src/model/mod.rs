//! Data models for seglabel.

mod geometry;
mod image;
mod mask;

pub use geometry::{MIN_POLYGON_VERTICES, Point, Polygon, Rect, Size};
pub use image::{ImageId, ImageInfo, ImageSize};
pub use mask::Mask;
