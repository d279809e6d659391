//! Image identity and lazily-known natural dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::geometry::Size;

/// Identity of an image: the backend id, or the file name when the image
/// came from a local folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ImageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Natural pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn to_size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

/// An image the user can browse and annotate.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub id: ImageId,
    /// Where the full resolution image can be fetched from
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Known only once the bitmap has been decoded
    natural_size: Option<ImageSize>,
}

impl ImageInfo {
    pub fn new(id: impl Into<ImageId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            thumbnail_url: None,
            natural_size: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail_url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(thumbnail_url.into());
        self
    }

    /// Natural size, if the image has been decoded and is not empty.
    pub fn natural_size(&self) -> Option<ImageSize> {
        self.natural_size
    }

    /// Record the decoded dimensions. Empty sizes are ignored.
    ///
    /// Returns true if the stored size changed.
    pub fn set_natural_size(&mut self, size: ImageSize) -> bool {
        if size.is_empty() {
            log::debug!("Ignoring empty natural size for {}", self.id);
            return false;
        }
        if self.natural_size == Some(size) {
            return false;
        }
        if let Some(previous) = self.natural_size {
            log::warn!(
                "Natural size of {} changed from {}x{} to {}x{}",
                self.id,
                previous.width,
                previous.height,
                size.width,
                size.height
            );
        }
        self.natural_size = Some(size);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_size_is_lazy() {
        let mut info = ImageInfo::new("cat.png", "http://host/cat.png");
        assert_eq!(info.natural_size(), None);

        assert!(info.set_natural_size(ImageSize::new(640, 480)));
        assert_eq!(info.natural_size(), Some(ImageSize::new(640, 480)));

        // Same size again is not a change
        assert!(!info.set_natural_size(ImageSize::new(640, 480)));
    }

    #[test]
    fn test_empty_natural_size_ignored() {
        let mut info = ImageInfo::new("a", "u");
        assert!(!info.set_natural_size(ImageSize::new(0, 0)));
        assert_eq!(info.natural_size(), None);
    }

    #[test]
    fn test_image_id_serializes_as_string() {
        let id = ImageId::new("42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
        assert_eq!(id.to_string(), "42");
    }
}
