//! The ordered set of images being labeled and the current selection.

use std::collections::HashSet;

use crate::backend::UploadedImage;
use crate::input::Step;
use crate::model::{ImageId, ImageInfo, ImageSize};

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

/// Check if a filename (string) has a supported image extension.
/// Works with both full paths and just filenames.
pub fn is_image_filename(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Images in upload order with a current index.
#[derive(Debug, Clone, Default)]
pub struct ImageCatalog {
    images: Vec<ImageInfo>,
    current_index: usize,
}

impl ImageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[ImageInfo] {
        &self.images
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> Option<&ImageInfo> {
        self.images.get(self.current_index)
    }

    pub fn current_id(&self) -> Option<&ImageId> {
        self.current().map(|info| &info.id)
    }

    pub fn get(&self, id: &ImageId) -> Option<&ImageInfo> {
        self.images.iter().find(|info| &info.id == id)
    }

    pub fn position(&self, id: &ImageId) -> Option<usize> {
        self.images.iter().position(|info| &info.id == id)
    }

    /// Move to the next image. Stops at the last one.
    ///
    /// Returns true if the selection changed.
    pub fn next(&mut self) -> bool {
        if self.current_index + 1 < self.images.len() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous image. Stops at the first one.
    pub fn prev(&mut self) -> bool {
        if self.current_index > 0 && !self.images.is_empty() {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    pub fn step(&mut self, step: Step) -> bool {
        match step {
            Step::Previous => self.prev(),
            Step::Next => self.next(),
        }
    }

    /// Select by index, as from a thumbnail click. Out of range is ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.images.len() || index == self.current_index {
            return false;
        }
        self.current_index = index;
        true
    }

    /// Add uploaded images. Ids already present keep their entry (and any
    /// decoded size); new ids are appended. Returns how many were added.
    pub fn merge_uploaded(&mut self, uploaded: &[UploadedImage]) -> usize {
        let mut known: HashSet<ImageId> = self.images.iter().map(|info| info.id.clone()).collect();
        let mut added = 0;
        for image in uploaded {
            if known.insert(image.id.clone()) {
                self.images.push(image.to_image_info());
                added += 1;
            }
        }
        if added > 0 {
            log::debug!("Catalog grew by {} to {} images", added, self.images.len());
        }
        added
    }

    /// Record decoded dimensions for an image. Returns true if they changed.
    pub fn set_natural_size(&mut self, id: &ImageId, size: ImageSize) -> bool {
        self.images
            .iter_mut()
            .find(|info| &info.id == id)
            .is_some_and(|info| info.set_natural_size(size))
    }

    /// Drop every image.
    pub fn clear(&mut self) {
        self.images.clear();
        self.current_index = 0;
    }
}
