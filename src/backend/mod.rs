//! Boundary to the labeling server.
//!
//! The engine never speaks HTTP or WebSocket itself. Hosts implement these
//! traits over whatever transport they use; [`MemoryBackend`] is an
//! in-process implementation for tests and offline rendering.

mod auto_label;
mod error;
mod mask_worker;
mod memory;
mod types;

pub use auto_label::{AutoLabelProgress, AutoLabelSession, AutoLabelUpdate, apply_event};
pub use error::{BackendError, BackendResult};
pub use mask_worker::{MaskJob, MaskOutcome, MaskRequestWorker};
pub use memory::{MemoryAutoLabelChannel, MemoryBackend};
pub use types::{
    AutoLabelEvent, AutoLabelRequest, AutoLabelStatus, CoordinateEntry, CoordinatesResponse,
    EncodedImage, GenerateMaskRequest, GenerateMaskResponse, LabeledCoordinate,
    SaveCoordinatesRequest, StoredCoordinates, UploadFile, UploadResponse, UploadedImage,
};

use crate::model::ImageId;

/// Image upload.
pub trait ImageBackend {
    /// Upload one batch of files into a folder.
    fn upload_images(&self, folder_path: &str, files: &[UploadFile]) -> BackendResult<UploadResponse>;
}

/// Coordinate persistence.
pub trait CoordinateBackend {
    /// Stored coordinates for every image in a folder.
    fn get_coordinates(&self, folder_path: &str) -> BackendResult<CoordinatesResponse>;

    fn save_coordinates(&self, request: &SaveCoordinatesRequest) -> BackendResult<()>;
}

/// Segmentation model. Called from the mask worker thread.
pub trait MaskBackend: Send + Sync {
    fn generate_mask(
        &self,
        image: &ImageId,
        request: &GenerateMaskRequest,
    ) -> BackendResult<GenerateMaskResponse>;
}

/// Duplex auto-label stream. Read from a background thread.
pub trait AutoLabelChannel: Send {
    fn send(&mut self, request: &AutoLabelRequest) -> BackendResult<()>;

    /// Block for the next event. `Ok(None)` means the server closed the stream.
    fn recv(&mut self) -> BackendResult<Option<AutoLabelEvent>>;

    fn close(&mut self);
}

/// Result of [`upload_in_batches`].
#[derive(Debug, Default)]
pub struct UploadOutcome {
    /// Images from every batch that succeeded, in upload order
    pub images: Vec<UploadedImage>,
    /// Index of each failed batch and why it failed
    pub failed_batches: Vec<(usize, BackendError)>,
}

impl UploadOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// Upload `files` in batches of `batch_size`. A failed batch is logged and
/// recorded; the remaining batches are still sent.
pub fn upload_in_batches(
    backend: &dyn ImageBackend,
    folder_path: &str,
    files: &[UploadFile],
    batch_size: usize,
) -> UploadOutcome {
    let mut outcome = UploadOutcome::default();
    for (index, batch) in files.chunks(batch_size.max(1)).enumerate() {
        match backend.upload_images(folder_path, batch) {
            Ok(response) => {
                log::debug!(
                    "Uploaded batch {} ({} files, {} accepted)",
                    index,
                    batch.len(),
                    response.images.len()
                );
                outcome.images.extend(response.images);
            }
            Err(e) => {
                log::error!("Error uploading batch {}: {}", index, e);
                outcome.failed_batches.push((index, e));
            }
        }
    }
    log::info!(
        "Uploaded {} images to {:?} ({} failed batches)",
        outcome.images.len(),
        folder_path,
        outcome.failed_batches.len()
    );
    outcome
}
