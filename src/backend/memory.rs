//! In-process backend.
//!
//! Keeps uploads and coordinates in memory and answers mask requests with a
//! synthetic mask built from the prompt points, so the whole pipeline can run
//! without a server.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::{BackendError, BackendResult};
use super::types::{
    AutoLabelEvent, AutoLabelRequest, CoordinatesResponse, GenerateMaskRequest,
    GenerateMaskResponse, SaveCoordinatesRequest, StoredCoordinates, UploadFile, UploadResponse,
    UploadedImage,
};
use super::{AutoLabelChannel, CoordinateBackend, ImageBackend, MaskBackend};
use crate::model::{ImageId, ImageSize, Mask, Point, Polygon};

/// Half-size of the diamond polygon drawn around each include point.
const POLYGON_RADIUS: f64 = 10.0;

#[derive(Debug, Default)]
struct MemoryState {
    batch_sizes: Vec<usize>,
    coordinates: BTreeMap<String, BTreeMap<String, Vec<Point>>>,
    image_sizes: HashMap<ImageId, ImageSize>,
    mask_requests: Vec<(ImageId, GenerateMaskRequest)>,
    fail_next: Option<BackendError>,
}

#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    /// Mask resolution as (width, height)
    mask_size: (usize, usize),
    mask_delay: Option<Duration>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            mask_size: (64, 64),
            mask_delay: None,
        }
    }

    pub fn with_mask_size(mut self, width: usize, height: usize) -> Self {
        self.mask_size = (width, height);
        self
    }

    /// Sleep this long in every mask request.
    pub fn with_mask_delay(mut self, delay: Duration) -> Self {
        self.mask_delay = Some(delay);
        self
    }

    /// Natural size used to place prompt points on the mask grid.
    pub fn with_image_size(self, id: impl Into<ImageId>, size: ImageSize) -> Self {
        self.state().image_sizes.insert(id.into(), size);
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self) -> BackendResult<()> {
        match self.state().fail_next.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Make the next request of any kind fail.
    pub fn fail_next(&self, error: BackendError) {
        self.state().fail_next = Some(error);
    }

    /// Size of each upload batch received so far.
    pub fn upload_batch_sizes(&self) -> Vec<usize> {
        self.state().batch_sizes.clone()
    }

    /// Store a coordinate as if it had been saved earlier.
    pub fn insert_coordinate(&self, folder_path: &str, image_name: &str, point: Point) {
        self.state()
            .coordinates
            .entry(folder_path.to_string())
            .or_default()
            .insert(image_name.to_string(), vec![point]);
    }

    /// Saved coordinates for a folder.
    pub fn saved_coordinates(&self, folder_path: &str) -> BTreeMap<String, Vec<Point>> {
        self.state()
            .coordinates
            .get(folder_path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn mask_request_count(&self) -> usize {
        self.state().mask_requests.len()
    }

    pub fn last_mask_request(&self) -> Option<(ImageId, GenerateMaskRequest)> {
        self.state().mask_requests.last().cloned()
    }

    /// Mask with the cell under each prompt point set (include) or cleared
    /// (exclude), in click order.
    fn synthesize(&self, image: &ImageId, request: &GenerateMaskRequest) -> GenerateMaskResponse {
        let (mask_w, mask_h) = self.mask_size;
        let size = self
            .state()
            .image_sizes
            .get(image)
            .copied()
            .unwrap_or(ImageSize::new(mask_w as u32, mask_h as u32));
        if size.is_empty() || mask_w == 0 || mask_h == 0 {
            return GenerateMaskResponse::default();
        }

        let mut mask = Mask::zeros(mask_w, mask_h);
        let mut polygons = Vec::new();
        for point in &request.coordinates {
            let position = point.position();
            if !position.is_finite() {
                continue;
            }
            let mx = (position.x / f64::from(size.width) * mask_w as f64).floor();
            let my = (position.y / f64::from(size.height) * mask_h as f64).floor();
            let mx = mx.clamp(0.0, (mask_w - 1) as f64) as usize;
            let my = my.clamp(0.0, (mask_h - 1) as f64) as usize;
            mask.set(mx, my, point.include);

            if point.include {
                polygons.push(Polygon::new(vec![
                    position + Point::new(0.0, -POLYGON_RADIUS),
                    position + Point::new(POLYGON_RADIUS, 0.0),
                    position + Point::new(0.0, POLYGON_RADIUS),
                    position + Point::new(-POLYGON_RADIUS, 0.0),
                ]));
            }
        }
        GenerateMaskResponse {
            mask: Some(mask),
            polygons,
        }
    }
}

impl ImageBackend for MemoryBackend {
    fn upload_images(&self, folder_path: &str, files: &[UploadFile]) -> BackendResult<UploadResponse> {
        self.take_failure()?;
        self.state().batch_sizes.push(files.len());
        let images = files
            .iter()
            .map(|file| UploadedImage {
                id: ImageId::new(file.name.clone()),
                url: format!("/media/{}/{}", folder_path, file.name),
                thumbnail_url: Some(format!("/media/{}/thumbnails/{}", folder_path, file.name)),
            })
            .collect();
        Ok(UploadResponse { images })
    }
}

impl CoordinateBackend for MemoryBackend {
    fn get_coordinates(&self, folder_path: &str) -> BackendResult<CoordinatesResponse> {
        self.take_failure()?;
        let coordinates = self
            .saved_coordinates(folder_path)
            .into_iter()
            .map(|(name, points)| (name, StoredCoordinates::Many(points)))
            .collect();
        Ok(CoordinatesResponse { coordinates })
    }

    fn save_coordinates(&self, request: &SaveCoordinatesRequest) -> BackendResult<()> {
        self.take_failure()?;
        for entry in &request.coordinates {
            self.insert_coordinate(&entry.folder_path, &entry.image_name, Point::new(entry.x, entry.y));
        }
        log::debug!("Saved {} coordinates", request.coordinates.len());
        Ok(())
    }
}

impl MaskBackend for MemoryBackend {
    fn generate_mask(
        &self,
        image: &ImageId,
        request: &GenerateMaskRequest,
    ) -> BackendResult<GenerateMaskResponse> {
        if let Some(delay) = self.mask_delay {
            std::thread::sleep(delay);
        }
        self.take_failure()?;
        self.state().mask_requests.push((image.clone(), request.clone()));
        Ok(self.synthesize(image, request))
    }
}

/// Scripted auto-label stream.
#[derive(Debug, Default)]
pub struct MemoryAutoLabelChannel {
    events: VecDeque<AutoLabelEvent>,
    /// Events fed while the stream is open, after the scripted ones
    live: Option<Receiver<AutoLabelEvent>>,
    sent: Arc<Mutex<Vec<AutoLabelRequest>>>,
    closed: bool,
}

impl MemoryAutoLabelChannel {
    /// A channel that yields `events` in order and then reports end of stream.
    pub fn new(events: impl IntoIterator<Item = AutoLabelEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A channel whose events arrive through the returned sender. `recv`
    /// blocks until an event is sent; dropping the sender ends the stream.
    pub fn live() -> (Self, Sender<AutoLabelEvent>) {
        let (tx, rx) = mpsc::channel();
        let channel = Self {
            live: Some(rx),
            ..Self::default()
        };
        (channel, tx)
    }

    /// Handle to the requests sent on this channel, readable after it moves
    /// to a reader thread.
    pub fn sent_log(&self) -> Arc<Mutex<Vec<AutoLabelRequest>>> {
        Arc::clone(&self.sent)
    }
}

impl AutoLabelChannel for MemoryAutoLabelChannel {
    fn send(&mut self, request: &AutoLabelRequest) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::ChannelClosed);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(())
    }

    fn recv(&mut self) -> BackendResult<Option<AutoLabelEvent>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }
        Ok(self.live.as_ref().and_then(|rx| rx.recv().ok()))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
