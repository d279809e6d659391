//! Labeling session: one catalog, one viewport, one pointer controller and
//! one annotation store, wired together.
//!
//! Raw input goes through [`LabelSession::handle_event`]. Pans and zooms
//! update the viewport, clicks are mapped to image space and written to the
//! store, and in segmentation mode each new point set is sent to the mask
//! worker. [`LabelSession::poll`] applies finished background work and
//! should be called once per frame.

use std::sync::Arc;

use image::RgbaImage;

use crate::annotation::{
    AnnotationMode, AnnotationPoint, ImageAnnotations, MergeIntent, SharedAnnotationStore,
};
use crate::backend::{
    AutoLabelChannel, AutoLabelProgress, AutoLabelRequest, AutoLabelSession, AutoLabelUpdate,
    BackendResult, CoordinateBackend, GenerateMaskRequest, ImageBackend, MaskBackend, MaskJob,
    MaskRequestWorker, SaveCoordinatesRequest, UploadFile, UploadOutcome, upload_in_batches,
};
use crate::catalog::{ImageCatalog, is_image_filename};
use crate::config::{AppConfig, ViewerConfig};
use crate::input::{CursorHint, Intent, PointerEvent, PointerInputController, Step};
use crate::model::{ImageId, ImageSize, Point, Size};
use crate::notify::Notifications;
use crate::render::{Frame, OverlayRenderer, RenderResult};
use crate::zoom_math::ViewportTransform;

/// What a click turned into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnnotateOutcome {
    /// Coordinate point placed or replaced
    PointSet(Point),
    /// Prompt point added; carries the new point list revision
    PointAdded { point: AnnotationPoint, revision: u64 },
    /// No image, unknown size, or the click missed the image
    Ignored,
}

pub struct LabelSession {
    viewer: ViewerConfig,
    upload_batch_size: usize,
    folder_path: String,
    catalog: ImageCatalog,
    viewport: ViewportTransform,
    /// The viewport has been fitted to an image at least once
    fitted: bool,
    input: PointerInputController,
    store: SharedAnnotationStore,
    overlay: OverlayRenderer,
    mask_worker: Option<MaskRequestWorker>,
    auto_label: Option<AutoLabelSession>,
    notifications: Notifications,
}

impl LabelSession {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            viewer: config.viewer.clone(),
            upload_batch_size: config.preferences.upload_batch_size,
            folder_path: config.preferences.default_folder.clone(),
            catalog: ImageCatalog::new(),
            viewport: ViewportTransform::new(config.viewer.zoom),
            fitted: false,
            input: PointerInputController::new(&config.viewer),
            store: SharedAnnotationStore::default(),
            overlay: OverlayRenderer::new(&config.overlay),
            mask_worker: None,
            auto_label: None,
            notifications: Notifications::default(),
        }
    }

    /// Start the mask worker. Segmentation clicks without one only store points.
    pub fn with_mask_backend(mut self, backend: Arc<dyn MaskBackend>) -> BackendResult<Self> {
        self.mask_worker = Some(MaskRequestWorker::spawn(backend)?);
        Ok(self)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn catalog(&self) -> &ImageCatalog {
        &self.catalog
    }

    pub fn viewport(&self) -> &ViewportTransform {
        &self.viewport
    }

    pub fn store(&self) -> &SharedAnnotationStore {
        &self.store
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    pub fn mode(&self) -> AnnotationMode {
        self.input.mode()
    }

    pub fn cursor(&self) -> CursorHint {
        self.input.cursor()
    }

    /// Annotations of the displayed image.
    pub fn current_annotations(&self) -> Option<ImageAnnotations> {
        let id = self.catalog.current_id()?;
        self.store.snapshot(id)
    }

    pub fn has_unsaved_edits(&self) -> bool {
        self.store.read().has_unsaved_edits()
    }

    pub fn is_mask_pending(&self) -> bool {
        match (&self.mask_worker, self.catalog.current_id()) {
            (Some(worker), Some(id)) => worker.is_pending(id),
            _ => false,
        }
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub fn set_mode(&mut self, mode: AnnotationMode) {
        if self.input.mode() != mode {
            log::info!("Annotation mode: {}", mode.name());
        }
        self.viewer.annotation_mode = mode;
        self.input.set_mode(mode);
    }

    pub fn set_keep_zoom_pan(&mut self, keep: bool) {
        self.viewer.keep_zoom_pan = keep;
    }

    // ------------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------------

    /// The display area changed size.
    pub fn resize(&mut self, container: Size) {
        self.viewport.set_container_size(container);
        self.refit();
    }

    /// The current image (or another one) finished decoding.
    pub fn set_natural_size(&mut self, id: &ImageId, size: ImageSize) {
        if !self.catalog.set_natural_size(id, size) {
            return;
        }
        if self.catalog.current_id() == Some(id) {
            self.viewport.set_image_size(Some(size));
            self.refit();
        }
    }

    /// Fit and center unless zoom and pan are being kept. The first image
    /// with a known size is always fitted.
    fn refit(&mut self) {
        if self.viewport.is_degenerate() {
            return;
        }
        if !self.viewer.keep_zoom_pan || !self.fitted {
            self.viewport.reset_to_fit();
            self.fitted = true;
        }
    }

    /// Fit the current image regardless of the keep toggle.
    pub fn reset_view(&mut self) {
        if self.viewport.is_degenerate() {
            return;
        }
        self.viewport.reset_to_fit();
        self.fitted = true;
    }

    fn on_image_changed(&mut self) {
        let size = self.catalog.current().and_then(|info| info.natural_size());
        self.viewport.set_image_size(size);
        self.refit();
        if let Some(id) = self.catalog.current_id() {
            log::debug!(
                "Showing {} ({}/{})",
                id,
                self.catalog.current_index() + 1,
                self.catalog.len()
            );
        }
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn navigate(&mut self, step: Step) -> bool {
        let changed = self.catalog.step(step);
        if changed {
            self.on_image_changed();
        }
        changed
    }

    /// Thumbnail click.
    pub fn select(&mut self, index: usize) -> bool {
        let changed = self.catalog.select(index);
        if changed {
            self.on_image_changed();
        }
        changed
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    /// Feed one raw event. The returned intent has already been applied;
    /// hosts only need it for [`Intent::SuppressContextMenu`].
    pub fn handle_event(&mut self, event: PointerEvent) -> Option<Intent> {
        let intent = self.input.handle(event)?;
        match intent {
            Intent::PanBy(delta) => self.viewport.pan_by(delta),
            Intent::ZoomAt { point, delta_sign } => {
                self.viewport.zoom_at(point, delta_sign);
            }
            Intent::Annotate {
                screen_point,
                include,
            } => {
                self.annotate_at_screen(screen_point, include);
            }
            Intent::Navigate(step) => {
                self.navigate(step);
            }
            Intent::SuppressContextMenu => {}
        }
        Some(intent)
    }

    /// Place an annotation at a screen point on the current image.
    pub fn annotate_at_screen(&mut self, screen: Point, include: bool) -> AnnotateOutcome {
        let Some(id) = self.catalog.current_id().cloned() else {
            return AnnotateOutcome::Ignored;
        };
        let image = self.viewport.screen_to_image(screen);
        if !self.viewport.in_bounds(image) {
            log::debug!(
                "Click at ({:.1}, {:.1}) is outside {}",
                screen.x,
                screen.y,
                id
            );
            return AnnotateOutcome::Ignored;
        }

        match self.input.mode() {
            AnnotationMode::SinglePoint => {
                self.store.write().set_point(&id, image);
                AnnotateOutcome::PointSet(image)
            }
            AnnotationMode::MultiPoint | AnnotationMode::Segmentation => {
                let point = AnnotationPoint::new(image, include);
                let revision = self.store.write().append_point(&id, point);
                if self.input.mode().generates_masks() {
                    self.request_mask(&id);
                }
                AnnotateOutcome::PointAdded { point, revision }
            }
        }
    }

    fn request_mask(&mut self, id: &ImageId) {
        let Some(worker) = self.mask_worker.as_mut() else {
            log::debug!("No mask backend; keeping points only");
            return;
        };
        let Some(entry) = self.store.snapshot(id) else {
            return;
        };
        if entry.points.is_empty() {
            worker.cancel(id);
            return;
        }
        worker.request(MaskJob {
            image: id.clone(),
            revision: entry.revision(),
            request: GenerateMaskRequest {
                coordinates: entry.points,
                mask_input: entry.mask,
                complexity: None,
            },
        });
    }

    /// Remove the current image's prompt points and their mask.
    pub fn clear_points(&mut self) {
        let Some(id) = self.catalog.current_id().cloned() else {
            return;
        };
        self.store.write().clear_points(&id);
        if let Some(worker) = self.mask_worker.as_mut() {
            worker.cancel(&id);
        }
    }

    /// Forget every annotation in the session.
    pub fn clear_labels(&mut self) {
        self.store.write().clear_all();
        if let Some(worker) = self.mask_worker.as_mut() {
            worker.cancel_all();
        }
        self.notifications.info("Cleared all labels");
    }

    // ------------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------------

    /// Apply finished mask requests and auto-label events. Returns the
    /// number of masks applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        if let Some(worker) = self.mask_worker.as_mut() {
            for outcome in worker.poll_results() {
                match outcome.result {
                    Ok(response) => {
                        let accepted = self.store.write().set_mask_for_revision(
                            &outcome.image,
                            outcome.revision,
                            response.mask,
                            response.polygons,
                        );
                        if accepted {
                            applied += 1;
                        }
                    }
                    Err(e) => {
                        log::error!("Error generating mask for {}: {}", outcome.image, e);
                        self.notifications
                            .error(format!("Mask generation failed for {}: {}", outcome.image, e));
                    }
                }
            }
        }

        if let Some(run) = self.auto_label.as_mut() {
            for update in run.poll_updates() {
                match update {
                    AutoLabelUpdate::Failed { message } => self.notifications.warning(format!(
                        "Auto-label error: {}",
                        message.as_deref().unwrap_or("unknown")
                    )),
                    AutoLabelUpdate::Complete => self.notifications.success("Auto-label complete"),
                    AutoLabelUpdate::Closed { error: Some(e) } => {
                        log::error!("Auto-label stream failed: {}", e);
                        self.notifications.error(format!("Auto-label stream failed: {}", e));
                    }
                    AutoLabelUpdate::Labeled { .. }
                    | AutoLabelUpdate::Skipped
                    | AutoLabelUpdate::Closed { error: None } => {}
                }
            }
        }

        self.notifications.prune();
        applied
    }

    // ------------------------------------------------------------------------
    // Backend operations
    // ------------------------------------------------------------------------

    /// Upload a folder. Non-image files are skipped. Switching to a new
    /// folder starts a fresh catalog and store.
    pub fn upload(
        &mut self,
        backend: &dyn ImageBackend,
        folder_path: &str,
        files: &[UploadFile],
    ) -> UploadOutcome {
        if folder_path != self.folder_path {
            // Stop the run before clearing so none of its results land in
            // the new folder
            if let Some(run) = self.auto_label.take() {
                log::info!("Folder changed; stopping auto-label run");
                run.cancel();
            }
            self.folder_path = folder_path.to_string();
            self.catalog.clear();
            self.store.write().clear_all();
            if let Some(worker) = self.mask_worker.as_mut() {
                worker.cancel_all();
            }
        }

        let images: Vec<UploadFile> = files
            .iter()
            .filter(|f| is_image_filename(&f.name))
            .cloned()
            .collect();
        if images.len() < files.len() {
            log::debug!("Skipping {} non-image files", files.len() - images.len());
        }

        let was_empty = self.catalog.is_empty();
        let outcome = upload_in_batches(backend, folder_path, &images, self.upload_batch_size);
        self.catalog.merge_uploaded(&outcome.images);
        if was_empty && !self.catalog.is_empty() {
            self.on_image_changed();
        }

        if outcome.is_complete() {
            self.notifications
                .success(format!("Uploaded {} images", outcome.images.len()));
        } else {
            self.notifications.error(format!(
                "{} of {} upload batches failed",
                outcome.failed_batches.len(),
                images.len().div_ceil(self.upload_batch_size.max(1))
            ));
        }
        outcome
    }

    /// Send every coordinate point to the backend.
    pub fn save(&mut self, backend: &dyn CoordinateBackend) -> BackendResult<usize> {
        let request = SaveCoordinatesRequest {
            coordinates: self.store.read().coordinate_entries(&self.folder_path),
        };
        match backend.save_coordinates(&request) {
            Ok(()) => {
                let ids: Vec<ImageId> = request.image_ids().collect();
                self.store.write().mark_saved(&ids);
                log::info!("Saved {} coordinates", ids.len());
                self.notifications
                    .success(format!("Saved {} coordinates", ids.len()));
                Ok(ids.len())
            }
            Err(e) => {
                log::error!("Error saving coordinates: {}", e);
                self.notifications.error(format!("Saving failed: {}", e));
                Err(e)
            }
        }
    }

    /// Fetch stored coordinates. `Load` keeps local edits, `Reload`
    /// replaces them; check [`LabelSession::has_unsaved_edits`] first.
    pub fn load(&mut self, backend: &dyn CoordinateBackend, intent: MergeIntent) -> BackendResult<usize> {
        let response = match backend.get_coordinates(&self.folder_path) {
            Ok(response) => response,
            Err(e) => {
                log::error!("Error reloading coordinates: {}", e);
                self.notifications.error(format!("Loading coordinates failed: {}", e));
                return Err(e);
            }
        };
        let applied = self
            .store
            .write()
            .merge_from_backend(response.into_annotations(), intent);
        if intent == MergeIntent::Reload {
            if let Some(worker) = self.mask_worker.as_mut() {
                worker.cancel_all();
            }
        }
        self.notifications
            .info(format!("Loaded {} coordinates", applied));
        Ok(applied)
    }

    /// Auto-label every uploaded image in the folder.
    pub fn start_auto_label(&mut self, channel: Box<dyn AutoLabelChannel>) -> BackendResult<()> {
        let request = AutoLabelRequest::ProcessImages {
            folder_path: self.folder_path.clone(),
        };
        self.start_auto_label_with(channel, request, self.catalog.len())
    }

    /// Auto-label images sent inline.
    pub fn start_auto_label_batch(
        &mut self,
        channel: Box<dyn AutoLabelChannel>,
        files: &[UploadFile],
    ) -> BackendResult<()> {
        self.start_auto_label_with(channel, AutoLabelRequest::batch(files), files.len())
    }

    fn start_auto_label_with(
        &mut self,
        channel: Box<dyn AutoLabelChannel>,
        request: AutoLabelRequest,
        total: usize,
    ) -> BackendResult<()> {
        if let Some(previous) = self.auto_label.take() {
            previous.cancel();
        }
        let run = AutoLabelSession::start(channel, request, total, self.store.clone())?;
        self.auto_label = Some(run);
        self.notifications.info(format!("Auto-labeling {} images", total));
        Ok(())
    }

    pub fn auto_label_progress(&self) -> Option<AutoLabelProgress> {
        self.auto_label.as_ref().map(AutoLabelSession::progress)
    }

    // ------------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------------

    /// Draw the current image and its overlays into a container-sized frame.
    pub fn render(&self, image: Option<&RgbaImage>) -> RenderResult<Frame> {
        let container = self.viewport.container_size();
        let mut frame = Frame::new(container.width.round() as u32, container.height.round() as u32)?;
        if let Some(image) = image {
            frame.draw_image(image, &self.viewport);
        }
        if let Some(annotations) = self.current_annotations() {
            let size = self.catalog.current().and_then(|info| info.natural_size());
            self.overlay.render(&mut frame, &annotations, &self.viewport, size);
        }
        Ok(frame)
    }
}
