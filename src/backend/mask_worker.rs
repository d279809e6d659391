//! Background thread for mask generation.
//!
//! Every request carries the revision of the point list it was built from
//! and gets a ticket from a counter that never repeats. Only the result for
//! the latest ticket of an image is handed back; anything older is dropped,
//! both on the worker (queued jobs are coalesced per image) and when results
//! are polled.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use web_time::Instant;

use super::MaskBackend;
use super::error::BackendResult;
use super::types::{GenerateMaskRequest, GenerateMaskResponse};
use crate::model::ImageId;

/// One mask request.
#[derive(Debug, Clone)]
pub struct MaskJob {
    pub image: ImageId,
    /// Point list revision the request was built from
    pub revision: u64,
    pub request: GenerateMaskRequest,
}

/// A finished request.
#[derive(Debug)]
pub struct MaskOutcome {
    pub image: ImageId,
    pub revision: u64,
    pub result: BackendResult<GenerateMaskResponse>,
    /// Time spent in the backend call
    pub elapsed: Duration,
    ticket: u64,
}

/// A job as queued on the worker.
struct Ticketed {
    ticket: u64,
    job: MaskJob,
}

/// Message sent to the worker thread.
enum WorkerMessage {
    Generate(Ticketed),
    Shutdown,
}

/// Runs mask requests off the UI thread.
pub struct MaskRequestWorker {
    request_tx: Sender<WorkerMessage>,
    result_rx: Receiver<MaskOutcome>,
    thread_handle: Option<JoinHandle<()>>,
    /// Ticket of the latest request per image
    latest: HashMap<ImageId, u64>,
    next_ticket: u64,
}

impl MaskRequestWorker {
    /// Spawn the worker thread.
    pub fn spawn(backend: Arc<dyn MaskBackend>) -> BackendResult<Self> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerMessage>();
        let (result_tx, result_rx) = mpsc::channel::<MaskOutcome>();

        let thread_handle = thread::Builder::new()
            .name("mask-worker".to_string())
            .spawn(move || {
                log::info!("Mask worker thread started");
                Self::thread_loop(backend.as_ref(), request_rx, result_tx);
                log::info!("Mask worker thread exiting");
            })?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            latest: HashMap::new(),
            next_ticket: 1,
        })
    }

    /// Worker main loop.
    fn thread_loop(
        backend: &dyn MaskBackend,
        request_rx: Receiver<WorkerMessage>,
        result_tx: Sender<MaskOutcome>,
    ) {
        loop {
            let first = match request_rx.recv() {
                Ok(WorkerMessage::Generate(queued)) => queued,
                Ok(WorkerMessage::Shutdown) => {
                    log::debug!("Received shutdown signal");
                    return;
                }
                Err(_) => {
                    log::debug!("Request channel closed, mask worker exiting");
                    return;
                }
            };

            // Coalesce whatever else is queued: one job per image, newest wins
            let mut batch = vec![first];
            let mut shutdown = false;
            loop {
                match request_rx.try_recv() {
                    Ok(WorkerMessage::Generate(queued)) => {
                        if let Some(slot) = batch.iter_mut().find(|q| q.job.image == queued.job.image) {
                            log::debug!(
                                "Superseding queued mask request for {} (revision {} -> {})",
                                queued.job.image,
                                slot.job.revision,
                                queued.job.revision
                            );
                            *slot = queued;
                        } else {
                            batch.push(queued);
                        }
                    }
                    Ok(WorkerMessage::Shutdown) => {
                        shutdown = true;
                        break;
                    }
                    Err(_) => break,
                }
            }
            if shutdown {
                return;
            }

            for queued in batch {
                let outcome = Self::run(backend, queued);
                if result_tx.send(outcome).is_err() {
                    log::warn!("Result channel closed, mask worker exiting");
                    return;
                }
            }
        }
    }

    fn run(backend: &dyn MaskBackend, Ticketed { ticket, job }: Ticketed) -> MaskOutcome {
        log::debug!(
            "Generating mask for {} from {} points (revision {})",
            job.image,
            job.request.coordinates.len(),
            job.revision
        );
        let start = Instant::now();
        let result = backend.generate_mask(&job.image, &job.request);
        MaskOutcome {
            image: job.image,
            revision: job.revision,
            result,
            elapsed: start.elapsed(),
            ticket,
        }
    }

    /// Queue a request. It supersedes any earlier request for the same image.
    pub fn request(&mut self, job: MaskJob) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.latest.insert(job.image.clone(), ticket);
        let image = job.image.clone();
        if self.request_tx.send(WorkerMessage::Generate(Ticketed { ticket, job })).is_err() {
            log::error!("Failed to send mask request for {}: worker stopped", image);
        }
    }

    /// Forget the image's outstanding request; its result will be dropped.
    pub fn cancel(&mut self, image: &ImageId) {
        if self.latest.remove(image).is_some() {
            log::debug!("Cancelled mask request for {}", image);
        }
    }

    /// Forget every outstanding request.
    pub fn cancel_all(&mut self) {
        if !self.latest.is_empty() {
            log::debug!("Cancelled {} mask requests", self.latest.len());
            self.latest.clear();
        }
    }

    /// Whether a result for `image` is still expected.
    pub fn is_pending(&self, image: &ImageId) -> bool {
        self.latest.contains_key(image)
    }

    /// Collect finished results for the latest revisions. Non-blocking.
    pub fn poll_results(&mut self) -> Vec<MaskOutcome> {
        let mut fresh = Vec::new();
        loop {
            match self.result_rx.try_recv() {
                Ok(outcome) => {
                    if self.latest.get(&outcome.image) != Some(&outcome.ticket) {
                        log::debug!(
                            "Dropping stale mask for {} (revision {})",
                            outcome.image,
                            outcome.revision
                        );
                        continue;
                    }
                    self.latest.remove(&outcome.image);
                    log::debug!(
                        "Mask for {} arrived after {:?}",
                        outcome.image,
                        outcome.elapsed
                    );
                    fresh.push(outcome);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Mask worker disconnected");
                    break;
                }
            }
        }
        fresh
    }

    /// Block until the latest request for every image has been answered, or
    /// `timeout` passes. Returns the fresh results.
    pub fn wait_for_results(&mut self, timeout: Duration) -> Vec<MaskOutcome> {
        let deadline = Instant::now() + timeout;
        let mut fresh = Vec::new();
        loop {
            fresh.extend(self.poll_results());
            if self.latest.is_empty() || Instant::now() >= deadline {
                return fresh;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for MaskRequestWorker {
    fn drop(&mut self) {
        let _ = self.request_tx.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Mask worker thread panicked");
            }
        }
    }
}
