//! Streaming auto-label run.
//!
//! A reader thread sends the start request, then applies each event to the
//! shared store as it arrives. The UI polls [`AutoLabelSession::poll_updates`]
//! and [`AutoLabelSession::progress`] and is free to edit other images
//! meanwhile.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use super::AutoLabelChannel;
use super::error::BackendResult;
use super::types::{AutoLabelEvent, AutoLabelRequest, AutoLabelStatus};
use crate::annotation::{AnnotationStore, SharedAnnotationStore};
use crate::model::{ImageId, Point};

/// Progress of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AutoLabelProgress {
    /// Images the server reported success for
    pub processed: usize,
    /// Images expected in this run
    pub total: usize,
    pub errors: usize,
    /// Last progress value the server sent, if any
    pub reported: Option<f64>,
    pub complete: bool,
}

impl AutoLabelProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// `processed / total * 100`, falling back to the server's own figure
    /// when the total is unknown. Capped at 100.
    pub fn percent(&self) -> f64 {
        let percent = if self.total > 0 {
            self.processed as f64 / self.total as f64 * 100.0
        } else if self.complete {
            100.0
        } else {
            self.reported.unwrap_or(0.0)
        };
        percent.clamp(0.0, 100.0)
    }
}

/// What an event did, reported back to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoLabelUpdate {
    /// A coordinate was written to the store
    Labeled { image: ImageId, point: Point },
    /// The server reported success without a usable coordinate
    Skipped,
    Failed { message: Option<String> },
    Complete,
    /// The stream ended, normally or not
    Closed { error: Option<String> },
}

/// Apply one server event to the store and the progress counters.
pub fn apply_event(
    store: &mut AnnotationStore,
    progress: &mut AutoLabelProgress,
    event: AutoLabelEvent,
) -> AutoLabelUpdate {
    if event.progress.is_some() {
        progress.reported = event.progress;
    }
    match event.status {
        AutoLabelStatus::Success => {
            progress.processed += 1;
            let labeled = event
                .coordinates
                .and_then(|c| c.point().map(|point| (ImageId::new(c.image_name), point)));
            match labeled {
                Some((image, point)) => {
                    store.set_point(&image, point);
                    log::debug!(
                        "Auto-labeled {} at ({:.1}, {:.1}), {:.0}%",
                        image,
                        point.x,
                        point.y,
                        progress.percent()
                    );
                    AutoLabelUpdate::Labeled { image, point }
                }
                None => AutoLabelUpdate::Skipped,
            }
        }
        AutoLabelStatus::Error => {
            progress.errors += 1;
            log::error!(
                "Error from server: {}",
                event.message.as_deref().unwrap_or("no message")
            );
            AutoLabelUpdate::Failed {
                message: event.message,
            }
        }
        AutoLabelStatus::Complete => {
            progress.complete = true;
            log::info!(
                "Auto-label complete: {} processed, {} errors",
                progress.processed,
                progress.errors
            );
            AutoLabelUpdate::Complete
        }
    }
}

/// A running auto-label stream.
pub struct AutoLabelSession {
    progress: Arc<Mutex<AutoLabelProgress>>,
    update_rx: Receiver<AutoLabelUpdate>,
    stop: Arc<AtomicBool>,
    finished: bool,
}

impl AutoLabelSession {
    /// Start a run on its own reader thread.
    pub fn start(
        mut channel: Box<dyn AutoLabelChannel>,
        request: AutoLabelRequest,
        total: usize,
        store: SharedAnnotationStore,
    ) -> BackendResult<Self> {
        let progress = Arc::new(Mutex::new(AutoLabelProgress::new(total)));
        let stop = Arc::new(AtomicBool::new(false));
        let (update_tx, update_rx) = mpsc::channel();

        let thread_progress = Arc::clone(&progress);
        let thread_stop = Arc::clone(&stop);
        // Detached; dropping the session only raises the stop flag
        thread::Builder::new()
            .name("auto-label".to_string())
            .spawn(move || {
                log::info!("Auto-label reader started ({} images)", total);
                let error = Self::read_loop(
                    channel.as_mut(),
                    &request,
                    &store,
                    &thread_progress,
                    &thread_stop,
                    &update_tx,
                )
                .err()
                .map(|e| e.to_string());
                channel.close();
                let _ = update_tx.send(AutoLabelUpdate::Closed { error });
                log::info!("Auto-label reader exiting");
            })?;

        Ok(Self {
            progress,
            update_rx,
            stop,
            finished: false,
        })
    }

    fn read_loop(
        channel: &mut dyn AutoLabelChannel,
        request: &AutoLabelRequest,
        store: &SharedAnnotationStore,
        progress: &Mutex<AutoLabelProgress>,
        stop: &AtomicBool,
        update_tx: &Sender<AutoLabelUpdate>,
    ) -> BackendResult<()> {
        channel.send(request)?;
        while !stop.load(Ordering::Acquire) {
            let Some(event) = channel.recv()? else {
                log::debug!("Auto-label stream closed by server");
                break;
            };
            let update = {
                // Checked under the write lock: once `cancel` returns, a
                // caller that then takes the lock sees no further writes
                let mut store = store.write();
                if stop.load(Ordering::Acquire) {
                    log::debug!("Auto-label cancelled; dropping pending event");
                    break;
                }
                let mut progress = progress.lock().unwrap_or_else(PoisonError::into_inner);
                apply_event(&mut store, &mut progress, event)
            };
            let complete = update == AutoLabelUpdate::Complete;
            if update_tx.send(update).is_err() || complete {
                break;
            }
        }
        Ok(())
    }

    pub fn progress(&self) -> AutoLabelProgress {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Updates since the last poll. Non-blocking.
    pub fn poll_updates(&mut self) -> Vec<AutoLabelUpdate> {
        let mut updates = Vec::new();
        loop {
            match self.update_rx.try_recv() {
                Ok(update) => {
                    if matches!(update, AutoLabelUpdate::Closed { .. }) {
                        self.finished = true;
                    }
                    updates.push(update);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.finished = true;
                    break;
                }
            }
        }
        updates
    }

    /// The reader has exited and every update has been polled.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop the reader. No store write happens after this returns; the
    /// event it may be blocked on is discarded.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for AutoLabelSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::{BackendError, LabeledCoordinate, MemoryAutoLabelChannel};

    fn drain(session: &mut AutoLabelSession) -> Vec<AutoLabelUpdate> {
        let mut updates = Vec::new();
        for _ in 0..5000 {
            updates.extend(session.poll_updates());
            if session.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        updates
    }

    #[test]
    fn test_progress_percent() {
        let mut progress = AutoLabelProgress::new(4);
        assert_eq!(progress.percent(), 0.0);
        progress.processed = 1;
        assert_eq!(progress.percent(), 25.0);
        progress.processed = 9;
        assert_eq!(progress.percent(), 100.0);

        let mut unknown = AutoLabelProgress::new(0);
        unknown.reported = Some(40.0);
        assert_eq!(unknown.percent(), 40.0);
        unknown.complete = true;
        assert_eq!(unknown.percent(), 100.0);
    }

    #[test]
    fn test_apply_event_writes_store() {
        let mut store = AnnotationStore::new();
        let mut progress = AutoLabelProgress::new(2);

        let update = apply_event(&mut store, &mut progress, AutoLabelEvent::success("a.png", Point::new(3.0, 4.0)));
        assert_eq!(
            update,
            AutoLabelUpdate::Labeled {
                image: ImageId::new("a.png"),
                point: Point::new(3.0, 4.0)
            }
        );
        assert_eq!(progress.percent(), 50.0);
        let entry = store.get(&ImageId::new("a.png")).unwrap();
        assert_eq!(entry.point, Some(Point::new(3.0, 4.0)));
        assert!(entry.is_dirty());
    }

    #[test]
    fn test_success_without_coordinates_still_counts() {
        let mut store = AnnotationStore::new();
        let mut progress = AutoLabelProgress::new(2);
        let mut event = AutoLabelEvent::success("a.png", Point::ZERO);
        event.coordinates = Some(LabeledCoordinate {
            image_name: "a.png".to_string(),
            x: None,
            y: Some(1.0),
        });
        assert_eq!(apply_event(&mut store, &mut progress, event), AutoLabelUpdate::Skipped);
        assert_eq!(progress.processed, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_error_events_do_not_advance_progress() {
        let mut store = AnnotationStore::new();
        let mut progress = AutoLabelProgress::new(2);
        let update = apply_event(&mut store, &mut progress, AutoLabelEvent::error("bad image"));
        assert!(matches!(update, AutoLabelUpdate::Failed { message: Some(_) }));
        assert_eq!(progress.processed, 0);
        assert_eq!(progress.errors, 1);
    }

    #[test]
    fn test_session_runs_to_completion() {
        let store = SharedAnnotationStore::default();
        let channel = MemoryAutoLabelChannel::new([
            AutoLabelEvent::success("a.png", Point::new(1.0, 1.0)),
            AutoLabelEvent::error("b.png failed"),
            AutoLabelEvent::success("c.png", Point::new(2.0, 2.0)),
            AutoLabelEvent::complete(),
        ]);
        let sent = channel.sent_log();
        let request = AutoLabelRequest::ProcessImages {
            folder_path: "f".to_string(),
        };

        let mut session = AutoLabelSession::start(Box::new(channel), request.clone(), 3, store.clone()).unwrap();
        let updates = drain(&mut session);

        assert!(session.is_finished());
        assert!(updates.contains(&AutoLabelUpdate::Complete));
        assert_eq!(updates.last(), Some(&AutoLabelUpdate::Closed { error: None }));
        let progress = session.progress();
        assert_eq!((progress.processed, progress.errors), (2, 1));
        assert!(progress.complete);
        assert_eq!(store.read().len(), 2);
        assert_eq!(sent.lock().unwrap().as_slice(), &[request]);
    }

    #[test]
    fn test_cancel_stops_store_writes() {
        let store = SharedAnnotationStore::default();
        let (channel, feed) = MemoryAutoLabelChannel::live();
        let request = AutoLabelRequest::ProcessImages {
            folder_path: "f".to_string(),
        };
        let mut session = AutoLabelSession::start(Box::new(channel), request, 2, store.clone()).unwrap();

        feed.send(AutoLabelEvent::success("a.png", Point::new(1.0, 1.0))).unwrap();
        for _ in 0..5000 {
            if store.snapshot(&ImageId::new("a.png")).is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(store.snapshot(&ImageId::new("a.png")).is_some());

        // The reader is blocked on the stream; the next event must be dropped
        session.cancel();
        let _ = feed.send(AutoLabelEvent::success("b.png", Point::new(2.0, 2.0)));
        let updates = drain(&mut session);

        assert!(session.is_finished());
        assert!(store.snapshot(&ImageId::new("b.png")).is_none());
        assert_eq!(session.progress().processed, 1);
        assert_eq!(updates.last(), Some(&AutoLabelUpdate::Closed { error: None }));
    }

    #[test]
    fn test_send_failure_closes_session() {
        struct Broken;
        impl AutoLabelChannel for Broken {
            fn send(&mut self, _: &AutoLabelRequest) -> BackendResult<()> {
                Err(BackendError::transport("refused"))
            }
            fn recv(&mut self) -> BackendResult<Option<AutoLabelEvent>> {
                Ok(None)
            }
            fn close(&mut self) {}
        }

        let request = AutoLabelRequest::ProcessImages {
            folder_path: "f".to_string(),
        };
        let mut session =
            AutoLabelSession::start(Box::new(Broken), request, 1, SharedAnnotationStore::default()).unwrap();
        let updates = drain(&mut session);
        assert!(matches!(
            updates.as_slice(),
            [AutoLabelUpdate::Closed { error: Some(_) }]
        ));
    }
}
