//! Transient user-facing messages.

use std::collections::VecDeque;
use std::time::Duration;

use web_time::Instant;

use crate::constants::{MAX_NOTIFICATIONS, NOTIFICATION_DURATION_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    created: Instant,
}

impl Notification {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }
}

/// Queue of notifications that expire on their own.
#[derive(Debug, Clone)]
pub struct Notifications {
    items: VecDeque<Notification>,
    lifetime: Duration,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(Duration::from_millis(NOTIFICATION_DURATION_MS))
    }
}

impl Notifications {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            lifetime,
        }
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.push_at(severity, message, Instant::now());
    }

    fn push_at(&mut self, severity: Severity, message: impl Into<String>, now: Instant) {
        let message = message.into();
        log::debug!("Notification ({:?}): {}", severity, message);
        self.items.push_back(Notification {
            severity,
            message,
            created: now,
        });
        while self.items.len() > MAX_NOTIFICATIONS {
            self.items.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Severity::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Drop expired notifications.
    pub fn prune(&mut self) {
        self.prune_at(Instant::now());
    }

    fn prune_at(&mut self, now: Instant) {
        let lifetime = self.lifetime;
        self.items.retain(|n| n.age(now) < lifetime);
    }

    /// Notifications still visible, oldest first.
    pub fn active(&self) -> impl Iterator<Item = &Notification> {
        let now = Instant::now();
        self.items.iter().filter(move |n| n.age(now) < self.lifetime)
    }

    /// Everything queued, expired or not.
    pub fn all(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
