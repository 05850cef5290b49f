//! In-memory per-user notification queues.
//!
//! The [`NotificationStore`] holds a FIFO queue of pending notifications for
//! every user. Clients poll it through `login` and `check-inbox`, which read
//! and then clear the queue so each notification is delivered at most once.

use std::collections::{HashMap, VecDeque};

use chatty_proto::dto::Notification;
use parking_lot::RwLock;

/// Default maximum number of queued notifications per user before FIFO eviction.
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 1000;

/// Per-user notification queues with FIFO eviction.
///
/// Thread-safe via [`RwLock`]. Each user has an independent queue capped at
/// a configurable maximum; when the cap is exceeded the oldest notification
/// is dropped.
pub struct NotificationStore {
    queues: RwLock<HashMap<String, VecDeque<Notification>>>,
    max_queue_size: usize,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    /// Creates an empty store with the default queue size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_queue_size(DEFAULT_MAX_NOTIFICATIONS)
    }

    /// Creates an empty store with a custom queue size limit.
    #[must_use]
    pub fn with_max_queue_size(max_queue_size: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            max_queue_size,
        }
    }

    /// Queues a notification for `username`, returning the new queue length.
    pub fn enqueue(&self, username: &str, notification: Notification) -> usize {
        let mut queues = self.queues.write();
        let queue = queues.entry(username.to_string()).or_default();
        queue.push_back(notification);
        while queue.len() > self.max_queue_size {
            queue.pop_front();
        }
        queue.len()
    }

    /// Copies the pending notifications for `username` without removing them.
    pub fn pending(&self, username: &str) -> Vec<Notification> {
        self.queues
            .read()
            .get(username)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes and returns all pending notifications for `username`, oldest first.
    pub fn drain(&self, username: &str) -> Vec<Notification> {
        self.queues
            .write()
            .remove(username)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of notifications pending for `username`.
    pub fn queue_len(&self, username: &str) -> usize {
        self.queues.read().get(username).map_or(0, VecDeque::len)
    }
}
