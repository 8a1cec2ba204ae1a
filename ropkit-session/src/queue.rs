//! FIFO queue of pending change notifications.

use parking_lot::Mutex;
use ropkit_protocol::rop::NotifyResponse;
use std::collections::VecDeque;
use std::time::Instant;

/// A queued notification awaiting buffer capacity.
#[derive(Debug, Clone)]
struct QueuedEntry {
    seq: u64,
    notify: NotifyResponse,
    enqueued_at: Instant,
}

/// Outcome of draining the queue into a response buffer.
#[derive(Debug, Clone)]
pub struct DrainOutcome {
    /// Notifications removed from the queue, oldest first.
    pub flushed: Vec<NotifyResponse>,
    /// Entries still queued after the drain.
    pub remaining: usize,
}

/// FIFO notification queue.
///
/// `enqueue` may be called by an external event source concurrently with
/// `drain`; one lock guards both.
#[derive(Debug)]
pub struct NotificationQueue {
    inner: Mutex<QueueInner>,
    /// Maximum queued entries; 0 means unbounded.
    max_depth: usize,
}

#[derive(Debug, Default)]
struct QueueInner {
    entries: VecDeque<QueuedEntry>,
    next_seq: u64,
}

impl NotificationQueue {
    pub fn new(max_depth: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            max_depth,
        }
    }

    /// Appends a notification. Returns false if the queue is full and the
    /// notification was dropped.
    pub fn enqueue(&self, notify: NotifyResponse) -> bool {
        let mut inner = self.inner.lock();
        if self.max_depth != 0 && inner.entries.len() >= self.max_depth {
            tracing::warn!(
                depth = inner.entries.len(),
                "notification queue full, dropping event"
            );
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push_back(QueuedEntry {
            seq,
            notify,
            enqueued_at: Instant::now(),
        });
        true
    }

    /// Removes and returns entries, oldest first, while each entry's
    /// encoded size fits within `capacity` bytes. Leftovers stay queued
    /// for the next call.
    pub fn drain(&self, mut capacity: usize) -> DrainOutcome {
        let mut inner = self.inner.lock();
        let mut flushed = Vec::new();

        while let Some(front) = inner.entries.front() {
            if NotifyResponse::ENCODED_LEN > capacity {
                break;
            }
            capacity -= NotifyResponse::ENCODED_LEN;
            tracing::trace!(
                seq = front.seq,
                age_ms = front.enqueued_at.elapsed().as_millis() as u64,
                "flushing queued notification"
            );
            // Front is present; the pop cannot fail.
            if let Some(entry) = inner.entries.pop_front() {
                flushed.push(entry.notify);
            }
        }

        DrainOutcome {
            flushed,
            remaining: inner.entries.len(),
        }
    }

    /// Returns the number of queued entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards all queued entries.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}
