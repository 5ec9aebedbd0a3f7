//! Per-connection record of sent notifications.
//!
//! APNs acknowledges nothing on success: when an error response arrives it
//! names the last notification that was received, and everything written
//! after it is silently lost. Each connection therefore keeps the
//! notifications it wrote, in insertion order, so the sender can look up
//! the failed one and retransmit the tail on a fresh connection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::notification::Notification;

/// Insertion-ordered record of sent notifications, keyed by identifier.
///
/// Entries expire from the front only: insertion times are monotonic, so
/// the front entry is always the oldest.
#[derive(Debug)]
pub(crate) struct ReplayBuffer {
    entries: VecDeque<Entry>,
    index: HashMap<u32, u64>,
    next_seq: u64,
    window: Duration,
}

#[derive(Debug)]
struct Entry {
    notification: Arc<Notification>,
    added_at: Instant,
    seq: u64,
}

impl ReplayBuffer {
    /// Create an empty buffer whose entries expire after `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            index: HashMap::new(),
            next_seq: 0,
            window,
        }
    }

    /// Append a sent notification, timestamped now.
    pub fn add(&mut self, notification: Arc<Notification>) {
        self.add_at(notification, Instant::now());
    }

    /// Append a sent notification with an explicit timestamp.
    pub fn add_at(&mut self, notification: Arc<Notification>, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.index.insert(notification.identifier().unwrap_or(0), seq);
        self.entries.push_back(Entry {
            notification,
            added_at: now,
            seq,
        });
    }

    /// Look up a sent notification by identifier.
    pub fn get(&self, identifier: u32) -> Option<Arc<Notification>> {
        let seq = *self.index.get(&identifier)?;
        let front_seq = self.entries.front()?.seq;
        self.entries
            .get((seq - front_seq) as usize)
            .map(|e| Arc::clone(&e.notification))
    }

    /// Get all notifications strictly after the one with `identifier`, in
    /// insertion order.
    ///
    /// If the identifier is unknown, every notification is returned: the
    /// caller cannot prove that any of them arrived.
    pub fn get_all_after(&self, identifier: u32) -> Vec<Arc<Notification>> {
        match self.index.get(&identifier) {
            Some(&seq) => self
                .entries
                .iter()
                .filter(|e| e.seq > seq)
                .map(|e| Arc::clone(&e.notification))
                .collect(),
            None => self.get_all(),
        }
    }

    /// Get all notifications in insertion order.
    pub fn get_all(&self) -> Vec<Arc<Notification>> {
        self.entries
            .iter()
            .map(|e| Arc::clone(&e.notification))
            .collect()
    }

    /// Drop front entries older than the expiry window.
    pub fn expire(&mut self) {
        self.expire_at(Instant::now());
    }

    /// Drop front entries older than the expiry window at a given time.
    ///
    /// Stops at the first entry that has not expired.
    pub fn expire_at(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.added_at) <= self.window {
                break;
            }
            let identifier = front.notification.identifier().unwrap_or(0);
            self.index.remove(&identifier);
            self.entries.pop_front();
        }
    }

    /// Number of buffered notifications.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notif(identifier: u32) -> Arc<Notification> {
        let mut n = Notification::new();
        n.set_identifier(identifier);
        Arc::new(n)
    }

    fn identifiers(notifications: &[Arc<Notification>]) -> Vec<u32> {
        notifications
            .iter()
            .map(|n| n.identifier().unwrap())
            .collect()
    }

    #[test]
    fn test_add_and_get() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));

        buffer.add(notif(3));
        buffer.add(notif(7));

        assert_eq!(buffer.get(3).unwrap().identifier(), Some(3));
        assert_eq!(buffer.get(7).unwrap().identifier(), Some(7));
        assert!(buffer.get(42).is_none());
    }

    #[test]
    fn test_get_all_preserves_insertion_order() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));

        for id in [5, 1, 9, 2] {
            buffer.add(notif(id));
        }

        assert_eq!(identifiers(&buffer.get_all()), vec![5, 1, 9, 2]);
    }

    #[test]
    fn test_get_all_after() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));

        for id in 0..6 {
            buffer.add(notif(id));
        }

        assert_eq!(identifiers(&buffer.get_all_after(1)), vec![2, 3, 4, 5]);
        assert_eq!(identifiers(&buffer.get_all_after(5)), Vec::<u32>::new());
    }

    #[test]
    fn test_get_all_after_unknown_returns_everything() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));

        for id in 0..3 {
            buffer.add(notif(id));
        }

        assert_eq!(identifiers(&buffer.get_all_after(99)), vec![0, 1, 2]);
    }

    #[test]
    fn test_expire_drops_old_front_entries() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));
        let start = Instant::now();

        buffer.add_at(notif(0), start);
        buffer.add_at(notif(1), start + Duration::from_secs(30));
        buffer.add_at(notif(2), start + Duration::from_secs(60));

        buffer.expire_at(start + Duration::from_secs(65));

        assert_eq!(identifiers(&buffer.get_all()), vec![1, 2]);
        assert!(buffer.get(0).is_none());
        assert_eq!(buffer.get(1).unwrap().identifier(), Some(1));
    }

    #[test]
    fn test_expire_stops_at_first_fresh_entry() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));
        let start = Instant::now();

        buffer.add_at(notif(0), start);
        buffer.add_at(notif(1), start + Duration::from_secs(50));

        // Entry 0 is past the window, entry 1 is not.
        buffer.expire_at(start + Duration::from_secs(61));

        assert_eq!(buffer.len(), 1);
        assert_eq!(identifiers(&buffer.get_all()), vec![1]);
    }

    #[test]
    fn test_expire_keeps_entries_within_window() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));
        let start = Instant::now();

        buffer.add_at(notif(0), start);
        buffer.expire_at(start + Duration::from_secs(60));

        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_lookup_after_expiry_reindexes() {
        let mut buffer = ReplayBuffer::new(Duration::from_secs(60));
        let start = Instant::now();

        for id in 0..4 {
            buffer.add_at(notif(id), start + Duration::from_secs(id as u64 * 40));
        }
        buffer.expire_at(start + Duration::from_secs(110));

        // 0 and 1 expired (ages 110 and 70), 2 and 3 are 30 and 0 seconds old.
        assert_eq!(identifiers(&buffer.get_all()), vec![2, 3]);
        assert_eq!(buffer.get(2).unwrap().identifier(), Some(2));
        assert!(buffer.get(1).is_none());
        assert_eq!(identifiers(&buffer.get_all_after(2)), vec![3]);
    }
}
