//! Bounded message-id dedup set.
//!
//! Tracks `(message_id -> first-seen instant)` explicitly rather than trying
//! to recover a timestamp from the id itself — message ids are opaque random
//! values with no embedded time, so any such recovery would never match and
//! the set would grow without bound. Two independent bounds apply: entries
//! older than the retention window are dropped, and the set is additionally
//! capped at a fixed size, evicting the oldest first-seen entries first.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct DedupSet {
    retention: Duration,
    max_entries: usize,
    inner: Mutex<HashMap<String, Instant>>,
}

impl DedupSet {
    pub fn new(retention: Duration, max_entries: usize) -> Self {
        Self {
            retention,
            max_entries,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Records `id` as seen if it isn't already present. Returns `true` when
    /// this is the first observation (the caller should process the
    /// message), `false` when it's a duplicate (the caller should discard).
    pub fn check_and_insert(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("dedup set mutex poisoned");
        if inner.contains_key(id) {
            false
        } else {
            inner.insert(id.to_string(), Instant::now());
            true
        }
    }

    /// Drops entries older than the retention window, then enforces the
    /// size cap by evicting the oldest first-seen entries if needed.
    pub fn gc(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("dedup set mutex poisoned");
        inner.retain(|_, seen| now.duration_since(*seen) <= self.retention);

        if inner.len() > self.max_entries {
            let mut by_age: Vec<(String, Instant)> = inner.drain().collect();
            by_age.sort_by_key(|(_, seen)| *seen);
            let drop_count = by_age.len() - self.max_entries;
            for (id, seen) in by_age.into_iter().skip(drop_count) {
                inner.insert(id, seen);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("dedup set mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
