use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Bounded memory of recently dispatched event keys.
///
/// Slack delivers events at least once and retries slow acknowledgements,
/// so the same `event_id` can arrive more than once.
pub struct RecentEvents {
    capacity: usize,
    inner: Mutex<Seen>,
}

#[derive(Default)]
struct Seen {
    keys: HashSet<String>,
    order: VecDeque<String>,
}

impl RecentEvents {
    /// A capacity of zero disables de-duplication.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Seen::default()),
        }
    }

    /// Record `key`, returning `false` if it is still among the most recent
    /// `capacity` keys.
    pub fn first_delivery(&self, key: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }

        let mut seen = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if seen.keys.contains(key) {
            return false;
        }

        if seen.order.len() >= self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.keys.remove(&oldest);
            }
        }
        seen.keys.insert(key.to_string());
        seen.order.push_back(key.to_string());
        true
    }
}
