use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    raised_at: Instant,
}

impl Notification {
    /// Fraction of the lifetime already used, for the progress gauge.
    pub fn elapsed_ratio(&self, now: Instant, ttl: Duration) -> f64 {
        if ttl.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.raised_at);
        (elapsed.as_secs_f64() / ttl.as_secs_f64()).min(1.0)
    }
}

/// Auto-expiring failure toasts. Newest last.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    items: VecDeque<Notification>,
    ttl: Duration,
    max_visible: usize,
}

impl NotificationCenter {
    pub fn new(ttl: Duration, max_visible: usize) -> Self {
        Self {
            items: VecDeque::new(),
            ttl,
            max_visible: max_visible.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.push(message.into(), Instant::now());
    }

    fn push(&mut self, message: String, raised_at: Instant) {
        self.items.push_back(Notification {
            message,
            raised_at,
        });
        while self.items.len() > self.max_visible {
            self.items.pop_front();
        }
    }

    /// Drops every toast older than the ttl. Returns how many expired.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.items.len();
        let ttl = self.ttl;
        self.items
            .retain(|item| now.saturating_duration_since(item.raised_at) < ttl);
        before - self.items.len()
    }

    pub fn dismiss_latest(&mut self) -> Option<Notification> {
        self.items.pop_back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Notification> + '_ {
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

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::from_millis(5_000), 3)
    }
}
