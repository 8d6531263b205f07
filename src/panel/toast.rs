use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sink for user-facing outcome messages.
pub trait Notifier {
    fn error(&mut self, message: &str);
    fn success(&mut self, message: &str, title: Option<&str>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    pub raised_at: Instant,
}

/// Bounded queue of transient notifications. Oldest entries fall off first.
#[derive(Debug)]
pub struct Toasts {
    entries: VecDeque<Toast>,
    capacity: usize,
    ttl: Duration,
}

impl Toasts {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.entries.back()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.entries.iter()
    }

    /// Drop toasts older than the configured lifetime.
    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|toast| now.saturating_duration_since(toast.raised_at) < ttl);
    }

    fn push(&mut self, level: ToastLevel, title: &str, message: &str) {
        self.entries.push_back(Toast {
            level,
            title: title.to_string(),
            message: message.to_string(),
            raised_at: Instant::now(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

impl Notifier for Toasts {
    fn error(&mut self, message: &str) {
        self.push(ToastLevel::Error, "Error", message);
    }

    fn success(&mut self, message: &str, title: Option<&str>) {
        self.push(ToastLevel::Success, title.unwrap_or("Success"), message);
    }
}
