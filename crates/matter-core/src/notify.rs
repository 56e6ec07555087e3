//! User-facing notifications
//!
//! Notifications are best-effort and fire-and-forget; a notifier must never
//! fail the operation that raised it.

use std::sync::{Arc, Mutex};

use tracing::info;

/// Sink for user-visible messages
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Sends notifications to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(target: "matter_core::notify", "{}", message);
    }
}

/// Keeps every notification, for tests and for hosts that batch messages
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages received so far
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}
