//! Console notifications

use matter_core::Notifier;
use tracing::info;

/// Prints notifications to stderr so they never mix with command output
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    quiet: bool,
}

impl ConsoleNotifier {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        info!("Notification: {}", message);
        if !self.quiet {
            eprintln!("Matter: {}", message);
        }
    }
}
