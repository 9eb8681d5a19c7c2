//! User-facing notification boundary.
//!
//! The core fires success/error toasts and forgets about them; what
//! renders them is someone else's problem. Production wiring logs via
//! `tracing`, tests collect into a buffer.

use std::sync::Mutex;

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default sink: structured log lines.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(target: "plugsmith::toast", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::warn!(target: "plugsmith::toast", "{}", message);
    }
}

/// Test sink that records everything it is told.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<(bool, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of (is_success, message) pairs in arrival order.
    pub fn entries(&self) -> Vec<(bool, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(ok, _)| !ok)
            .map(|(_, msg)| msg)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.entries.lock().unwrap().push((true, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.entries.lock().unwrap().push((false, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_preserves_order() {
        let notifier = RecordingNotifier::new();
        notifier.success("generated");
        notifier.error("download failed");
        notifier.success("synced");

        let entries = notifier.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (true, "generated".to_string()));
        assert_eq!(entries[1], (false, "download failed".to_string()));
        assert_eq!(entries[2], (true, "synced".to_string()));
    }

    #[test]
    fn test_recording_notifier_filters_errors() {
        let notifier = RecordingNotifier::new();
        notifier.success("ok");
        notifier.error("boom");
        assert_eq!(notifier.errors(), vec!["boom".to_string()]);
    }
}
