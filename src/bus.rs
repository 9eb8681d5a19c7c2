//! Invalidation event bus.
//!
//! A process-wide, typed publish/subscribe channel through which
//! unrelated long-running operations announce that a workspace's
//! backend state changed. Delivery is in publication order and there is
//! no replay: subscribers that join after an event was published never
//! see it. The core's listener (see `sync`) filters events down to the
//! currently active workspace and debounces reloads.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::WorkspaceKey;

/// Buffer depth per subscriber. Invalidation traffic is a handful of
/// events per user action, so lagging receivers indicate a stuck task.
const CHANNEL_CAPACITY: usize = 64;

/// The fixed set of operations that can invalidate a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationTopic {
    GenerationCompleted,
    ChatTurnCompleted,
    FilesSynced,
    PluginFilesUpdated,
}

impl InvalidationTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerationCompleted => "generation_completed",
            Self::ChatTurnCompleted => "chat_turn_completed",
            Self::FilesSynced => "files_synced",
            Self::PluginFilesUpdated => "plugin_files_updated",
        }
    }

    /// All topics the load coordinator listens for.
    pub fn all() -> &'static [InvalidationTopic] {
        &[
            Self::GenerationCompleted,
            Self::ChatTurnCompleted,
            Self::FilesSynced,
            Self::PluginFilesUpdated,
        ]
    }
}

impl std::fmt::Display for InvalidationTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationTopic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generation_completed" => Ok(Self::GenerationCompleted),
            "chat_turn_completed" => Ok(Self::ChatTurnCompleted),
            "files_synced" => Ok(Self::FilesSynced),
            "plugin_files_updated" => Ok(Self::PluginFilesUpdated),
            _ => Err(format!("Invalid invalidation topic: {}", s)),
        }
    }
}

/// One invalidation announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub topic: InvalidationTopic,
    pub key: WorkspaceKey,
    /// Failed operations still publish (uniform completion signal);
    /// subscribers ignore them.
    pub success: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

impl InvalidationEvent {
    pub fn succeeded(topic: InvalidationTopic, key: WorkspaceKey) -> Self {
        Self {
            topic,
            key,
            success: true,
            detail: None,
        }
    }

    pub fn failed(topic: InvalidationTopic, key: WorkspaceKey, detail: impl Into<String>) -> Self {
        Self {
            topic,
            key,
            success: false,
            detail: Some(detail.into()),
        }
    }
}

/// The bus itself: a thin wrapper over a broadcast channel so payloads
/// stay typed and subscribers are enumerable in tests.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<InvalidationEvent>,
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to all current subscribers. An event with no subscribers
    /// is dropped silently; that is fine, invalidation is advisory.
    pub fn publish(&self, event: InvalidationEvent) {
        let receivers = self.tx.receiver_count();
        tracing::debug!(
            topic = %event.topic,
            workspace = %event.key,
            success = event.success,
            receivers,
            "publishing invalidation event"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_roundtrip() {
        for s in &[
            "generation_completed",
            "chat_turn_completed",
            "files_synced",
            "plugin_files_updated",
        ] {
            let parsed: InvalidationTopic = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("invalid".parse::<InvalidationTopic>().is_err());
    }

    #[test]
    fn test_all_topics_are_enumerated() {
        assert_eq!(InvalidationTopic::all().len(), 4);
    }

    #[test]
    fn test_event_serde_uses_snake_case() {
        let event = InvalidationEvent::succeeded(
            InvalidationTopic::GenerationCompleted,
            WorkspaceKey::new("user1", "demo"),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""topic":"generation_completed""#));
        assert!(json.contains(r#""success":true"#));
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_publication_order() {
        let bus = InvalidationBus::new();
        let mut rx = bus.subscribe();

        let key = WorkspaceKey::new("user1", "demo");
        bus.publish(InvalidationEvent::succeeded(
            InvalidationTopic::GenerationCompleted,
            key.clone(),
        ));
        bus.publish(InvalidationEvent::succeeded(
            InvalidationTopic::FilesSynced,
            key.clone(),
        ));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.topic, InvalidationTopic::GenerationCompleted);
        assert_eq!(second.topic, InvalidationTopic::FilesSynced);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = InvalidationBus::new();
        bus.publish(InvalidationEvent::succeeded(
            InvalidationTopic::FilesSynced,
            WorkspaceKey::new("user1", "demo"),
        ));

        let mut rx = bus.subscribe();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let bus = InvalidationBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(InvalidationEvent::failed(
            InvalidationTopic::PluginFilesUpdated,
            WorkspaceKey::new("user1", "demo"),
            "compile failed",
        ));
    }
}
