//! Settings change events.
//!
//! Changes are pushed to subscribers instead of polled, so the scheduler can
//! re-run admission the moment the concurrency limit moves.

use tokio::sync::broadcast;

use super::settings::Settings;

/// Events broadcast when settings change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsEvent {
    /// The whole snapshot was replaced.
    Updated(Settings),
}

impl SettingsEvent {
    /// Get a description of the event for logging.
    pub fn description(&self) -> String {
        match self {
            Self::Updated(settings) => format!(
                "Settings updated (concurrent_downloads={})",
                settings.concurrent_downloads
            ),
        }
    }
}

/// Default channel capacity for settings events.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Broadcaster for settings events.
#[derive(Clone)]
pub struct SettingsEventBroadcaster {
    sender: broadcast::Sender<SettingsEvent>,
}

impl SettingsEventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    ///
    /// Returns the number of receivers that received it (0 without subscribers).
    pub fn publish(&self, event: SettingsEvent) -> usize {
        tracing::debug!("Publishing settings event: {}", event.description());
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SettingsEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let broadcaster = SettingsEventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        let settings = Settings::default().with_concurrent_downloads(7);
        assert_eq!(broadcaster.publish(SettingsEvent::Updated(settings.clone())), 1);

        let SettingsEvent::Updated(received) = rx.recv().await.unwrap();
        assert_eq!(received, settings);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = SettingsEventBroadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(
            broadcaster.publish(SettingsEvent::Updated(Settings::default())),
            0
        );
    }
}
