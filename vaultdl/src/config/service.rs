//! Settings service.
//!
//! Holds the current settings snapshot and broadcasts changes.

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::events::{SettingsEvent, SettingsEventBroadcaster};
use super::settings::Settings;
use crate::Result;

/// Source of settings snapshots and change notifications.
pub trait SettingsSource: Send + Sync {
    /// Current settings, read synchronously.
    fn snapshot(&self) -> Settings;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<SettingsEvent>;
}

/// In-memory settings service.
pub struct SettingsService {
    current: RwLock<Settings>,
    broadcaster: SettingsEventBroadcaster,
}

impl SettingsService {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(settings),
            broadcaster: SettingsEventBroadcaster::new(),
        }
    }

    /// Replace the snapshot and notify subscribers.
    pub fn update(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        *self.current.write() = settings.clone();
        self.broadcaster.publish(SettingsEvent::Updated(settings));
        tracing::info!("Settings updated");
        Ok(())
    }

    /// Apply an in-place modification and notify subscribers.
    pub fn modify(&self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut next = self.snapshot();
        f(&mut next);
        self.update(next)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsSource for SettingsService {
    fn snapshot(&self) -> Settings {
        self.current.read().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.broadcaster.subscribe()
    }
}
