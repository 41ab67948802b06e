//! Configuration module.
//!
//! Process configuration comes from the environment; download settings are a
//! live snapshot with change events.

pub mod app;
pub mod events;
pub mod service;
pub mod settings;

pub use app::{AppConfig, DEFAULT_STALL_TIMEOUT, LibraryPaths};
pub use events::{SettingsEvent, SettingsEventBroadcaster};
pub use service::{SettingsService, SettingsSource};
pub use settings::{DEFAULT_SUBTITLE_LANGS, Settings};
