//! Watcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SettingsError;

/// Tunables for the outcome watcher.
///
/// Every field has a default, so an empty TOML document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Wait before reporting completion so in-flight state saves can land.
    pub settle_delay_ms: u64,
    /// Wait before a forced branch seeks, so the learner sees the result.
    pub branch_delay_ms: u64,
    /// Cadence of `IntervalFrames`.
    pub frame_interval_ms: u64,
    /// Dispatcher event carrying outcome statements.
    pub event_name: String,
    /// Sanitize rendered branch text.
    pub sanitize_text: bool,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1_500,
            branch_delay_ms: 1_000,
            frame_interval_ms: 16,
            event_name: "xAPI".to_string(),
            sanitize_text: true,
        }
    }
}

impl WatcherSettings {
    /// Parse and validate settings from TOML.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the document is invalid TOML or fails validation.
    pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(input)?;
        settings.validate()
    }

    /// # Errors
    ///
    /// Returns `SettingsError` if the event name is blank or the frame interval is zero.
    pub fn validate(self) -> Result<Self, SettingsError> {
        if self.event_name.trim().is_empty() {
            return Err(SettingsError::EmptyEventName);
        }
        if self.frame_interval_ms == 0 {
            return Err(SettingsError::InvalidFrameInterval);
        }
        Ok(self)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn branch_delay(&self) -> Duration {
        Duration::from_millis(self.branch_delay_ms)
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
