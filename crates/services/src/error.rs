//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use watch_core::model::SessionConfigError;

/// Errors reported by a widget runtime while it is being probed or read.
///
/// During readiness polling these mean "not ready yet".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WidgetError {
    #[error("widget document is not accessible: {0}")]
    AccessDenied(String),
    #[error("widget runtime is not initialized")]
    NotInitialized,
    #[error("widget state is unreadable: {0}")]
    State(String),
}

/// Errors emitted by rich-text renderers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted by completion sinks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("completion was rejected: {0}")]
    Rejected(String),
    #[error("completion sink unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted while loading watcher settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("event name cannot be empty")]
    EmptyEventName,
    #[error("frame interval must be > 0")]
    InvalidFrameInterval,
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Errors emitted by `ResumeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResumeError {
    #[error("persisted state is malformed: {0}")]
    MalformedState(String),
    #[error(transparent)]
    Config(#[from] SessionConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
