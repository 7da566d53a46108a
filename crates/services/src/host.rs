//! Contracts for the host application around the widget.

use watch_core::model::{SessionId, UserId};

use crate::surface::ContentArea;

/// The video player hosting the interaction.
pub trait HostPlayer: Send + Sync {
    fn seek(&self, time_ms: u64);
    fn play(&self);
    fn close_interaction(&self, session: SessionId);
    fn is_edit_mode(&self) -> bool;
    fn current_user(&self) -> UserId;
}

/// The region of the page the watcher draws into.
///
/// The watcher hands over a complete snapshot on every change; implementations replace
/// what is on screen with it.
pub trait SessionSurface: Send + Sync {
    fn update(&self, session: SessionId, area: &ContentArea);

    /// Audible confirmation for authors in edit mode.
    fn play_chime(&self);
}
