//! Outcome watcher: one background task per attached session.
//!
//! Each task waits for the widget to become ready, subscribes to its statement stream,
//! and turns accepted outcomes into completion reports and branch navigation.

mod handle;
mod task;

pub use handle::{WatchHandle, WatchState, WatchStatus};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, instrument};

use storage::repository::StateStore;
use watch_core::Clock;
use watch_core::model::{Session, SessionId};

use crate::completion::CompletionSink;
use crate::frames::{FrameScheduler, IntervalFrames};
use crate::host::{HostPlayer, SessionSurface};
use crate::render::{RichTextRenderer, SanitizingRenderer};
use crate::settings::WatcherSettings;
use crate::widget::WidgetRuntime;

use task::{WatchContext, WatchTask};

struct Attachment {
    token: CancellationToken,
    status: watch::Receiver<WatchStatus>,
}

/// Registry of running watchers, keyed by session.
///
/// At most one watcher runs per session; attaching again replaces the previous one.
pub struct OutcomeWatcher {
    ctx: WatchContext,
    attachments: Mutex<HashMap<SessionId, Attachment>>,
}

impl OutcomeWatcher {
    /// Watcher with the local renderer and interval frames derived from `settings`.
    #[must_use]
    pub fn new(
        host: Arc<dyn HostPlayer>,
        surface: Arc<dyn SessionSurface>,
        sink: Arc<dyn CompletionSink>,
        store: Arc<dyn StateStore>,
        settings: WatcherSettings,
    ) -> Self {
        let ctx = WatchContext {
            host,
            surface,
            renderer: Arc::new(SanitizingRenderer::new(settings.sanitize_text)),
            sink,
            store,
            frames: Arc::new(IntervalFrames::new(settings.frame_interval())),
            clock: Clock::default(),
            settings,
        };
        Self {
            ctx,
            attachments: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn RichTextRenderer>) -> Self {
        self.ctx.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_frames(mut self, frames: Arc<dyn FrameScheduler>) -> Self {
        self.ctx.frames = frames;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.ctx.clock = clock;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &WatcherSettings {
        &self.ctx.settings
    }

    /// Start watching `session` on `widget`.
    ///
    /// A watcher already attached to the same session is cancelled first, and this call
    /// waits until its listener is gone. Concurrent attaches for one session leave exactly
    /// one watcher running.
    #[instrument(skip_all, fields(session_id = %session.session_id()))]
    pub async fn attach(&self, session: Session, widget: Arc<dyn WidgetRuntime>) -> WatchHandle {
        let session_id = session.session_id();
        loop {
            // The empty-slot check and the insert share one lock.
            let previous = {
                let mut attachments = self.lock();
                prune(&mut attachments);
                match attachments.remove(&session_id) {
                    Some(previous) => previous,
                    None => {
                        let (attachment, handle) = self.spawn(session, widget);
                        attachments.insert(session_id, attachment);
                        return handle;
                    }
                }
            };
            debug!("replacing attached watcher");
            detach_attachment(previous).await;
        }
    }

    fn spawn(&self, session: Session, widget: Arc<dyn WidgetRuntime>) -> (Attachment, WatchHandle) {
        let session_id = session.session_id();
        let token = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(WatchStatus::idle());

        let task = WatchTask::new(
            self.ctx.clone(),
            session,
            widget,
            token.clone(),
            command_rx,
            status_tx,
        );
        let span = info_span!("outcome_watcher", %session_id);
        tokio::spawn(task.run().instrument(span));

        let attachment = Attachment {
            token: token.clone(),
            status: status_rx.clone(),
        };
        (attachment, WatchHandle::new(session_id, token, command_tx, status_rx))
    }

    /// Cancel the watcher for `session_id`, without saving, and wait for it to end.
    ///
    /// Returns the final state, or `None` if nothing was attached.
    #[instrument(skip(self))]
    pub async fn detach(&self, session_id: SessionId) -> Option<WatchState> {
        let attachment = self.remove(session_id)?;
        Some(detach_attachment(attachment).await)
    }

    #[must_use]
    pub fn is_attached(&self, session_id: SessionId) -> bool {
        let mut attachments = self.lock();
        prune(&mut attachments);
        attachments.contains_key(&session_id)
    }

    /// Sessions with a running watcher, in ascending id order.
    #[must_use]
    pub fn attached_sessions(&self) -> Vec<SessionId> {
        let mut attachments = self.lock();
        prune(&mut attachments);
        let mut sessions: Vec<_> = attachments.keys().copied().collect();
        sessions.sort_unstable();
        sessions
    }

    fn remove(&self, session_id: SessionId) -> Option<Attachment> {
        let mut attachments = self.lock();
        prune(&mut attachments);
        attachments.remove(&session_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Attachment>> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop entries whose task has already ended.
fn prune(attachments: &mut HashMap<SessionId, Attachment>) {
    attachments.retain(|_, a| !a.status.borrow().detached);
}

async fn detach_attachment(attachment: Attachment) -> WatchState {
    attachment.token.cancel();
    let mut status = attachment.status;
    // An error means the task already ended.
    let _ = status.wait_for(|s| s.detached).await;
    status.borrow().state
}
