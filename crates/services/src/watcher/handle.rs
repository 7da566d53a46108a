use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use watch_core::model::{CompletionResult, SessionId};

use crate::surface::BranchDecision;

/// Lifecycle of one watched session.
///
/// `Idle → WaitingForWidgetReady → Subscribed → {Completed | Abandoned}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    WaitingForWidgetReady,
    Subscribed,
    /// Terminal; reached at most once.
    Completed,
    /// Torn down before completing.
    Abandoned,
}

/// Observable status published by a running watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchStatus {
    pub state: WatchState,
    pub completion: Option<CompletionResult>,
    /// The listener has been removed and the watcher task has ended.
    pub detached: bool,
}

impl WatchStatus {
    pub(crate) fn idle() -> Self {
        Self {
            state: WatchState::Idle,
            completion: None,
            detached: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchCommand {
    Refresh,
    Close,
    Choose(BranchDecision),
}

/// Owner of one watcher attachment.
///
/// Dropping the handle detaches the watcher without saving state.
#[derive(Debug)]
pub struct WatchHandle {
    session_id: SessionId,
    token: CancellationToken,
    commands: mpsc::UnboundedSender<WatchCommand>,
    status: watch::Receiver<WatchStatus>,
}

impl WatchHandle {
    pub(crate) fn new(
        session_id: SessionId,
        token: CancellationToken,
        commands: mpsc::UnboundedSender<WatchCommand>,
        status: watch::Receiver<WatchStatus>,
    ) -> Self {
        Self {
            session_id,
            token,
            commands,
            status,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn state(&self) -> WatchState {
        self.status.borrow().state
    }

    #[must_use]
    pub fn status(&self) -> WatchStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn completion(&self) -> Option<CompletionResult> {
        self.status.borrow().completion.clone()
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.status.borrow().detached
    }

    /// Stop polling or remove the listener. No state is saved.
    ///
    /// Delayed completion or branch actions already scheduled may still run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Ask the watcher to persist the widget's current state.
    ///
    /// Returns false if the watcher has already ended.
    pub fn refresh(&self) -> bool {
        self.commands.send(WatchCommand::Refresh).is_ok()
    }

    /// Answer the pending branch choice.
    ///
    /// Returns false if the watcher has already ended.
    pub fn choose(&self, decision: BranchDecision) -> bool {
        self.commands.send(WatchCommand::Choose(decision)).is_ok()
    }

    /// Persist state if required, detach, and wait for the watcher to end.
    pub async fn close(&self) -> WatchState {
        // A send error only means the task is already gone.
        let _ = self.commands.send(WatchCommand::Close);
        self.detached().await
    }

    /// Wait until the watcher task has ended.
    pub async fn detached(&self) -> WatchState {
        let mut rx = self.status.clone();
        let _ = rx.wait_for(|s| s.detached).await;
        self.state()
    }

    /// Wait until the state satisfies `pred`, or the watcher ends.
    pub async fn wait_for_state(&self, mut pred: impl FnMut(WatchState) -> bool) -> WatchState {
        let mut rx = self.status.clone();
        match rx.wait_for(|s| pred(s.state) || s.detached).await {
            Ok(status) => status.state,
            Err(_) => self.state(),
        }
    }
}
