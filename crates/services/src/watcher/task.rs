use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, trace, warn};

use storage::repository::StateStore;
use watch_core::Clock;
use watch_core::model::{
    BranchReaction, CompletionResult, Navigation, OutcomeEvent, Session, classify, plan_reaction,
};

use crate::completion::CompletionSink;
use crate::error::WidgetError;
use crate::frames::FrameScheduler;
use crate::host::{HostPlayer, SessionSurface};
use crate::render::RichTextRenderer;
use crate::settings::WatcherSettings;
use crate::surface::{BranchChoice, BranchDecision, ContentArea, Indicator};
use crate::widget::{ListenerId, ReadyWidget, WidgetRuntime, probe};

use super::handle::{WatchCommand, WatchState, WatchStatus};

/// Collaborators shared by every watcher a registry spawns.
#[derive(Clone)]
pub(crate) struct WatchContext {
    pub host: Arc<dyn HostPlayer>,
    pub surface: Arc<dyn SessionSurface>,
    pub renderer: Arc<dyn RichTextRenderer>,
    pub sink: Arc<dyn CompletionSink>,
    pub store: Arc<dyn StateStore>,
    pub frames: Arc<dyn FrameScheduler>,
    pub clock: Clock,
    pub settings: WatcherSettings,
}

struct Subscription {
    widget: ReadyWidget,
    listener: ListenerId,
    events: mpsc::UnboundedReceiver<Value>,
}

pub(crate) struct WatchTask {
    ctx: WatchContext,
    session: Session,
    widget: Arc<dyn WidgetRuntime>,
    token: CancellationToken,
    commands: mpsc::UnboundedReceiver<WatchCommand>,
    status: watch::Sender<WatchStatus>,
    area: ContentArea,
    history: Vec<OutcomeEvent>,
    completed: bool,
    edit_mode: bool,
    chimed: bool,
}

impl WatchTask {
    pub(crate) fn new(
        ctx: WatchContext,
        session: Session,
        widget: Arc<dyn WidgetRuntime>,
        token: CancellationToken,
        commands: mpsc::UnboundedReceiver<WatchCommand>,
        status: watch::Sender<WatchStatus>,
    ) -> Self {
        let completed = session.already_completed();
        Self {
            ctx,
            session,
            widget,
            token,
            commands,
            status,
            area: ContentArea::default(),
            history: Vec::new(),
            completed,
            edit_mode: false,
            chimed: false,
        }
    }

    pub(crate) async fn run(mut self) {
        self.set_state(WatchState::WaitingForWidgetReady);
        let Some(mut subscription) = self.wait_until_ready().await else {
            debug!("stopped before the widget became ready");
            self.finish();
            return;
        };

        self.edit_mode = self.ctx.host.is_edit_mode();
        if self.edit_mode {
            self.area.set_indicator(Indicator::Checking);
            self.publish_area();
        }
        self.set_state(WatchState::Subscribed);
        info!(
            mode = %self.session.tracking_mode(),
            edit_mode = self.edit_mode,
            already_completed = self.session.already_completed(),
            "listening for outcome statements"
        );

        self.listen(&mut subscription).await;

        subscription.widget.dispatcher.off(subscription.listener);
        debug!(listener = subscription.listener.0, "listener removed");
        self.finish();
    }

    // ─── READINESS ─────────────────────────────────────────────

    async fn wait_until_ready(&mut self) -> Option<Subscription> {
        let mut attempts: u64 = 0;
        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => return None,
                command = self.commands.recv() => match command {
                    None | Some(WatchCommand::Close) => return None,
                    Some(other) => debug!(?other, "widget not ready; command ignored"),
                },
                () = self.ctx.frames.next_frame() => {
                    attempts += 1;
                    match self.try_subscribe() {
                        Ok(Some(subscription)) => {
                            debug!(attempts, "widget ready");
                            return Some(subscription);
                        }
                        Ok(None) => trace!(attempts, "widget not ready"),
                        Err(e) => trace!(attempts, error = %e, "widget probe failed"),
                    }
                }
            }
        }
    }

    fn try_subscribe(&self) -> Result<Option<Subscription>, WidgetError> {
        let Some(widget) = probe(self.widget.as_ref())? else {
            return Ok(None);
        };
        // The widget reads its state when the listener goes live.
        widget.slot.write_state(self.session.saved_state().cloned());

        let (tx, events) = mpsc::unbounded_channel();
        let listener = widget.dispatcher.on(&self.ctx.settings.event_name, tx)?;
        Ok(Some(Subscription {
            widget,
            listener,
            events,
        }))
    }

    // ─── LISTENING ─────────────────────────────────────────────

    async fn listen(&mut self, subscription: &mut Subscription) {
        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    debug!("cancelled");
                    return;
                }
                statement = subscription.events.recv() => match statement {
                    None => {
                        debug!("dispatcher dropped the listener");
                        return;
                    }
                    Some(statement) => self.on_statement(&statement).await,
                },
                command = self.commands.recv() => {
                    // Commands act on the outcome of everything the widget already emitted.
                    self.drain_events(subscription).await;
                    match command {
                        None => {
                            debug!("handle dropped");
                            return;
                        }
                        Some(WatchCommand::Close) => {
                            self.persist_state(&subscription.widget, true).await;
                            return;
                        }
                        Some(WatchCommand::Refresh) => {
                            self.persist_state(&subscription.widget, false).await;
                        }
                        Some(WatchCommand::Choose(decision)) => self.resolve_choice(decision),
                    }
                }
            }
        }
    }

    async fn drain_events(&mut self, subscription: &mut Subscription) {
        while let Ok(statement) = subscription.events.try_recv() {
            self.on_statement(&statement).await;
        }
    }

    async fn on_statement(&mut self, statement: &Value) {
        let Some(event) = classify(statement) else {
            debug!("statement ignored");
            return;
        };

        if self.edit_mode {
            self.area.set_indicator(Indicator::EventDetected);
            self.publish_area();
            if !self.chimed {
                self.ctx.surface.play_chime();
                self.chimed = true;
            }
            debug!(verb = ?event.verb(), "outcome detected in edit mode");
            return;
        }

        if self.completed {
            trace!(verb = ?event.verb(), "session already completed");
            return;
        }
        if self.session.tracking_mode().evaluates_outcomes() {
            self.history.push(event.clone());
        }

        let reaction = plan_reaction(&self.session, self.completed, &event);
        if reaction.is_noop() {
            debug!(
                verb = ?event.verb(),
                scaled = event.score().map(|s| s.scaled()),
                "outcome has no effect"
            );
            return;
        }
        if reaction.completes {
            self.complete(&event);
        }
        if let Some(branch) = reaction.branch {
            self.apply_branch(branch).await;
        }
    }

    // ─── EFFECTS ───────────────────────────────────────────────

    fn complete(&mut self, event: &OutcomeEvent) {
        let result = CompletionResult::from_outcome(
            &self.session,
            event,
            self.history.clone(),
            self.ctx.clock.now(),
        );
        self.completed = true;
        self.status.send_modify(|status| {
            status.state = WatchState::Completed;
            status.completion = Some(result.clone());
        });
        info!(
            final_score = result.final_score(),
            duration_ms = result.duration_ms(),
            "session completed"
        );

        let sink = Arc::clone(&self.ctx.sink);
        let delay = self.ctx.settings.settle_delay();
        let session_id = self.session.session_id();
        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                match sink.report_completion(session_id, &result).await {
                    Ok(()) => debug!("completion reported"),
                    Err(e) => warn!(error = %e, "completion report failed"),
                }
            }
            .in_current_span(),
        );
    }

    async fn apply_branch(&mut self, branch: BranchReaction) {
        let mut changed = false;
        match branch.navigation {
            Some(Navigation::Forced { target_ms }) => self.schedule_forced_branch(target_ms),
            Some(Navigation::Offer { target_ms }) => {
                self.area.offer_choice(BranchChoice {
                    kind: branch.outcome.into(),
                    target_ms,
                });
                changed = true;
            }
            None => {}
        }

        if let Some(text) = branch.text {
            match self.ctx.renderer.render(&text).await {
                Ok(html) => {
                    self.area.replace_branch_text(html);
                    changed = true;
                }
                Err(e) => warn!(error = %e, "branch text not shown"),
            }
        }

        if changed {
            self.publish_area();
        }
        info!(outcome = ?branch.outcome, "branch applied");
    }

    fn schedule_forced_branch(&self, target_ms: u64) {
        let host = Arc::clone(&self.ctx.host);
        let delay = self.ctx.settings.branch_delay();
        let session_id = self.session.session_id();
        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                host.close_interaction(session_id);
                host.seek(target_ms);
                host.play();
                info!(target_ms, "forced branch taken");
            }
            .in_current_span(),
        );
    }

    fn resolve_choice(&mut self, decision: BranchDecision) {
        let Some(choice) = self.area.take_choice() else {
            debug!(?decision, "no branch choice pending");
            return;
        };
        if decision == BranchDecision::Continue {
            let host = &self.ctx.host;
            host.close_interaction(self.session.session_id());
            host.seek(choice.target_ms);
            host.play();
        }
        self.publish_area();
        info!(?decision, target_ms = choice.target_ms, "branch choice resolved");
    }

    async fn persist_state(&self, widget: &ReadyWidget, is_final: bool) {
        let mode = self.session.tracking_mode();
        if self.edit_mode
            || !mode.saves_state()
            || self.completed
            || !self.session.is_first_view()
        {
            trace!(is_final, "state not saved for this session");
            return;
        }

        let state = match widget.slot.read_state() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(is_final, "widget has no state to save");
                return;
            }
            Err(e) => {
                warn!(error = %e, "could not read widget state");
                return;
            }
        };
        let payload = match serde_json::to_string(&state) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "could not encode widget state");
                return;
            }
        };

        let user = self.ctx.host.current_user();
        match self
            .ctx
            .store
            .save_state(self.session.session_id(), &payload, user, is_final)
            .await
        {
            Ok(()) => debug!(user_id = %user, is_final, "state saved"),
            Err(e) => warn!(error = %e, is_final, "state save failed"),
        }
    }

    // ─── STATUS ────────────────────────────────────────────────

    fn publish_area(&self) {
        self.ctx
            .surface
            .update(self.session.session_id(), &self.area);
    }

    fn set_state(&self, state: WatchState) {
        self.status.send_modify(|status| status.state = state);
    }

    fn finish(&self) {
        self.status.send_modify(|status| {
            if status.state != WatchState::Completed {
                status.state = WatchState::Abandoned;
            }
            status.detached = true;
        });
    }
}
