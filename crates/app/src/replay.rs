//! Scripted collaborators for replaying recorded statements.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

use services::{
    BranchDecision, CompletionReport, CompletionSink, ContentArea, EventDispatcher, HostPlayer,
    ListenerId, SessionSurface, SinkError, UserStateSlot, WidgetError, WidgetRuntime,
};
use watch_core::model::{CompletionResult, SessionDraft, SessionId, UserId};

/// A recorded session: its configuration plus the statements the widget emitted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScript {
    pub session: SessionDraft,
    #[serde(default = "default_user")]
    pub user_id: UserId,
    #[serde(default)]
    pub statements: Vec<Value>,
    /// Progress the widget reports when the session is closed.
    #[serde(default)]
    pub progress: Option<Value>,
    /// Answer given to a branch choice, if one is offered.
    #[serde(default)]
    pub decision: Option<ReplayDecision>,
}

fn default_user() -> UserId {
    UserId::new(1)
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayDecision {
    Continue,
    Dismiss,
}

impl From<ReplayDecision> for BranchDecision {
    fn from(decision: ReplayDecision) -> Self {
        match decision {
            ReplayDecision::Continue => Self::Continue,
            ReplayDecision::Dismiss => Self::Dismiss,
        }
    }
}

// ─── HOST ──────────────────────────────────────────────────────

pub struct ConsoleHost {
    edit_mode: bool,
    user: UserId,
    seeks: Mutex<Vec<u64>>,
}

impl ConsoleHost {
    pub fn new(edit_mode: bool, user: UserId) -> Self {
        Self {
            edit_mode,
            user,
            seeks: Mutex::new(Vec::new()),
        }
    }

    /// Seek targets in the order the watcher issued them.
    pub fn seeks(&self) -> Vec<u64> {
        self.seeks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HostPlayer for ConsoleHost {
    fn seek(&self, time_ms: u64) {
        println!("host: seek {time_ms}ms");
        self.seeks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(time_ms);
    }

    fn play(&self) {
        println!("host: play");
    }

    fn close_interaction(&self, session: SessionId) {
        println!("host: close interaction {session}");
    }

    fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    fn current_user(&self) -> UserId {
        self.user
    }
}

pub struct ConsoleSurface;

impl SessionSurface for ConsoleSurface {
    fn update(&self, session: SessionId, area: &ContentArea) {
        if let Some(indicator) = area.indicator() {
            println!("surface {session}: indicator {indicator:?}");
        }
        if let Some(text) = area.branch_text() {
            println!("surface {session}: text {text}");
        }
        match area.choice() {
            Some(choice) => println!(
                "surface {session}: choice {:?} -> {}ms",
                choice.kind, choice.target_ms
            ),
            None => println!("surface {session}: no choice pending"),
        }
    }

    fn play_chime(&self) {
        println!("surface: chime");
    }
}

#[derive(Default)]
pub struct PrintingSink {
    reported: Mutex<Option<CompletionResult>>,
}

impl PrintingSink {
    pub fn reported(&self) -> Option<CompletionResult> {
        self.reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CompletionSink for PrintingSink {
    async fn report_completion(
        &self,
        session: SessionId,
        result: &CompletionResult,
    ) -> Result<(), SinkError> {
        let report = CompletionReport::from_result(result);
        println!(
            "sink: session {session} completed in {} for {} points",
            report.duration, report.points
        );
        *self.reported.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        Ok(())
    }
}

// ─── WIDGET ────────────────────────────────────────────────────

/// Widget that becomes ready after a fixed number of probes.
pub struct ScriptedWidget {
    ready_after: u64,
    probes: AtomicU64,
    dispatcher: Arc<ScriptedDispatcher>,
    slot: Arc<ScriptedSlot>,
}

impl ScriptedWidget {
    pub fn new(ready_after: u64) -> Self {
        Self {
            ready_after,
            probes: AtomicU64::new(0),
            dispatcher: Arc::new(ScriptedDispatcher::default()),
            slot: Arc::new(ScriptedSlot::default()),
        }
    }

    /// Deliver one statement to the registered listener.
    pub fn emit(&self, statement: Value) -> bool {
        self.dispatcher.emit(statement)
    }

    pub fn set_progress(&self, state: Value) {
        self.slot.write_state(Some(state));
    }
}

impl WidgetRuntime for ScriptedWidget {
    fn dispatcher(&self) -> Result<Option<Arc<dyn EventDispatcher>>, WidgetError> {
        let probe = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
        if probe <= self.ready_after {
            return Err(WidgetError::NotInitialized);
        }
        Ok(Some(self.dispatcher.clone() as Arc<dyn EventDispatcher>))
    }

    fn integration(&self) -> Result<Option<Arc<dyn UserStateSlot>>, WidgetError> {
        Ok(Some(self.slot.clone() as Arc<dyn UserStateSlot>))
    }
}

#[derive(Default)]
struct ScriptedDispatcher {
    listener: Mutex<Option<(ListenerId, String, UnboundedSender<Value>)>>,
    next_id: AtomicU64,
}

impl ScriptedDispatcher {
    fn emit(&self, statement: Value) -> bool {
        let listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        listener
            .as_ref()
            .is_some_and(|(_, _, tx)| tx.send(statement).is_ok())
    }
}

impl EventDispatcher for ScriptedDispatcher {
    fn on(&self, event_name: &str, sink: UnboundedSender<Value>) -> Result<ListenerId, WidgetError> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((id, event_name.to_string(), sink));
        println!("widget: listener {} on {event_name}", id.0);
        Ok(id)
    }

    fn off(&self, listener: ListenerId) {
        let mut current = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|(id, _, _)| *id == listener) {
            *current = None;
            println!("widget: listener {} removed", listener.0);
        }
    }
}

#[derive(Default)]
struct ScriptedSlot {
    state: Mutex<Option<Value>>,
}

impl UserStateSlot for ScriptedSlot {
    fn read_state(&self) -> Result<Option<Value>, WidgetError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn write_state(&self, state: Option<Value>) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}
