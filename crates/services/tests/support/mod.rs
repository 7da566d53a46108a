#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use services::{
    CompletionSink, ContentArea, EventDispatcher, HostPlayer, ListenerId, ManualFrames,
    OutcomeWatcher, SessionSurface, SinkError, UserStateSlot, WatcherSettings, WidgetError,
    WidgetRuntime,
};
use storage::repository::InMemoryStateStore;
use watch_core::model::{
    BranchAction, BranchRules, BranchRulesInput, CompletionResult, RichText, Session,
    SessionDraft, SessionId, TrackingMode, UserId,
};
use watch_core::time::{fixed_clock, fixed_now};

pub const VERB_COMPLETED: &str = "http://adlnet.gov/expapi/verbs/completed";
pub const VERB_ANSWERED: &str = "http://adlnet.gov/expapi/verbs/answered";

// ─── HOST ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Seek(u64),
    Play,
    CloseInteraction(SessionId),
}

pub struct FakeHost {
    calls: Mutex<Vec<HostCall>>,
    edit_mode: bool,
    user: UserId,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            edit_mode: false,
            user: UserId::new(7),
        }
    }

    pub fn editing() -> Self {
        Self {
            edit_mode: true,
            ..Self::new()
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl HostPlayer for FakeHost {
    fn seek(&self, time_ms: u64) {
        self.calls.lock().unwrap().push(HostCall::Seek(time_ms));
    }

    fn play(&self) {
        self.calls.lock().unwrap().push(HostCall::Play);
    }

    fn close_interaction(&self, session: SessionId) {
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::CloseInteraction(session));
    }

    fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    fn current_user(&self) -> UserId {
        self.user
    }
}

// ─── SURFACE ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSurface {
    updates: Mutex<Vec<(SessionId, ContentArea)>>,
    chimes: AtomicUsize,
}

impl RecordingSurface {
    pub fn latest(&self) -> Option<ContentArea> {
        self.updates.lock().unwrap().last().map(|(_, a)| a.clone())
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn chimes(&self) -> usize {
        self.chimes.load(Ordering::SeqCst)
    }
}

impl SessionSurface for RecordingSurface {
    fn update(&self, session: SessionId, area: &ContentArea) {
        self.updates.lock().unwrap().push((session, area.clone()));
    }

    fn play_chime(&self) {
        self.chimes.fetch_add(1, Ordering::SeqCst);
    }
}

// ─── SINK ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(SessionId, CompletionResult)>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<(SessionId, CompletionResult)> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn report_completion(
        &self,
        session: SessionId,
        result: &CompletionResult,
    ) -> Result<(), SinkError> {
        self.reports.lock().unwrap().push((session, result.clone()));
        Ok(())
    }
}

// ─── WIDGET ────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDispatcher {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, (String, UnboundedSender<Value>)>>,
    on_calls: AtomicUsize,
    off_calls: AtomicUsize,
}

impl FakeDispatcher {
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn on_calls(&self) -> usize {
        self.on_calls.load(Ordering::SeqCst)
    }

    pub fn off_calls(&self) -> usize {
        self.off_calls.load(Ordering::SeqCst)
    }
}

impl EventDispatcher for FakeDispatcher {
    fn on(&self, event_name: &str, sink: UnboundedSender<Value>) -> Result<ListenerId, WidgetError> {
        self.on_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap()
            .insert(id, (event_name.to_string(), sink));
        Ok(ListenerId(id))
    }

    fn off(&self, listener: ListenerId) {
        self.off_calls.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().remove(&listener.0);
    }
}

#[derive(Default)]
pub struct FakeSlot {
    state: Mutex<Option<Value>>,
    writes: AtomicUsize,
}

impl FakeSlot {
    pub fn state(&self) -> Option<Value> {
        self.state.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Simulate the learner making progress inside the widget.
    pub fn set_progress(&self, state: Value) {
        *self.state.lock().unwrap() = Some(state);
    }
}

impl UserStateSlot for FakeSlot {
    fn read_state(&self) -> Result<Option<Value>, WidgetError> {
        Ok(self.state())
    }

    fn write_state(&self, state: Option<Value>) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = state;
    }
}

pub struct FakeWidget {
    pub dispatcher: Arc<FakeDispatcher>,
    pub slot: Arc<FakeSlot>,
    ready: AtomicBool,
    failing_probes: AtomicUsize,
    probes: AtomicUsize,
}

impl FakeWidget {
    pub fn ready() -> Arc<Self> {
        Arc::new(Self::build(true, 0))
    }

    pub fn loading() -> Arc<Self> {
        Arc::new(Self::build(false, 0))
    }

    /// The first `failures` probes raise an access error.
    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self::build(true, failures))
    }

    fn build(ready: bool, failures: usize) -> Self {
        Self {
            dispatcher: Arc::new(FakeDispatcher::default()),
            slot: Arc::new(FakeSlot::default()),
            ready: AtomicBool::new(ready),
            failing_probes: AtomicUsize::new(failures),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn make_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Deliver a statement to every `xAPI` listener. Returns how many received it.
    pub fn emit(&self, statement: Value) -> usize {
        let listeners = self.dispatcher.listeners.lock().unwrap();
        listeners
            .values()
            .filter(|(name, _)| name == "xAPI")
            .filter(|(_, tx)| tx.send(statement.clone()).is_ok())
            .count()
    }
}

impl WidgetRuntime for FakeWidget {
    fn dispatcher(&self) -> Result<Option<Arc<dyn EventDispatcher>>, WidgetError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_probes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_probes.store(failing - 1, Ordering::SeqCst);
            return Err(WidgetError::AccessDenied("cross-origin frame".into()));
        }
        if !self.ready.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.dispatcher.clone() as Arc<dyn EventDispatcher>))
    }

    fn integration(&self) -> Result<Option<Arc<dyn UserStateSlot>>, WidgetError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.slot.clone() as Arc<dyn UserStateSlot>))
    }
}

// ─── HARNESS ───────────────────────────────────────────────────

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub surface: Arc<RecordingSurface>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<InMemoryStateStore>,
    pub frames: Arc<ManualFrames>,
    pub watcher: OutcomeWatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_host(FakeHost::new())
    }

    pub fn with_host(host: FakeHost) -> Self {
        let host = Arc::new(host);
        let surface = Arc::new(RecordingSurface::default());
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(InMemoryStateStore::new());
        let frames = Arc::new(ManualFrames::new());
        let watcher = OutcomeWatcher::new(
            host.clone(),
            surface.clone(),
            sink.clone(),
            store.clone(),
            WatcherSettings::default(),
        )
        .with_frames(frames.clone())
        .with_clock(fixed_clock());
        Self {
            host,
            surface,
            sink,
            store,
            frames,
            watcher,
        }
    }
}

/// Let the watcher task drain its queues without firing the settle or branch delays.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Step past both the branch and the completion delay.
pub async fn past_delays() {
    tokio::time::sleep(Duration::from_millis(1_600)).await;
}

// ─── FIXTURES ──────────────────────────────────────────────────

pub fn session(mode: TrackingMode) -> Session {
    draft(mode).validate(fixed_now()).unwrap()
}

pub fn draft(mode: TrackingMode) -> SessionDraft {
    SessionDraft {
        max_points: 10.0,
        ..SessionDraft::new(SessionId::new(1), mode)
    }
}

pub fn forced_rules() -> BranchRulesInput {
    BranchRulesInput::Native(BranchRules::new(
        BranchAction {
            enabled: true,
            forced: true,
            target_time_ms: 90_000,
            ..BranchAction::default()
        },
        BranchAction {
            enabled: true,
            forced: true,
            target_time_ms: 30_000,
            ..BranchAction::default()
        },
    ))
}

pub fn offer_rules_with_text() -> BranchRulesInput {
    BranchRulesInput::Native(BranchRules::new(
        BranchAction {
            enabled: true,
            target_time_ms: 90_000,
            show_text: true,
            text: RichText::html("<p>Great work</p>"),
            ..BranchAction::default()
        },
        BranchAction {
            enabled: true,
            target_time_ms: 30_000,
            show_text: true,
            text: RichText::html("<p>Try again</p><script>x()</script>"),
            ..BranchAction::default()
        },
    ))
}

pub fn statement(verb: &str, score: Option<(f64, f64)>) -> Value {
    let mut stmt = json!({
        "verb": { "id": verb },
        "object": { "id": "https://lms.test/h5p/embed/1" },
    });
    if let Some((raw, max)) = score {
        stmt["result"] = json!({ "score": { "raw": raw, "max": max, "scaled": raw / max } });
    }
    stmt
}

pub fn sub_content(verb: &str, score: Option<(f64, f64)>) -> Value {
    let mut stmt = statement(verb, score);
    stmt["object"]["id"] = json!("https://lms.test/h5p/embed/1?subContentId=3a9e");
    stmt
}

pub fn rollup(verb: &str, score: Option<(f64, f64)>) -> Value {
    let mut stmt = statement(verb, score);
    stmt["context"] = json!({
        "contextActivities": { "parent": [{ "id": "https://lms.test/h5p/embed/0" }] }
    });
    stmt
}
