use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::branch::{BranchRules, BranchRulesError};
use crate::model::ids::{ContainerRef, SessionId};
use crate::model::tracking::TrackingMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionConfigError {
    #[error("max points must be a finite, non-negative number")]
    InvalidMaxPoints,

    #[error(transparent)]
    BranchRules(#[from] BranchRulesError),

    #[error("saved state is not valid JSON: {0}")]
    MalformedState(String),
}

/// Branch rules as they arrive from the host: either the native object or the
/// form's flat JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchRulesInput {
    Legacy(String),
    Native(BranchRules),
}

/// Unvalidated session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub session_id: SessionId,
    #[serde(default)]
    pub container_ref: Option<ContainerRef>,
    #[serde(default)]
    pub tracking_mode: TrackingMode,
    #[serde(default)]
    pub partial_credit_enabled: bool,
    #[serde(default)]
    pub max_points: f64,
    #[serde(default)]
    pub already_completed: bool,
    /// Resumable state exactly as persisted (JSON text).
    #[serde(default)]
    pub saved_state_json: Option<String>,
    #[serde(default)]
    pub branch_rules: Option<BranchRulesInput>,
    /// Duration accumulated by earlier viewings, in milliseconds.
    #[serde(default)]
    pub prior_duration_ms: u64,
    #[serde(default)]
    pub viewing_started_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub first_view: bool,
}

fn default_true() -> bool {
    true
}

impl SessionDraft {
    #[must_use]
    pub fn new(session_id: SessionId, tracking_mode: TrackingMode) -> Self {
        Self {
            session_id,
            container_ref: None,
            tracking_mode,
            partial_credit_enabled: false,
            max_points: 0.0,
            already_completed: false,
            saved_state_json: None,
            branch_rules: None,
            prior_duration_ms: 0,
            viewing_started_at: None,
            first_view: true,
        }
    }

    /// Validate and normalize the draft into a session.
    ///
    /// `now` is used as the viewing start when the draft does not carry one.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError` for invalid points, malformed branch rules or
    /// malformed saved state.
    pub fn validate(self, now: DateTime<Utc>) -> Result<Session, SessionConfigError> {
        if !self.max_points.is_finite() || self.max_points < 0.0 {
            return Err(SessionConfigError::InvalidMaxPoints);
        }

        let saved_state = match self.saved_state_json.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Null) => None,
                Ok(value) => Some(value),
                Err(e) => return Err(SessionConfigError::MalformedState(e.to_string())),
            },
        };

        let branch_rules = match self.branch_rules {
            None => None,
            Some(BranchRulesInput::Legacy(text)) => BranchRules::from_legacy_json(&text)?,
            Some(BranchRulesInput::Native(rules)) => Some(rules.normalized()),
        };

        let evaluates = self.tracking_mode.evaluates_outcomes();
        let container_ref = self
            .container_ref
            .unwrap_or_else(|| ContainerRef::new(format!("session-{}", self.session_id)));

        Ok(Session {
            session_id: self.session_id,
            container_ref,
            tracking_mode: self.tracking_mode,
            partial_credit_enabled: evaluates && self.partial_credit_enabled,
            max_points: self.max_points,
            already_completed: self.already_completed,
            saved_state,
            branch_rules: branch_rules.filter(|_| evaluates),
            prior_duration_ms: self.prior_duration_ms,
            viewing_started_at: self.viewing_started_at.unwrap_or(now),
            first_view: self.first_view,
        })
    }
}

/// One embedding of one widget instance inside one container.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    session_id: SessionId,
    container_ref: ContainerRef,
    tracking_mode: TrackingMode,
    partial_credit_enabled: bool,
    max_points: f64,
    already_completed: bool,
    saved_state: Option<Value>,
    branch_rules: Option<BranchRules>,
    prior_duration_ms: u64,
    viewing_started_at: DateTime<Utc>,
    first_view: bool,
}

impl Session {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn container_ref(&self) -> &ContainerRef {
        &self.container_ref
    }

    #[must_use]
    pub fn tracking_mode(&self) -> TrackingMode {
        self.tracking_mode
    }

    #[must_use]
    pub fn partial_credit_enabled(&self) -> bool {
        self.partial_credit_enabled
    }

    #[must_use]
    pub fn max_points(&self) -> f64 {
        self.max_points
    }

    #[must_use]
    pub fn already_completed(&self) -> bool {
        self.already_completed
    }

    #[must_use]
    pub fn saved_state(&self) -> Option<&Value> {
        self.saved_state.as_ref()
    }

    #[must_use]
    pub fn branch_rules(&self) -> Option<&BranchRules> {
        self.branch_rules.as_ref()
    }

    #[must_use]
    pub fn prior_duration_ms(&self) -> u64 {
        self.prior_duration_ms
    }

    #[must_use]
    pub fn viewing_started_at(&self) -> DateTime<Utc> {
        self.viewing_started_at
    }

    #[must_use]
    pub fn is_first_view(&self) -> bool {
        self.first_view
    }

    /// Replace the resumable state, e.g. after loading it from storage.
    #[must_use]
    pub fn with_saved_state(mut self, state: Option<Value>) -> Self {
        self.saved_state = state;
        self
    }
}
