use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use storage::repository::StateStore;
use watch_core::model::{Session, SessionDraft, SessionId, UserId};

use crate::error::ResumeError;

/// A validated session plus the resume problem, if any, that was skipped.
#[derive(Debug)]
pub struct PreparedSession {
    pub session: Session,
    pub resume_error: Option<ResumeError>,
}

/// Loads resumable state from the persistence service.
#[derive(Clone)]
pub struct ResumeService {
    store: Arc<dyn StateStore>,
}

impl ResumeService {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Latest saved state for the session written by any of `users`.
    ///
    /// # Errors
    ///
    /// Returns `ResumeError::Storage` if the logs cannot be read and
    /// `ResumeError::MalformedState` if the latest payload is not valid JSON.
    pub async fn try_load(
        &self,
        session: SessionId,
        users: &[UserId],
    ) -> Result<Option<Value>, ResumeError> {
        let logs = self.store.load_state(session, users).await?;
        let Some(latest) = logs.last() else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&latest.payload) {
            Ok(Value::Null) => Ok(None),
            Ok(state) => Ok(Some(state)),
            Err(e) => Err(ResumeError::MalformedState(e.to_string())),
        }
    }

    /// Validate the draft and attach persisted state when the draft carries none.
    ///
    /// Storage failures are logged and the session starts fresh. A malformed payload is
    /// returned in `resume_error` and resume is skipped.
    ///
    /// # Errors
    ///
    /// Returns `ResumeError::Config` if the draft itself is invalid.
    pub async fn prepare(
        &self,
        draft: SessionDraft,
        users: &[UserId],
        now: DateTime<Utc>,
    ) -> Result<PreparedSession, ResumeError> {
        let session = draft.validate(now)?;
        if session.saved_state().is_some() || session.already_completed() {
            return Ok(PreparedSession {
                session,
                resume_error: None,
            });
        }

        let session_id = session.session_id();
        match self.try_load(session_id, users).await {
            Ok(state) => {
                debug!(%session_id, resumed = state.is_some(), "loaded resumable state");
                Ok(PreparedSession {
                    session: session.with_saved_state(state),
                    resume_error: None,
                })
            }
            Err(ResumeError::Storage(e)) => {
                warn!(%session_id, error = %e, "state load failed; starting fresh");
                Ok(PreparedSession {
                    session,
                    resume_error: None,
                })
            }
            Err(e) => {
                warn!(%session_id, error = %e, "skipping resume");
                Ok(PreparedSession {
                    session,
                    resume_error: Some(e),
                })
            }
        }
    }
}
