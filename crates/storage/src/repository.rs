use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use watch_core::Clock;
use watch_core::model::{SessionId, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One persisted snapshot of a widget's resumable state.
///
/// `payload` is the widget-owned JSON text; storage never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLog {
    pub id: i64,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub payload: String,
    pub is_final: bool,
    pub saved_at: DateTime<Utc>,
}

/// Persistence contract for resumable widget state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Prior logs for the session written by any of `users`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the logs cannot be read.
    async fn load_state(
        &self,
        session: SessionId,
        users: &[UserId],
    ) -> Result<Vec<StateLog>, StorageError>;

    /// Append a state snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_state(
        &self,
        session: SessionId,
        payload: &str,
        user: UserId,
        is_final: bool,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    clock: Clock,
    logs: Arc<Mutex<Vec<StateLog>>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Snapshot of everything stored so far.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn all_logs(&self) -> Result<Vec<StateLog>, StorageError> {
        let guard = self
            .logs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load_state(
        &self,
        session: SessionId,
        users: &[UserId],
    ) -> Result<Vec<StateLog>, StorageError> {
        let guard = self
            .logs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<StateLog> = guard
            .iter()
            .filter(|log| log.session_id == session && users.contains(&log.user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.saved_at.cmp(&b.saved_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn save_state(
        &self,
        session: SessionId,
        payload: &str,
        user: UserId,
        is_final: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .logs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("log id overflow".into()))?
            + 1;
        guard.push(StateLog {
            id,
            session_id: session,
            user_id: user,
            payload: payload.to_owned(),
            is_final,
            saved_at: self.clock.now(),
        });
        Ok(())
    }
}

/// State store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub states: Arc<dyn StateStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let states: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        Self { states }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_core::time::{fixed_clock, fixed_now};

    #[tokio::test]
    async fn loads_only_requested_session_and_users() {
        let store = InMemoryStateStore::new().with_clock(fixed_clock());
        let session = SessionId::new(1);
        store
            .save_state(session, r#"{"page":1}"#, UserId::new(10), false)
            .await
            .unwrap();
        store
            .save_state(session, r#"{"page":2}"#, UserId::new(11), false)
            .await
            .unwrap();
        store
            .save_state(SessionId::new(2), r#"{"page":9}"#, UserId::new(10), true)
            .await
            .unwrap();

        let logs = store.load_state(session, &[UserId::new(10)]).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].payload, r#"{"page":1}"#);
        assert_eq!(logs[0].saved_at, fixed_now());

        let logs = store
            .load_state(session, &[UserId::new(10), UserId::new(11)])
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].id < logs[1].id);
    }

    #[tokio::test]
    async fn storage_in_memory_starts_empty() {
        let storage = Storage::in_memory();
        let logs = storage
            .states
            .load_state(SessionId::new(1), &[UserId::new(1)])
            .await
            .unwrap();
        assert!(logs.is_empty());
    }
}
