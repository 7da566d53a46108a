use watch_core::model::{SessionId, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_state_row};
use crate::repository::{StateLog, StateStore, StorageError};

#[async_trait::async_trait]
impl StateStore for SqliteRepository {
    async fn load_state(
        &self,
        session: SessionId,
        users: &[UserId],
    ) -> Result<Vec<StateLog>, StorageError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT id, session_id, user_id, payload, is_final, saved_at
                FROM state_logs
                WHERE session_id = ?1 AND user_id IN (
            ",
        );
        for idx in 0..users.len() {
            if idx > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(idx + 2).to_string());
        }
        sql.push_str(") ORDER BY saved_at ASC, id ASC");

        let mut query = sqlx::query(&sql).bind(id_i64("session_id", session.value())?);
        for user in users {
            query = query.bind(id_i64("user_id", user.value())?);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_state_row).collect()
    }

    async fn save_state(
        &self,
        session: SessionId,
        payload: &str,
        user: UserId,
        is_final: bool,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO state_logs (session_id, user_id, payload, is_final, saved_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("session_id", session.value())?)
        .bind(id_i64("user_id", user.value())?)
        .bind(payload)
        .bind(i64::from(is_final))
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
