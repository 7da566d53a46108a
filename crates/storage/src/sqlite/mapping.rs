use sqlx::Row;
use watch_core::model::{SessionId, UserId};

use crate::repository::{StateLog, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn map_state_row(row: &sqlx::sqlite::SqliteRow) -> Result<StateLog, StorageError> {
    let session_id = SessionId::new(i64_to_u64(
        "session_id",
        row.try_get::<i64, _>("session_id").map_err(ser)?,
    )?);
    let user_id = UserId::new(i64_to_u64(
        "user_id",
        row.try_get::<i64, _>("user_id").map_err(ser)?,
    )?);
    let is_final = match row.try_get::<i64, _>("is_final").map_err(ser)? {
        0 => false,
        1 => true,
        other => {
            return Err(StorageError::Serialization(format!(
                "invalid is_final: {other}"
            )));
        }
    };

    Ok(StateLog {
        id: row.try_get("id").map_err(ser)?,
        session_id,
        user_id,
        payload: row.try_get("payload").map_err(ser)?,
        is_final,
        saved_at: row.try_get("saved_at").map_err(ser)?,
    })
}
