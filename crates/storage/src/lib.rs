#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{InMemoryStateStore, StateLog, StateStore, Storage, StorageError};
