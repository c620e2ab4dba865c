//! Collaborator stores touched by the room lifecycle.
//!
//! The [`RoomStore`] holds durable room records (who created a code and when);
//! the [`FileStore`] is the shared upload area whose files carry the room code
//! as a name prefix.

mod disk;
mod memory;
mod postgres;

pub use disk::DiskFileStore;
pub use memory::MemoryRoomStore;
pub use postgres::PgRoomStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huddle_protocol::RoomCode;
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File too large. Maximum size is {max_mb} MB")]
    FileTooLarge { max_mb: usize },

    #[error("File type '{0}' is not allowed")]
    DisallowedExtension(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persisted metadata for an allocated room code
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoomRecord {
    pub id: Uuid,
    pub room_code: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl RoomRecord {
    pub fn new(code: &RoomCode, created_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_code: code.as_str().to_string(),
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn exists(&self, code: &RoomCode) -> StoreResult<bool>;

    async fn get(&self, code: &RoomCode) -> StoreResult<Option<RoomRecord>>;

    /// Insert a record. Returns `false` without writing when the code is taken.
    async fn insert(&self, record: &RoomRecord) -> StoreResult<bool>;

    /// Returns whether a record was removed.
    async fn delete(&self, code: &RoomCode) -> StoreResult<bool>;
}

/// A file written to the upload area
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub original_name: String,
    pub size_bytes: u64,
}

/// Outcome of a prefix purge. One failing file never aborts the rest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, room: &RoomCode, original_name: &str, data: &[u8])
        -> StoreResult<StoredFile>;

    async fn read(&self, name: &str) -> StoreResult<Vec<u8>>;

    async fn delete_all_with_prefix(&self, prefix: &str) -> StoreResult<PurgeReport>;
}
