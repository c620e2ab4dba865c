use crate::store::{FileStore, PurgeReport, RoomStore};
use huddle_protocol::RoomCode;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What a teardown managed to clean up
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub record_deleted: bool,
    pub files: PurgeReport,
    /// Sub-operations that failed outright
    pub failures: usize,
}

/// Side effects of rooms opening and closing.
///
/// Teardown is best effort. The record delete and the file purge run side by
/// side; a failure in one is logged and does not stop the other, and nothing
/// is retried.
#[derive(Clone)]
pub struct RoomLifecycle {
    room_store: Arc<dyn RoomStore>,
    file_store: Arc<dyn FileStore>,
}

impl RoomLifecycle {
    pub fn new(room_store: Arc<dyn RoomStore>, file_store: Arc<dyn FileStore>) -> Self {
        Self {
            room_store,
            file_store,
        }
    }

    pub fn room_opened(&self, code: &RoomCode) {
        tracing::info!(room_code = %code, "Room opened");
    }

    /// Start teardown of an emptied room in the background. Callers on the
    /// signaling path drop the handle.
    pub fn room_closed(&self, code: RoomCode) -> JoinHandle<TeardownReport> {
        let room_store = self.room_store.clone();
        let file_store = self.file_store.clone();

        tokio::spawn(async move { teardown(room_store, file_store, code).await })
    }
}

async fn teardown(
    room_store: Arc<dyn RoomStore>,
    file_store: Arc<dyn FileStore>,
    code: RoomCode,
) -> TeardownReport {
    let prefix = code.file_prefix();
    let (record, files) = tokio::join!(
        room_store.delete(&code),
        file_store.delete_all_with_prefix(&prefix)
    );

    let mut report = TeardownReport::default();

    match record {
        Ok(deleted) => report.record_deleted = deleted,
        Err(e) => {
            tracing::error!(room_code = %code, error = %e, "Failed to delete room record");
            report.failures += 1;
        }
    }

    match files {
        Ok(purge) => {
            if !purge.failed.is_empty() {
                tracing::warn!(
                    room_code = %code,
                    failed = purge.failed.len(),
                    "Some room files could not be deleted"
                );
            }
            report.files = purge;
        }
        Err(e) => {
            tracing::error!(room_code = %code, error = %e, "Failed to purge room files");
            report.failures += 1;
        }
    }

    tracing::info!(
        room_code = %code,
        record_deleted = report.record_deleted,
        files_deleted = report.files.deleted.len(),
        "Room closed"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        DiskFileStore, MemoryRoomStore, RoomRecord, StoreError, StoreResult, StoredFile,
    };
    use async_trait::async_trait;

    struct BrokenRoomStore;

    #[async_trait]
    impl RoomStore for BrokenRoomStore {
        async fn exists(&self, _: &RoomCode) -> StoreResult<bool> {
            Err(StoreError::Io(std::io::Error::other("offline")))
        }
        async fn get(&self, _: &RoomCode) -> StoreResult<Option<RoomRecord>> {
            Err(StoreError::Io(std::io::Error::other("offline")))
        }
        async fn insert(&self, _: &RoomRecord) -> StoreResult<bool> {
            Err(StoreError::Io(std::io::Error::other("offline")))
        }
        async fn delete(&self, _: &RoomCode) -> StoreResult<bool> {
            Err(StoreError::Io(std::io::Error::other("offline")))
        }
    }

    struct BrokenFileStore;

    #[async_trait]
    impl FileStore for BrokenFileStore {
        async fn save(&self, _: &RoomCode, _: &str, _: &[u8]) -> StoreResult<StoredFile> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        async fn read(&self, _: &str) -> StoreResult<Vec<u8>> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        async fn delete_all_with_prefix(&self, _: &str) -> StoreResult<PurgeReport> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
    }

    fn code() -> RoomCode {
        RoomCode::parse("ABC123").unwrap()
    }

    #[tokio::test]
    async fn teardown_removes_record_and_prefixed_files() {
        let dir = tempfile::tempdir().unwrap();
        let rooms = Arc::new(MemoryRoomStore::new());
        let files = Arc::new(DiskFileStore::new(dir.path()));
        rooms.insert(&RoomRecord::new(&code(), "alice")).await.unwrap();
        let kept = files
            .save(&RoomCode::parse("ABC1234").unwrap(), "x.txt", b"x")
            .await
            .unwrap();
        files.save(&code(), "slides.pdf", b"pdf").await.unwrap();

        let lifecycle = RoomLifecycle::new(rooms.clone(), files.clone());
        let report = lifecycle.room_closed(code()).await.unwrap();

        assert!(report.record_deleted);
        assert_eq!(report.files.deleted.len(), 1);
        assert_eq!(report.failures, 0);
        assert!(!rooms.exists(&code()).await.unwrap());
        // "ABC1234_" does not carry the "ABC123_" prefix
        assert!(files.read(&kept.name).await.is_ok());
    }

    #[tokio::test]
    async fn broken_record_store_does_not_block_file_purge() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(DiskFileStore::new(dir.path()));
        let stored = files.save(&code(), "notes.txt", b"n").await.unwrap();

        let lifecycle = RoomLifecycle::new(Arc::new(BrokenRoomStore), files.clone());
        let report = lifecycle.room_closed(code()).await.unwrap();

        assert_eq!(report.failures, 1);
        assert!(!report.record_deleted);
        assert_eq!(report.files.deleted, vec![stored.name]);
    }

    #[tokio::test]
    async fn broken_file_store_does_not_block_record_delete() {
        let rooms = Arc::new(MemoryRoomStore::new());
        rooms.insert(&RoomRecord::new(&code(), "alice")).await.unwrap();

        let lifecycle = RoomLifecycle::new(rooms.clone(), Arc::new(BrokenFileStore));
        let report = lifecycle.room_closed(code()).await.unwrap();

        assert_eq!(report.failures, 1);
        assert!(report.record_deleted);
        assert!(!rooms.exists(&code()).await.unwrap());
    }
}
