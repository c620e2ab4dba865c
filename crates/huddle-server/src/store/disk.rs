use super::{FileStore, PurgeReport, StoreError, StoreResult, StoredFile};
use async_trait::async_trait;
use huddle_protocol::RoomCode;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Maximum file size: 25 MB
const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// Allowed file extensions
const ALLOWED_EXTENSIONS: &[&str] = &[
    // Images
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp",
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    "txt", "rtf", "csv", "md",
    // Archives
    "zip", "tar", "gz", "7z",
    // Audio
    "mp3", "wav", "ogg", "flac", "m4a",
    // Video
    "mp4", "webm", "mov",
];

/// Upload area on the local filesystem
#[derive(Clone)]
pub struct DiskFileStore {
    upload_dir: PathBuf,
}

impl DiskFileStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    fn validate_file(&self, filename: &str, size: usize) -> StoreResult<()> {
        if size > MAX_FILE_SIZE {
            return Err(StoreError::FileTooLarge {
                max_mb: MAX_FILE_SIZE / 1024 / 1024,
            });
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(StoreError::DisallowedExtension(extension));
        }

        Ok(())
    }
}

/// Keep only the last path component and replace anything outside a safe set
fn sanitize(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn check_stored_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(StoreError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn save(
        &self,
        room: &RoomCode,
        original_name: &str,
        data: &[u8],
    ) -> StoreResult<StoredFile> {
        let sanitized = sanitize(original_name);
        if sanitized.is_empty() {
            return Err(StoreError::InvalidFileName(original_name.to_string()));
        }
        self.validate_file(&sanitized, data.len())?;

        fs::create_dir_all(&self.upload_dir).await?;

        let name = format!(
            "{}{}_{}",
            room.file_prefix(),
            Uuid::new_v4().simple(),
            sanitized
        );
        let mut file = fs::File::create(self.upload_dir.join(&name)).await?;
        file.write_all(data).await?;
        file.flush().await?;

        tracing::debug!(room_code = %room, file = %name, "Stored upload");

        Ok(StoredFile {
            name,
            original_name: original_name.to_string(),
            size_bytes: data.len() as u64,
        })
    }

    async fn read(&self, name: &str) -> StoreResult<Vec<u8>> {
        check_stored_name(name)?;
        Ok(fs::read(self.upload_dir.join(name)).await?)
    }

    async fn delete_all_with_prefix(&self, prefix: &str) -> StoreResult<PurgeReport> {
        // An empty prefix would match the whole upload area
        if prefix.is_empty() {
            return Err(StoreError::InvalidFileName(prefix.to_string()));
        }

        let mut report = PurgeReport::default();

        let mut entries = match fs::read_dir(&self.upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => report.deleted.push(name),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Failed to delete uploaded file");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn save_prefixes_with_room_code() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());

        let stored = store
            .save(&code("ABC123"), "../notes/agenda.txt", b"hello")
            .await
            .unwrap();

        assert!(stored.name.starts_with("ABC123_"));
        assert!(stored.name.ends_with("_agenda.txt"));
        assert_eq!(stored.size_bytes, 5);
        assert_eq!(store.read(&stored.name).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn save_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());

        let err = store
            .save(&code("ABC123"), "payload.exe", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DisallowedExtension(ext) if ext == "exe"));
    }

    #[tokio::test]
    async fn read_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());

        assert!(matches!(
            store.read("../etc/passwd").await,
            Err(StoreError::InvalidFileName(_))
        ));
    }

    #[tokio::test]
    async fn purge_only_touches_prefix_and_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());

        let a = store.save(&code("ABC123"), "a.txt", b"a").await.unwrap();
        let b = store.save(&code("ABC123"), "b.png", b"b").await.unwrap();
        let other = store.save(&code("XYZ789"), "c.txt", b"c").await.unwrap();
        // A directory cannot be removed with remove_file, so it fails on its own
        std::fs::create_dir(dir.path().join("ABC123_stuck")).unwrap();

        let report = store.delete_all_with_prefix("ABC123_").await.unwrap();

        let mut deleted = report.deleted.clone();
        deleted.sort();
        let mut expected = vec![a.name.clone(), b.name.clone()];
        expected.sort();
        assert_eq!(deleted, expected);
        assert_eq!(report.failed, vec!["ABC123_stuck".to_string()]);

        assert!(store.read(&other.name).await.is_ok());
        assert!(store.read(&a.name).await.is_err());
    }

    #[tokio::test]
    async fn purge_of_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path().join("never-created"));

        let report = store.delete_all_with_prefix("ABC123_").await.unwrap();
        assert_eq!(report, PurgeReport::default());
        assert!(store.delete_all_with_prefix("").await.is_err());
    }
}
