use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Prefix under which stored assets are addressed in record content.
const ASSET_PREFIX: &str = "/uploads/";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("only audio uploads are accepted")]
    UnsupportedMediaType,
    #[error("upload exceeds the {0}-byte limit")]
    TooLarge(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// On-disk storage for uploaded audio clips.
///
/// Assets live in a flat directory under generated names and are addressed
/// by the server-relative path `/uploads/{name}`. Each asset is owned by
/// the single test record that references it; whoever breaks the reference
/// removes the file in the same operation.
pub struct AudioStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl AudioStore {
    pub async fn new(dir: PathBuf, max_bytes: usize) -> std::io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Audio storage directory: {}", dir.display());
        Ok(Self { dir, max_bytes })
    }

    /// Persist an uploaded blob and return its server-relative path.
    ///
    /// The declared content type must be an audio kind and the blob must
    /// fit the configured ceiling. The generated name keeps the original
    /// extension so clients can sniff the format from the path.
    pub async fn store(
        &self,
        bytes: &[u8],
        content_type: Option<&str>,
        original_name: &str,
    ) -> Result<String, StorageError> {
        if !content_type.is_some_and(|ct| ct.starts_with("audio/")) {
            return Err(StorageError::UnsupportedMediaType);
        }
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge(self.max_bytes));
        }

        let name = unique_name(original_name);
        fs::write(self.dir.join(&name), bytes).await?;
        info!("Stored audio asset {} ({} bytes)", name, bytes.len());

        Ok(format!("{ASSET_PREFIX}{name}"))
    }

    /// Store a replacement blob, then drop the old asset if there was one.
    /// The old file's removal is advisory — the new path is already
    /// committed by the time cleanup runs.
    pub async fn replace(
        &self,
        old: Option<&str>,
        bytes: &[u8],
        content_type: Option<&str>,
        original_name: &str,
    ) -> Result<String, StorageError> {
        let new_path = self.store(bytes, content_type, original_name).await?;
        if let Some(old) = old {
            self.remove(old).await;
        }
        Ok(new_path)
    }

    /// Best-effort delete. A missing file or an I/O failure is logged and
    /// swallowed — asset cleanup never fails the enclosing record
    /// mutation.
    pub async fn remove(&self, asset_path: &str) {
        let Some(file) = self.disk_path(asset_path) else {
            warn!("Refusing to remove asset outside the audio dir: {asset_path}");
            return;
        };

        match fs::remove_file(&file).await {
            Ok(()) => info!("Deleted audio asset {asset_path}"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Audio asset {asset_path} already gone");
            }
            Err(e) => warn!("Failed to delete audio asset {asset_path}: {e}"),
        }
    }

    /// Resolve a server-relative asset path to its on-disk location.
    /// Returns `None` for anything that does not name a plain file inside
    /// the audio directory.
    pub fn disk_path(&self, asset_path: &str) -> Option<PathBuf> {
        let name = asset_path.strip_prefix(ASSET_PREFIX)?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(self.dir.join(name))
    }
}

/// `audiofile-{unix millis}-{random}` plus the original extension.
fn unique_name(original_name: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::random();
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("audiofile-{millis}-{suffix}{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch_store() -> AudioStore {
        let dir = std::env::temp_dir().join(format!("quizbank-audio-{}", rand::random::<u32>()));
        AudioStore::new(dir, DEFAULT_MAX_UPLOAD_BYTES).await.unwrap()
    }

    #[tokio::test]
    async fn store_writes_and_names_asset() {
        let store = scratch_store().await;
        let path = store
            .store(b"RIFFdata", Some("audio/wav"), "clip.wav")
            .await
            .unwrap();

        assert!(path.starts_with("/uploads/audiofile-"));
        assert!(path.ends_with(".wav"));

        let disk = store.disk_path(&path).unwrap();
        assert_eq!(std::fs::read(disk).unwrap(), b"RIFFdata");
    }

    #[tokio::test]
    async fn non_audio_content_type_rejected() {
        let store = scratch_store().await;
        let err = store
            .store(b"<html>", Some("text/html"), "page.html")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedMediaType));

        let err = store.store(b"data", None, "clip.wav").await.unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedMediaType));
    }

    #[tokio::test]
    async fn oversized_blob_rejected() {
        let dir = std::env::temp_dir().join(format!("quizbank-audio-{}", rand::random::<u32>()));
        let store = AudioStore::new(dir, 16).await.unwrap();

        let err = store
            .store(&[0u8; 17], Some("audio/mpeg"), "big.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge(16)));
    }

    #[tokio::test]
    async fn replace_drops_old_asset() {
        let store = scratch_store().await;
        let old = store
            .store(b"one", Some("audio/mpeg"), "a.mp3")
            .await
            .unwrap();
        let new = store
            .replace(Some(&old), b"two", Some("audio/mpeg"), "b.mp3")
            .await
            .unwrap();

        assert!(!std::fs::exists(store.disk_path(&old).unwrap()).unwrap());
        assert!(std::fs::exists(store.disk_path(&new).unwrap()).unwrap());
    }

    #[tokio::test]
    async fn remove_is_advisory() {
        let store = scratch_store().await;
        // Missing file and junk paths are swallowed, not errors.
        store.remove("/uploads/never-stored.mp3").await;
        store.remove("/etc/passwd").await;
        store.remove("/uploads/../escape").await;
    }

    #[test]
    fn disk_path_rejects_traversal() {
        let store = AudioStore {
            dir: PathBuf::from("/srv/audio"),
            max_bytes: 1,
        };
        assert!(store.disk_path("/uploads/ok.mp3").is_some());
        assert!(store.disk_path("/uploads/").is_none());
        assert!(store.disk_path("/uploads/../../x").is_none());
        assert!(store.disk_path("/uploads/a/b").is_none());
        assert!(store.disk_path("relative.mp3").is_none());
    }
}
