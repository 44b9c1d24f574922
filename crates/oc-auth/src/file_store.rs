use std::path::{Path, PathBuf};

use fs2::FileExt;
use tokio::fs;

use crate::errors::{AuthError, Result};
use crate::store::KeyValueStore;

/// File-based key-value store
///
/// Each key lives in its own file so independent entries never share a write.
/// Values are stored as plain text; confidentiality is left to filesystem
/// permissions.
///
/// # Directory Structure
/// ```text
/// ~/.local/share/orchid-client/
/// ├── lock                   # Advisory lock file
/// └── entries/
///     └── session.json       # Persisted session record
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    entries_dir: PathBuf,
    lock_file: PathBuf,
}

impl FileStore {
    /// Create a new file-based store rooted at `storage_dir`
    pub async fn new(storage_dir: impl AsRef<Path>) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let entries_dir = storage_dir.join("entries");
        let lock_file = storage_dir.join("lock");

        fs::create_dir_all(&entries_dir).await?;

        // Set secure permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            std::fs::set_permissions(&storage_dir, perms.clone())?;
            std::fs::set_permissions(&entries_dir, perms)?;
        }

        tracing::debug!("Opened file store at {}", storage_dir.display());

        Ok(Self {
            entries_dir,
            lock_file,
        })
    }

    /// Get default storage directory for the current platform
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "orchid-client").ok_or_else(|| {
            AuthError::Storage("Could not determine data directory".to_string())
        })?;

        Ok(project_dirs.data_dir().to_path_buf())
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AuthError::Storage(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.entries_dir.join(format!("{}.json", key)))
    }

    /// Acquire an exclusive lock on the storage
    fn acquire_lock(&self) -> Result<std::fs::File> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_file)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| AuthError::LockTimeout)?;

        Ok(lock_file)
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;

        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let _lock = self.acquire_lock()?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value).await?;

        // Sync to disk
        let file = std::fs::File::open(&temp_path)?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&temp_path, perms)?;
        }

        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let _lock = self.acquire_lock()?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, _temp) = create_test_store().await;

        assert!(store.get("session").await.unwrap().is_none());
        store.set("session", r#"{"a":1}"#).await.unwrap();
        assert_eq!(
            store.get("session").await.unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let (store, temp) = create_test_store().await;
        store.set("session", "persisted").await.unwrap();
        drop(store);

        let reopened = FileStore::new(temp.path()).await.unwrap();
        assert_eq!(
            reopened.get("session").await.unwrap().as_deref(),
            Some("persisted")
        );
        assert!(!temp.path().join("entries").join("session.tmp").exists());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (store, _temp) = create_test_store().await;

        store.set("session", "x").await.unwrap();
        store.remove("session").await.unwrap();
        store.remove("session").await.unwrap();
        assert!(store.get("session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (store, _temp) = create_test_store().await;

        for key in ["", "../escape", "a/b", "with space"] {
            assert!(matches!(
                store.set(key, "x").await,
                Err(AuthError::Storage(_))
            ));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_entry_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (store, temp) = create_test_store().await;
        store.set("session", "secret").await.unwrap();

        let meta = std::fs::metadata(temp.path().join("entries").join("session.json")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }
}
