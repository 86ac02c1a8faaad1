//! secrets::file_store
//!
//! File-backed secret storage, the default backend.
//!
//! # Security
//!
//! - Secrets live in `~/.docsauth/secrets.toml`
//! - The file is created with 0600 permissions on Unix
//! - Writes go to a temp file that is renamed into place
//! - Read-modify-write cycles hold an exclusive `fs2` lock on a sibling
//!   `.lock` file, so two editor windows cannot drop each other's writes
//! - Values are never logged or put in error messages

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use fs2::FileExt;

use super::traits::{SecretError, SecretStore};

/// Secret storage in a TOML table of `key = "value"` pairs.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
}

/// Holds the exclusive lock until dropped.
struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl FileSecretStore {
    /// Store at `~/.docsauth/secrets.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, SecretError> {
        let home = dirs::home_dir()
            .ok_or_else(|| SecretError::ReadError("cannot determine home directory".into()))?;
        Ok(Self {
            path: home.join(".docsauth").join("secrets.toml"),
        })
    }

    /// Store at a custom path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn ensure_parent(&self) -> Result<(), SecretError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SecretError::WriteError(format!("cannot create directory: {}", e)))?;
        }
        Ok(())
    }

    /// Block until this process holds the store's write lock.
    fn lock(&self) -> Result<StoreLock, SecretError> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| SecretError::WriteError(format!("cannot open lock file: {}", e)))?;

        if file.try_lock_exclusive().is_err() {
            tracing::debug!(path = %self.lock_path().display(), "waiting for secret store lock");
            file.lock_exclusive()
                .map_err(|e| SecretError::WriteError(format!("cannot lock secret store: {}", e)))?;
        }
        Ok(StoreLock { file })
    }

    fn read_secrets(&self) -> Result<BTreeMap<String, String>, SecretError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| SecretError::ReadError(format!("cannot read secrets file: {}", e)))?;

        toml::from_str(&content).map_err(|e| {
            // toml errors quote the offending line; keep only the location.
            let at = e
                .span()
                .map(|span| format!(" at byte {}", span.start))
                .unwrap_or_default();
            SecretError::ReadError(format!("cannot parse secrets file{}", at))
        })
    }

    fn write_secrets(&self, secrets: &BTreeMap<String, String>) -> Result<(), SecretError> {
        self.ensure_parent()?;

        let content = toml::to_string(secrets)
            .map_err(|e| SecretError::WriteError(format!("cannot serialize secrets: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| SecretError::WriteError(format!("cannot create temp file: {}", e)))?;

            #[cfg(unix)]
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| SecretError::WriteError(format!("cannot set permissions: {}", e)))?;

            file.write_all(content.as_bytes())
                .map_err(|e| SecretError::WriteError(format!("cannot write secrets: {}", e)))?;
            file.sync_all()
                .map_err(|e| SecretError::WriteError(format!("cannot sync to disk: {}", e)))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| SecretError::WriteError(format!("cannot rename temp file: {}", e)))
    }

    /// Apply `change` to the stored table under the write lock.
    fn modify(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), SecretError> {
        let _lock = self.lock()?;
        let mut secrets = self.read_secrets()?;
        if change(&mut secrets) {
            self.write_secrets(&secrets)?;
        }
        Ok(())
    }

    /// Whether the file is missing or only readable by its owner.
    #[cfg(unix)]
    pub fn verify_permissions(&self) -> Result<bool, SecretError> {
        if !self.path.exists() {
            return Ok(true);
        }
        let metadata = fs::metadata(&self.path)
            .map_err(|e| SecretError::ReadError(format!("cannot read file metadata: {}", e)))?;
        Ok(metadata.permissions().mode() & 0o777 == 0o600)
    }

    #[cfg(not(unix))]
    pub fn verify_permissions(&self) -> Result<bool, SecretError> {
        Ok(true)
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        Ok(self.read_secrets()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        tracing::debug!(key, "storing secret");
        self.modify(|secrets| {
            secrets.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn delete(&self, key: &str) -> Result<(), SecretError> {
        self.modify(|secrets| {
            let removed = secrets.remove(key).is_some();
            if removed {
                tracing::debug!(key, "deleted secret");
            }
            removed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, FileSecretStore) {
        let temp = TempDir::new().expect("create temp dir");
        let store = FileSecretStore::with_path(temp.path().join("secrets.toml"));
        (temp, store)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let (_temp, store) = create_test_store();
        assert_eq!(store.get("docs.user.prod.github").expect("get"), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn set_get_overwrite() {
        let (_temp, store) = create_test_store();

        store.set("docs.user.prod.github", "first").expect("set");
        store.set("docs.user.prod.github", "second").expect("overwrite");

        assert_eq!(
            store.get("docs.user.prod.github").expect("get"),
            Some("second".to_string())
        );
    }

    #[test]
    fn delete_is_idempotent_and_does_not_create_file() {
        let (_temp, store) = create_test_store();

        store.delete("docs.user.ppe.github").expect("delete missing");
        assert!(!store.path().exists());

        store.set("docs.user.ppe.github", "v").expect("set");
        store.delete("docs.user.ppe.github").expect("delete");
        assert_eq!(store.get("docs.user.ppe.github").expect("get"), None);
    }

    #[test]
    fn creates_parent_directory() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join(".docsauth").join("secrets.toml");
        let store = FileSecretStore::with_path(&path);

        store.set("k", "v").expect("set");
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        let (_temp, store) = create_test_store();
        assert!(store.verify_permissions().expect("verify before write"));

        store.set("k", "v").expect("set");

        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(store.verify_permissions().expect("verify after write"));
    }

    #[test]
    fn json_values_survive_toml_quoting() {
        let (_temp, store) = create_test_store();
        let record = r#"{"kind":"docsauth.user-info","user":{"userName":"a \"b\""}}"#;

        store.set("docs.user.prod.github", record).expect("set");
        assert_eq!(
            store.get("docs.user.prod.github").expect("get"),
            Some(record.to_string())
        );
    }

    #[test]
    fn parse_errors_do_not_echo_content() {
        let (_temp, store) = create_test_store();
        fs::write(store.path(), "leaked-secret = [unclosed").expect("write bad toml");

        let err = store.get("k").unwrap_err().to_string();
        assert!(err.contains("cannot parse"));
        assert!(!err.contains("leaked-secret"));
    }

    #[test]
    fn concurrent_writers_keep_every_key() {
        let (_temp, store) = create_test_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let path = store.path().to_path_buf();
                    // A separate instance per thread, like separate processes.
                    FileSecretStore::with_path(path)
                        .set(&format!("key.{}", i), "v")
                        .expect("set");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        for i in 0..8 {
            assert!(store.get(&format!("key.{}", i)).expect("get").is_some());
        }
    }
}
