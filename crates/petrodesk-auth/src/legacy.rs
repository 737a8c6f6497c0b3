//! Storage for credentials left behind by the pre-cookie auth scheme.
//!
//! Older clients kept a bearer token (and maybe a refresh token) in local
//! storage. [`AuthSession::initialize`](crate::AuthSession::initialize)
//! trades them once for cookies and then clears the store, whatever the
//! outcome.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use petrodesk_protocol::{Codec, JsonCodec, LegacyCredentials};
use tracing::{debug, warn};

/// Where legacy credentials are read from and cleared.
///
/// Both methods are called from async code (`initialize`, `login`,
/// `logout`) and run inline on the executor, so they must return quickly.
pub trait LegacyCredentialStore: Send + Sync + 'static {
    /// The stored credentials, if any. A corrupt entry reads as `None`.
    fn load(&self) -> Option<LegacyCredentials>;

    /// Removes any stored credentials. Idempotent.
    fn clear(&self);
}

/// A store that never has anything. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLegacyStore;

impl LegacyCredentialStore for NoLegacyStore {
    fn load(&self) -> Option<LegacyCredentials> {
        None
    }

    fn clear(&self) {}
}

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryLegacyStore {
    credentials: Mutex<Option<LegacyCredentials>>,
}

impl MemoryLegacyStore {
    pub fn new(credentials: Option<LegacyCredentials>) -> Self {
        Self {
            credentials: Mutex::new(credentials),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<LegacyCredentials>> {
        self.credentials
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LegacyCredentialStore for MemoryLegacyStore {
    fn load(&self) -> Option<LegacyCredentials> {
        self.lock().clone()
    }

    fn clear(&self) {
        self.lock().take();
    }
}

/// A store backed by a JSON file (`{"token": "...", "refreshToken": "..."}`),
/// the format desktop builds of the old client wrote.
///
/// The file is a few hundred bytes and uses blocking `std::fs` calls.
/// Once the store has seen the file missing or removed it, later calls
/// answer from memory, so only the first `initialize` touches the disk.
#[derive(Debug)]
pub struct JsonFileLegacyStore {
    path: PathBuf,
    gone: AtomicBool,
}

impl JsonFileLegacyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gone: AtomicBool::new(false),
        }
    }
}

impl LegacyCredentialStore for JsonFileLegacyStore {
    fn load(&self) -> Option<LegacyCredentials> {
        if self.gone.load(Ordering::Acquire) {
            return None;
        }
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.gone.store(true, Ordering::Release);
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read legacy credentials");
                return None;
            }
        };
        match JsonCodec.decode::<LegacyCredentials>(&bytes) {
            Ok(creds) if !creds.token.is_empty() => Some(creds),
            Ok(_) => None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring corrupt legacy credentials");
                None
            }
        }
    }

    fn clear(&self) {
        if self.gone.load(Ordering::Acquire) {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "legacy credentials removed");
                self.gone.store(true, Ordering::Release);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.gone.store(true, Ordering::Release);
            }
            Err(e) => warn!(path = %self.path.display(), error = %e, "cannot remove legacy credentials"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("petrodesk-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn test_memory_store_clear_empties() {
        let store = MemoryLegacyStore::new(Some(LegacyCredentials {
            token: "old".into(),
            refresh_token: None,
        }));
        assert!(store.load().is_some());
        store.clear();
        assert!(store.is_empty());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_load_then_clear_removes_file() {
        let path = temp_path("roundtrip");
        std::fs::write(&path, br#"{"token":"abc","refreshToken":"def"}"#).unwrap();
        let store = JsonFileLegacyStore::new(&path);

        let creds = store.load().expect("credentials should load");
        assert_eq!(creds.token, "abc");
        assert_eq!(creds.refresh_token.as_deref(), Some("def"));

        store.clear();
        assert!(!path.exists());
        store.clear();
    }

    #[test]
    fn test_file_store_corrupt_file_reads_as_none() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"not json").unwrap();
        let store = JsonFileLegacyStore::new(&path);

        assert!(store.load().is_none());
        store.clear();
    }

    #[test]
    fn test_file_store_missing_file_reads_as_none() {
        let store = JsonFileLegacyStore::new(temp_path("missing"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_skips_disk_once_file_is_gone() {
        let path = temp_path("gone");
        std::fs::write(&path, br#"{"token":"abc"}"#).unwrap();
        let store = JsonFileLegacyStore::new(&path);
        assert!(store.load().is_some());
        store.clear();
        assert!(!path.exists());

        // A file appearing later is not re-read or removed by this store.
        std::fs::write(&path, br#"{"token":"new"}"#).unwrap();
        assert!(store.load().is_none());
        store.clear();
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_store_failed_remove_keeps_trying() {
        // A directory can't be removed with remove_file.
        let path = temp_path("dir");
        std::fs::create_dir_all(&path).unwrap();
        let store = JsonFileLegacyStore::new(&path);

        store.clear();
        assert!(!store.gone.load(Ordering::Acquire));
        std::fs::remove_dir(&path).unwrap();
        store.clear();
        assert!(store.gone.load(Ordering::Acquire));
    }
}
