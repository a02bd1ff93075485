//! Backend register: the single mutable "where do we forward to" value.
//!
//! # Data Flow
//! ```text
//! POST /update_tunnel ──▶ set() ──▶ normalize + validate
//!                                   → atomic swap (ArcSwapOption)
//!                                   → store.save() (file-backed only)
//!
//! proxy request ──▶ get() ──▶ Arc<BackendAddress> snapshot for this request
//!
//! state file edited externally ──▶ watcher ──▶ reload()
//! ```
//!
//! # Design Decisions
//! - Reads are lock-free snapshots; a request keeps the address it started with
//! - Writers are serialized so the stored file always matches the last swap
//! - Memory-first durability: a failed save is reported, the new value stays live
//! - Unreadable or invalid stored contents load as "unset", never as a crash

pub mod store;
pub mod watcher;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use arc_swap::ArcSwapOption;
use thiserror::Error;
use url::Url;

use crate::config::RegisterConfig;

pub use store::{AddressStore, FileStore, MemoryStore};
pub use watcher::StateFileWatcher;

/// Errors produced by register updates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// The supplied address was rejected; the register is unchanged.
    #[error("Invalid URL format: {0}")]
    Validation(String),

    /// The address is live in memory but could not be written to storage.
    #[error("Failed to save tunnel URL: {0}")]
    Persistence(String),
}

/// Normalized absolute backend base URL (`http`/`https`, no trailing slash).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendAddress(String);

impl BackendAddress {
    /// Normalize and validate a raw address.
    pub fn parse(raw: &str) -> Result<Self, RegisterError> {
        let normalized = raw.trim().trim_end_matches('/');

        if !(normalized.starts_with("http://") || normalized.starts_with("https://")) {
            return Err(RegisterError::Validation(format!(
                "'{}' must start with http:// or https://",
                raw
            )));
        }

        let url = Url::parse(normalized)
            .map_err(|e| RegisterError::Validation(format!("'{}': {}", raw, e)))?;
        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(RegisterError::Validation(format!("'{}' has no host", raw))),
        }

        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join an inbound path (with or without leading slash) onto this base.
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BackendAddress {
    type Err = RegisterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Synchronized holder of the current backend address.
#[derive(Debug)]
pub struct BackendRegister {
    current: ArcSwapOption<BackendAddress>,
    store: Box<dyn AddressStore>,
    /// Serializes `set`/`reload` so swap order and storage order agree.
    write_lock: Mutex<()>,
}

impl BackendRegister {
    /// Register with no storage; a restart clears it.
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(MemoryStore))
    }

    /// Register backed by `store`, initialized from whatever it holds.
    pub fn with_store(store: Box<dyn AddressStore>) -> Self {
        let register = Self {
            current: ArcSwapOption::empty(),
            store,
            write_lock: Mutex::new(()),
        };
        register.reload();
        register
    }

    /// File-backed when a state file is configured, in-memory otherwise.
    pub fn from_config(config: &RegisterConfig) -> Self {
        match &config.state_file {
            Some(path) => {
                tracing::info!(path = %path.display(), "Using file-backed backend register");
                Self::with_store(Box::new(FileStore::new(path)))
            }
            None => Self::in_memory(),
        }
    }

    /// Current backend, or `None` if never set.
    pub fn get(&self) -> Option<Arc<BackendAddress>> {
        self.current.load_full()
    }

    /// Validate, swap in, then persist a new backend address.
    pub fn set(&self, raw: &str) -> Result<Arc<BackendAddress>, RegisterError> {
        let address = Arc::new(BackendAddress::parse(raw)?);

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.current.store(Some(address.clone()));

        self.store.save(address.as_str()).map_err(|e| {
            tracing::error!(error = %e, backend = %address, "Failed to persist backend address");
            RegisterError::Persistence(e.to_string())
        })?;

        tracing::info!(backend = %address, "Backend address updated");
        Ok(address)
    }

    /// Re-read the store and adopt its value. Invalid or unreadable contents clear the register.
    pub fn reload(&self) -> Option<Arc<BackendAddress>> {
        // Memory-only stores have nothing to reload from.
        if self.store.path().is_none() {
            return self.current.load_full();
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let loaded = match self.store.load() {
            Ok(Some(raw)) => match BackendAddress::parse(&raw) {
                Ok(address) => Some(Arc::new(address)),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored backend address is invalid, treating as unset");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored backend address, treating as unset");
                None
            }
        };

        let changed = self.current.load().as_deref() != loaded.as_deref();
        if changed {
            tracing::info!(
                backend = loaded.as_deref().map(BackendAddress::as_str).unwrap_or("<unset>"),
                "Backend address loaded from storage"
            );
            self.current.store(loaded.clone());
        }
        loaded
    }
}

impl Default for BackendRegister {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::Path;
    use std::thread;

    #[test]
    fn test_normalizes_trailing_slashes() {
        let addr = BackendAddress::parse("https://abc.trycloudflare.com//").unwrap();
        assert_eq!(addr.as_str(), "https://abc.trycloudflare.com");

        let with_prefix = BackendAddress::parse("http://127.0.0.1:8000/api/").unwrap();
        assert_eq!(with_prefix.as_str(), "http://127.0.0.1:8000/api");
    }

    #[test]
    fn test_rejects_other_schemes() {
        for raw in ["ftp://host", "host:8080", "", "//host", "HTTP://host", "http://"] {
            assert!(
                matches!(BackendAddress::parse(raw), Err(RegisterError::Validation(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_join_uses_single_separator() {
        let addr = BackendAddress::parse("http://b.example/base").unwrap();
        assert_eq!(addr.join("/v1/chat"), "http://b.example/base/v1/chat");
        assert_eq!(addr.join("v1"), "http://b.example/base/v1");
        assert_eq!(addr.join(""), "http://b.example/base/");
    }

    #[test]
    fn test_unset_until_first_set() {
        let register = BackendRegister::in_memory();
        assert!(register.get().is_none());

        register.set("http://a.example/").unwrap();
        assert_eq!(register.get().unwrap().as_str(), "http://a.example");
    }

    #[test]
    fn test_rejected_set_leaves_value_unchanged() {
        let register = BackendRegister::in_memory();
        register.set("http://a.example").unwrap();

        assert!(register.set("ws://b.example").is_err());
        assert_eq!(register.get().unwrap().as_str(), "http://a.example");
    }

    #[test]
    fn test_read_after_write_across_threads() {
        let register = Arc::new(BackendRegister::in_memory());

        for i in 0..50 {
            let url = format!("http://backend-{i}.example");
            register.set(&url).unwrap();

            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let register = register.clone();
                    thread::spawn(move || register.get().unwrap().as_str().to_string())
                })
                .collect();
            for reader in readers {
                assert_eq!(reader.join().unwrap(), url);
            }
        }
    }

    #[test]
    fn test_concurrent_writers_end_consistent_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnel_url.txt");
        let register = Arc::new(BackendRegister::with_store(Box::new(FileStore::new(&path))));

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let register = register.clone();
                thread::spawn(move || {
                    register.set(&format!("http://w{i}.example")).unwrap();
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let in_memory = register.get().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), in_memory.as_str());
    }

    #[test]
    fn test_file_backed_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnel_url.txt");

        let first = BackendRegister::with_store(Box::new(FileStore::new(&path)));
        first.set("https://persisted.example/").unwrap();
        drop(first);

        let second = BackendRegister::with_store(Box::new(FileStore::new(&path)));
        assert_eq!(second.get().unwrap().as_str(), "https://persisted.example");
    }

    #[test]
    fn test_corrupt_file_loads_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnel_url.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let register = BackendRegister::with_store(Box::new(FileStore::new(&path)));
        assert!(register.get().is_none());

        std::fs::write(&path, "not a url").unwrap();
        assert!(register.reload().is_none());
    }

    #[test]
    fn test_reload_picks_up_external_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnel_url.txt");
        let register = BackendRegister::with_store(Box::new(FileStore::new(&path)));
        register.set("http://old.example").unwrap();

        std::fs::write(&path, "http://new.example/").unwrap();
        register.reload();
        assert_eq!(register.get().unwrap().as_str(), "http://new.example");
    }

    #[derive(Debug)]
    struct FailingStore;

    impl AddressStore for FailingStore {
        fn load(&self) -> io::Result<Option<String>> {
            Ok(None)
        }
        fn save(&self, _address: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
        fn path(&self) -> Option<&Path> {
            Some(Path::new("/read-only/tunnel_url.txt"))
        }
    }

    #[test]
    fn test_persistence_failure_is_reported_but_value_is_live() {
        let register = BackendRegister::with_store(Box::new(FailingStore));

        let err = register.set("http://a.example").unwrap_err();
        assert!(matches!(err, RegisterError::Persistence(_)));
        assert_eq!(register.get().unwrap().as_str(), "http://a.example");
    }
}
