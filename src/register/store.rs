//! Storage strategies behind the backend register.
//!
//! # Design Decisions
//! - Memory and file storage implement the same trait; the register never
//!   knows which one it holds
//! - The store deals in raw strings; parsing and normalization stay in the register
//! - File writes go to a temp file that is renamed over the target, so readers
//!   never observe a half-written address

use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Durable home of the current backend address.
pub trait AddressStore: Send + Sync + Debug {
    /// Read the stored address. `Ok(None)` when nothing was stored yet.
    fn load(&self) -> io::Result<Option<String>>;

    /// Replace the stored address.
    fn save(&self, address: &str) -> io::Result<()>;

    /// File backing this store, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Keeps nothing: the register's in-memory value is the only copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl AddressStore for MemoryStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn save(&self, _address: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Single text file holding the address, no trailing newline.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AddressStore for FileStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let trimmed = content.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, address: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(address.as_bytes())?;
            file.sync_all()
        });
        written
            .and_then(|()| fs::rename(&tmp, &self.path))
            .inspect_err(|_| {
                let _ = fs::remove_file(&tmp);
            })
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
