//! State file watcher for out-of-band backend updates.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use crate::register::BackendRegister;

/// Reloads the register whenever its state file changes on disk.
///
/// The parent directory is watched rather than the file itself, so the
/// temp-file-and-rename writes (ours or another process's) are seen.
pub struct StateFileWatcher {
    path: PathBuf,
    register: Arc<BackendRegister>,
}

impl StateFileWatcher {
    pub fn new(path: &Path, register: Arc<BackendRegister>) -> Self {
        Self {
            path: path.to_path_buf(),
            register,
        }
    }

    /// Start watching. Events stop once the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(notify::Error::io)?;

        let file_name: OsString = self.path.file_name().map(OsString::from).unwrap_or_default();
        let register = self.register.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_state_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if touches_state_file
                        && (event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove())
                    {
                        tracing::debug!(kind = ?event.kind, "State file change detected");
                        register.reload();
                    }
                }
                Err(e) => tracing::error!(error = ?e, "State file watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "State file watcher started");
        Ok(watcher)
    }
}
