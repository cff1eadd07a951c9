// src/resolve.rs

//! Executable lookup.
//!
//! Mirrors the classic `execvp` search: a name that already points at a
//! regular file is used as-is, otherwise each directory of the search path is
//! tried in order.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::trace;

use crate::config::ExecSettings;
use crate::fs::FileSystem;

/// Used when neither the config nor the agent's `PATH` names a search path.
pub const DEFAULT_SEARCH_PATH: &str = "/bin:/usr/bin:/sbin:/usr/sbin";

#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    search_path: String,
    fs: Arc<dyn FileSystem>,
}

impl ExecutableResolver {
    pub fn new(search_path: impl Into<String>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            search_path: search_path.into(),
            fs,
        }
    }

    /// Search path precedence: `[exec].search_path`, then `PATH`, then
    /// [`DEFAULT_SEARCH_PATH`].
    pub fn from_settings(settings: &ExecSettings, fs: Arc<dyn FileSystem>) -> Self {
        let search_path = settings
            .search_path
            .clone()
            .or_else(|| std::env::var("PATH").ok())
            .unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string());
        Self::new(search_path, fs)
    }

    pub fn search_path(&self) -> &str {
        &self.search_path
    }

    /// Resolve `name` to a regular file, or `None` if nothing matches.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        let direct = PathBuf::from(name);
        if self.fs.is_file(&direct) {
            return Some(direct);
        }

        for dir in self.search_path.split(':').filter(|d| !d.is_empty()) {
            let candidate = PathBuf::from(dir).join(name);
            trace!(candidate = %candidate.display(), "probing executable candidate");
            if self.fs.is_file(&candidate) {
                return Some(candidate);
            }
        }

        None
    }
}
