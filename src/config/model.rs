// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default number of commands allowed to run at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default wall-clock budget for one command.
pub const DEFAULT_TIMEOUT: &str = "30s";

/// Default ceiling for one encoded completion reply (4 MiB).
pub const DEFAULT_MAX_REPLY_BYTES: usize = 4 * 1024 * 1024;

/// Smallest accepted `max_reply_bytes`; anything lower cannot even hold the
/// fixed JSON envelope of a reply.
pub const MIN_REPLY_BYTES: usize = 1024;

/// Largest accepted per-command timeout (one week).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [exec]
/// max_concurrent = 5
/// timeout = "30s"
/// backlog_limit = 64
/// search_path = "/bin:/usr/bin"
/// max_reply_bytes = 4194304
/// reply_on_timeout = false
/// env_deny = ["LD_PRELOAD"]
///
/// [auth]
/// shadow_path = "/etc/shadow"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub exec: ExecSection,

    #[serde(default)]
    pub auth: AuthSection,
}

/// `[exec]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSection {
    /// Maximum number of child processes running at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-command timeout, e.g. `"30s"`, `"500ms"`, `"2m"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Maximum number of commands waiting for a slot. `None` means the
    /// backlog is unbounded.
    #[serde(default)]
    pub backlog_limit: Option<usize>,

    /// Colon-separated executable search path. Falls back to `PATH`, then to
    /// the standard system binary directories.
    #[serde(default)]
    pub search_path: Option<String>,

    /// Ceiling for one encoded completion reply.
    #[serde(default = "default_max_reply_bytes")]
    pub max_reply_bytes: usize,

    /// Send an explicit error reply (code 7) when a command times out.
    #[serde(default)]
    pub reply_on_timeout: bool,

    /// Environment variable names a request may not override.
    #[serde(default)]
    pub env_deny: Vec<String>,
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

fn default_max_reply_bytes() -> usize {
    DEFAULT_MAX_REPLY_BYTES
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout: default_timeout(),
            backlog_limit: None,
            search_path: None,
            max_reply_bytes: default_max_reply_bytes(),
            reply_on_timeout: false,
            env_deny: Vec::new(),
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSection {
    /// Shadow-format credential file.
    #[serde(default = "default_shadow_path")]
    pub shadow_path: PathBuf,
}

fn default_shadow_path() -> PathBuf {
    PathBuf::from("/etc/shadow")
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            shadow_path: default_shadow_path(),
        }
    }
}

/// Validated `[exec]` settings with parsed durations.
#[derive(Debug, Clone)]
pub struct ExecSettings {
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub backlog_limit: Option<usize>,
    pub search_path: Option<String>,
    pub max_reply_bytes: usize,
    pub reply_on_timeout: bool,
    pub env_deny: Vec<String>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`)
/// or [`ConfigFile::default`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub exec: ExecSettings,
    pub auth: AuthSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(exec: ExecSettings, auth: AuthSection) -> Self {
        Self { exec, auth }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            exec: ExecSettings {
                max_concurrent: DEFAULT_MAX_CONCURRENT,
                timeout: Duration::from_secs(30),
                backlog_limit: None,
                search_path: None,
                max_reply_bytes: DEFAULT_MAX_REPLY_BYTES,
                reply_on_timeout: false,
                env_deny: Vec::new(),
            },
            auth: AuthSection::default(),
        }
    }
}
