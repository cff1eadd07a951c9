// src/errors.rs

//! Crate-wide error types.
//!
//! - [`RcmdError`] covers everything that can stop the agent itself
//!   (bad config, broken transport, IO).
//! - [`CmdError`] is the wire-level taxonomy reported back to a caller in an
//!   error reply. It never aborts the agent.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RcmdError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RcmdError>;

/// Error codes carried in the `err` field of an error reply.
///
/// The numeric values and messages are part of the wire contract.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdError {
    #[error("operation not permitted")]
    PermissionDenied,

    #[error("not found")]
    NotFound,

    #[error("no mem")]
    OutOfMemory,

    #[error("sys error")]
    SystemError,

    #[error("stdout+stderr is too big")]
    ResponseTooLarge,

    #[error("too many pending commands")]
    Overloaded,

    #[error("timeout")]
    TimedOut,
}

impl CmdError {
    pub fn code(self) -> i32 {
        match self {
            CmdError::PermissionDenied => 1,
            CmdError::NotFound => 2,
            CmdError::OutOfMemory => 3,
            CmdError::SystemError => 4,
            CmdError::ResponseTooLarge => 5,
            CmdError::Overloaded => 6,
            CmdError::TimedOut => 7,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            CmdError::PermissionDenied => "operation not permitted",
            CmdError::NotFound => "not found",
            CmdError::OutOfMemory => "no mem",
            CmdError::SystemError => "sys error",
            CmdError::ResponseTooLarge => "stdout+stderr is too big",
            CmdError::Overloaded => "too many pending commands",
            CmdError::TimedOut => "timeout",
        }
    }
}
