// src/auth/mod.rs

//! Credential verification for command requests.
//!
//! [`CredentialVerifier`] answers one question: does this username/password
//! pair match the local credential store? It fails closed on every path
//! (empty username, unknown user, locked account, unreadable store).

pub mod shadow;

use std::fmt::Debug;

use anyhow::Result;
use tracing::{debug, warn};

pub use shadow::ShadowFile;

/// Source of stored password hashes.
pub trait CredentialStore: Send + Sync + Debug {
    /// Return the stored crypt(3)-style hash for `username`, or `None` if the
    /// user has no entry.
    fn lookup(&self, username: &str) -> Result<Option<String>>;
}

#[derive(Debug)]
pub struct CredentialVerifier {
    store: Box<dyn CredentialStore>,
}

impl CredentialVerifier {
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Check `password` against the stored hash for `username`.
    ///
    /// An absent password is treated as the empty string.
    pub fn verify(&self, username: Option<&str>, password: Option<&str>) -> bool {
        let username = match username {
            Some(u) if !u.is_empty() => u,
            _ => return false,
        };

        let stored = match self.store.lookup(username) {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                debug!(user = %username, "no credential entry for user");
                return false;
            }
            Err(e) => {
                warn!(user = %username, error = %e, "credential store lookup failed");
                return false;
            }
        };

        if !hash_is_usable(&stored) {
            debug!(user = %username, "account is locked or has no password hash");
            return false;
        }

        pwhash::unix::verify(password.unwrap_or(""), &stored)
    }
}

/// Locked (`!`, `!!`, `*`) or empty hash fields never authenticate.
fn hash_is_usable(hash: &str) -> bool {
    !(hash.is_empty() || hash.starts_with('!') || hash.starts_with('*'))
}
