// src/auth/shadow.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use super::CredentialStore;
use crate::fs::FileSystem;

/// Credential store backed by a shadow(5)-format file.
///
/// Each line is `name:hash:lastchg:...`; only the first two fields are read.
/// The file is re-read on every lookup so password changes take effect
/// without restarting the agent.
#[derive(Debug, Clone)]
pub struct ShadowFile {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl ShadowFile {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }
}

impl CredentialStore for ShadowFile {
    fn lookup(&self, username: &str) -> Result<Option<String>> {
        let contents = self.fs.read_to_string(&self.path)?;
        Ok(find_hash(&contents, username))
    }
}

fn find_hash(contents: &str, username: &str) -> Option<String> {
    contents
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .find_map(|line| {
            let mut fields = line.splitn(3, ':');
            let name = fields.next()?;
            if name != username {
                return None;
            }
            Some(fields.next().unwrap_or("").to_string())
        })
}
