// src/engine/intake.rs

//! Request intake: authenticate, resolve, and build a [`TaskSpec`].
//!
//! Every rejection here happens before any process exists, and carries the
//! caller's token so the runtime can reply immediately.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::{CredentialVerifier, ShadowFile};
use crate::config::ConfigFile;
use crate::engine::TaskSpec;
use crate::errors::CmdError;
use crate::fs::FileSystem;
use crate::protocol::CommandRequest;
use crate::resolve::ExecutableResolver;

/// A request that was turned away before scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub token: String,
    pub error: CmdError,
}

#[derive(Debug)]
pub struct Intake {
    verifier: CredentialVerifier,
    resolver: ExecutableResolver,
    env_deny: Vec<String>,
}

impl Intake {
    pub fn new(
        verifier: CredentialVerifier,
        resolver: ExecutableResolver,
        env_deny: Vec<String>,
    ) -> Self {
        Self {
            verifier,
            resolver,
            env_deny,
        }
    }

    /// Production wiring: shadow file + search path from config.
    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Self {
        let store = ShadowFile::new(cfg.auth.shadow_path.clone(), Arc::clone(&fs));
        let resolver = ExecutableResolver::from_settings(&cfg.exec, fs);
        Self::new(
            CredentialVerifier::new(store),
            resolver,
            cfg.exec.env_deny.clone(),
        )
    }

    pub fn accept(&self, request: CommandRequest) -> Result<TaskSpec, Rejection> {
        let CommandRequest {
            token,
            username,
            password,
            cmd,
            params,
            env,
        } = request;

        if !self
            .verifier
            .verify(username.as_deref(), password.as_deref())
        {
            debug!(token = %token, user = ?username, "authentication failed");
            return Err(Rejection {
                token,
                error: CmdError::PermissionDenied,
            });
        }

        let program = match cmd.as_deref().and_then(|c| self.resolver.resolve(c)) {
            Some(path) => path,
            None => {
                debug!(token = %token, cmd = ?cmd, "command not found on search path");
                return Err(Rejection {
                    token,
                    error: CmdError::NotFound,
                });
            }
        };

        let env = self.filter_env(&token, env);

        Ok(TaskSpec {
            token,
            program,
            args: params,
            env,
        })
    }

    fn filter_env(&self, token: &str, env: Vec<(String, String)>) -> Vec<(String, String)> {
        if self.env_deny.is_empty() {
            return env;
        }

        env.into_iter()
            .filter(|(key, _)| {
                let denied = self.env_deny.iter().any(|d| d == key);
                if denied {
                    warn!(token = %token, var = %key, "ignoring denied environment override");
                }
                !denied
            })
            .collect()
    }
}
