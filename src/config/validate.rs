// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    ConfigFile, ExecSection, ExecSettings, MAX_TIMEOUT, MIN_REPLY_BYTES, RawConfigFile,
};
use crate::errors::{RcmdError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RcmdError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let exec = validate_exec(&raw.exec)?;
        validate_auth(&raw)?;
        Ok(ConfigFile::new_unchecked(exec, raw.auth))
    }
}

fn validate_exec(section: &ExecSection) -> Result<ExecSettings> {
    if section.max_concurrent == 0 {
        return Err(RcmdError::ConfigError(
            "[exec].max_concurrent must be >= 1 (got 0)".to_string(),
        ));
    }

    let timeout = parse_duration(&section.timeout)
        .map_err(|e| RcmdError::ConfigError(format!("[exec].timeout: {e}")))?;
    if timeout.is_zero() {
        return Err(RcmdError::ConfigError(
            "[exec].timeout must be greater than zero".to_string(),
        ));
    }
    if timeout > MAX_TIMEOUT {
        return Err(RcmdError::ConfigError(format!(
            "[exec].timeout must be at most {}h (got {:?})",
            MAX_TIMEOUT.as_secs() / 3600,
            timeout
        )));
    }

    if section.backlog_limit == Some(0) {
        return Err(RcmdError::ConfigError(
            "[exec].backlog_limit must be >= 1 when set (omit it for an unbounded backlog)"
                .to_string(),
        ));
    }

    if section.max_reply_bytes < MIN_REPLY_BYTES {
        return Err(RcmdError::ConfigError(format!(
            "[exec].max_reply_bytes must be >= {MIN_REPLY_BYTES} (got {})",
            section.max_reply_bytes
        )));
    }

    if let Some(bad) = section.env_deny.iter().find(|k| k.is_empty() || k.contains('=')) {
        return Err(RcmdError::ConfigError(format!(
            "[exec].env_deny contains an invalid variable name: {bad:?}"
        )));
    }

    Ok(ExecSettings {
        max_concurrent: section.max_concurrent,
        timeout,
        backlog_limit: section.backlog_limit,
        search_path: section.search_path.clone(),
        max_reply_bytes: section.max_reply_bytes,
        reply_on_timeout: section.reply_on_timeout,
        env_deny: section.env_deny.clone(),
    })
}

fn validate_auth(cfg: &RawConfigFile) -> Result<()> {
    if cfg.auth.shadow_path.as_os_str().is_empty() {
        return Err(RcmdError::ConfigError(
            "[auth].shadow_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Parse a duration string such as `"500ms"`, `"30s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
