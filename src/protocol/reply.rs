// src/protocol/reply.rs

//! Outbound message encoding.
//!
//! Error reply:
//! `{"type":"cmd","token":T,"attrs":{"err":CODE,"msg":MSG}}`
//!
//! Completion reply:
//! `{"type":"cmd","token":T,"attrs":{"code":N,"stdout":B64,"stderr":B64}}`
//!
//! Completion replies are sized before anything is written. A reply that
//! would exceed the configured ceiling, or whose buffer cannot be allocated,
//! becomes an error reply instead; a partial message is never produced.

use base64::display::Base64Display;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};

use super::MSG_TYPE;
use crate::errors::CmdError;

/// Fixed JSON envelope around a completion reply, with room for the exit code.
const COMPLETION_OVERHEAD: usize = 128;

#[derive(Serialize)]
struct Envelope<'a, A> {
    #[serde(rename = "type")]
    kind: &'static str,
    token: &'a str,
    attrs: A,
}

#[derive(Serialize)]
struct ErrorAttrs {
    err: i32,
    msg: &'static str,
}

#[derive(Serialize)]
struct CompletionAttrs<'a> {
    code: i32,
    stdout: Base64Field<'a>,
    stderr: Base64Field<'a>,
}

/// Serializes raw bytes as a base64 string without an intermediate `String`.
struct Base64Field<'a>(&'a [u8]);

impl Serialize for Base64Field<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&Base64Display::new(self.0, &STANDARD))
    }
}

/// Encode an error reply for `token`.
pub fn encode_error(token: &str, err: CmdError) -> String {
    let envelope = Envelope {
        kind: MSG_TYPE,
        token,
        attrs: ErrorAttrs {
            err: err.code(),
            msg: err.message(),
        },
    };
    // Only strings and integers are serialized here.
    serde_json::to_string(&envelope).unwrap_or_default()
}

/// Encode a completion reply carrying the exit code and both captured
/// streams.
pub fn encode_completion(
    token: &str,
    code: i32,
    stdout: &[u8],
    stderr: &[u8],
    max_bytes: usize,
) -> Result<String, CmdError> {
    let needed = completion_size_bound(token, stdout.len(), stderr.len());
    if needed > max_bytes {
        return Err(CmdError::ResponseTooLarge);
    }

    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(needed)
        .map_err(|_| CmdError::OutOfMemory)?;

    let envelope = Envelope {
        kind: MSG_TYPE,
        token,
        attrs: CompletionAttrs {
            code,
            stdout: Base64Field(stdout),
            stderr: Base64Field(stderr),
        },
    };
    serde_json::to_writer(&mut buf, &envelope).map_err(|_| CmdError::SystemError)?;

    String::from_utf8(buf).map_err(|_| CmdError::SystemError)
}

/// Upper bound on the encoded size of a completion reply.
///
/// Tokens are counted at six bytes per input byte, the worst case for JSON
/// escaping (`\u00XX`).
pub fn completion_size_bound(token: &str, stdout_len: usize, stderr_len: usize) -> usize {
    base64_len(stdout_len)
        .saturating_add(base64_len(stderr_len))
        .saturating_add(token.len().saturating_mul(6))
        .saturating_add(COMPLETION_OVERHEAD)
}

fn base64_len(n: usize) -> usize {
    n.div_ceil(3).saturating_mul(4)
}
