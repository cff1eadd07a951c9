// src/protocol/mod.rs

//! Wire format for command messages.
//!
//! - [`request`] extracts the recognised fields from an inbound JSON value.
//! - [`reply`] builds the two outbound message shapes.

pub mod reply;
pub mod request;

pub use reply::{encode_completion, encode_error};
pub use request::{is_command_message, CommandRequest};

/// Value of the `type` field on every command message.
pub const MSG_TYPE: &str = "cmd";
