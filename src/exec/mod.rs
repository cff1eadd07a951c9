// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the resolved commands
//! using `tokio::process::Command`, and reporting back to the runtime via
//! `RuntimeEvent`s.
//!
//! - [`task_runner`] spawns one child and supervises it: output pumps, exit
//!   or deadline, and the final task event.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
