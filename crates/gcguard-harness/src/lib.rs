//! Self-check harness for gcguard.
//!
//! This crate provides:
//! - Structured JSONL logging for guard runs
//! - An in-process scenario suite covering every guard decision path
//! - The `gcguard-harness` CLI

#![forbid(unsafe_code)]

pub mod runner;
pub mod structured_log;

pub use runner::{HarnessError, SelfCheckReport, SelfCheckRunner};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
