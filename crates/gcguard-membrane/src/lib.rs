//! External-call safety membrane for gcguard.
//!
//! Decides whether a call target may be invoked while the calling thread is
//! still in the collectible state, without ever dereferencing a possibly
//! invalid function pointer.
//!
//! # Architecture
//!
//! - **Allow-list** (`allow_list`): static catalogue of foreign symbols that need no
//!   state transition
//! - **Safety oracle** (`oracle`): per-thread prefix probe + name lookup caches
//! - **Configuration** (`config`): runtime check mode control
//! - **Metrics** (`metrics`): per-thread sharded counters for observability

#![deny(unsafe_code)]

pub mod allow_list;
pub mod config;
pub mod metrics;
pub mod oracle;

pub use config::CheckMode;
pub use metrics::{Counter, GuardMetrics};
pub use oracle::{MANAGED_PREFIX_MAGIC, MemoryProbe, OracleError, ProbeRead, SafetyOracle};
