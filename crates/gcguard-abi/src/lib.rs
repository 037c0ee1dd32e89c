// All extern "C" exports accept raw pointers from generated code and the
// runtime's thread glue; their contracts are documented per module.
#![allow(clippy::missing_safety_doc)]
//! # gcguard-abi
//!
//! `extern "C"` boundary for gcguard.
//!
//! This crate produces a `cdylib` exposing the call-boundary guard that the
//! compiler inserts before every call whose target is not statically known to
//! be managed code, plus the thread-registry surface used by the runtime's
//! thread start/stop glue and by the collector.
//!
//! # Architecture
//!
//! ```text
//! generated call site -> check_abi -> guard (early exits, registry, state hook)
//!                                          -> SafetyOracle (pipe probe, allow-list)
//!                                          -> accept | abort
//! ```

#[macro_use]
mod macros;

pub mod check_abi;
pub mod guard;
pub mod platform;
pub mod probe;
pub mod registry_abi;
pub mod runtime_context;
pub mod util;

pub use guard::{Acceptance, CallSite, GuardEnvironment, GuardError, ThreadContext, check_call};
pub use probe::PipeProbe;
pub use runtime_context::{RuntimeContext, runtime};
