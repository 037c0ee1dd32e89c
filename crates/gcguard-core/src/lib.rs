//! # gcguard-core
//!
//! Thread bookkeeping for the gcguard call-boundary checker.
//!
//! This crate holds the pieces the collector and the guard share:
//! - **Thread states** (`state`): the execution states the guard asserts on
//! - **Liveness list** (`liveness`): slot arena with concurrent insert/remove/iterate
//! - **Thread registry** (`registry`): per-thread records plus a cached self-reference
//!
//! No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod liveness;
pub mod registry;
pub mod state;

pub use liveness::{Entry, LivenessList, SlotHandle};
pub use registry::{RegistryError, ThreadIdentity, ThreadNode, ThreadRecord, ThreadRegistry};
pub use state::ThreadState;
