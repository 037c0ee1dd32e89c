//! Per-thread safety oracle for external call targets.
//!
//! Two independent checks, each backed by a lazily built per-thread cache:
//!
//! - **Prefix probe**: managed functions are emitted with
//!   [`MANAGED_PREFIX_MAGIC`] in the 8 bytes before their entry point. The
//!   bytes are fetched through a [`MemoryProbe`], which must report an
//!   unreadable address instead of faulting.
//! - **Name lookup**: exact match against a sorted copy of
//!   [`SAFE_FOREIGN_FUNCTIONS`], made on first use.
//!
//! An oracle is owned by a single thread. A probe channel shared between
//! threads would interleave the 8-byte transfers.

use thiserror::Error;

use crate::allow_list::SAFE_FOREIGN_FUNCTIONS;
use crate::metrics::{Counter, global_metrics};

/// Marker the code generator places before every managed function entry.
pub const MANAGED_PREFIX_MAGIC: u64 = 0x2FF6_8E62_079B_D1AC;

/// Width of the marker in bytes.
pub const PREFIX_LEN: usize = 8;

/// Result of copying one word through a [`MemoryProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRead {
    /// All 8 bytes were transferred.
    Word(u64),
    /// The source could not be read. Invalid addresses and unrelated channel
    /// failures are not told apart.
    Unreadable,
    /// The write side accepted the full word but the read side returned
    /// `read` bytes.
    ShortRead { read: isize },
}

/// Fault-free memory read capability.
pub trait MemoryProbe: Sized {
    /// Create the probe. Called at most once per oracle.
    fn open() -> std::io::Result<Self>;

    /// Copy the 8 bytes starting at `addr` without dereferencing `addr` in
    /// this process.
    fn read_word(&mut self, addr: usize) -> ProbeRead;
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to create pipes for checking functions: {0}")]
    ProbeSetup(#[source] std::io::Error),
    #[error("failed to read data back from pipe: got {read} of {PREFIX_LEN} bytes")]
    ShortRead { read: isize },
}

/// Per-thread oracle state.
pub struct SafetyOracle<P> {
    probe: Option<P>,
    /// Sorted allow-list snapshot; empty until first lookup.
    sorted_names: Vec<&'static str>,
}

impl<P: MemoryProbe> SafetyOracle<P> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            probe: None,
            sorted_names: Vec::new(),
        }
    }

    /// Whether `fun` is preceded by the managed-function marker.
    ///
    /// `Ok(false)` covers every inconclusive outcome. `Err` is returned only
    /// when the probe cannot be created or its channel loses bytes.
    pub fn is_known_by_prefix(&mut self, fun: usize) -> Result<bool, OracleError> {
        let metrics = global_metrics();
        let Some(prefix_addr) = fun.checked_sub(PREFIX_LEN) else {
            metrics.inc(Counter::ProbeUnreadable);
            return Ok(false);
        };
        if self.probe.is_none() {
            self.probe = Some(P::open().map_err(OracleError::ProbeSetup)?);
        }
        let Some(probe) = self.probe.as_mut() else {
            return Ok(false);
        };
        match probe.read_word(prefix_addr) {
            ProbeRead::Word(word) if word == MANAGED_PREFIX_MAGIC => {
                metrics.inc(Counter::PrefixHits);
                Ok(true)
            }
            ProbeRead::Word(_) => {
                metrics.inc(Counter::PrefixMisses);
                Ok(false)
            }
            ProbeRead::Unreadable => {
                metrics.inc(Counter::ProbeUnreadable);
                Ok(false)
            }
            ProbeRead::ShortRead { read } => Err(OracleError::ShortRead { read }),
        }
    }

    /// Whether `name` is on the allow-list.
    pub fn is_safe_by_name(&mut self, name: &str) -> bool {
        self.load_names();
        let found = self
            .sorted_names
            .binary_search_by(|candidate| (*candidate).cmp(name))
            .is_ok();
        let metrics = global_metrics();
        if found {
            metrics.inc(Counter::NameHits);
        } else {
            metrics.inc(Counter::NameMisses);
        }
        found
    }

    /// Drop the probe (closing its channel). Idempotent.
    pub fn close_probe(&mut self) {
        self.probe = None;
    }

    #[must_use]
    pub fn has_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// The sorted allow-list snapshot, built on demand.
    pub fn sorted_names(&mut self) -> &[&'static str] {
        self.load_names();
        &self.sorted_names
    }

    fn load_names(&mut self) {
        if self.sorted_names.is_empty() {
            self.sorted_names.extend_from_slice(SAFE_FOREIGN_FUNCTIONS);
            self.sorted_names.sort_unstable();
        }
    }
}

impl<P: MemoryProbe> Default for SafetyOracle<P> {
    fn default() -> Self {
        Self::new()
    }
}
