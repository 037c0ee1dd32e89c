//! Atomic counters for guard observability.
//!
//! The guard runs in front of every foreign call, so counters are sharded:
//! each thread increments its own cache-line-aligned shard and readers sum
//! all shards. Threads beyond the shard count share shards round-robin.
//!
//! All counters use relaxed ordering; they are diagnostic only.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const SHARD_COUNT: usize = 16;
const COUNTER_COUNT: usize = 14;
const UNASSIGNED: usize = usize::MAX;

/// One counter per guard exit path plus oracle outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Counter {
    /// Guard invocations that reached the first check.
    Checks,
    /// Accepted: callee was the nil-message-send sentinel.
    NilSentinel,
    /// Accepted: caller was the TLS-teardown query or teardown was running.
    TlsTeardown,
    /// Accepted: guard re-entered on the same thread.
    Reentrant,
    /// Accepted: calling thread not registered.
    Unregistered,
    /// Accepted: thread already in the native state.
    NativeState,
    /// Prefix probes that found the managed marker.
    PrefixHits,
    /// Prefix probes that read a different value.
    PrefixMisses,
    /// Prefix probes whose source address could not be read.
    ProbeUnreadable,
    /// Callee names recovered from the callee address.
    SymbolsResolved,
    /// Callee names that could not be recovered.
    SymbolsUnresolved,
    /// Allow-list lookups that matched.
    NameHits,
    /// Allow-list lookups that did not match.
    NameMisses,
    /// Foreign calls from the collectible state.
    Violations,
}

#[repr(align(64))]
struct Shard([AtomicU64; COUNTER_COUNT]);

impl Shard {
    const fn new() -> Self {
        Self([const { AtomicU64::new(0) }; COUNTER_COUNT])
    }
}

static NEXT_SHARD: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    // No destructor, so it stays readable while TLS is torn down.
    static SHARD_INDEX: Cell<usize> = const { Cell::new(UNASSIGNED) };
}

fn shard_index() -> usize {
    SHARD_INDEX
        .try_with(|slot| {
            let mut index = slot.get();
            if index == UNASSIGNED {
                index = NEXT_SHARD.fetch_add(1, Ordering::Relaxed) % SHARD_COUNT;
                slot.set(index);
            }
            index
        })
        .unwrap_or(0)
}

/// Guard counters, sharded per thread.
pub struct GuardMetrics {
    shards: [Shard; SHARD_COUNT],
}

impl GuardMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            shards: [const { Shard::new() }; SHARD_COUNT],
        }
    }

    /// Increment a counter by 1 in the calling thread's shard.
    pub fn inc(&self, counter: Counter) {
        self.shards[shard_index()].0[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value summed over all shards.
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.0[counter as usize].load(Ordering::Relaxed))
            .fold(0u64, u64::wrapping_add)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            checks: self.get(Counter::Checks),
            nil_sentinel: self.get(Counter::NilSentinel),
            tls_teardown: self.get(Counter::TlsTeardown),
            reentrant: self.get(Counter::Reentrant),
            unregistered: self.get(Counter::Unregistered),
            native_state: self.get(Counter::NativeState),
            prefix_hits: self.get(Counter::PrefixHits),
            prefix_misses: self.get(Counter::PrefixMisses),
            probe_unreadable: self.get(Counter::ProbeUnreadable),
            symbols_resolved: self.get(Counter::SymbolsResolved),
            symbols_unresolved: self.get(Counter::SymbolsUnresolved),
            name_hits: self.get(Counter::NameHits),
            name_misses: self.get(Counter::NameMisses),
            violations: self.get(Counter::Violations),
        }
    }
}

impl Default for GuardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all guard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub checks: u64,
    pub nil_sentinel: u64,
    pub tls_teardown: u64,
    pub reentrant: u64,
    pub unregistered: u64,
    pub native_state: u64,
    pub prefix_hits: u64,
    pub prefix_misses: u64,
    pub probe_unreadable: u64,
    pub symbols_resolved: u64,
    pub symbols_unresolved: u64,
    pub name_hits: u64,
    pub name_misses: u64,
    pub violations: u64,
}

static GLOBAL_METRICS: GuardMetrics = GuardMetrics::new();

/// Access the global metrics singleton.
#[must_use]
pub fn global_metrics() -> &'static GuardMetrics {
    &GLOBAL_METRICS
}
