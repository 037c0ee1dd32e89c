//! Thread-liveness registry.
//!
//! One [`ThreadRecord`] per registered thread, kept in a [`LivenessList`] the
//! collector walks to enumerate live threads. Each registering thread also
//! caches its own node in thread-local storage so the registration query on
//! the guard fast path never touches the shared list.
//!
//! A thread may be registered with several registries at once. The cache holds
//! one node per registry, keyed by the registry's id.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use thiserror::Error;

use crate::liveness::{Entry, Iter, LivenessList};

/// Platform identity of a thread (`pthread_t` widened to 64 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadIdentity(pub u64);

/// Per-thread bookkeeping entry.
#[derive(Debug)]
pub struct ThreadRecord {
    identity: ThreadIdentity,
    /// Opaque managed execution context, owned by the runtime.
    context: AtomicUsize,
}

impl ThreadRecord {
    #[must_use]
    pub fn new(identity: ThreadIdentity) -> Self {
        Self {
            identity,
            context: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn identity(&self) -> ThreadIdentity {
        self.identity
    }

    /// Managed context word published by the runtime (0 when unset).
    #[must_use]
    pub fn context(&self) -> usize {
        self.context.load(Ordering::Acquire)
    }

    pub fn set_context(&self, context: usize) {
        self.context.store(context, Ordering::Release);
    }
}

/// Shared handle to a registered thread's record.
pub type ThreadNode = Arc<Entry<ThreadRecord>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("thread {0:#x} already had some data assigned to it")]
    AlreadyRegistered(u64),
    #[error("current thread is not registered")]
    NotRegistered,
    #[error("thread-local storage is no longer available on this thread")]
    ThreadLocalUnavailable,
}

struct CachedNode {
    registry: u64,
    node: ThreadNode,
}

impl CachedNode {
    fn is_live_in(&self, registry: u64) -> bool {
        self.registry == registry && !self.node.is_retired()
    }
}

thread_local! {
    static CURRENT_NODES: RefCell<Vec<CachedNode>> = const { RefCell::new(Vec::new()) };
}

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Registry of live managed threads.
pub struct ThreadRegistry {
    id: u64,
    list: LivenessList<ThreadRecord>,
}

impl ThreadRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            list: LivenessList::new(),
        }
    }

    /// Register the calling thread and cache its node.
    ///
    /// Fails if the thread already holds a live node in this registry, or if
    /// its thread-local storage has been torn down (no record is kept then).
    pub fn register_current_thread(
        &self,
        identity: ThreadIdentity,
    ) -> Result<ThreadNode, RegistryError> {
        if self.is_current_thread_registered() {
            return Err(RegistryError::AlreadyRegistered(identity.0));
        }
        let node = self.list.insert(ThreadRecord::new(identity));
        let cached = CachedNode {
            registry: self.id,
            node: Arc::clone(&node),
        };
        let stored = CURRENT_NODES.try_with(|slot| {
            let Ok(mut nodes) = slot.try_borrow_mut() else {
                return false;
            };
            nodes.retain(|c| !c.node.is_retired() && c.registry != self.id);
            nodes.push(cached);
            true
        });
        if !matches!(stored, Ok(true)) {
            self.list.remove(&node);
            return Err(RegistryError::ThreadLocalUnavailable);
        }
        Ok(node)
    }

    /// Remove `node` from the registry.
    ///
    /// The cached node is cleared only when `on_main_thread` is set. Other
    /// threads unregister from TLS destructors where writing TLS is unsafe;
    /// their stale cache is recognised through the retired flag instead.
    pub fn unregister(&self, node: &ThreadNode, on_main_thread: bool) {
        self.list.remove(node);
        if on_main_thread {
            let _ = CURRENT_NODES.try_with(|slot| {
                if let Ok(mut nodes) = slot.try_borrow_mut() {
                    nodes.retain(|c| !Arc::ptr_eq(&c.node, node));
                }
            });
        }
    }

    /// Whether the calling thread holds a live node in this registry.
    #[must_use]
    pub fn is_current_thread_registered(&self) -> bool {
        CURRENT_NODES
            .try_with(|slot| {
                slot.try_borrow()
                    .is_ok_and(|nodes| nodes.iter().any(|c| c.is_live_in(self.id)))
            })
            .unwrap_or(false)
    }

    /// The calling thread's node.
    pub fn current_thread_record(&self) -> Result<ThreadNode, RegistryError> {
        CURRENT_NODES
            .try_with(|slot| {
                slot.try_borrow().ok().and_then(|nodes| {
                    nodes
                        .iter()
                        .find(|c| c.is_live_in(self.id))
                        .map(|c| Arc::clone(&c.node))
                })
            })
            .ok()
            .flatten()
            .ok_or(RegistryError::NotRegistered)
    }

    /// Lazily walk every registered thread.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, ThreadRecord> {
        self.list.iter()
    }

    /// Number of registered threads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadRegistry {
    /// Retire every remaining record so per-thread caches drop them on the
    /// next registration.
    fn drop(&mut self) {
        let remaining: Vec<_> = self.list.iter().collect();
        for node in remaining {
            self.list.remove(&node);
        }
    }
}
