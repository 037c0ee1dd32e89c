//! Concurrent liveness list.
//!
//! A slot arena holding reference-counted entries. Insertion claims a free
//! slot (or appends one) and stamps the entry with a fresh generation, so a
//! `SlotHandle` names exactly one entry for the process lifetime. Removal
//! retires the entry and frees its slot for reuse.
//!
//! ## Concurrency
//!
//! The slot table sits behind a `parking_lot::RwLock`. Writers hold it only
//! while splicing a slot in or out. Iterators take the read lock for one step
//! at a time, clone the `Arc` in the slot under the cursor, and release the
//! lock before yielding. Consequently:
//!
//! - an entry stays valid for as long as any iterator still holds it, even
//!   after removal;
//! - an entry removed ahead of the cursor is skipped;
//! - an entry occupies a single slot for its whole life and the cursor only
//!   moves forward, so no iteration yields the same entry twice.

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Stable name for one inserted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Slot index in the arena.
    pub index: usize,
    /// Generation stamped at insertion. Never reused.
    pub generation: u64,
}

/// An entry owned by a [`LivenessList`].
#[derive(Debug)]
pub struct Entry<T> {
    handle: SlotHandle,
    retired: AtomicBool,
    value: T,
}

impl<T> Entry<T> {
    #[must_use]
    pub fn handle(&self) -> SlotHandle {
        self.handle
    }

    #[must_use]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// True once the entry has been removed from its list.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

struct SlotTable<T> {
    slots: Vec<Option<Arc<Entry<T>>>>,
    /// Free slot indices for reuse.
    free_list: Vec<usize>,
    live: usize,
}

/// Thread-safe list supporting concurrent insert, remove and iteration.
pub struct LivenessList<T> {
    table: RwLock<SlotTable<T>>,
    next_generation: AtomicU64,
}

impl<T> LivenessList<T> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(SlotTable {
                slots: Vec::new(),
                free_list: Vec::new(),
                live: 0,
            }),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Insert `value` and return the shared entry.
    pub fn insert(&self, value: T) -> Arc<Entry<T>> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut table = self.table.write();
        let index = match table.free_list.pop() {
            Some(index) => index,
            None => {
                table.slots.push(None);
                table.slots.len() - 1
            }
        };
        let entry = Arc::new(Entry {
            handle: SlotHandle { index, generation },
            retired: AtomicBool::new(false),
            value,
        });
        table.slots[index] = Some(Arc::clone(&entry));
        table.live += 1;
        entry
    }

    /// Remove `entry` from the list.
    ///
    /// Returns `false` if the entry was not (or no longer) in this list.
    pub fn remove(&self, entry: &Entry<T>) -> bool {
        let index = entry.handle.index;
        let mut table = self.table.write();
        let owned = matches!(
            table.slots.get(index),
            Some(Some(current)) if std::ptr::eq(Arc::as_ptr(current), entry)
        );
        if !owned {
            return false;
        }
        entry.retired.store(true, Ordering::Release);
        table.slots[index] = None;
        table.free_list.push(index);
        table.live -= 1;
        true
    }

    /// Look up a live entry by handle.
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<Arc<Entry<T>>> {
        let table = self.table.read();
        match table.slots.get(handle.index) {
            Some(Some(entry)) if entry.handle.generation == handle.generation => {
                Some(Arc::clone(entry))
            }
            _ => None,
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy iteration over live entries. Each call starts a fresh walk.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: 0,
        }
    }
}

impl<T> Default for LivenessList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`LivenessList::iter`].
pub struct Iter<'a, T> {
    list: &'a LivenessList<T>,
    cursor: usize,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = Arc<Entry<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = {
                let table = self.list.table.read();
                if self.cursor >= table.slots.len() {
                    return None;
                }
                table.slots[self.cursor].clone()
            };
            self.cursor += 1;
            match candidate {
                Some(entry) if !entry.is_retired() => return Some(entry),
                _ => continue,
            }
        }
    }
}
