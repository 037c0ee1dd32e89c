#![cfg(unix)]
//! Prefix probing through the real pipe probe, including unmapped memory.

use std::ptr;

use gcguard_abi::PipeProbe;
use gcguard_membrane::oracle::{MANAGED_PREFIX_MAGIC, MemoryProbe, ProbeRead, SafetyOracle};

static MANAGED_FUNCTION: [u64; 2] = [MANAGED_PREFIX_MAGIC, 0xC3];
static NEAR_MISS: [u64; 2] = [MANAGED_PREFIX_MAGIC ^ 1, 0xC3];

/// One inaccessible page, unmapped on drop.
struct GuardPage {
    base: *mut libc::c_void,
    len: usize,
}

impl GuardPage {
    fn new() -> Self {
        // SAFETY: sysconf has no preconditions.
        let len = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        // SAFETY: anonymous private mapping with no access rights.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(base, libc::MAP_FAILED, "mmap should succeed");
        Self { base, len }
    }

    fn addr(&self) -> usize {
        self.base as usize
    }
}

impl Drop for GuardPage {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` describe the mapping created in `new`.
        unsafe { libc::munmap(self.base, self.len) };
    }
}

fn entry_of(words: &'static [u64; 2]) -> usize {
    ptr::addr_of!(words[1]) as usize
}

#[test]
fn exact_magic_is_recognised() {
    let mut oracle = SafetyOracle::<PipeProbe>::new();
    assert!(oracle.is_known_by_prefix(entry_of(&MANAGED_FUNCTION)).unwrap());
    assert!(oracle.has_probe());
}

#[test]
fn one_bit_off_is_not_managed() {
    let mut oracle = SafetyOracle::<PipeProbe>::new();
    assert!(!oracle.is_known_by_prefix(entry_of(&NEAR_MISS)).unwrap());
}

#[test]
fn unmapped_memory_reads_as_not_managed() {
    let page = GuardPage::new();
    let mut oracle = SafetyOracle::<PipeProbe>::new();
    // Prefix lies entirely inside the inaccessible page.
    assert!(!oracle.is_known_by_prefix(page.addr() + 64).unwrap());

    let mut probe = PipeProbe::open().unwrap();
    assert_eq!(probe.read_word(page.addr()), ProbeRead::Unreadable);
    // The failed write left nothing behind: the next read is clean.
    assert_eq!(
        probe.read_word(ptr::addr_of!(MANAGED_FUNCTION[0]) as usize),
        ProbeRead::Word(MANAGED_PREFIX_MAGIC)
    );
}

#[test]
fn probe_survives_close_and_reopen() {
    let mut oracle = SafetyOracle::<PipeProbe>::new();
    assert!(oracle.is_known_by_prefix(entry_of(&MANAGED_FUNCTION)).unwrap());
    oracle.close_probe();
    assert!(!oracle.has_probe());
    assert!(oracle.is_known_by_prefix(entry_of(&MANAGED_FUNCTION)).unwrap());
}

#[test]
fn null_and_tiny_pointers_never_fault() {
    let mut oracle = SafetyOracle::<PipeProbe>::new();
    for fun in [0usize, 1, 7, 8, 16, 4096] {
        assert!(!oracle.is_known_by_prefix(fun).unwrap());
    }
}
