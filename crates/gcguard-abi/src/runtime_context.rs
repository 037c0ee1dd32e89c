//! Process-wide runtime context.
//!
//! Holds the single thread registry, the resolved check mode, and the hooks
//! through which the managed runtime answers the guard's external queries.
//! Built lazily on first use and never torn down.

use std::ffi::c_int;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use gcguard_core::{ThreadRegistry, ThreadState};
use gcguard_membrane::config::{CheckMode, check_mode};

use crate::check_abi;
use crate::guard::GuardEnvironment;
use crate::platform;

/// Returns the calling thread's raw execution state (see [`ThreadState`]).
pub type ThreadStateHook = unsafe extern "C" fn() -> c_int;

/// Returns true while the calling thread's TLS destructors are running.
pub type TlsTeardownHook = unsafe extern "C" fn() -> bool;

/// Registry, configuration and hooks shared by every ABI entrypoint.
pub struct RuntimeContext {
    registry: ThreadRegistry,
    mode: CheckMode,
    // Hook function pointers stored as usize; 0 = not installed.
    thread_state_hook: AtomicUsize,
    tls_teardown_hook: AtomicUsize,
}

impl RuntimeContext {
    #[must_use]
    pub fn new(mode: CheckMode) -> Self {
        Self {
            registry: ThreadRegistry::new(),
            mode,
            thread_state_hook: AtomicUsize::new(0),
            tls_teardown_hook: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    #[must_use]
    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    /// Install (or with `None`, remove) the thread-state query.
    pub fn install_thread_state_hook(&self, hook: Option<ThreadStateHook>) {
        let raw = hook.map_or(0, |f| f as usize);
        self.thread_state_hook.store(raw, Ordering::Release);
    }

    /// Install (or with `None`, remove) the TLS-teardown query.
    pub fn install_tls_teardown_hook(&self, hook: Option<TlsTeardownHook>) {
        let raw = hook.map_or(0, |f| f as usize);
        self.tls_teardown_hook.store(raw, Ordering::Release);
    }

    fn thread_state_hook(&self) -> Option<ThreadStateHook> {
        let raw = self.thread_state_hook.load(Ordering::Acquire);
        // SAFETY: non-zero values were stored from a ThreadStateHook.
        (raw != 0).then(|| unsafe { std::mem::transmute::<usize, ThreadStateHook>(raw) })
    }

    fn tls_teardown_hook(&self) -> Option<TlsTeardownHook> {
        let raw = self.tls_teardown_hook.load(Ordering::Acquire);
        // SAFETY: non-zero values were stored from a TlsTeardownHook.
        (raw != 0).then(|| unsafe { std::mem::transmute::<usize, TlsTeardownHook>(raw) })
    }
}

impl GuardEnvironment for RuntimeContext {
    fn is_thread_local_teardown_running(&self) -> bool {
        match self.tls_teardown_hook() {
            // SAFETY: installed hooks are valid for the process lifetime.
            Some(hook) => unsafe { hook() },
            None => check_abi::thread_context_unavailable(),
        }
    }

    fn is_current_thread_registered(&self) -> bool {
        self.registry.is_current_thread_registered()
    }

    /// Without a state hook nothing can be asserted, so the thread counts as native.
    fn thread_state(&self) -> ThreadState {
        match self.thread_state_hook() {
            // SAFETY: installed hooks are valid for the process lifetime.
            Some(hook) => ThreadState::from_raw(unsafe { hook() }),
            None => ThreadState::Native,
        }
    }

    fn resolve_symbol(&self, addr: usize) -> Option<String> {
        platform::address_to_symbol(addr)
    }
}

/// Global runtime context.
pub fn runtime() -> &'static RuntimeContext {
    static CONTEXT: OnceLock<RuntimeContext> = OnceLock::new();
    CONTEXT.get_or_init(|| RuntimeContext::new(check_mode()))
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn always_runnable() -> c_int {
        ThreadState::Runnable.as_raw()
    }

    unsafe extern "C" fn always_tearing_down() -> bool {
        true
    }

    #[test]
    fn default_state_is_native() {
        let ctx = RuntimeContext::new(CheckMode::Strict);
        assert_eq!(ctx.thread_state(), ThreadState::Native);
    }

    #[test]
    fn state_hook_is_consulted_and_removable() {
        let ctx = RuntimeContext::new(CheckMode::Strict);
        ctx.install_thread_state_hook(Some(always_runnable));
        assert_eq!(ctx.thread_state(), ThreadState::Runnable);
        ctx.install_thread_state_hook(None);
        assert_eq!(ctx.thread_state(), ThreadState::Native);
    }

    #[test]
    fn teardown_hook_overrides_default() {
        let ctx = RuntimeContext::new(CheckMode::Strict);
        assert!(!ctx.is_thread_local_teardown_running());
        ctx.install_tls_teardown_hook(Some(always_tearing_down));
        assert!(ctx.is_thread_local_teardown_running());
    }

    #[test]
    fn registration_flows_through_registry() {
        let ctx = RuntimeContext::new(CheckMode::Off);
        assert!(!ctx.is_current_thread_registered());
        let node = ctx
            .registry()
            .register_current_thread(platform::current_thread_identity())
            .unwrap();
        assert!(ctx.is_current_thread_registered());
        ctx.registry().unregister(&node, false);
        assert!(!ctx.is_current_thread_registered());
        assert_eq!(ctx.mode(), CheckMode::Off);
    }
}
