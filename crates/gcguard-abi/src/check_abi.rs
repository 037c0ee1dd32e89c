//! ABI surface for the call-boundary guard.
//!
//! `gcguard_check_state_at_external_call` is what the compiler emits in front
//! of every foreign call. A rejected call is fatal: one diagnostic line goes
//! to stderr and the process aborts.

use std::ffi::{c_char, c_int, c_void};
use std::fmt::Display;
use std::io::Write;

use crate::guard::{CallSite, ThreadContext, check_call};
use crate::probe::PipeProbe;
use crate::runtime_context::{ThreadStateHook, TlsTeardownHook, runtime};
use crate::util::{c_str_lossy, optional_c_str};

thread_local! {
    static THREAD_CONTEXT: ThreadContext<PipeProbe> = const { ThreadContext::new() };
}

/// True when the guard's own thread-local state can no longer be reached,
/// i.e. the calling thread is past its TLS destructors.
pub(crate) fn thread_context_unavailable() -> bool {
    THREAD_CONTEXT.try_with(|_| ()).is_err()
}

/// Write `gcguard: fatal: <msg>` to stderr and abort.
pub fn fatal(msg: &dyn Display) -> ! {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "gcguard: fatal: {msg}");
    let _ = stderr.flush();
    std::process::abort()
}

abi_fn! {
    /// Check that the calling thread may call `callee_ptr` from `caller`.
    ///
    /// `caller` and `callee` are NUL-terminated names; `callee` may be null or
    /// empty when the compiler does not know the target statically. Returns
    /// only if the call is allowed.
    fn gcguard_check_state_at_external_call(
        caller: *const c_char,
        callee: *const c_char,
        callee_ptr: *const c_void,
    ) {
        let ctx = runtime();
        if !ctx.mode().checks_enabled() {
            return;
        }
        let caller = c_str_lossy(caller);
        let callee = optional_c_str(callee);
        let site = CallSite {
            caller: &caller,
            callee: callee.as_deref(),
            callee_ptr: callee_ptr as usize,
        };
        if let Err(err) = check_call(ctx, &THREAD_CONTEXT, &site) {
            fatal(&err);
        }
    }
}

abi_fn! {
    /// Whether the calling thread is running its TLS destructors.
    ///
    /// Calls made from inside this function are accepted by name, so it must
    /// stay exported under exactly this symbol.
    fn gcguard_is_thread_local_teardown_running() -> bool {
        use crate::guard::GuardEnvironment;
        runtime().is_thread_local_teardown_running()
    }
}

abi_fn! {
    /// Install the runtime's thread-state query; null removes it.
    fn gcguard_install_thread_state_hook(hook: Option<ThreadStateHook>) {
        runtime().install_thread_state_hook(hook);
    }
}

abi_fn! {
    /// Install the runtime's TLS-teardown query; null removes it.
    fn gcguard_install_tls_teardown_hook(hook: Option<TlsTeardownHook>) {
        runtime().install_tls_teardown_hook(hook);
    }
}

abi_fn! {
    /// Non-zero when checks are active (`GCGUARD_MODE` is not `off`).
    fn gcguard_checks_enabled() -> c_int {
        c_int::from(runtime().mode().checks_enabled())
    }
}

abi_fn! {
    /// Drop the calling thread's probe pipe, if one is open.
    ///
    /// The runtime calls this when a thread detaches; a later check on the
    /// same thread reopens it.
    fn gcguard_close_thread_probe() {
        let _ = THREAD_CONTEXT.try_with(|ctx| ctx.with_oracle(|oracle| oracle.close_probe()));
    }
}
