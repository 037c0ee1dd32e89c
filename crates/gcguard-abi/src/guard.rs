//! Call-boundary guard.
//!
//! Decides, for one call site, whether the calling thread may invoke the
//! callee in its current execution state. Cheap early exits come first; the
//! oracle runs only for registered threads in the collectible state.
//!
//! The guard can be reached again from inside itself (the state hook or
//! symbol resolution may be instrumented code). A per-thread flag turns such
//! nested invocations into an immediate accept.

use std::cell::{Cell, RefCell};
use std::thread::LocalKey;

use gcguard_core::ThreadState;
use gcguard_membrane::metrics::{Counter, global_metrics};
use gcguard_membrane::oracle::{MemoryProbe, OracleError, SafetyOracle};
use thiserror::Error;

/// Callee pointer used for message sends to nil; such sends do nothing.
pub const NIL_MESSAGE_SENDER: usize = usize::MAX;

/// Exported name of the TLS-teardown query. The query is itself
/// instrumented, so calls made from it are accepted without any TLS access.
pub const TLS_TEARDOWN_QUERY_SYMBOL: &str = "gcguard_is_thread_local_teardown_running";

/// Placeholder when the callee name is neither supplied nor resolvable.
pub const UNKNOWN_FUNCTION: &str = "unknown function";

/// External queries the guard depends on.
pub trait GuardEnvironment {
    /// True while the calling thread's TLS destructors are running.
    fn is_thread_local_teardown_running(&self) -> bool;

    fn is_current_thread_registered(&self) -> bool;

    fn thread_state(&self) -> ThreadState;

    /// Best-effort name of the symbol at `addr`.
    fn resolve_symbol(&self, addr: usize) -> Option<String>;
}

/// One instrumented call site.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub caller: &'a str,
    /// Statically known callee name, if any.
    pub callee: Option<&'a str>,
    pub callee_ptr: usize,
}

/// Why a call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Acceptance {
    NilMessageSend,
    TeardownQuery,
    ThreadLocalTeardown,
    Reentrant,
    UnregisteredThread,
    NativeState,
    ManagedPrefix,
    AllowListed,
}

impl Acceptance {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NilMessageSend => "nil_message_send",
            Self::TeardownQuery => "teardown_query",
            Self::ThreadLocalTeardown => "thread_local_teardown",
            Self::Reentrant => "reentrant",
            Self::UnregisteredThread => "unregistered_thread",
            Self::NativeState => "native_state",
            Self::ManagedPrefix => "managed_prefix",
            Self::AllowListed => "allow_listed",
        }
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error(
        "Expected {expected} thread state at call of function {callee} by function {caller} (actual state {actual})"
    )]
    ForeignCall {
        caller: String,
        callee: String,
        expected: ThreadState,
        actual: ThreadState,
    },
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Per-thread guard state: recursion flag plus the oracle caches.
pub struct ThreadContext<P> {
    in_guard: Cell<bool>,
    oracle: RefCell<SafetyOracle<P>>,
}

impl<P: MemoryProbe> ThreadContext<P> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_guard: Cell::new(false),
            oracle: RefCell::new(SafetyOracle::new()),
        }
    }

    /// Whether a guard invocation is in progress on this thread.
    #[must_use]
    pub fn in_guard(&self) -> bool {
        self.in_guard.get()
    }

    /// Direct access to this thread's oracle.
    pub fn with_oracle<R>(&self, f: impl FnOnce(&mut SafetyOracle<P>) -> R) -> R {
        f(&mut self.oracle.borrow_mut())
    }
}

impl<P: MemoryProbe> Default for ThreadContext<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the recursion flag for its lifetime.
struct ReentrancyScope<'a>(&'a Cell<bool>);

impl<'a> ReentrancyScope<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for ReentrancyScope<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Check one call site.
///
/// `context` is only touched after the TLS-teardown checks pass.
pub fn check_call<E, P>(
    env: &E,
    context: &'static LocalKey<ThreadContext<P>>,
    site: &CallSite<'_>,
) -> Result<Acceptance, GuardError>
where
    E: GuardEnvironment,
    P: MemoryProbe + 'static,
{
    let metrics = global_metrics();
    metrics.inc(Counter::Checks);

    if site.callee_ptr == NIL_MESSAGE_SENDER {
        metrics.inc(Counter::NilSentinel);
        return Ok(Acceptance::NilMessageSend);
    }
    if site.caller == TLS_TEARDOWN_QUERY_SYMBOL {
        metrics.inc(Counter::TlsTeardown);
        return Ok(Acceptance::TeardownQuery);
    }
    if env.is_thread_local_teardown_running() {
        metrics.inc(Counter::TlsTeardown);
        return Ok(Acceptance::ThreadLocalTeardown);
    }

    context
        .try_with(|ctx| check_in_context(env, ctx, site))
        .unwrap_or_else(|_| {
            metrics.inc(Counter::TlsTeardown);
            Ok(Acceptance::ThreadLocalTeardown)
        })
}

fn check_in_context<E, P>(
    env: &E,
    ctx: &ThreadContext<P>,
    site: &CallSite<'_>,
) -> Result<Acceptance, GuardError>
where
    E: GuardEnvironment,
    P: MemoryProbe,
{
    let metrics = global_metrics();
    if ctx.in_guard.get() {
        metrics.inc(Counter::Reentrant);
        return Ok(Acceptance::Reentrant);
    }
    if !env.is_current_thread_registered() {
        metrics.inc(Counter::Unregistered);
        return Ok(Acceptance::UnregisteredThread);
    }
    let _scope = ReentrancyScope::enter(&ctx.in_guard);

    let actual = env.thread_state();
    if actual == ThreadState::Native {
        metrics.inc(Counter::NativeState);
        return Ok(Acceptance::NativeState);
    }

    if ctx.oracle.borrow_mut().is_known_by_prefix(site.callee_ptr)? {
        return Ok(Acceptance::ManagedPrefix);
    }

    let resolved;
    let callee = match site.callee {
        Some(name) => name,
        None => {
            resolved = env.resolve_symbol(site.callee_ptr);
            if resolved.is_some() {
                metrics.inc(Counter::SymbolsResolved);
            } else {
                metrics.inc(Counter::SymbolsUnresolved);
            }
            resolved.as_deref().unwrap_or(UNKNOWN_FUNCTION)
        }
    };

    if ctx.oracle.borrow_mut().is_safe_by_name(callee) {
        return Ok(Acceptance::AllowListed);
    }

    metrics.inc(Counter::Violations);
    Err(GuardError::ForeignCall {
        caller: site.caller.to_owned(),
        callee: callee.to_owned(),
        expected: ThreadState::Native,
        actual,
    })
}
