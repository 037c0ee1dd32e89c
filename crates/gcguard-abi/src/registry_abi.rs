//! ABI surface for the thread registry.
//!
//! Node handles are opaque `*const c_void` values. The handle returned by
//! [`gcguard_register_current_thread`] owns one reference to the node and is
//! consumed by [`gcguard_unregister_thread`]; handles passed to visitors or
//! returned by [`gcguard_current_thread_record`] are borrowed.

use std::ffi::c_void;
use std::sync::Arc;

use gcguard_core::{Entry, ThreadNode, ThreadRecord};

use crate::check_abi::fatal;
use crate::platform::{current_thread_identity, is_main_thread};
use crate::runtime_context::runtime;

/// Collector-side visitor: `(node, identity, context, user)`.
pub type ThreadVisitor = unsafe extern "C" fn(*const c_void, u64, usize, *mut c_void);

#[inline]
fn node_handle(node: &ThreadNode) -> *const c_void {
    Arc::as_ptr(node).cast()
}

/// Borrow the record behind a handle.
///
/// # Safety
///
/// `node` must be null or a handle issued by this module that is still live.
#[inline]
unsafe fn record<'a>(node: *const c_void) -> Option<&'a ThreadRecord> {
    // SAFETY: handles are `Arc::as_ptr`/`Arc::into_raw` of `Entry<ThreadRecord>`.
    unsafe { node.cast::<Entry<ThreadRecord>>().as_ref() }.map(Entry::get)
}

abi_fn! {
    /// Register the calling thread. Aborts if it is already registered.
    fn gcguard_register_current_thread() -> *const c_void {
        match runtime().registry().register_current_thread(current_thread_identity()) {
            Ok(node) => Arc::into_raw(node).cast(),
            Err(err) => fatal(&err),
        }
    }
}

abi_fn! {
    /// Unregister the thread owning `node` and release the handle.
    ///
    /// May run from the thread's TLS destructors; a null handle is ignored.
    fn gcguard_unregister_thread(node: *const c_void) {
        if node.is_null() {
            return;
        }
        // SAFETY: `node` came from gcguard_register_current_thread and is consumed here.
        let node: ThreadNode = unsafe { Arc::from_raw(node.cast::<Entry<ThreadRecord>>()) };
        runtime().registry().unregister(&node, is_main_thread());
    }
}

abi_fn! {
    /// Whether the calling thread is registered.
    fn gcguard_is_current_thread_registered() -> bool {
        runtime().registry().is_current_thread_registered()
    }
}

abi_fn! {
    /// Borrowed handle of the calling thread's node. Aborts if unregistered.
    fn gcguard_current_thread_record() -> *const c_void {
        match runtime().registry().current_thread_record() {
            Ok(node) => node_handle(&node),
            Err(err) => fatal(&err),
        }
    }
}

abi_fn! {
    /// Publish the managed context word for `node`.
    fn gcguard_thread_record_set_context(node: *const c_void, context: usize) {
        if let Some(rec) = record(node) {
            rec.set_context(context);
        }
    }
}

abi_fn! {
    /// Managed context word for `node`, or 0.
    fn gcguard_thread_record_context(node: *const c_void) -> usize {
        record(node).map_or(0, ThreadRecord::context)
    }
}

abi_fn! {
    /// Platform identity of the thread owning `node`, or 0.
    fn gcguard_thread_record_identity(node: *const c_void) -> u64 {
        record(node).map_or(0, |rec| rec.identity().0)
    }
}

abi_fn! {
    /// Number of currently registered threads.
    fn gcguard_registered_thread_count() -> usize {
        runtime().registry().len()
    }
}

abi_fn! {
    /// Call `visitor` once for every registered thread; returns the number visited.
    ///
    /// Threads may register or unregister concurrently. Each node present for
    /// the whole walk is visited exactly once.
    fn gcguard_for_each_thread(visitor: Option<ThreadVisitor>, user: *mut c_void) -> usize {
        let Some(visitor) = visitor else {
            return 0;
        };
        let mut visited = 0usize;
        for node in runtime().registry().iter() {
            let rec = node.get();
            // SAFETY: caller-supplied visitor; the handle stays live for the call.
            unsafe { visitor(node_handle(&node), rec.identity().0, rec.context(), user) };
            visited += 1;
        }
        visited
    }
}
