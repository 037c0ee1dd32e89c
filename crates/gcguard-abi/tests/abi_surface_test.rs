#![cfg(target_os = "linux")]
//! End-to-end tests of the exported entrypoints against the global runtime.
//!
//! Only accepting paths are exercised here; rejected calls abort the process and
//! are covered by `fatal_path_test.rs` in child processes.

use std::ffi::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use gcguard_abi::check_abi::{
    gcguard_check_state_at_external_call, gcguard_close_thread_probe,
    gcguard_install_thread_state_hook, gcguard_install_tls_teardown_hook,
    gcguard_is_thread_local_teardown_running,
};
use gcguard_abi::guard::NIL_MESSAGE_SENDER;
use gcguard_abi::registry_abi::{
    gcguard_current_thread_record, gcguard_for_each_thread, gcguard_is_current_thread_registered,
    gcguard_register_current_thread, gcguard_registered_thread_count,
    gcguard_thread_record_context, gcguard_thread_record_identity,
    gcguard_thread_record_set_context, gcguard_unregister_thread,
};
use gcguard_core::ThreadState;
use gcguard_membrane::MANAGED_PREFIX_MAGIC;

static TEST_GUARD_HELD: AtomicBool = AtomicBool::new(false);

struct TestGuard;

impl Drop for TestGuard {
    fn drop(&mut self) {
        // Hooks are process-wide; never leak one into the next test.
        unsafe {
            gcguard_install_thread_state_hook(None);
            gcguard_install_tls_teardown_hook(None);
        }
        TEST_GUARD_HELD.store(false, Ordering::Release);
    }
}

fn acquire_test_guard() -> TestGuard {
    loop {
        if TEST_GUARD_HELD
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return TestGuard;
        }
        std::thread::yield_now();
    }
}

static MANAGED_FUNCTION: [u64; 2] = [MANAGED_PREFIX_MAGIC, 0xC3];

unsafe extern "C" fn runnable_state() -> c_int {
    ThreadState::Runnable.as_raw()
}

unsafe extern "C" fn teardown_running() -> bool {
    true
}

unsafe extern "C" fn collect_identity(
    node: *const c_void,
    identity: u64,
    context: usize,
    user: *mut c_void,
) {
    // SAFETY: `user` is the Vec passed by the test below.
    let seen = unsafe { &mut *user.cast::<Vec<(usize, u64, usize)>>() };
    seen.push((node as usize, identity, context));
}

fn self_identity() -> u64 {
    unsafe { libc::pthread_self() as usize as u64 }
}

#[test]
fn register_query_and_unregister() {
    let _guard = acquire_test_guard();
    unsafe {
        assert!(!gcguard_is_current_thread_registered());
        let node = gcguard_register_current_thread();
        assert!(!node.is_null());
        assert!(gcguard_is_current_thread_registered());
        assert_eq!(gcguard_current_thread_record(), node);
        assert_eq!(gcguard_thread_record_identity(node), self_identity());

        assert_eq!(gcguard_thread_record_context(node), 0);
        gcguard_thread_record_set_context(node, 0xfeed);
        assert_eq!(gcguard_thread_record_context(node), 0xfeed);

        gcguard_unregister_thread(node);
        assert!(!gcguard_is_current_thread_registered());
    }
}

#[test]
fn null_handles_are_tolerated() {
    let _guard = acquire_test_guard();
    unsafe {
        gcguard_unregister_thread(ptr::null());
        gcguard_thread_record_set_context(ptr::null(), 1);
        assert_eq!(gcguard_thread_record_context(ptr::null()), 0);
        assert_eq!(gcguard_thread_record_identity(ptr::null()), 0);
        assert_eq!(gcguard_for_each_thread(None, ptr::null_mut()), 0);
    }
}

#[test]
fn collector_walk_sees_registered_threads() {
    let _guard = acquire_test_guard();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<(usize, u64)>();
    let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
    let worker = std::thread::spawn(move || unsafe {
        let node = gcguard_register_current_thread();
        gcguard_thread_record_set_context(node, 7);
        ready_tx
            .send((node as usize, self_identity()))
            .expect("main side is listening");
        done_rx.recv().expect("main side signals completion");
        gcguard_unregister_thread(node);
    });

    let (worker_node, worker_identity) = ready_rx.recv().expect("worker registers");
    unsafe {
        let own = gcguard_register_current_thread();
        assert!(gcguard_registered_thread_count() >= 2);

        let mut seen: Vec<(usize, u64, usize)> = Vec::new();
        let visited = gcguard_for_each_thread(
            Some(collect_identity),
            ptr::addr_of_mut!(seen).cast::<c_void>(),
        );
        assert_eq!(visited, seen.len());
        assert!(seen.contains(&(worker_node, worker_identity, 7)));
        assert!(seen.contains(&(own as usize, self_identity(), 0)));

        gcguard_unregister_thread(own);
    }
    done_tx.send(()).expect("worker is waiting");
    worker.join().expect("worker thread panicked");
}

#[test]
fn accepting_paths_return() {
    let _guard = acquire_test_guard();
    let managed = ptr::addr_of!(MANAGED_FUNCTION[1]).cast::<c_void>();
    unsafe {
        // Unregistered thread: anything goes.
        gcguard_check_state_at_external_call(c"kfun:a".as_ptr(), c"launch".as_ptr(), managed);

        let node = gcguard_register_current_thread();
        // No state hook: the thread counts as native.
        gcguard_check_state_at_external_call(c"kfun:a".as_ptr(), c"launch".as_ptr(), managed);

        gcguard_install_thread_state_hook(Some(runnable_state));
        gcguard_check_state_at_external_call(
            c"kfun:a".as_ptr(),
            ptr::null(),
            NIL_MESSAGE_SENDER as *const c_void,
        );
        gcguard_check_state_at_external_call(c"kfun:a".as_ptr(), ptr::null(), managed);
        gcguard_check_state_at_external_call(
            c"kfun:a".as_ptr(),
            c"malloc".as_ptr(),
            libc::malloc as *const c_void,
        );
        // An empty name is treated as absent; the prefix still identifies the callee.
        gcguard_check_state_at_external_call(c"kfun:a".as_ptr(), c"".as_ptr(), managed);
        gcguard_check_state_at_external_call(
            c"gcguard_is_thread_local_teardown_running".as_ptr(),
            c"launch".as_ptr(),
            ptr::null(),
        );

        gcguard_close_thread_probe();
        gcguard_close_thread_probe();
        gcguard_check_state_at_external_call(c"kfun:a".as_ptr(), ptr::null(), managed);

        gcguard_install_thread_state_hook(None);
        gcguard_unregister_thread(node);
    }
}

#[test]
fn teardown_hook_is_consulted() {
    let _guard = acquire_test_guard();
    unsafe {
        assert!(!gcguard_is_thread_local_teardown_running());
        gcguard_install_tls_teardown_hook(Some(teardown_running));
        assert!(gcguard_is_thread_local_teardown_running());

        let node = gcguard_register_current_thread();
        gcguard_install_thread_state_hook(Some(runnable_state));
        gcguard_check_state_at_external_call(c"kfun:a".as_ptr(), c"launch".as_ptr(), ptr::null());
        gcguard_install_thread_state_hook(None);
        gcguard_unregister_thread(node);
    }
}
