#![cfg(target_os = "linux")]
//! Fatal paths of the exported entrypoints.
//!
//! Each case re-runs this test binary filtered to itself with `GCGUARD_FATAL_CASE`
//! set; the child performs the rejected operation and must die from `SIGABRT`
//! after writing one diagnostic line.

use std::ffi::{c_int, c_void};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Output};
use std::ptr;

use gcguard_abi::check_abi::{
    gcguard_check_state_at_external_call, gcguard_install_thread_state_hook,
};
use gcguard_abi::registry_abi::{gcguard_current_thread_record, gcguard_register_current_thread};
use gcguard_core::ThreadState;

const CASE_ENV: &str = "GCGUARD_FATAL_CASE";

/// Neither prefixed nor on the allow-list.
static FOREIGN_FUNCTION: [u64; 2] = [0x1122_3344_5566_7788, 0xC3];

unsafe extern "C" fn runnable_state() -> c_int {
    ThreadState::Runnable.as_raw()
}

fn run_child(test_name: &str, case: &str) -> Output {
    let exe = std::env::current_exe().expect("test binary path should be known");
    Command::new(exe)
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CASE_ENV, case)
        .env("GCGUARD_MODE", "strict")
        .output()
        .expect("child test process should spawn")
}

fn child_case() -> Option<String> {
    std::env::var(CASE_ENV).ok()
}

fn assert_aborted(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    assert_eq!(
        output.status.signal(),
        Some(libc::SIGABRT),
        "child should abort; status={:?} stderr:\n{stderr}",
        output.status
    );
    stderr
}

#[test]
fn foreign_call_from_runnable_aborts() {
    if child_case().as_deref() == Some("foreign_call") {
        unsafe {
            gcguard_register_current_thread();
            gcguard_install_thread_state_hook(Some(runnable_state));
            gcguard_check_state_at_external_call(
                c"kfun:victim".as_ptr(),
                c"launch_missiles".as_ptr(),
                ptr::addr_of!(FOREIGN_FUNCTION[1]).cast::<c_void>(),
            );
        }
        // Reaching this point means the call was let through.
        std::process::exit(0);
    }

    let output = run_child("foreign_call_from_runnable_aborts", "foreign_call");
    let stderr = assert_aborted(&output);
    assert!(stderr.contains("gcguard: fatal:"), "stderr:\n{stderr}");
    assert!(stderr.contains("launch_missiles"), "stderr:\n{stderr}");
    assert!(stderr.contains("kfun:victim"), "stderr:\n{stderr}");
    assert!(stderr.contains("kNative"), "stderr:\n{stderr}");
    assert!(stderr.contains("kRunnable"), "stderr:\n{stderr}");
}

#[test]
fn unnamed_callee_still_aborts() {
    if child_case().as_deref() == Some("unknown_callee") {
        unsafe {
            gcguard_register_current_thread();
            gcguard_install_thread_state_hook(Some(runnable_state));
            gcguard_check_state_at_external_call(
                c"kfun:victim".as_ptr(),
                ptr::null(),
                ptr::addr_of!(FOREIGN_FUNCTION[1]).cast::<c_void>(),
            );
        }
        std::process::exit(0);
    }

    let output = run_child("unnamed_callee_still_aborts", "unknown_callee");
    let stderr = assert_aborted(&output);
    assert!(
        stderr.contains("gcguard: fatal: Expected kNative thread state at call of function"),
        "stderr:\n{stderr}"
    );
    assert!(stderr.contains("kfun:victim"), "stderr:\n{stderr}");
}

#[test]
fn double_registration_aborts() {
    if child_case().as_deref() == Some("double_register") {
        unsafe {
            gcguard_register_current_thread();
            gcguard_register_current_thread();
        }
        std::process::exit(0);
    }

    let output = run_child("double_registration_aborts", "double_register");
    let stderr = assert_aborted(&output);
    assert!(stderr.contains("gcguard: fatal:"), "stderr:\n{stderr}");
    assert!(
        stderr.contains("already had some data assigned to it"),
        "stderr:\n{stderr}"
    );
}

#[test]
fn current_record_of_unregistered_thread_aborts() {
    if child_case().as_deref() == Some("unregistered_record") {
        unsafe {
            gcguard_current_thread_record();
        }
        std::process::exit(0);
    }

    let output = run_child(
        "current_record_of_unregistered_thread_aborts",
        "unregistered_record",
    );
    let stderr = assert_aborted(&output);
    assert!(
        stderr.contains("gcguard: fatal: current thread is not registered"),
        "stderr:\n{stderr}"
    );
}

#[test]
fn off_mode_lets_foreign_call_through() {
    if child_case().as_deref() == Some("off_mode") {
        unsafe {
            gcguard_register_current_thread();
            gcguard_install_thread_state_hook(Some(runnable_state));
            gcguard_check_state_at_external_call(
                c"kfun:victim".as_ptr(),
                c"launch_missiles".as_ptr(),
                ptr::addr_of!(FOREIGN_FUNCTION[1]).cast::<c_void>(),
            );
        }
        std::process::exit(0);
    }

    let exe = std::env::current_exe().expect("test binary path should be known");
    let output = Command::new(exe)
        .args([
            "off_mode_lets_foreign_call_through",
            "--exact",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(CASE_ENV, "off_mode")
        .env("GCGUARD_MODE", "off")
        .output()
        .expect("child test process should spawn");
    assert!(
        output.status.success(),
        "status={:?} stderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
}
