//! Platform thread and symbol queries.

use std::ffi::{CStr, c_void};

use gcguard_core::ThreadIdentity;

/// Identity of the calling thread (`pthread_self`).
#[must_use]
pub fn current_thread_identity() -> ThreadIdentity {
    // SAFETY: pthread_self has no preconditions.
    let raw = unsafe { libc::pthread_self() };
    ThreadIdentity(raw as usize as u64)
}

/// Whether the calling thread is the process's initial thread.
#[cfg(any(target_os = "linux", target_os = "android"))]
#[must_use]
pub fn is_main_thread() -> bool {
    // SAFETY: gettid and getpid have no preconditions.
    unsafe { libc::syscall(libc::SYS_gettid) as libc::pid_t == libc::getpid() }
}

/// Whether the calling thread is the process's initial thread.
#[cfg(target_vendor = "apple")]
#[must_use]
pub fn is_main_thread() -> bool {
    // SAFETY: pthread_main_np has no preconditions.
    unsafe { libc::pthread_main_np() != 0 }
}

/// Whether the calling thread is the process's initial thread.
#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple")))]
#[must_use]
pub fn is_main_thread() -> bool {
    std::thread::current().name() == Some("main")
}

/// Best-effort name of the symbol containing `addr`, via `dladdr`.
#[must_use]
pub fn address_to_symbol(addr: usize) -> Option<String> {
    // SAFETY: Dl_info is plain old data; all-zero is a valid value.
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    // SAFETY: dladdr only inspects loader tables; `addr` is never dereferenced.
    let rc = unsafe { libc::dladdr(addr as *const c_void, &mut info) };
    if rc == 0 || info.dli_sname.is_null() {
        return None;
    }
    // SAFETY: dli_sname points into the loader's string table.
    let name = unsafe { CStr::from_ptr(info.dli_sname) };
    Some(name.to_string_lossy().into_owned())
}
