//! Shared internal utilities for ABI adapters.

use std::borrow::Cow;
use std::ffi::{CStr, c_char};

/// Borrow a C string as UTF-8, replacing invalid sequences.
///
/// A null pointer reads as the empty string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid for `'a`.
pub unsafe fn c_str_lossy<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        return Cow::Borrowed("");
    }
    // SAFETY: caller guarantees a valid NUL-terminated string.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy()
}

/// Like [`c_str_lossy`], but null and empty strings read as `None`.
///
/// # Safety
///
/// Same contract as [`c_str_lossy`].
pub unsafe fn optional_c_str<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    // SAFETY: forwarded contract.
    let s = unsafe { c_str_lossy(ptr) };
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reads_empty() {
        assert_eq!(unsafe { c_str_lossy(std::ptr::null()) }, "");
        assert!(unsafe { optional_c_str(std::ptr::null()) }.is_none());
    }

    #[test]
    fn empty_is_absent() {
        let empty = c"";
        assert!(unsafe { optional_c_str(empty.as_ptr()) }.is_none());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let bytes = b"ab\xffcd\0";
        let s = unsafe { c_str_lossy(bytes.as_ptr().cast()) };
        assert_eq!(s, "ab\u{fffd}cd");
    }

    #[test]
    fn borrowed_when_valid() {
        let name = c"malloc";
        let s = unsafe { optional_c_str(name.as_ptr()) }.unwrap();
        assert!(matches!(s, Cow::Borrowed("malloc")));
    }
}
