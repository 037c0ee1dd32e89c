//! Thread execution states.
//!
//! The state machine itself lives in the managed runtime; gcguard only reads
//! the current state through a hook and asserts on it. The numeric values are
//! the ones the runtime passes across the C boundary.

use std::fmt;

/// Execution state of a managed thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ThreadState {
    /// Collectible state. The collector may need to observe this thread's
    /// references, so foreign calls are not allowed.
    Runnable = 0,
    /// Relinquished state. The thread holds no unannounced references.
    Native = 1,
}

impl ThreadState {
    /// Decode a raw state value from the runtime.
    ///
    /// Unknown values decode as `Runnable`, the state under which checks apply.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Native,
            _ => Self::Runnable,
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Name used in diagnostics (`kRunnable` / `kNative`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Runnable => "kRunnable",
            Self::Native => "kNative",
        }
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
