//! Runtime mode configuration.
//!
//! The check mode is set via the `GCGUARD_MODE` environment variable:
//! - `strict` (default): every external call site is checked and a foreign
//!   call from the collectible state aborts the process.
//! - `off`: the guard returns immediately. Baseline for benchmarking only.

use std::sync::OnceLock;

/// Environment variable consulted by [`check_mode`].
pub const MODE_ENV_VAR: &str = "GCGUARD_MODE";

/// Runtime operating mode for the call-boundary guard.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckMode {
    /// Full checking; violations are fatal.
    #[default]
    Strict,
    /// No checking. Pure passthrough.
    Off,
}

impl CheckMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "default" | "abort" => Self::Strict,
            "off" | "none" | "disabled" => Self::Off,
            _ => Self::Strict,
        }
    }

    /// Returns true if call sites are checked.
    #[must_use]
    pub const fn checks_enabled(self) -> bool {
        matches!(self, Self::Strict)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Off => "off",
        }
    }
}

static GLOBAL_MODE: OnceLock<CheckMode> = OnceLock::new();

/// Get the configured check mode (reads env var on first call, caches thereafter).
#[must_use]
pub fn check_mode() -> CheckMode {
    *GLOBAL_MODE.get_or_init(|| {
        std::env::var(MODE_ENV_VAR)
            .map(|v| CheckMode::from_str_loose(&v))
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_check_modes() {
        assert_eq!(CheckMode::from_str_loose("strict"), CheckMode::Strict);
        assert_eq!(CheckMode::from_str_loose("STRICT"), CheckMode::Strict);
        assert_eq!(CheckMode::from_str_loose("abort"), CheckMode::Strict);
        assert_eq!(CheckMode::from_str_loose("off"), CheckMode::Off);
        assert_eq!(CheckMode::from_str_loose("Disabled"), CheckMode::Off);
        assert_eq!(CheckMode::from_str_loose("bogus"), CheckMode::Strict);
    }

    #[test]
    fn default_is_strict() {
        assert_eq!(CheckMode::default(), CheckMode::Strict);
        assert!(CheckMode::Strict.checks_enabled());
        assert!(!CheckMode::Off.checks_enabled());
    }
}
