//! Raw runtime error codes and the reporting mask that gates them
//!
//! Codes are single bits so that a reporting level can be expressed as a
//! union of the kinds it admits. The set is open-ended: hosts may raise codes
//! outside the named constants, which then need an explicit severity group.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODES
// ============================================================================

/// Raw error kind as produced by the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(u32);

impl ErrorCode {
    pub const FATAL: ErrorCode = ErrorCode(1);
    pub const WARNING: ErrorCode = ErrorCode(1 << 1);
    pub const PARSE: ErrorCode = ErrorCode(1 << 2);
    pub const NOTICE: ErrorCode = ErrorCode(1 << 3);
    pub const CORE_FATAL: ErrorCode = ErrorCode(1 << 4);
    pub const CORE_WARNING: ErrorCode = ErrorCode(1 << 5);
    pub const COMPILE_FATAL: ErrorCode = ErrorCode(1 << 6);
    pub const COMPILE_WARNING: ErrorCode = ErrorCode(1 << 7);
    pub const USER_ERROR: ErrorCode = ErrorCode(1 << 8);
    pub const USER_WARNING: ErrorCode = ErrorCode(1 << 9);
    pub const USER_NOTICE: ErrorCode = ErrorCode(1 << 10);
    pub const STRICT: ErrorCode = ErrorCode(1 << 11);
    pub const RECOVERABLE: ErrorCode = ErrorCode(1 << 12);
    pub const DEPRECATED: ErrorCode = ErrorCode(1 << 13);
    pub const USER_DEPRECATED: ErrorCode = ErrorCode(1 << 14);

    /// Every named code, lowest bit first
    pub const ALL_KNOWN: [ErrorCode; 15] = [
        Self::FATAL,
        Self::WARNING,
        Self::PARSE,
        Self::NOTICE,
        Self::CORE_FATAL,
        Self::CORE_WARNING,
        Self::COMPILE_FATAL,
        Self::COMPILE_WARNING,
        Self::USER_ERROR,
        Self::USER_WARNING,
        Self::USER_NOTICE,
        Self::STRICT,
        Self::RECOVERABLE,
        Self::DEPRECATED,
        Self::USER_DEPRECATED,
    ];

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check whether this is one of the named codes
    pub fn is_known(self) -> bool {
        Self::ALL_KNOWN.contains(&self)
    }

    /// Human readable name of the code
    pub fn title(self) -> &'static str {
        match self {
            Self::FATAL => "Fatal error",
            Self::WARNING => "Warning",
            Self::PARSE => "Parse error",
            Self::NOTICE => "Notice",
            Self::CORE_FATAL => "Core fatal error",
            Self::CORE_WARNING => "Core warning",
            Self::COMPILE_FATAL => "Compile fatal error",
            Self::COMPILE_WARNING => "Compile warning",
            Self::USER_ERROR => "User error",
            Self::USER_WARNING => "User warning",
            Self::USER_NOTICE => "User notice",
            Self::STRICT => "Strict standards",
            Self::RECOVERABLE => "Recoverable error",
            Self::DEPRECATED => "Deprecated",
            Self::USER_DEPRECATED => "User deprecated",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ErrorCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

// ============================================================================
// REPORTING LEVEL
// ============================================================================

/// Bitmask of error codes eligible for processing; zero suppresses everything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportLevel(u32);

impl ReportLevel {
    pub const NONE: ReportLevel = ReportLevel(0);
    /// Every bit, including codes the host defines beyond the named ones
    pub const ALL: ReportLevel = ReportLevel(u32::MAX);
    /// Union of the named codes
    pub const ALL_KNOWN: ReportLevel = ReportLevel((1 << 15) - 1);

    pub const fn new(mask: u32) -> Self {
        Self(mask)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The "report nothing" sentinel
    pub fn is_suppressed(self) -> bool {
        self.0 == 0
    }

    /// Bitwise containment test: every bit of `code` is set in the mask
    pub fn allows(self, code: ErrorCode) -> bool {
        code.raw() & self.0 == code.raw()
    }

    pub fn with(self, code: ErrorCode) -> Self {
        Self(self.0 | code.raw())
    }

    pub fn without(self, code: ErrorCode) -> Self {
        Self(self.0 & !code.raw())
    }
}

impl Default for ReportLevel {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<ErrorCode> for ReportLevel {
    fn from(code: ErrorCode) -> Self {
        Self(code.raw())
    }
}

impl FromIterator<ErrorCode> for ReportLevel {
    fn from_iter<I: IntoIterator<Item = ErrorCode>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, ReportLevel::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_are_distinct_bits() {
        let union: ReportLevel = ErrorCode::ALL_KNOWN.iter().copied().collect();
        assert_eq!(union, ReportLevel::ALL_KNOWN);

        for code in ErrorCode::ALL_KNOWN {
            assert_eq!(code.raw().count_ones(), 1, "{} is not a single bit", code.title());
            assert!(code.is_known());
        }
    }

    #[test]
    fn test_report_level_containment() {
        let level = ReportLevel::ALL.without(ErrorCode::USER_WARNING);

        assert!(level.allows(ErrorCode::USER_ERROR));
        assert!(!level.allows(ErrorCode::USER_WARNING));
        assert!(level.with(ErrorCode::USER_WARNING).allows(ErrorCode::USER_WARNING));
    }

    #[test]
    fn test_suppressed_level_allows_nothing() {
        assert!(ReportLevel::NONE.is_suppressed());
        for code in ErrorCode::ALL_KNOWN {
            assert!(!ReportLevel::NONE.allows(code));
        }
    }

    #[test]
    fn test_all_allows_host_defined_codes() {
        let custom = ErrorCode::new(1 << 20);

        assert!(ReportLevel::ALL.allows(custom));
        assert!(!ReportLevel::ALL_KNOWN.allows(custom));
        assert_eq!(ReportLevel::default(), ReportLevel::ALL);
    }

    #[test]
    fn test_unknown_code_title() {
        let code = ErrorCode::new(1 << 20);
        assert!(!code.is_known());
        assert_eq!(code.title(), "Unknown error");
        assert_eq!(code.to_string(), "1048576");
    }
}
