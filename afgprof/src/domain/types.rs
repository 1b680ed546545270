//! Core value types shared by the pipeline stages

use serde::Serialize;
use std::fmt;

/// A raw (caller, callee) pair as recorded by the profiling collector.
///
/// Addresses are stored widened to `u64`; the collector records 32-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CallPair {
    pub caller: u64,
    pub callee: u64,
}

impl CallPair {
    #[must_use]
    pub fn new(caller: u64, callee: u64) -> Self {
        Self { caller, callee }
    }
}

impl fmt::Display for CallPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} -> {:#x}", self.caller, self.callee)
    }
}

/// Location of a virtual address inside its backing object file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectOffset {
    pub pathname: String,
    pub offset: u64,
}

/// What the oracle reports for one object offset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub symbol: String,
    pub file: String,
    /// Kept verbatim: oracles print `?` or `42 (discriminator 3)` here
    pub line: String,
}

impl SourceLocation {
    /// Split an oracle `file:line` location at the first colon.
    ///
    /// Returns `None` when the separator is missing.
    #[must_use]
    pub fn from_oracle_lines(symbol: &str, location: &str) -> Option<Self> {
        let (file, line) = location.trim().split_once(':')?;
        Some(Self { symbol: symbol.trim().to_string(), file: file.to_string(), line: line.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_pair_display() {
        assert_eq!(CallPair::new(0x400010, 0x400020).to_string(), "0x400010 -> 0x400020");
    }

    #[test]
    fn test_location_splits_at_first_colon() {
        let loc = SourceLocation::from_oracle_lines("foo_a\n", "/src/foo.c:10:4\n").unwrap();
        assert_eq!(loc.symbol, "foo_a");
        assert_eq!(loc.file, "/src/foo.c");
        assert_eq!(loc.line, "10:4");
    }

    #[test]
    fn test_location_without_colon_is_rejected() {
        assert!(SourceLocation::from_oracle_lines("foo", "no separator").is_none());
    }
}
