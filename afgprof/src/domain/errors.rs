//! Structured error types for afgprof
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only fatal conditions live here: address misses and missing object files
//! are folded into the report instead of being raised.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapParseError {
    #[error("Failed to read memory map {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse map line {line_number}: {line:?}")]
    MalformedLine { line_number: usize, line: String },

    #[error("Empty address range {start:#x}-{end:#x} in map line {line:?}")]
    EmptyRange { start: u64, end: u64, line: String },
}

#[derive(Error, Debug)]
pub enum CallLogError {
    #[error("Failed to read call log {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Truncated call log record {record}: got {got} of {expected} bytes")]
    TruncatedRecord { record: u64, got: usize, expected: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SymbolizeError {
    #[error("Failed to start oracle `{command}` for {object}")]
    Spawn {
        command: String,
        object: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Oracle output for {object} ended after {answered} of {expected} offsets")]
    UnexpectedEof { object: PathBuf, answered: usize, expected: usize },

    #[error("Unexpected oracle location line {line:?} for offset {offset:#x}")]
    MalformedLocation { offset: u64, line: String },

    #[error("Failed to load debug info from {object}: {reason}")]
    DebugInfo { object: PathBuf, reason: String },

    #[error("Symbolization worker for {object} panicked")]
    WorkerPanicked { object: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write report: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_line_display() {
        let err = MapParseError::MalformedLine { line_number: 3, line: "garbage".to_string() };
        assert_eq!(err.to_string(), "Cannot parse map line 3: \"garbage\"");
    }

    #[test]
    fn test_unexpected_eof_display() {
        let err = SymbolizeError::UnexpectedEof {
            object: PathBuf::from("objects/libfoo.so"),
            answered: 2,
            expected: 5,
        };
        assert!(err.to_string().contains("objects/libfoo.so"));
        assert!(err.to_string().contains("2 of 5"));
    }
}
