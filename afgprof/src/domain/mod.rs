//! Domain model for afgprof
//!
//! This module contains core domain types and errors that provide:
//! - Value types passed between pipeline stages
//! - Structured error handling, one enum per input/stage

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{CallPair, ObjectOffset, SourceLocation};

pub use errors::{CallLogError, ExportError, MapParseError, SymbolizeError};
