//! Aggregation of the raw call log
//!
//! This module turns the collector's raw address pairs into the two tables the
//! rest of the pipeline works from: call counts per pair, and a deduplicated
//! index of the addresses that need symbolization.

pub mod call_counts;
pub mod symbol_index;

pub use call_counts::{CallCountTable, CallLogFormat};
pub use symbol_index::{DebugInfo, ObjectBatch, SymbolIndex};
