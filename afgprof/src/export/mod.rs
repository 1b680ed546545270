//! Report export
//!
//! This module merges call counts with the symbolized index and writes the
//! result as a single JSON document.

pub mod report;

pub use report::{CallRecord, Report};
