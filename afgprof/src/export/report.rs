//! Call-count report
//!
//! ```json
//! {
//!   "calls": [{"caller": 4194320, "callee": 4194336, "count": 3}],
//!   "index": [{"pc": 4194320, "object": "/bin/foo", "offset": 16,
//!              "symbol": "foo_a", "source_file": "/src/foo.c", "line_number": "10"}],
//!   "misses": 0
//! }
//! ```
//!
//! `calls` is sorted by descending count, ties in first-seen order. `index`
//! holds every indexed address sorted by `pc`, symbolized or not.

use serde::Serialize;
use std::io::Write;

use crate::analysis::{CallCountTable, DebugInfo, SymbolIndex};
use crate::domain::{CallPair, ExportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    #[serde(flatten)]
    pub pair: CallPair,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub calls: Vec<CallRecord>,
    pub index: Vec<DebugInfo>,
    pub misses: u64,
}

impl Report {
    #[must_use]
    pub fn build(calls: &CallCountTable, index: SymbolIndex) -> Self {
        let mut records: Vec<CallRecord> =
            calls.iter().map(|(pair, count)| CallRecord { pair, count }).collect();
        // Stable: equal counts keep first-seen order
        records.sort_by(|a, b| b.count.cmp(&a.count));

        let misses = index.misses();
        let mut entries = index.into_entries();
        entries.sort_by_key(|entry| entry.pc);

        Self { calls: records, index: entries, misses }
    }

    /// Number of index entries that received a symbol
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.index.iter().filter(|entry| entry.is_resolved()).count()
    }

    /// Serialize as one JSON document followed by a newline
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn write_json<W: Write>(&self, mut writer: W, pretty: bool) -> Result<(), ExportError> {
        if pretty {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }
        writeln!(writer).map_err(ExportError::WriteFailed)?;
        writer.flush().map_err(ExportError::WriteFailed)
    }
}
