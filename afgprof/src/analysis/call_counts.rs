//! Call-pair aggregation from the collector's binary log.
//!
//! Two on-disk flavors exist:
//!
//! ```text
//! unmapped-calls   [caller: u32 LE][callee: u32 LE]                    8 bytes / record
//! calls            [caller: u32 LE][callee: u32 LE][count: u64 LE]    16 bytes / record
//! ```
//!
//! The first is one record per observed call; the second is already
//! aggregated by the in-process collector. Both fold into a [`CallCountTable`].

use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::domain::{CallLogError, CallPair};

/// Binary layout of the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CallLogFormat {
    /// One `(caller, callee)` record per observed call
    Unmapped,
    /// `(caller, callee, count)` records written by the aggregating collector
    Counted,
}

impl CallLogFormat {
    /// File name of this log inside a profile directory
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Unmapped => "unmapped-calls",
            Self::Counted => "calls",
        }
    }

    #[must_use]
    pub fn record_size(self) -> usize {
        match self {
            Self::Unmapped => 8,
            Self::Counted => 16,
        }
    }
}

/// Occurrence count per distinct call pair.
///
/// Pairs remember the order in which they were first seen so that equal
/// counts keep a stable order in the report.
#[derive(Debug, Default, Clone)]
pub struct CallCountTable {
    slots: HashMap<CallPair, usize>,
    entries: Vec<(CallPair, u64)>,
    records: u64,
}

impl CallCountTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `n` more observations of `pair`. Counts saturate at `u64::MAX`.
    pub fn add(&mut self, pair: CallPair, n: u64) {
        self.records += 1;
        match self.slots.get(&pair) {
            Some(&slot) => {
                let count = &mut self.entries[slot].1;
                if count.checked_add(n).is_none() {
                    warn!("Call count for {pair} overflows, saturating");
                }
                *count = count.saturating_add(n);
            }
            None => {
                self.slots.insert(pair, self.entries.len());
                self.entries.push((pair, n));
            }
        }
    }

    #[must_use]
    pub fn count(&self, pair: &CallPair) -> Option<u64> {
        self.slots.get(pair).map(|&slot| self.entries[slot].1)
    }

    /// Distinct pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (CallPair, u64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn pairs(&self) -> impl Iterator<Item = CallPair> + '_ {
        self.entries.iter().map(|(pair, _)| *pair)
    }

    /// Number of distinct pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of log records folded in
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Stream a call log into a table.
    ///
    /// # Errors
    /// Returns an error on I/O failure or if the stream ends inside a record
    pub fn read_from<R: Read>(reader: R, format: CallLogFormat) -> Result<Self, CallLogError> {
        let mut table = Self::new();
        let mut reader = BufReader::new(reader);
        let mut record = [0u8; 16];
        let record = &mut record[..format.record_size()];

        while read_record(&mut reader, record, table.records)? {
            let caller = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
            let callee = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
            let count = match format {
                CallLogFormat::Unmapped => 1,
                CallLogFormat::Counted => u64::from_le_bytes([
                    record[8], record[9], record[10], record[11], record[12], record[13],
                    record[14], record[15],
                ]),
            };
            table.add(CallPair::new(u64::from(caller), u64::from(callee)), count);
        }

        Ok(table)
    }

    /// Open and read a call log file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is malformed
    pub fn from_file(path: &Path, format: CallLogFormat) -> Result<Self, CallLogError> {
        let file = File::open(path)
            .map_err(|source| CallLogError::Read { path: path.to_path_buf(), source })?;
        let table = Self::read_from(file, format).map_err(|e| match e {
            CallLogError::Io(source) => CallLogError::Read { path: path.to_path_buf(), source },
            other => other,
        })?;
        info!(
            "Read {} records ({} distinct call pairs) from {}",
            table.records(),
            table.len(),
            path.display()
        );
        Ok(table)
    }
}

/// Fill `buf` with the next record. `Ok(false)` on a clean end of stream.
fn read_record<R: Read>(reader: &mut R, buf: &mut [u8], record: u64) -> Result<bool, CallLogError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    match filled {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        got => Err(CallLogError::TruncatedRecord { record, got, expected: buf.len() }),
    }
}
