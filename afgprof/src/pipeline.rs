//! One afgprof run, end to end
//!
//! ```text
//! maps ──► MappedSet (executable only)
//!                 │ translate
//! call log ──► CallCountTable ──► SymbolIndex ──► SymbolizationPool ──► Report
//! ```

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use crate::analysis::{CallCountTable, CallLogFormat, SymbolIndex};
use crate::export::Report;
use crate::symbolization::{
    Addr2LineOracle, DwarfOracle, MappedSet, Oracle, PoolConfig, RegionFilter, SymbolizationPool,
};

/// File name of the memory-layout snapshot inside the input directory
pub const MAPS_FILE: &str = "maps";

/// Which oracle resolves offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Spawn an `addr2line`-compatible command per worker
    Addr2line,
    /// Read DWARF in process
    Dwarf,
}

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub object_dir: PathBuf,
    pub oracle_command: String,
    /// Workers per object; at least 1
    pub concurrency: usize,
    pub backend: Backend,
    pub format: CallLogFormat,
    pub demangle: bool,
}

impl RunConfig {
    #[must_use]
    pub fn maps_path(&self) -> PathBuf {
        self.input_dir.join(MAPS_FILE)
    }

    #[must_use]
    pub fn calls_path(&self) -> PathBuf {
        self.input_dir.join(self.format.file_name())
    }

    fn oracle(&self) -> Box<dyn Oracle> {
        match self.backend {
            Backend::Addr2line => Box::new(Addr2LineOracle::new(self.oracle_command.clone())),
            Backend::Dwarf => Box::new(DwarfOracle),
        }
    }
}

/// Parse the inputs, symbolize every indexed address and build the report
///
/// # Errors
/// Returns an error for malformed inputs or any oracle failure
pub fn run(config: &RunConfig) -> Result<Report> {
    let maps_path = config.maps_path();
    let map = MappedSet::from_file(&maps_path, RegionFilter::Executable)
        .with_context(|| format!("Failed to load {}", maps_path.display()))?;

    let calls_path = config.calls_path();
    let calls = CallCountTable::from_file(&calls_path, config.format)
        .with_context(|| format!("Failed to load {}", calls_path.display()))?;

    let mut index = SymbolIndex::build(&calls, &map);
    info!(
        "Indexed {} distinct addresses in {} objects, {} call pairs missed",
        index.len(),
        index.batches().len(),
        index.misses()
    );

    let oracle = config.oracle();
    let pool = SymbolizationPool::new(
        oracle.as_ref(),
        PoolConfig {
            concurrency: config.concurrency.max(1),
            object_dir: config.object_dir.clone(),
            demangle: config.demangle,
        },
    );
    let summary = pool.symbolize_all(&mut index).context("Symbolization failed")?;
    info!(
        "Symbolized {} records in {} objects ({} objects skipped)",
        summary.records_resolved, summary.objects_resolved, summary.objects_skipped
    );

    Ok(Report::build(&calls, index))
}
