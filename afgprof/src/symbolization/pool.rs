//! # Symbolization Worker Pool
//!
//! Resolves the offsets of one object at a time with a bounded number of
//! oracle sessions running in parallel.
//!
//! ## Flow per object
//!
//! ```text
//!             offsets (sorted, distinct)
//!                       │ partition: first len % w slices get one extra
//!        ┌──────────────┼──────────────┐
//!        ▼              ▼              ▼
//!    worker 0       worker 1  ...  worker w-1      one OracleSession each
//!        │              │              │
//!        └──── bounded crossbeam channel ────┘
//!                       │
//!                       ▼
//!                  collector (calling thread)
//!                       │ SymbolIndex::mark_resolved
//! ```
//!
//! ## Failure handling
//!
//! The first worker error is stored in the [`SessionContext`] and raises its
//! cancellation flag. Siblings check the flag between offsets and drop their
//! session (killing the child) as soon as they see it; the collector stops
//! writing into the index at the same point. The stored error is returned and
//! aborts the run. Objects are processed one after another, so a session never
//! outlives its object.

use crossbeam_channel::{bounded, Sender};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::thread;

use super::oracle::Oracle;
use super::symbolizer::demangle_symbol;
use crate::analysis::{ObjectBatch, SymbolIndex};
use crate::domain::{SourceLocation, SymbolizeError};

/// Results in flight between workers and the collector
const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Pool settings for one run
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on workers per object; at least 1
    pub concurrency: usize,
    /// Directory holding the object files, looked up by basename
    pub object_dir: PathBuf,
    /// Pass symbols through the Rust demangler
    pub demangle: bool,
}

/// What happened to one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectOutcome {
    /// Object file not found; its offsets stay unresolved
    Skipped,
    /// Number of index records filled in
    Resolved(usize),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub objects_resolved: usize,
    pub objects_skipped: usize,
    pub records_resolved: usize,
}

/// Shared state of one object's workers: cancellation flag plus the first error
#[derive(Debug, Default)]
pub struct SessionContext {
    cancelled: AtomicBool,
    first_error: OnceLock<SymbolizeError>,
}

impl SessionContext {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Record `err` unless an earlier error exists, then cancel
    pub fn fail(&self, err: SymbolizeError) {
        if let Err(later) = self.first_error.set(err) {
            debug!("Ignoring error after cancellation: {later}");
        }
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn into_error(self) -> Option<SymbolizeError> {
        self.first_error.into_inner()
    }
}

/// One answer travelling from a worker to the collector
#[derive(Debug)]
struct Resolved {
    offset: u64,
    location: SourceLocation,
}

/// Split `items` into `workers` contiguous slices whose sizes differ by at most one
#[must_use]
pub fn partition<T>(items: &[T], workers: usize) -> Vec<&[T]> {
    let workers = workers.clamp(1, items.len().max(1));
    let div = items.len() / workers;
    let rem = items.len() % workers;

    let mut slices = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let stop = start + div + usize::from(i < rem);
        slices.push(&items[start..stop]);
        start = stop;
    }
    slices
}

pub struct SymbolizationPool<'a> {
    oracle: &'a dyn Oracle,
    config: PoolConfig,
}

impl<'a> SymbolizationPool<'a> {
    pub fn new(oracle: &'a dyn Oracle, config: PoolConfig) -> Self {
        Self { oracle, config }
    }

    /// Where the object backing `pathname` is expected on disk
    #[must_use]
    pub fn object_path(&self, pathname: &str) -> PathBuf {
        let base = Path::new(pathname).file_name().unwrap_or_default();
        self.config.object_dir.join(base)
    }

    /// Symbolize every object in the index, one object at a time
    ///
    /// # Errors
    /// Returns the first oracle failure; objects after it are not processed
    pub fn symbolize_all(&self, index: &mut SymbolIndex) -> Result<PoolSummary, SymbolizeError> {
        let mut summary = PoolSummary::default();
        for batch in index.batches() {
            match self.symbolize_object(&batch, index)? {
                ObjectOutcome::Skipped => summary.objects_skipped += 1,
                ObjectOutcome::Resolved(records) => {
                    summary.objects_resolved += 1;
                    summary.records_resolved += records;
                }
            }
        }
        Ok(summary)
    }

    /// Symbolize the offsets of one object and write the results into `index`
    ///
    /// # Errors
    /// Returns the first error raised by any worker or a worker panic
    pub fn symbolize_object(
        &self,
        batch: &ObjectBatch,
        index: &mut SymbolIndex,
    ) -> Result<ObjectOutcome, SymbolizeError> {
        let object_path = self.object_path(&batch.object);
        if !object_path.is_file() {
            warn!("{} does not exist, skipping {}", object_path.display(), batch.object);
            return Ok(ObjectOutcome::Skipped);
        }
        if batch.offsets.is_empty() {
            return Ok(ObjectOutcome::Resolved(0));
        }

        let slices = partition(&batch.offsets, self.config.concurrency);
        info!(
            "{} addresses to be resolved in {} ({} workers)",
            batch.offsets.len(),
            batch.object,
            slices.len()
        );

        let ctx = SessionContext::default();
        let oracle = self.oracle;
        let demangle = self.config.demangle;

        let written = thread::scope(|scope| {
            let (tx, rx) = bounded(RESULT_CHANNEL_CAPACITY);

            let handles: Vec<_> = slices
                .into_iter()
                .enumerate()
                .map(|(worker, offsets)| {
                    let tx = tx.clone();
                    let ctx = &ctx;
                    let object_path = object_path.as_path();
                    scope.spawn(move || {
                        debug!("Worker {worker} starting with {} offsets", offsets.len());
                        let result = run_worker(ctx, oracle, object_path, offsets, demangle, &tx);
                        if let Err(err) = result {
                            warn!("Worker {worker} failed: {err}");
                            ctx.fail(err);
                        }
                    })
                })
                .collect();
            drop(tx);

            // Single writer: only this loop touches the index
            let mut written = 0;
            for resolved in &rx {
                if ctx.is_cancelled() {
                    break;
                }
                written += index.mark_resolved(&batch.object, resolved.offset, &resolved.location);
            }
            // Unblocks workers still sending after a cancellation
            drop(rx);

            for handle in handles {
                if handle.join().is_err() {
                    ctx.fail(SymbolizeError::WorkerPanicked { object: object_path.clone() });
                }
            }
            written
        });

        match ctx.into_error() {
            Some(err) => Err(err),
            None => Ok(ObjectOutcome::Resolved(written)),
        }
    }
}

fn run_worker(
    ctx: &SessionContext,
    oracle: &dyn Oracle,
    object: &Path,
    offsets: &[u64],
    demangle: bool,
    tx: &Sender<Resolved>,
) -> Result<(), SymbolizeError> {
    if ctx.is_cancelled() {
        return Ok(());
    }
    let mut session = oracle.open(object, offsets)?;

    for &offset in offsets {
        if ctx.is_cancelled() {
            debug!("Cancelled before offset {offset:#x}");
            return Ok(());
        }
        let mut location = session.next_location(offset)?;
        if demangle {
            location.symbol = demangle_symbol(&location.symbol);
        }
        if tx.send(Resolved { offset, location }).is_err() {
            // Collector stopped listening
            return Ok(());
        }
    }
    Ok(())
}
