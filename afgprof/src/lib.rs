//! # afgprof - Call-Graph Symbolization for Raw Address Profiles
//!
//! afgprof post-processes the output of an `mcount`-style profiling
//! collector. The collector records every (caller, callee) pair as raw
//! virtual addresses together with a snapshot of the process's memory
//! layout; afgprof turns those addresses into function names and source
//! locations and reports how often each call happened.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Profile directory (input)                   │
//! │        maps (text snapshot)   unmapped-calls (binary)        │
//! └──────────────┬───────────────────────────┬───────────────────┘
//!                │                           │
//!                ▼                           ▼
//!        ┌──────────────┐           ┌────────────────┐
//!        │  MappedSet   │◄──────────│ CallCountTable │
//!        │ (binary srch)│ translate │  (pair counts) │
//!        └──────┬───────┘           └───────┬────────┘
//!               ▼                           │
//!        ┌──────────────┐                   │
//!        │ SymbolIndex  │  per-object       │
//!        │ (pc + object)│  offset batches   │
//!        └──────┬───────┘                   │
//!               ▼                           │
//!        ┌──────────────────────┐           │
//!        │  SymbolizationPool   │           │
//!        │ workers ─► collector │           │
//!        │   (addr2line/DWARF)  │           │
//!        └──────┬───────────────┘           │
//!               ▼                           ▼
//!        ┌──────────────────────────────────────┐
//!        │        Report (JSON on stdout)       │
//!        └──────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`symbolization`]: maps parsing, the oracle backends and the worker pool
//! - [`analysis`]: call counting and the deduplicated symbol index
//! - [`export`]: report building and JSON serialization
//! - [`pipeline`]: one run from input directory to report
//! - [`cli`]: command-line argument parsing
//! - [`preflight`]: input and oracle checks before a run
//! - [`domain`]: value types and error enums
//!
//! ## Typical Usage
//!
//! ```bash
//! # Resolve with eu-addr2line, 8 workers per object
//! afgprof -j 8 --objdir objects/ profile/ > report.json
//!
//! # No elfutils available: read DWARF in process
//! afgprof --backend dwarf --demangle profile/
//! ```

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod pipeline;
pub mod preflight;
pub mod symbolization;
