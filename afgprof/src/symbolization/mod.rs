//! # Symbol Resolution and Address Translation
//!
//! This module converts raw virtual addresses recorded by the profiling
//! collector into (object file, file offset) pairs and then into function
//! names, file paths and line numbers. This process is called
//! **symbolization**.
//!
//! ## Address Translation Flow
//!
//! ```text
//! 1. Collector records raw addresses
//!    caller/callee: 0x7f10000011a0, 0x400020, ...
//!
//! 2. Parse the maps snapshot, keep executable regions
//!    7f1000001000-7f1000002000 r-xp 00001000 fd:01 98765 /usr/lib/libbar.so
//!
//! 3. Binary search the region containing the address
//!    0x7f10000011a0 ∈ [0x7f1000001000, 0x7f1000002000)
//!
//! 4. Calculate file offset
//!    file_offset = address - region.start + region.offset = 0x11a0
//!
//! 5. Batch offsets per object and hand them to the oracle
//!    objects/libbar.so: 0x11a0 → bar_init at /src/bar.c:42
//! ```
//!
//! ## Module Structure
//!
//! - **`memory_maps`**: maps snapshot parsing and address → (object, offset)
//! - **`oracle`**: the resolver interface plus the `addr2line` subprocess backend
//! - **`symbolizer`**: in-process DWARF backend (`addr2line`, `gimli`, `object`)
//!   and Rust symbol demangling
//! - **`pool`**: concurrent, cancellable workers driving the oracle per object
//!
//! ## Limitations
//!
//! - **Object lookup by basename**: objects are found as `<objdir>/<basename>`,
//!   so two different libraries with the same file name collide
//! - **Debug info required**: without DWARF the oracle can only answer `??`

pub mod memory_maps;
pub mod oracle;
pub mod pool;
pub mod symbolizer;

pub use memory_maps::{parse_map_line, MappedSet, MemoryRegion, RegionFilter};
pub use oracle::{resolve_all, Addr2LineOracle, Oracle, OracleSession};
pub use pool::{partition, ObjectOutcome, PoolConfig, PoolSummary, SessionContext, SymbolizationPool};
pub use symbolizer::{demangle_symbol, DwarfOracle, Symbolizer};
