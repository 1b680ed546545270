use addr2line::Context;
use gimli::{EndianRcSlice, RunTimeEndian};
use object::{Object, ObjectSection, ObjectSegment};
use rustc_demangle::try_demangle;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::oracle::{Oracle, OracleSession};
use crate::domain::{SourceLocation, SymbolizeError};

/// Placeholder printed by `addr2line` for unknown names and files
const UNKNOWN: &str = "??";

/// In-process oracle reading DWARF debug info with `addr2line`
///
/// Each session parses the object on its own, so sessions can live on
/// separate worker threads without sharing the (non-`Send`) context.
#[derive(Debug, Clone, Copy, Default)]
pub struct DwarfOracle;

impl Oracle for DwarfOracle {
    fn open(&self, object: &Path, _offsets: &[u64]) -> Result<Box<dyn OracleSession>, SymbolizeError> {
        Ok(Box::new(Symbolizer::new(object)?))
    }
}

/// Symbolizer for resolving file offsets of one object to source locations
pub struct Symbolizer {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    /// Loadable segments as (file offset, file size, virtual address)
    segments: Vec<(u64, u64, u64)>,
}

impl Symbolizer {
    /// Create a new symbolizer for the given object file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if its DWARF is unusable
    pub fn new<P: AsRef<Path>>(object_path: P) -> Result<Self, SymbolizeError> {
        let object_path = object_path.as_ref();
        let debug_info_error = |reason: String| SymbolizeError::DebugInfo {
            object: PathBuf::from(object_path),
            reason,
        };

        let binary_data = fs::read(object_path)?;
        let obj_file = object::File::parse(&*binary_data)
            .map_err(|e| debug_info_error(format!("failed to parse object file: {e}")))?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)
            .map_err(|e| debug_info_error(format!("failed to load DWARF sections: {e}")))?;
        let ctx = Context::from_dwarf(dwarf)
            .map_err(|e| debug_info_error(format!("failed to index DWARF: {e}")))?;

        let segments = obj_file
            .segments()
            .map(|segment| {
                let (file_offset, file_size) = segment.file_range();
                (file_offset, file_size, segment.address())
            })
            .collect();

        Ok(Self { ctx, segments })
    }

    /// Map a file offset to the virtual address DWARF uses.
    ///
    /// Offsets outside every loadable segment are used as-is, which is what
    /// `addr2line` does for objects linked at address zero. `None` if the
    /// address would overflow.
    #[must_use]
    pub fn offset_to_address(&self, offset: u64) -> Option<u64> {
        segment_address(&self.segments, offset)
    }

    /// Resolve a file offset to the innermost function and its source location
    #[must_use]
    pub fn resolve(&self, offset: u64) -> SourceLocation {
        let mut symbol = None;
        let mut file = None;
        let mut line = None;

        let frames = self
            .offset_to_address(offset)
            .map(|addr| self.ctx.find_frames(addr).skip_all_loads());
        if let Some(Ok(mut frame_iter)) = frames {
            if let Ok(Some(frame)) = frame_iter.next() {
                symbol = frame.function.and_then(|f| f.raw_name().ok().map(|s| s.to_string()));
                if let Some(loc) = frame.location {
                    file = loc.file.map(std::string::ToString::to_string);
                    line = loc.line;
                }
            }
        }

        SourceLocation {
            symbol: symbol.unwrap_or_else(|| UNKNOWN.to_string()),
            file: file.unwrap_or_else(|| UNKNOWN.to_string()),
            line: line.map_or_else(|| "0".to_string(), |l| l.to_string()),
        }
    }
}

impl OracleSession for Symbolizer {
    fn next_location(&mut self, offset: u64) -> Result<SourceLocation, SymbolizeError> {
        Ok(self.resolve(offset))
    }
}

fn segment_address(segments: &[(u64, u64, u64)], offset: u64) -> Option<u64> {
    match segments.iter().find(|&&(start, size, _)| offset >= start && offset - start < size) {
        Some(&(start, _, address)) => address.checked_add(offset - start),
        None => Some(offset),
    }
}

/// Demangle a Rust symbol name; other names are returned unchanged
#[must_use]
pub fn demangle_symbol(symbol: &str) -> String {
    try_demangle(symbol).map_or_else(|_| symbol.to_string(), |d| format!("{d:#}"))
}
