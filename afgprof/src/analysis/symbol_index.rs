//! Deduplicated debug-info records keyed by raw PC and by (object, offset).
//!
//! The index owns every [`DebugInfo`]; the two lookup maps only hold slot
//! numbers into that storage, so the records are never duplicated:
//!
//! ```text
//! pc_slots:      0x400010 ──┐
//!                0x400020 ──┼──► entries[slot]
//! object_slots:  /bin/foo ─► 0x10 ─► [slot, ...]
//! ```
//!
//! Several raw PCs can land on the same object offset (e.g. the same library
//! mapped twice). They keep separate records but share one offset entry, so
//! the offset is symbolized once and the result is written into all of them.

use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::call_counts::CallCountTable;
use crate::domain::{ObjectOffset, SourceLocation};
use crate::symbolization::MappedSet;

/// Symbol information for one distinct raw address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugInfo {
    pub pc: u64,
    pub object: String,
    pub offset: u64,
    pub symbol: String,
    pub source_file: String,
    pub line_number: String,
}

impl DebugInfo {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.symbol.is_empty()
    }
}

/// Offsets of one object file that still need symbolization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBatch {
    pub object: String,
    /// Sorted ascending, no duplicates
    pub offsets: Vec<u64>,
}

#[derive(Debug, Default)]
pub struct SymbolIndex {
    entries: Vec<DebugInfo>,
    pc_slots: HashMap<u64, usize>,
    object_slots: BTreeMap<String, BTreeMap<u64, Vec<usize>>>,
    misses: u64,
}

impl SymbolIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate every distinct call pair through the map and index both
    /// sides. A pair with either side unmapped counts as one miss and indexes
    /// neither address.
    #[must_use]
    pub fn build(calls: &CallCountTable, map: &MappedSet) -> Self {
        let mut index = Self::new();
        for pair in calls.pairs() {
            match (map.translate(pair.caller), map.translate(pair.callee)) {
                (Some(caller), Some(callee)) => {
                    index.insert(pair.caller, caller);
                    index.insert(pair.callee, callee);
                }
                _ => index.misses += 1,
            }
        }
        index
    }

    /// Register a raw PC. Returns `false` if the PC was already known.
    pub fn insert(&mut self, pc: u64, location: ObjectOffset) -> bool {
        if self.pc_slots.contains_key(&pc) {
            return false;
        }

        let slot = self.entries.len();
        self.object_slots
            .entry(location.pathname.clone())
            .or_default()
            .entry(location.offset)
            .or_default()
            .push(slot);
        self.pc_slots.insert(pc, slot);
        self.entries.push(DebugInfo {
            pc,
            object: location.pathname,
            offset: location.offset,
            symbol: String::new(),
            source_file: String::new(),
            line_number: String::new(),
        });
        true
    }

    /// Write an oracle result into every record sharing `(object, offset)`.
    /// Returns the number of records updated.
    pub fn mark_resolved(&mut self, object: &str, offset: u64, location: &SourceLocation) -> usize {
        let Some(slots) = self.object_slots.get(object).and_then(|m| m.get(&offset)) else {
            warn!("Resolved offset {offset:#x} is not indexed for {object}");
            return 0;
        };

        for &slot in slots {
            let entry = &mut self.entries[slot];
            entry.symbol.clone_from(&location.symbol);
            entry.source_file.clone_from(&location.file);
            entry.line_number.clone_from(&location.line);
        }
        slots.len()
    }

    /// Per-object offset lists, objects in pathname order
    #[must_use]
    pub fn batches(&self) -> Vec<ObjectBatch> {
        self.object_slots
            .iter()
            .map(|(object, offsets)| ObjectBatch {
                object: object.clone(),
                offsets: offsets.keys().copied().collect(),
            })
            .collect()
    }

    #[must_use]
    pub fn get(&self, pc: u64) -> Option<&DebugInfo> {
        self.pc_slots.get(&pc).map(|&slot| &self.entries[slot])
    }

    /// All records in insertion order
    #[must_use]
    pub fn entries(&self) -> &[DebugInfo] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<DebugInfo> {
        self.entries
    }
}
