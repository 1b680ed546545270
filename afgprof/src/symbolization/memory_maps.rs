//! Memory mapping utilities for process address space analysis
//!
//! This module parses a `/proc/<pid>/maps` snapshot into a sorted set of
//! regions and translates raw virtual addresses into (object, file offset)
//! pairs, which is what the symbolization oracle needs for position-independent
//! objects loaded at randomized addresses.

use log::{info, warn};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::domain::{MapParseError, ObjectOffset};

/// One line of a maps snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    pub dev_major: u16,
    pub dev_minor: u16,
    pub inode: u64,
    /// Empty for anonymous mappings
    pub pathname: String,
}

impl MemoryRegion {
    /// Check if an address falls within this region
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.perms.contains('x')
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:08x} {} {:08x} {:02x}:{:02x} {}",
            self.start, self.end, self.perms, self.offset, self.dev_major, self.dev_minor, self.inode
        )?;
        if !self.pathname.is_empty() {
            write!(f, " {}", self.pathname)?;
        }
        Ok(())
    }
}

/// Which regions to keep while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionFilter {
    All,
    /// Only mappings with `x` permission; call addresses can only land there
    Executable,
}

impl RegionFilter {
    fn keeps(self, region: &MemoryRegion) -> bool {
        match self {
            Self::All => true,
            Self::Executable => region.is_executable(),
        }
    }
}

fn parse_hex(field: &str) -> Option<u64> {
    if field.is_empty() || field.len() > 16 || !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(field, 16).ok()
}

/// Split off the next whitespace-delimited field, returning it and the remainder
fn next_field(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    Some(rest.split_at(rest.find(char::is_whitespace).unwrap_or(rest.len())))
}

/// Parse a single maps line: `start-end perms offset major:minor inode [pathname]`
///
/// # Errors
/// Returns an error if any field is missing or malformed, or if the range is empty
pub fn parse_map_line(line: &str) -> Result<MemoryRegion, MapParseError> {
    parse_numbered_line(line, 1)
}

fn parse_numbered_line(line: &str, line_number: usize) -> Result<MemoryRegion, MapParseError> {
    let region = parse_fields(line)
        .ok_or_else(|| MapParseError::MalformedLine { line_number, line: line.to_string() })?;
    if region.start >= region.end {
        return Err(MapParseError::EmptyRange {
            start: region.start,
            end: region.end,
            line: line.to_string(),
        });
    }
    Ok(region)
}

fn parse_fields(line: &str) -> Option<MemoryRegion> {
    let (range, rest) = next_field(line)?;
    let (start, end) = range.split_once('-')?;

    let (perms, rest) = next_field(rest)?;
    if !perms.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return None;
    }

    let (offset, rest) = next_field(rest)?;

    let (dev, rest) = next_field(rest)?;
    let (major, minor) = dev.split_once(':')?;

    let (inode, rest) = next_field(rest)?;
    if !inode.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(MemoryRegion {
        start: parse_hex(start)?,
        end: parse_hex(end)?,
        perms: perms.to_string(),
        offset: parse_hex(offset)?,
        dev_major: u16::try_from(parse_hex(major)?).ok()?,
        dev_minor: u16::try_from(parse_hex(minor)?).ok()?,
        inode: inode.parse().ok()?,
        // Trailing spaces belong to the path
        pathname: rest.trim_start().trim_end_matches(['\r', '\n']).to_string(),
    })
}

/// Regions of one snapshot, sorted by start address for binary search
#[derive(Debug, Clone, Default)]
pub struct MappedSet {
    regions: Vec<MemoryRegion>,
}

impl MappedSet {
    /// Build a set from already parsed regions
    #[must_use]
    pub fn new(mut regions: Vec<MemoryRegion>) -> Self {
        regions.sort_by_key(|r| r.start);
        Self { regions }
    }

    /// Parse a whole maps snapshot. Blank lines are skipped; any other
    /// malformed line fails the parse.
    ///
    /// # Errors
    /// Returns the first malformed line with its 1-based line number
    pub fn parse(text: &str, filter: RegionFilter) -> Result<Self, MapParseError> {
        let mut regions = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let region = parse_numbered_line(line, idx + 1)?;
            if filter.keeps(&region) {
                regions.push(region);
            }
        }
        Ok(Self::new(regions))
    }

    /// Read and parse a maps file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains a malformed line
    pub fn from_file(path: &Path, filter: RegionFilter) -> Result<Self, MapParseError> {
        let text = fs::read_to_string(path)
            .map_err(|source| MapParseError::Read { path: path.to_path_buf(), source })?;
        let set = Self::parse(&text, filter)?;
        info!("Loaded {} regions from {} ({filter:?})", set.len(), path.display());
        Ok(set)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Find the region containing `address`, if any
    #[must_use]
    pub fn resolve(&self, address: u64) -> Option<&MemoryRegion> {
        let idx = self.regions.partition_point(|r| r.start <= address);
        let region = self.regions.get(idx.checked_sub(1)?)?;
        region.contains(address).then_some(region)
    }

    /// Translate a virtual address into its backing object and file offset.
    /// `None` is a miss, not an error, including an offset past `u64::MAX`.
    #[must_use]
    pub fn translate(&self, address: u64) -> Option<ObjectOffset> {
        let region = self.resolve(address)?;
        let Some(offset) = region.offset.checked_add(address - region.start) else {
            warn!("File offset of {address:#x} overflows in region {region}");
            return None;
        };
        Some(ObjectOffset { pathname: region.pathname.clone(), offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = "\
00400000-00401000 r-xp 00000000 08:01 1234       /bin/foo
00601000-00602000 rw-p 00001000 08:01 1234       /bin/foo
7f0000000000-7f0000021000 rw-p 00000000 00:00 0
7f1000001000-7f1000002000 r-xp 00001000 fd:01 98765      /usr/lib/libbar.so
7ffd00000000-7ffd00021000 rw-p 00000000 00:00 0          [stack]
";

    fn region(start: u64, end: u64, offset: u64, pathname: &str) -> MemoryRegion {
        MemoryRegion {
            start,
            end,
            perms: "r-xp".to_string(),
            offset,
            dev_major: 8,
            dev_minor: 1,
            inode: 1,
            pathname: pathname.to_string(),
        }
    }

    #[test]
    fn test_region_contains() {
        let r = region(0x1000, 0x2000, 0, "/a");

        assert!(r.contains(0x1000));
        assert!(r.contains(0x1FFF));
        assert!(!r.contains(0x0FFF));
        assert!(!r.contains(0x2000));
    }

    #[test]
    fn test_parse_line_fields() {
        let r = parse_map_line("7f1000001000-7f1000002000 r-xp 00001000 fd:01 98765      /usr/lib/libbar.so")
            .unwrap();
        assert_eq!(r.start, 0x7f10_0000_1000);
        assert_eq!(r.end, 0x7f10_0000_2000);
        assert_eq!(r.perms, "r-xp");
        assert_eq!(r.offset, 0x1000);
        assert_eq!((r.dev_major, r.dev_minor), (0xfd, 0x01));
        assert_eq!(r.inode, 98765);
        assert_eq!(r.pathname, "/usr/lib/libbar.so");
    }

    #[test]
    fn test_parse_line_anonymous_and_spaces_in_path() {
        let anon = parse_map_line("7f0000000000-7f0000021000 rw-p 00000000 00:00 0 ").unwrap();
        assert_eq!(anon.pathname, "");

        let deleted = parse_map_line("1000-2000 r-xp 00000000 08:01 7 /tmp/a b (deleted)").unwrap();
        assert_eq!(deleted.pathname, "/tmp/a b (deleted)");
    }

    #[test]
    fn test_trailing_space_in_path_round_trips() {
        let line = "1000-2000 r-xp 00000000 08:01 7 /tmp/odd name ";
        let r = parse_map_line(line).unwrap();
        assert_eq!(r.pathname, "/tmp/odd name ");
        assert_eq!(r.to_string(), "00001000-00002000 r-xp 00000000 08:01 7 /tmp/odd name ");

        let crlf = parse_map_line("1000-2000 r-xp 00000000 08:01 7 /bin/foo\r\n").unwrap();
        assert_eq!(crlf.pathname, "/bin/foo");
    }

    #[test]
    fn test_device_numbers_are_16_bit() {
        let r = parse_map_line("1000-2000 r-xp 00000000 ffff:1 7 /bin/foo").unwrap();
        assert_eq!((r.dev_major, r.dev_minor), (0xffff, 1));
        assert!(parse_map_line("1000-2000 r-xp 00000000 10000:01 7 /bin/foo").is_err());
    }

    #[test]
    fn test_translate_offset_overflow_is_a_miss() {
        let set = MappedSet::parse(
            "1000-2000 r-xp ffffffffffffff00 08:01 1 /bin/foo\n",
            RegionFilter::Executable,
        )
        .unwrap();

        assert_eq!(
            set.translate(0x10ff),
            Some(ObjectOffset { pathname: "/bin/foo".to_string(), offset: u64::MAX })
        );
        assert!(set.resolve(0x1fff).is_some());
        assert_eq!(set.translate(0x1100), None);
        assert_eq!(set.translate(0x1fff), None);
    }

    #[test]
    fn test_display_round_trips() {
        for line in SNAPSHOT.lines() {
            let parsed = parse_map_line(line).unwrap();
            let reparsed = parse_map_line(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "round trip failed for {line:?}");
        }
    }

    #[test]
    fn test_malformed_lines_rejected() {
        for bad in [
            "",
            "00400000 r-xp 00000000 08:01 1 /bin/foo",
            "0040000g-00401000 r-xp 00000000 08:01 1 /bin/foo",
            "00400000-00401000 r-xp 00000000 0801 1 /bin/foo",
            "00400000-00401000 r-xp 00000000 08:01 x1 /bin/foo",
            "00400000-00401000 r-xp",
            "+0400000-00401000 r-xp 00000000 08:01 1 /bin/foo",
        ] {
            assert!(parse_map_line(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_empty_range_rejected() {
        let err = parse_map_line("2000-1000 r-xp 00000000 08:01 1 /bin/foo").unwrap_err();
        assert!(matches!(err, MapParseError::EmptyRange { .. }));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let text = "00400000-00401000 r-xp 00000000 08:01 1 /bin/foo\nnot a map line\n";
        match MappedSet::parse(text, RegionFilter::All) {
            Err(MapParseError::MalformedLine { line_number, line }) => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "not a map line");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_executable_filter() {
        let all = MappedSet::parse(SNAPSHOT, RegionFilter::All).unwrap();
        let exec = MappedSet::parse(SNAPSHOT, RegionFilter::Executable).unwrap();

        assert_eq!(all.len(), 5);
        assert_eq!(exec.len(), 2);
        assert!(exec.resolve(0x7f10_0000_1010).is_some_and(MemoryRegion::is_executable));
        assert!(exec.resolve(0x0060_1010).is_none());
        // Stack is parsed but not resolvable once filtered out
        assert!(all.resolve(0x7ffd_0000_0010).is_some());
        assert!(exec.resolve(0x7ffd_0000_0010).is_none());
    }

    #[test]
    fn test_resolve_gaps_and_edges() {
        let set = MappedSet::new(vec![
            region(0x3000, 0x4000, 0x500, "/b"),
            region(0x1000, 0x2000, 0, "/a"),
        ]);

        assert_eq!(set.resolve(0x1500).map(|r| r.pathname.as_str()), Some("/a"));
        assert!(set.resolve(0x2500).is_none());
        assert!(set.resolve(0x0fff).is_none());
        assert!(set.resolve(0x4000).is_none());
        assert!(set.resolve(u64::MAX).is_none());

        assert_eq!(
            set.translate(0x3100),
            Some(ObjectOffset { pathname: "/b".to_string(), offset: 0x600 })
        );
        assert_eq!(set.translate(0x2500), None);
    }

    #[test]
    fn test_resolve_on_empty_set() {
        let set = MappedSet::default();
        assert!(set.is_empty());
        assert!(set.resolve(0x1000).is_none());
    }
}
