//! Directory records and the per-slot scan policy.
//!
//! A directory is a run of 32-byte records. Scanning stops for good at the
//! first record whose name starts with 0x00; deleted records, long-name
//! fragments and volume labels are skipped.

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

use crate::fs::datetime::{FatDate, FatDateTime};
use crate::fs::fat_constants::{DIR_ENTRY_SIZE, ENTRY_DELETED, ENTRY_END};
use crate::fs::volume::FsError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

impl Attributes {
    /// Low-nibble pattern of a long-name fragment.
    pub const LONG_NAME: u8 = 0x0F;

    pub fn is_long_name(raw: u8) -> bool {
        raw & Self::LONG_NAME == Self::LONG_NAME
    }
}

/// One decoded short-name directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Printable `NAME.EXT` form.
    pub name: String,
    /// On-disk space-padded 8.3 name.
    pub short_name: [u8; 11],
    pub attributes: Attributes,
    pub file_size: u32,
    pub first_cluster: u32,
    pub created: FatDateTime,
    pub accessed: FatDate,
    pub modified: FatDateTime,
}

impl DirectoryEntry {
    /// Decode a 32-byte record. Does not apply the skip policy.
    pub fn parse(raw: &[u8]) -> Self {
        let mut short_name = [0u8; 11];
        short_name.copy_from_slice(&raw[0..11]);
        // high cluster word (20..22) is meaningless on FAT12
        DirectoryEntry {
            name: display_name(&short_name),
            short_name,
            attributes: Attributes::from_bits_retain(raw[11]),
            created: FatDateTime::decode_with_tenths(
                LittleEndian::read_u16(&raw[16..18]),
                LittleEndian::read_u16(&raw[14..16]),
                raw[13],
            ),
            accessed: FatDate::decode(LittleEndian::read_u16(&raw[18..20])),
            modified: FatDateTime::decode(LittleEndian::read_u16(&raw[24..26]), LittleEndian::read_u16(&raw[22..24])),
            first_cluster: LittleEndian::read_u16(&raw[26..28]) as u32,
            file_size: LittleEndian::read_u32(&raw[28..32]),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    /// `.` or `..`
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    /// Case-insensitive match against a user supplied `NAME.EXT`.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// What one 32-byte slot contributes to a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// 0x00 lead byte: nothing further in this directory.
    End,
    /// Deleted record or long-name fragment.
    Skip,
    VolumeLabel(String),
    Entry(DirectoryEntry),
}

impl Slot {
    pub fn classify(raw: &[u8]) -> Self {
        let lead = raw[0];
        let attr = raw[11];
        if lead == ENTRY_END {
            Slot::End
        } else if lead == ENTRY_DELETED || Attributes::is_long_name(attr) {
            Slot::Skip
        } else if attr & Attributes::VOLUME_ID.bits() != 0 {
            let label: String = raw[0..11].iter().map(|&b| printable(b)).collect();
            Slot::VolumeLabel(label.trim_end().to_string())
        } else {
            Slot::Entry(DirectoryEntry::parse(raw))
        }
    }
}

/// Result of one directory read: entries in on-disk order plus the error that
/// cut the scan short, if any.
#[derive(Debug, Default)]
pub struct DirectoryListing {
    pub entries: Vec<DirectoryEntry>,
    pub volume_label: Option<String>,
    pub error: Option<FsError>,
}

impl DirectoryListing {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DirectoryEntry> {
        self.entries.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.matches(name))
    }

    /// Drop the partial result if the scan failed.
    pub fn into_result(self) -> Result<Vec<DirectoryEntry>, FsError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.entries),
        }
    }
}

/// Incremental scanner fed one sector (or cluster) at a time.
#[derive(Debug, Default)]
pub(crate) struct DirectoryScan {
    listing: DirectoryListing,
}

impl DirectoryScan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every record in `block`. Returns `Ok(false)` once the end marker
    /// has been seen; later blocks must not be fed.
    pub fn feed(&mut self, block: &[u8]) -> Result<bool, FsError> {
        for raw in block.chunks_exact(DIR_ENTRY_SIZE) {
            match Slot::classify(raw) {
                Slot::End => return Ok(false),
                Slot::Skip => {}
                Slot::VolumeLabel(label) => {
                    if self.listing.volume_label.is_none() {
                        self.listing.volume_label = Some(label);
                    }
                }
                Slot::Entry(entry) => {
                    self.listing.entries.try_reserve(1).map_err(|_| FsError::AllocationExhausted)?;
                    self.listing.entries.push(entry);
                }
            }
        }
        Ok(true)
    }

    pub fn fail(mut self, error: FsError) -> DirectoryListing {
        self.listing.error = Some(error);
        self.listing
    }

    pub fn finish(self) -> DirectoryListing {
        self.listing
    }
}

fn printable(b: u8) -> char {
    if (0x20..0x7F).contains(&b) {
        b as char
    } else {
        '?'
    }
}

/// `NAME    EXT` -> `NAME.EXT`. Bytes outside printable ASCII, including a
/// stored 0x05 lead byte, show as `?`; `short_name` keeps the raw bytes.
pub fn display_name(short_name: &[u8; 11]) -> String {
    let base: String = short_name[0..8].iter().map(|&b| printable(b)).collect();
    let ext: String = short_name[8..11].iter().map(|&b| printable(b)).collect();
    let base = base.trim_end_matches(' ');
    let ext = ext.trim_end_matches(' ');
    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, ext)
    }
}

/// `name.ext` -> space-padded, upper-cased 8.3 bytes. `None` if it can't fit.
pub fn to_short_name(name: &str) -> Option<[u8; 11]> {
    if name == "." || name == ".." {
        let mut out = [b' '; 11];
        out[..name.len()].copy_from_slice(name.as_bytes());
        return Some(out);
    }
    let up = name.to_ascii_uppercase();
    let (base, ext) = match up.rsplit_once('.') {
        Some((b, e)) => (b, e),
        None => (up.as_str(), ""),
    };
    if base.is_empty() || base.len() > 8 || ext.len() > 3 || !up.is_ascii() {
        return None;
    }
    let mut out = [b' '; 11];
    out[..base.len()].copy_from_slice(base.as_bytes());
    out[8..8 + ext.len()].copy_from_slice(ext.as_bytes());
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &[u8; 11], attr: u8, cluster: u16, size: u32) -> [u8; 32] {
        let mut raw = [0u8; 32];
        raw[0..11].copy_from_slice(name);
        raw[11] = attr;
        raw[26..28].copy_from_slice(&cluster.to_le_bytes());
        raw[28..32].copy_from_slice(&size.to_le_bytes());
        raw
    }

    #[test]
    fn parse_record_fields() {
        let mut raw = record(b"README  TXT", 0x20, 2, 13);
        raw[20..22].copy_from_slice(&0xBEEFu16.to_le_bytes()); // ignored high word
        raw[24..26].copy_from_slice(&(((2020 - 1980) << 9 | 1 << 5 | 2) as u16).to_le_bytes());
        let e = DirectoryEntry::parse(&raw);
        assert_eq!(e.name, "README.TXT");
        assert_eq!(&e.short_name, b"README  TXT");
        assert!(!e.is_dir());
        assert!(e.attributes.contains(Attributes::ARCHIVE));
        assert_eq!(e.first_cluster, 2);
        assert_eq!(e.file_size, 13);
        assert_eq!(e.modified.date.to_string(), "2020-01-02");
    }

    #[test]
    fn names_without_extension_and_kanji_lead() {
        assert_eq!(display_name(b"SUBDIR     "), "SUBDIR");
        assert_eq!(display_name(b".          "), ".");
        assert_eq!(display_name(b"..         "), "..");
        let e = DirectoryEntry::parse(&record(b"\x05BC     TXT", 0, 3, 0));
        assert_eq!(e.name, "?BC.TXT");
        assert_eq!(e.short_name[0], 0x05);
    }

    #[test]
    fn short_name_encoding() {
        assert_eq!(to_short_name("readme.txt"), Some(*b"README  TXT"));
        assert_eq!(to_short_name("SUBDIR"), Some(*b"SUBDIR     "));
        assert_eq!(to_short_name(".."), Some(*b"..         "));
        assert_eq!(to_short_name("toolongname.txt"), None);
        assert_eq!(to_short_name("a.text"), None);
        assert_eq!(to_short_name(""), None);
    }

    #[test]
    fn slot_policy() {
        assert_eq!(Slot::classify(&[0u8; 32]), Slot::End);
        assert_eq!(Slot::classify(&record(b"\xE5ELETED TXT", 0x20, 5, 1)), Slot::Skip);
        assert_eq!(Slot::classify(&record(b"ALONGNAME  ", 0x0F, 0, 0)), Slot::Skip);
        assert_eq!(Slot::classify(&record(b"ALONGNAME  ", 0x3F, 0, 0)), Slot::Skip);
        assert_eq!(Slot::classify(&record(b"MY VOLUME  ", 0x08, 0, 0)), Slot::VolumeLabel("MY VOLUME".into()));
        assert!(matches!(Slot::classify(&record(b"DOCS       ", 0x10, 7, 0)), Slot::Entry(e) if e.is_dir()));
    }

    #[test]
    fn scan_stops_at_end_marker() {
        let mut block = vec![0u8; 512];
        block[0..32].copy_from_slice(&record(b"A       TXT", 0x20, 2, 1));
        block[32..64].copy_from_slice(&record(b"\xE5       TXT", 0x20, 3, 1));
        block[64..96].copy_from_slice(&record(b"LFN        ", 0x0F, 0, 0));
        block[96..128].copy_from_slice(&record(b"LABEL      ", 0x08, 0, 0));
        block[128..160].copy_from_slice(&record(b"B       TXT", 0x20, 4, 1));
        // 160..192 zero: end marker
        block[192..224].copy_from_slice(&record(b"GHOST   TXT", 0x20, 9, 1));

        let mut scan = DirectoryScan::new();
        assert!(!scan.feed(&block).unwrap());
        let listing = scan.finish();
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["A.TXT", "B.TXT"]);
        assert_eq!(listing.volume_label.as_deref(), Some("LABEL"));
        assert!(listing.is_complete());
    }
}
