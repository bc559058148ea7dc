use core::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::fs::fat_constants::{
    BOOT_RECORD_LEN, BOOT_SIG_LEAD, BOOT_SIG_OFFSET, BOOT_SIG_TRAIL, DIR_ENTRY_SIZE, EXT_BOOT_SIGNATURE,
    FAT12_MAX_CLUSTERS, FIRST_DATA_CLUSTER, NATIVE_SECTOR_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatError {
    /// Buffer too short to hold the boot record.
    InvalidBootSector { len: usize },
    /// Decoded fields cannot describe a usable FAT12 volume.
    InvalidGeometry(&'static str),
}

impl fmt::Display for FatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatError::InvalidBootSector { len } => {
                write!(f, "invalid boot sector: {} bytes, need at least {}", len, BOOT_RECORD_LEN)
            }
            FatError::InvalidGeometry(reason) => write!(f, "invalid geometry: {}", reason),
        }
    }
}

impl std::error::Error for FatError {}

/// Raw boot record, decoded field by field with no sanity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSector {
    pub jump: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media_descriptor: u8,
    pub fat_size_16: u16,
    pub sectors_per_track: u16,
    pub heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    pub drive_number: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
    /// Whether the 0x55AA trailer was present (only checked on full sectors).
    pub signature_present: bool,
}

impl BootSector {
    pub fn parse(buf: &[u8]) -> Result<Self, FatError> {
        if buf.len() < BOOT_RECORD_LEN {
            return Err(FatError::InvalidBootSector { len: buf.len() });
        }

        let mut jump = [0u8; 3];
        jump.copy_from_slice(&buf[0..3]);
        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(&buf[3..11]);
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&buf[43..54]);
        let mut fs_type = [0u8; 8];
        fs_type.copy_from_slice(&buf[54..62]);

        let signature_present = buf.len() >= BOOT_SIG_OFFSET + 2
            && buf[BOOT_SIG_OFFSET] == BOOT_SIG_LEAD
            && buf[BOOT_SIG_OFFSET + 1] == BOOT_SIG_TRAIL;

        Ok(BootSector {
            jump,
            oem_name,
            bytes_per_sector: LittleEndian::read_u16(&buf[11..13]),
            sectors_per_cluster: buf[13],
            reserved_sectors: LittleEndian::read_u16(&buf[14..16]),
            fat_count: buf[16],
            root_entry_count: LittleEndian::read_u16(&buf[17..19]),
            total_sectors_16: LittleEndian::read_u16(&buf[19..21]),
            media_descriptor: buf[21],
            fat_size_16: LittleEndian::read_u16(&buf[22..24]),
            sectors_per_track: LittleEndian::read_u16(&buf[24..26]),
            heads: LittleEndian::read_u16(&buf[26..28]),
            hidden_sectors: LittleEndian::read_u32(&buf[28..32]),
            total_sectors_32: LittleEndian::read_u32(&buf[32..36]),
            drive_number: buf[36],
            boot_signature: buf[38],
            volume_id: LittleEndian::read_u32(&buf[39..43]),
            volume_label,
            fs_type,
            signature_present,
        })
    }

    /// Write the BPB fields back into a full boot sector buffer.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), FatError> {
        if buf.len() < BOOT_SIG_OFFSET + 2 {
            return Err(FatError::InvalidBootSector { len: buf.len() });
        }
        buf[0..3].copy_from_slice(&self.jump);
        buf[3..11].copy_from_slice(&self.oem_name);
        LittleEndian::write_u16(&mut buf[11..13], self.bytes_per_sector);
        buf[13] = self.sectors_per_cluster;
        LittleEndian::write_u16(&mut buf[14..16], self.reserved_sectors);
        buf[16] = self.fat_count;
        LittleEndian::write_u16(&mut buf[17..19], self.root_entry_count);
        LittleEndian::write_u16(&mut buf[19..21], self.total_sectors_16);
        buf[21] = self.media_descriptor;
        LittleEndian::write_u16(&mut buf[22..24], self.fat_size_16);
        LittleEndian::write_u16(&mut buf[24..26], self.sectors_per_track);
        LittleEndian::write_u16(&mut buf[26..28], self.heads);
        LittleEndian::write_u32(&mut buf[28..32], self.hidden_sectors);
        LittleEndian::write_u32(&mut buf[32..36], self.total_sectors_32);
        buf[36] = self.drive_number;
        buf[38] = self.boot_signature;
        LittleEndian::write_u32(&mut buf[39..43], self.volume_id);
        buf[43..54].copy_from_slice(&self.volume_label);
        buf[54..62].copy_from_slice(&self.fs_type);
        // boot sig
        if self.signature_present {
            buf[BOOT_SIG_OFFSET] = BOOT_SIG_LEAD;
            buf[BOOT_SIG_OFFSET + 1] = BOOT_SIG_TRAIL;
        }
        Ok(())
    }

    pub fn has_boot_signature(&self) -> bool {
        self.signature_present
    }

    pub fn has_extended_bpb(&self) -> bool {
        self.boot_signature == EXT_BOOT_SIGNATURE
    }

    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u32
        } else {
            self.total_sectors_32
        }
    }

    pub fn oem_name_str(&self) -> String {
        trimmed_ascii(&self.oem_name)
    }

    /// Label from the extended BPB, if one is recorded.
    pub fn volume_label_str(&self) -> Option<String> {
        if !self.has_extended_bpb() {
            return None;
        }
        let label = trimmed_ascii(&self.volume_label);
        if label.is_empty() || label == "NO NAME" {
            None
        } else {
            Some(label)
        }
    }

    /// Check the fields and derive the volume layout.
    pub fn geometry(&self) -> Result<Geometry, FatError> {
        let bps = self.bytes_per_sector as u32;
        if bps == 0 || bps as usize % NATIVE_SECTOR_SIZE != 0 {
            return Err(FatError::InvalidGeometry("bytes per sector must be a non-zero multiple of 512"));
        }
        let spc = self.sectors_per_cluster as u32;
        if spc == 0 || !spc.is_power_of_two() {
            return Err(FatError::InvalidGeometry("sectors per cluster must be a power of two"));
        }
        if self.reserved_sectors == 0 {
            return Err(FatError::InvalidGeometry("reserved sector count is zero"));
        }
        if self.fat_count == 0 {
            return Err(FatError::InvalidGeometry("FAT count is zero"));
        }
        if self.fat_size_16 == 0 {
            return Err(FatError::InvalidGeometry("FAT size is zero"));
        }
        if self.root_entry_count == 0 {
            return Err(FatError::InvalidGeometry("root directory has no entries"));
        }
        let total_sectors = self.total_sectors();
        if total_sectors == 0 {
            return Err(FatError::InvalidGeometry("total sector count is zero"));
        }

        let fat_start_sector = self.reserved_sectors as u32;
        let root_dir_start_sector = fat_start_sector + self.fat_count as u32 * self.fat_size_16 as u32;
        let root_dir_sector_count = (self.root_entry_count as u32 * DIR_ENTRY_SIZE as u32).div_ceil(bps);
        let data_region_start = root_dir_start_sector + root_dir_sector_count;
        if total_sectors < data_region_start {
            return Err(FatError::InvalidGeometry("volume ends before the data region"));
        }
        let cluster_count = (total_sectors - data_region_start) / spc;
        if cluster_count > FAT12_MAX_CLUSTERS {
            return Err(FatError::InvalidGeometry("too many clusters for FAT12"));
        }

        Ok(Geometry {
            bytes_per_sector: bps,
            sectors_per_cluster: spc,
            reserved_sectors: self.reserved_sectors as u32,
            fat_count: self.fat_count as u32,
            fat_size: self.fat_size_16 as u32,
            root_entry_count: self.root_entry_count as u32,
            media_descriptor: self.media_descriptor,
            total_sectors,
            root_dir_start_sector,
            root_dir_sector_count,
            data_region_start,
            cluster_count,
        })
    }
}

/// Validated layout of an open volume. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub fat_count: u32,
    /// Sectors per FAT copy.
    pub fat_size: u32,
    pub root_entry_count: u32,
    pub media_descriptor: u8,
    pub total_sectors: u32,
    pub root_dir_start_sector: u32,
    pub root_dir_sector_count: u32,
    pub data_region_start: u32,
    /// Number of addressable data clusters.
    pub cluster_count: u32,
}

impl Geometry {
    pub fn bytes_per_cluster(&self) -> usize {
        self.bytes_per_sector as usize * self.sectors_per_cluster as usize
    }

    /// Byte length of one FAT copy.
    pub fn fat_bytes(&self) -> usize {
        self.fat_size as usize * self.bytes_per_sector as usize
    }

    /// First sector of FAT copy `index`.
    pub fn fat_start_sector(&self, index: u32) -> u32 {
        self.reserved_sectors + index * self.fat_size
    }

    /// First sector of a data cluster; `None` for the reserved entries 0 and 1.
    pub fn cluster_to_sector(&self, cluster: u32) -> Option<u32> {
        let index = cluster.checked_sub(FIRST_DATA_CLUSTER)?;
        Some(self.data_region_start + index * self.sectors_per_cluster)
    }

    /// Whether `cluster` addresses a cluster inside the data region.
    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= FIRST_DATA_CLUSTER && cluster < self.cluster_count + FIRST_DATA_CLUSTER
    }
}

fn trimmed_ascii(bytes: &[u8]) -> String {
    let s: String = bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect();
    s.trim_end_matches(' ').to_string()
}
