// On-disk constants for FAT12 volumes.
// Kept in one small module so parsers, the image builder and tests agree.

/// Sector size every block device starts out with.
pub const NATIVE_SECTOR_SIZE: usize = 512;

/// Length of the fixed boot record (BPB + extended BPB) we decode.
pub const BOOT_RECORD_LEN: usize = 62;

// Boot sector signature offset
pub const BOOT_SIG_OFFSET: usize = 510;
pub const BOOT_SIG_LEAD: u8 = 0x55;
pub const BOOT_SIG_TRAIL: u8 = 0xAA;

/// Extended boot signature marking the presence of volume id/label fields.
pub const EXT_BOOT_SIGNATURE: u8 = 0x29;

// FAT12 detection thresholds
pub const FAT12_MAX_CLUSTERS: u32 = 4084; // < 4085 means FAT12

/// Size of one directory record.
pub const DIR_ENTRY_SIZE: usize = 32;

// First name byte markers
pub const ENTRY_END: u8 = 0x00;
pub const ENTRY_DELETED: u8 = 0xE5;

/// Cluster value standing in for the fixed root directory.
pub const ROOT_CLUSTER: u32 = 0;
/// Clusters 0 and 1 never address data.
pub const FIRST_DATA_CLUSTER: u32 = 2;

// FAT12 entry values
pub const FAT12_FREE: u16 = 0x000;
pub const FAT12_RESERVED: u16 = 0x001;
pub const FAT12_MAX_POINTER: u16 = 0xFEF;
pub const FAT12_BAD: u16 = 0xFF7;
pub const FAT12_EOC_MIN: u16 = 0xFF8;
/// Value the image builder writes to terminate a chain.
pub const FAT12_EOC: u16 = 0xFFF;

// Common 1.44MB floppy layout
pub const FLOPPY_1440_TOTAL_SECTORS: u16 = 2880;
pub const FLOPPY_1440_SECTORS_PER_FAT: u16 = 9;
pub const FLOPPY_1440_ROOT_ENTRIES: u16 = 224;
pub const FLOPPY_1440_MEDIA: u8 = 0xF0;
