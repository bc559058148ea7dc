//! Read-only FAT12 disk image driver.
//!
//! `fs` holds the on-disk formats and the `Volume` that reads them,
//! `shell` an interactive browser on top, `logger` the stderr log sink
//! used by the `fat12-browse` binary.

pub mod fs;
pub mod logger;
pub mod shell;

pub use fs::{BlockDevice, DirectoryEntry, DirectoryListing, FileStream, FsError, ImageFile, Volume, VolumeOptions};
