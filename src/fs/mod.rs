//! Read-only FAT12 driver.
//!
//! `boot_sector` decodes the BPB into a validated `Geometry`, `fat_table`
//! decodes the packed 12-bit allocation table, `volume` lists directories and
//! streams files over any `BlockDevice`, and `navigation` tracks where an
//! interactive browser currently is.

pub mod block_device;
pub mod boot_sector;
pub mod datetime;
pub mod directory;
pub mod fat_constants;
pub mod fat_table;
pub mod image_device;
pub mod mock_device;
pub mod navigation;
pub mod volume;

pub use block_device::{BlockDevice, DeviceError};
pub use boot_sector::{BootSector, FatError, Geometry};
pub use directory::{Attributes, DirectoryEntry, DirectoryListing};
pub use fat_table::{ClusterRef, FatTable};
pub use image_device::{ImageDevice, ImageFile};
pub use navigation::{ClusterStack, Navigator, Opened};
pub use volume::{FileStream, FsError, Volume, VolumeOptions};
