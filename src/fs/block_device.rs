use core::fmt;

use crate::fs::fat_constants::NATIVE_SECTOR_SIZE;

pub type Result<T> = core::result::Result<T, DeviceError>;

/// Failures reported by a sector source.
#[derive(Debug)]
pub enum DeviceError {
    /// The backing store returned fewer bytes than requested.
    ShortRead { lba: u32, expected: usize, actual: usize },
    /// The first requested sector lies past the end of the device.
    OutOfRange { lba: u32 },
    /// Sector size is zero or not a multiple of the native size.
    UnsupportedSectorSize(usize),
    /// Caller buffer cannot hold the requested sectors.
    BufferTooSmall { needed: usize, actual: usize },
    Io(std::io::Error),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::ShortRead { lba, expected, actual } => {
                write!(f, "short read at sector {}: expected {} bytes, got {}", lba, expected, actual)
            }
            DeviceError::OutOfRange { lba } => write!(f, "sector {} is past the end of the device", lba),
            DeviceError::UnsupportedSectorSize(size) => {
                write!(f, "unsupported sector size {} (must be a non-zero multiple of {})", size, NATIVE_SECTOR_SIZE)
            }
            DeviceError::BufferTooSmall { needed, actual } => {
                write!(f, "buffer too small: need {} bytes, have {}", needed, actual)
            }
            DeviceError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(e: std::io::Error) -> Self {
        DeviceError::Io(e)
    }
}

/// Sector-addressed, read-only source the FAT modules pull bytes from.
pub trait BlockDevice {
    /// Current logical sector size in bytes.
    fn sector_size(&self) -> usize;

    /// Reconfigure the logical sector size, e.g. after the boot sector
    /// reports something other than 512.
    fn set_sector_size(&mut self, size: usize) -> Result<()>;

    /// Number of whole logical sectors on this device.
    fn sector_count(&self) -> u64;

    /// Read exactly `count` sectors starting at `lba` into the front of `buf`.
    fn read_sectors(&mut self, lba: u32, count: u32, buf: &mut [u8]) -> Result<()>;

    /// Read exactly one sector at `lba` into the front of `buf`.
    fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> Result<()> {
        self.read_sectors(lba, 1, buf)
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn sector_size(&self) -> usize {
        (**self).sector_size()
    }

    fn set_sector_size(&mut self, size: usize) -> Result<()> {
        (**self).set_sector_size(size)
    }

    fn sector_count(&self) -> u64 {
        (**self).sector_count()
    }

    fn read_sectors(&mut self, lba: u32, count: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read_sectors(lba, count, buf)
    }
}

/// Shared sector-size rule for every device implementation.
pub fn check_sector_size(size: usize) -> Result<()> {
    if size == 0 || size % NATIVE_SECTOR_SIZE != 0 {
        return Err(DeviceError::UnsupportedSectorSize(size));
    }
    Ok(())
}

/// Byte length of `count` sectors, checking that `buf` can hold them.
pub(crate) fn request_len(sector_size: usize, count: u32, buf: &[u8]) -> Result<usize> {
    let needed = sector_size * count as usize;
    if buf.len() < needed {
        return Err(DeviceError::BufferTooSmall { needed, actual: buf.len() });
    }
    Ok(needed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_size_rule() {
        assert!(check_sector_size(512).is_ok());
        assert!(check_sector_size(4096).is_ok());
        assert!(matches!(check_sector_size(0), Err(DeviceError::UnsupportedSectorSize(0))));
        assert!(matches!(check_sector_size(513), Err(DeviceError::UnsupportedSectorSize(513))));
    }

    #[test]
    fn request_len_rejects_small_buffers() {
        let buf = [0u8; 1000];
        assert_eq!(request_len(512, 1, &buf).ok(), Some(512));
        assert!(matches!(
            request_len(512, 2, &buf),
            Err(DeviceError::BufferTooSmall { needed: 1024, actual: 1000 })
        ));
    }
}
