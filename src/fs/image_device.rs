use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::fs::block_device::{check_sector_size, request_len, BlockDevice, DeviceError, Result};
use crate::fs::fat_constants::NATIVE_SECTOR_SIZE;

/// Block device over any seekable byte stream, typically a disk image file.
pub struct ImageDevice<R> {
    inner: R,
    sector_size: usize,
    len: u64,
}

/// A disk image opened from the filesystem. Closed when dropped.
pub type ImageFile = ImageDevice<File>;

impl ImageDevice<File> {
    /// Open a disk image read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("opened image {}", path.display());
        ImageDevice::new(file)
    }
}

impl<R: Read + Seek> ImageDevice<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(ImageDevice { inner, sector_size: NATIVE_SECTOR_SIZE, len })
    }

    /// Image length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<R: Read + Seek> BlockDevice for ImageDevice<R> {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn set_sector_size(&mut self, size: usize) -> Result<()> {
        check_sector_size(size)?;
        self.sector_size = size;
        Ok(())
    }

    fn sector_count(&self) -> u64 {
        self.len / self.sector_size as u64
    }

    fn read_sectors(&mut self, lba: u32, count: u32, buf: &mut [u8]) -> Result<()> {
        let needed = request_len(self.sector_size, count, buf)?;
        let offset = lba as u64 * self.sector_size as u64;
        if offset >= self.len && needed > 0 {
            return Err(DeviceError::OutOfRange { lba });
        }
        self.inner.seek(SeekFrom::Start(offset))?;

        // fill as much as the stream gives us, then judge the count
        let mut filled = 0usize;
        while filled < needed {
            match self.inner.read(&mut buf[filled..needed]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled != needed {
            return Err(DeviceError::ShortRead { lba, expected: needed, actual: filled });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn numbered_image(sectors: usize) -> Vec<u8> {
        let mut img = vec![0u8; sectors * NATIVE_SECTOR_SIZE];
        for (i, chunk) in img.chunks_mut(NATIVE_SECTOR_SIZE).enumerate() {
            chunk.fill(i as u8);
        }
        img
    }

    #[test]
    fn reads_addressed_sectors() {
        let mut dev = ImageDevice::new(Cursor::new(numbered_image(4))).unwrap();
        assert_eq!(dev.sector_count(), 4);
        let mut buf = [0u8; 1024];
        dev.read_sectors(2, 2, &mut buf).unwrap();
        assert!(buf[..512].iter().all(|&b| b == 2));
        assert!(buf[512..].iter().all(|&b| b == 3));
    }

    #[test]
    fn truncated_image_is_short_read() {
        let mut img = numbered_image(2);
        img.truncate(700);
        let mut dev = ImageDevice::new(Cursor::new(img)).unwrap();
        let mut buf = [0u8; 512];
        match dev.read_sector(1, &mut buf) {
            Err(DeviceError::ShortRead { lba: 1, expected: 512, actual: 188 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(dev.read_sector(5, &mut buf), Err(DeviceError::OutOfRange { lba: 5 })));
    }

    #[test]
    fn larger_sector_size_rescales_lba() {
        let mut dev = ImageDevice::new(Cursor::new(numbered_image(4))).unwrap();
        dev.set_sector_size(1024).unwrap();
        assert_eq!(dev.sector_count(), 2);
        let mut buf = [0u8; 1024];
        dev.read_sector(1, &mut buf).unwrap();
        assert_eq!(buf[0], 2);
        assert_eq!(buf[1023], 3);
        assert!(dev.set_sector_size(100).is_err());
    }
}
