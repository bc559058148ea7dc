//! In-memory block device and a builder for synthetic FAT12 images.
//!
//! Both exist for tests and demos; the driver itself never writes to a device.

use std::collections::HashMap;
use std::io;

use crate::fs::block_device::{check_sector_size, request_len, BlockDevice, DeviceError, Result};
use crate::fs::boot_sector::{BootSector, FatError, Geometry};
use crate::fs::directory::{to_short_name, Attributes};
use crate::fs::fat_constants::*;

pub struct MockDevice {
    pub buf: Vec<u8>,
    sector_size: usize,
    fail_at: Option<u32>,
    reads: usize,
}

impl MockDevice {
    pub fn new(buf: Vec<u8>) -> Self {
        MockDevice { buf, sector_size: NATIVE_SECTOR_SIZE, fail_at: None, reads: 0 }
    }

    /// Make every read touching sector `lba` fail.
    pub fn fail_at(mut self, lba: u32) -> Self {
        self.fail_at = Some(lba);
        self
    }

    /// Number of `read_sectors` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl BlockDevice for MockDevice {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn set_sector_size(&mut self, size: usize) -> Result<()> {
        check_sector_size(size)?;
        self.sector_size = size;
        Ok(())
    }

    fn sector_count(&self) -> u64 {
        (self.buf.len() / self.sector_size) as u64
    }

    fn read_sectors(&mut self, lba: u32, count: u32, buf: &mut [u8]) -> Result<()> {
        self.reads += 1;
        let needed = request_len(self.sector_size, count, buf)?;
        if let Some(bad) = self.fail_at {
            if bad >= lba && bad < lba + count {
                return Err(DeviceError::Io(io::Error::new(io::ErrorKind::Other, "injected read fault")));
            }
        }
        let start = lba as usize * self.sector_size;
        if start >= self.buf.len() && needed > 0 {
            return Err(DeviceError::OutOfRange { lba });
        }
        let available = (self.buf.len() - start).min(needed);
        buf[..available].copy_from_slice(&self.buf[start..start + available]);
        if available != needed {
            return Err(DeviceError::ShortRead { lba, expected: needed, actual: available });
        }
        Ok(())
    }
}

struct DirState {
    clusters: Vec<u32>,
    next_slot: usize,
}

/// Lays out a FAT12 volume in memory: boot sector, every FAT copy, the root
/// directory, subdirectories and file data.
///
/// # Panics
/// Builder methods panic when the volume runs out of clusters or directory
/// slots, or when a name does not fit 8.3.
pub struct Fat12ImageBuilder {
    geometry: Geometry,
    image: Vec<u8>,
    next_free: u32,
    dirs: HashMap<u32, DirState>,
}

impl Fat12ImageBuilder {
    /// Standard 1.44MB floppy: 512 B sectors, 1 sector/cluster, 2 FATs of 9
    /// sectors, 224 root entries, 2880 sectors.
    pub fn floppy_1440() -> Self {
        Self::new(Self::layout(512, 1, 1, 2, FLOPPY_1440_SECTORS_PER_FAT, FLOPPY_1440_ROOT_ENTRIES, FLOPPY_1440_TOTAL_SECTORS))
            .expect("floppy layout is valid")
    }

    /// Boot sector with the given BPB values and an extended BPB.
    pub fn layout(
        bytes_per_sector: u16,
        sectors_per_cluster: u8,
        reserved_sectors: u16,
        fat_count: u8,
        fat_size: u16,
        root_entries: u16,
        total_sectors: u16,
    ) -> BootSector {
        BootSector {
            jump: [0xEB, 0x3C, 0x90],
            oem_name: *b"RZFAT12 ",
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            root_entry_count: root_entries,
            total_sectors_16: total_sectors,
            media_descriptor: FLOPPY_1440_MEDIA,
            fat_size_16: fat_size,
            sectors_per_track: 18,
            heads: 2,
            hidden_sectors: 0,
            total_sectors_32: 0,
            drive_number: 0,
            boot_signature: EXT_BOOT_SIGNATURE,
            volume_id: 0x1234_ABCD,
            volume_label: *b"NO NAME    ",
            fs_type: *b"FAT12   ",
            signature_present: true,
        }
    }

    pub fn new(boot: BootSector) -> core::result::Result<Self, FatError> {
        let geometry = boot.geometry()?;
        let bps = geometry.bytes_per_sector as usize;
        let mut image = vec![0u8; geometry.total_sectors as usize * bps];
        boot.serialize(&mut image[..bps])?;

        let mut dirs = HashMap::new();
        dirs.insert(ROOT_CLUSTER, DirState { clusters: Vec::new(), next_slot: 0 });
        let mut builder = Fat12ImageBuilder { geometry, image, next_free: FIRST_DATA_CLUSTER, dirs };
        builder.set_fat_entry(0, 0xF00 | boot.media_descriptor as u16);
        builder.set_fat_entry(1, FAT12_EOC);
        Ok(builder)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Store a 12-bit value for `cluster` in every FAT copy.
    pub fn set_fat_entry(&mut self, cluster: u32, value: u16) {
        let bps = self.geometry.bytes_per_sector as usize;
        for copy in 0..self.geometry.fat_count {
            let base = self.geometry.fat_start_sector(copy) as usize * bps;
            pack_fat12(&mut self.image[base..base + self.geometry.fat_bytes()], cluster, value);
        }
    }

    /// Store a value in one FAT copy only, to simulate diverging mirrors.
    pub fn set_fat_entry_in_copy(&mut self, copy: u32, cluster: u32, value: u16) {
        let bps = self.geometry.bytes_per_sector as usize;
        let base = self.geometry.fat_start_sector(copy) as usize * bps;
        pack_fat12(&mut self.image[base..base + self.geometry.fat_bytes()], cluster, value);
    }

    /// Link `clusters` in order and terminate the chain.
    pub fn link(&mut self, clusters: &[u32]) {
        for pair in clusters.windows(2) {
            self.set_fat_entry(pair[0], pair[1] as u16);
        }
        if let Some(&last) = clusters.last() {
            self.set_fat_entry(last, FAT12_EOC);
        }
    }

    pub fn alloc_cluster(&mut self) -> u32 {
        let cluster = self.next_free;
        assert!(self.geometry.is_data_cluster(cluster), "volume is full");
        self.next_free += 1;
        cluster
    }

    /// Byte range of a data cluster inside the image.
    pub fn cluster_range(&self, cluster: u32) -> core::ops::Range<usize> {
        let sector = self.geometry.cluster_to_sector(cluster).expect("not a data cluster");
        let start = sector as usize * self.geometry.bytes_per_sector as usize;
        start..start + self.geometry.bytes_per_cluster()
    }

    pub fn write_cluster(&mut self, cluster: u32, data: &[u8]) {
        let range = self.cluster_range(cluster);
        let len = data.len().min(range.len());
        self.image[range.start..range.start + len].copy_from_slice(&data[..len]);
    }

    /// Store `data` in freshly allocated clusters and add a file record to
    /// `parent` (0 for the root). Returns the first cluster, 0 for empty data.
    pub fn add_file(&mut self, parent: u32, name: &str, data: &[u8]) -> u32 {
        let bpc = self.geometry.bytes_per_cluster();
        let clusters: Vec<u32> = data.chunks(bpc).map(|_| self.alloc_cluster()).collect();
        for (&cluster, chunk) in clusters.iter().zip(data.chunks(bpc)) {
            self.write_cluster(cluster, chunk);
        }
        self.link(&clusters);
        let first = clusters.first().copied().unwrap_or(0);
        self.add_record(parent, Self::record(name, Attributes::ARCHIVE.bits(), first, data.len() as u32));
        first
    }

    /// Create an empty subdirectory of `parent` holding `.` and `..`.
    pub fn add_dir(&mut self, parent: u32, name: &str) -> u32 {
        let cluster = self.alloc_cluster();
        self.link(&[cluster]);
        self.add_record(parent, Self::record(name, Attributes::DIRECTORY.bits(), cluster, 0));
        self.dirs.insert(cluster, DirState { clusters: vec![cluster], next_slot: 0 });
        self.add_record(cluster, Self::record(".", Attributes::DIRECTORY.bits(), cluster, 0));
        self.add_record(cluster, Self::record("..", Attributes::DIRECTORY.bits(), parent, 0));
        cluster
    }

    pub fn set_volume_label(&mut self, label: &str) {
        let mut name = [b' '; 11];
        for (dst, &src) in name.iter_mut().zip(label.as_bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        self.add_record(ROOT_CLUSTER, Self::raw_record(&name, Attributes::VOLUME_ID.bits(), 0, 0));
    }

    /// Append a raw record to the next free slot of `dir`.
    pub fn add_record(&mut self, dir: u32, raw: [u8; 32]) -> usize {
        let state = self.dirs.get_mut(&dir).expect("unknown directory");
        let slot = state.next_slot;
        state.next_slot += 1;
        self.put_record(dir, slot, raw);
        slot
    }

    /// Write a raw record into slot `slot` of `dir`, growing a subdirectory
    /// chain as needed.
    pub fn put_record(&mut self, dir: u32, slot: usize, raw: [u8; 32]) {
        let bps = self.geometry.bytes_per_sector as usize;
        let offset = if dir == ROOT_CLUSTER {
            assert!(slot < self.geometry.root_entry_count as usize, "root directory is full");
            self.geometry.root_dir_start_sector as usize * bps + slot * DIR_ENTRY_SIZE
        } else {
            let per_cluster = self.geometry.bytes_per_cluster() / DIR_ENTRY_SIZE;
            let index = slot / per_cluster;
            while self.dirs[&dir].clusters.len() <= index {
                let cluster = self.alloc_cluster();
                let state = self.dirs.get_mut(&dir).expect("unknown directory");
                state.clusters.push(cluster);
                let chain = state.clusters.clone();
                self.link(&chain);
            }
            let cluster = self.dirs[&dir].clusters[index];
            self.cluster_range(cluster).start + (slot % per_cluster) * DIR_ENTRY_SIZE
        };
        self.image[offset..offset + DIR_ENTRY_SIZE].copy_from_slice(&raw);
    }

    /// 32-byte record for a `NAME.EXT` style name.
    pub fn record(name: &str, attr: u8, cluster: u32, size: u32) -> [u8; 32] {
        let short = to_short_name(name).expect("name does not fit 8.3");
        Self::raw_record(&short, attr, cluster, size)
    }

    pub fn raw_record(short_name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
        let mut raw = [0u8; 32];
        raw[0..11].copy_from_slice(short_name);
        raw[11] = attr;
        // 2024-01-01 12:00:00
        let date: u16 = ((2024 - 1980) << 9) | (1 << 5) | 1;
        let time: u16 = 12 << 11;
        raw[14..16].copy_from_slice(&time.to_le_bytes());
        raw[16..18].copy_from_slice(&date.to_le_bytes());
        raw[18..20].copy_from_slice(&date.to_le_bytes());
        raw[22..24].copy_from_slice(&time.to_le_bytes());
        raw[24..26].copy_from_slice(&date.to_le_bytes());
        raw[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
        raw[28..32].copy_from_slice(&size.to_le_bytes());
        raw
    }

    pub fn build(self) -> Vec<u8> {
        self.image
    }

    pub fn into_device(self) -> MockDevice {
        MockDevice::new(self.image)
    }
}

/// Store a 12-bit FAT entry using the on-disk packing.
pub fn pack_fat12(fat: &mut [u8], cluster: u32, value: u16) {
    let idx = (cluster as usize * 3) / 2;
    let value = value & 0x0FFF;
    if cluster % 2 == 0 {
        fat[idx] = (value & 0xFF) as u8;
        fat[idx + 1] = (fat[idx + 1] & 0xF0) | (value >> 8) as u8;
    } else {
        fat[idx] = (fat[idx] & 0x0F) | ((value & 0x0F) << 4) as u8;
        fat[idx + 1] = (value >> 4) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::fat_table::FatTable;

    #[test]
    fn packed_entries_decode() {
        let mut fat = vec![0u8; 12];
        pack_fat12(&mut fat, 2, 3);
        pack_fat12(&mut fat, 3, 4);
        pack_fat12(&mut fat, 4, FAT12_EOC);
        pack_fat12(&mut fat, 5, 0xABC);
        let table = FatTable::from_bytes(fat);
        assert_eq!(table.chain(2).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(table.entry(5), Some(0xABC));
    }

    #[test]
    fn injected_fault() {
        let mut dev = MockDevice::new(vec![0u8; 4 * 512]).fail_at(2);
        let mut buf = [0u8; 1024];
        assert!(dev.read_sectors(0, 2, &mut buf).is_ok());
        assert!(matches!(dev.read_sectors(1, 2, &mut buf), Err(DeviceError::Io(_))));
        assert!(matches!(dev.read_sector(9, &mut buf), Err(DeviceError::OutOfRange { lba: 9 })));
        assert_eq!(dev.reads(), 3);
    }

    #[test]
    fn builder_lays_out_floppy() {
        let mut b = Fat12ImageBuilder::floppy_1440();
        let first = b.add_file(ROOT_CLUSTER, "hello.txt", b"hi");
        assert_eq!(first, 2);
        let img = b.build();
        assert_eq!(img.len(), 2880 * 512);
        assert_eq!(&img[510..512], &[0x55, 0xAA]);
        // root directory starts at sector 19
        assert_eq!(&img[19 * 512..19 * 512 + 11], b"HELLO   TXT");
        // file data at sector 33
        assert_eq!(&img[33 * 512..33 * 512 + 2], b"hi");
        // both FAT copies agree
        assert_eq!(&img[512..512 + 9 * 512], &img[10 * 512..10 * 512 + 9 * 512]);
    }
}
