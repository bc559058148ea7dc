use crate::fs::block_device::BlockDevice;
use crate::fs::boot_sector::Geometry;
use crate::fs::fat_constants::{
    FAT12_BAD, FAT12_EOC_MIN, FAT12_FREE, FAT12_MAX_POINTER, FAT12_RESERVED, FIRST_DATA_CLUSTER,
};
use crate::fs::volume::FsError;

/// Classification of a FAT12 entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterRef {
    Free,
    Reserved,
    Pointer(u32),
    Bad,
    EndOfChain,
    /// The entry lies past the end of the loaded table.
    OutOfRange,
}

impl ClusterRef {
    pub fn classify(value: u16) -> Self {
        match value & 0x0FFF {
            FAT12_FREE => ClusterRef::Free,
            FAT12_RESERVED => ClusterRef::Reserved,
            v @ 0x002..=FAT12_MAX_POINTER => ClusterRef::Pointer(v as u32),
            FAT12_BAD => ClusterRef::Bad,
            v if v >= FAT12_EOC_MIN => ClusterRef::EndOfChain,
            _ => ClusterRef::Reserved, // 0xFF0..=0xFF6
        }
    }
}

/// In-memory copy of one FAT, read-only after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatTable {
    bytes: Vec<u8>,
}

impl FatTable {
    /// Read the first FAT copy from the device.
    pub fn load<D: BlockDevice>(device: &mut D, geometry: &Geometry) -> Result<Self, FsError> {
        Self::load_copy(device, geometry, 0)
    }

    /// Read FAT copy `index` (0-based) from the device.
    pub fn load_copy<D: BlockDevice>(device: &mut D, geometry: &Geometry, index: u32) -> Result<Self, FsError> {
        let len = geometry.fat_bytes();
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).map_err(|_| FsError::OutOfMemory { bytes: len })?;
        bytes.resize(len, 0);
        let start = geometry.fat_start_sector(index);
        device.read_sectors(start, geometry.fat_size, &mut bytes)?;
        log::debug!("loaded FAT copy {} ({} sectors at {})", index, geometry.fat_size, start);
        Ok(FatTable { bytes })
    }

    /// Wrap raw FAT bytes, e.g. a table assembled in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        FatTable { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of 12-bit entries the buffer holds.
    pub fn capacity(&self) -> u32 {
        (self.bytes.len() * 2 / 3) as u32
    }

    /// Raw 12-bit entry for `cluster`.
    pub fn entry(&self, cluster: u32) -> Option<u16> {
        let idx = (cluster as usize * 3) / 2;
        let b0 = *self.bytes.get(idx)? as u16;
        let b1 = *self.bytes.get(idx + 1)? as u16;
        let word = (b1 << 8) | b0;
        if cluster % 2 == 0 {
            Some(word & 0x0FFF)
        } else {
            Some(word >> 4)
        }
    }

    pub fn next_cluster(&self, cluster: u32) -> ClusterRef {
        match self.entry(cluster) {
            Some(value) => ClusterRef::classify(value),
            None => ClusterRef::OutOfRange,
        }
    }

    /// Walk the chain starting at `start`.
    pub fn chain(&self, start: u32) -> ClusterChain<'_> {
        ClusterChain {
            fat: self,
            next: if start >= FIRST_DATA_CLUSTER { Some(start) } else { None },
            remaining: self.capacity(),
            end: None,
        }
    }
}

/// Iterator over the clusters of one chain.
pub struct ClusterChain<'a> {
    fat: &'a FatTable,
    next: Option<u32>,
    remaining: u32,
    end: Option<ClusterRef>,
}

impl ClusterChain<'_> {
    /// How the chain terminated, once the iterator is exhausted.
    pub fn end(&self) -> Option<ClusterRef> {
        self.end
    }
}

impl Iterator for ClusterChain<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let cluster = self.next.take()?;
        if self.remaining == 0 {
            log::warn!("cluster chain exceeds FAT capacity at cluster {}, assuming a loop", cluster);
            return None;
        }
        self.remaining -= 1;

        match self.fat.next_cluster(cluster) {
            ClusterRef::Pointer(n) => self.next = Some(n),
            ClusterRef::EndOfChain => self.end = Some(ClusterRef::EndOfChain),
            other => {
                log::warn!("cluster chain broken after cluster {}: {:?}", cluster, other);
                self.end = Some(other);
            }
        }
        Some(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack a pair of 12-bit values the way they sit on disk.
    fn pack_pair(even: u16, odd: u16) -> [u8; 3] {
        [
            (even & 0xFF) as u8,
            (((even >> 8) & 0x0F) | ((odd & 0x0F) << 4)) as u8,
            (odd >> 4) as u8,
        ]
    }

    #[test]
    fn even_entries_match_bit_layout() {
        for value in 0..=0x0FFFu16 {
            for neighbour in [0x000u16, 0xABC, 0xFFF] {
                let mut fat = vec![0u8; 3];
                fat.extend_from_slice(&pack_pair(value, neighbour));
                let fat = FatTable::from_bytes(fat);
                assert_eq!(fat.entry(2), Some(value), "cluster 2 value {:#05x}", value);
                let b = &fat.as_bytes()[3..6];
                assert_eq!(((b[1] as u16 & 0x0F) << 8) | b[0] as u16, value);
            }
        }
    }

    #[test]
    fn odd_entries_match_bit_layout() {
        for value in 0..=0x0FFFu16 {
            for neighbour in [0x000u16, 0x5A5, 0xFFF] {
                let mut fat = vec![0u8; 3];
                fat.extend_from_slice(&pack_pair(neighbour, value));
                let fat = FatTable::from_bytes(fat);
                assert_eq!(fat.entry(3), Some(value), "cluster 3 value {:#05x}", value);
                let b = &fat.as_bytes()[3..6];
                assert_eq!((b[1] as u16 >> 4) | ((b[2] as u16) << 4), value);
                // the neighbour is untouched
                assert_eq!(fat.entry(2), Some(neighbour));
            }
        }
    }

    #[test]
    fn hand_built_fragment() {
        // cluster 0 = 0xFF0, 1 = 0xFFF, 2 = 0x003, 3 = 0xFFF
        let fat = FatTable::from_bytes(vec![0xF0, 0xFF, 0xFF, 0x03, 0xF0, 0xFF]);
        assert_eq!(fat.entry(0), Some(0xFF0));
        assert_eq!(fat.entry(1), Some(0xFFF));
        assert_eq!(fat.next_cluster(2), ClusterRef::Pointer(3));
        assert_eq!(fat.next_cluster(3), ClusterRef::EndOfChain);
        assert_eq!(fat.next_cluster(4), ClusterRef::OutOfRange);
    }

    #[test]
    fn classification_ranges() {
        assert_eq!(ClusterRef::classify(0x000), ClusterRef::Free);
        assert_eq!(ClusterRef::classify(0x001), ClusterRef::Reserved);
        assert_eq!(ClusterRef::classify(0x002), ClusterRef::Pointer(2));
        assert_eq!(ClusterRef::classify(0xFEF), ClusterRef::Pointer(0xFEF));
        for v in 0xFF0..=0xFF6 {
            assert_eq!(ClusterRef::classify(v), ClusterRef::Reserved);
        }
        assert_eq!(ClusterRef::classify(0xFF7), ClusterRef::Bad);
        for v in 0xFF8..=0xFFF {
            assert_eq!(ClusterRef::classify(v), ClusterRef::EndOfChain);
        }
    }

    #[test]
    fn chain_follows_pointers() {
        // 2 -> 3 -> 4 -> EOC
        let mut bytes = vec![0xF0, 0xFF, 0xFF];
        bytes.extend_from_slice(&pack_pair(3, 4));
        bytes.extend_from_slice(&pack_pair(0xFFF, 0));
        let fat = FatTable::from_bytes(bytes);
        let mut chain = fat.chain(2);
        assert_eq!(chain.by_ref().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(chain.end(), Some(ClusterRef::EndOfChain));
    }

    #[test]
    fn chain_stops_on_bad_and_loops() {
        let mut bytes = vec![0xF0, 0xFF, 0xFF];
        bytes.extend_from_slice(&pack_pair(3, 0xFF7));
        let fat = FatTable::from_bytes(bytes);
        let mut chain = fat.chain(2);
        assert_eq!(chain.by_ref().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(chain.end(), Some(ClusterRef::Bad));

        // 2 -> 3 -> 2 ...
        let mut bytes = vec![0xF0, 0xFF, 0xFF];
        bytes.extend_from_slice(&pack_pair(3, 2));
        let fat = FatTable::from_bytes(bytes);
        let visited: Vec<u32> = fat.chain(2).collect();
        assert_eq!(visited.len() as u32, fat.capacity());
    }

    #[test]
    fn chain_from_reserved_start_is_empty() {
        let fat = FatTable::from_bytes(vec![0xF0, 0xFF, 0xFF, 0, 0, 0]);
        assert_eq!(fat.chain(0).count(), 0);
        assert_eq!(fat.chain(1).count(), 0);
    }
}
