use core::fmt;
use std::io::Write;

use crate::fs::block_device::{BlockDevice, DeviceError};
use crate::fs::boot_sector::{BootSector, FatError, Geometry};
use crate::fs::directory::{DirectoryEntry, DirectoryListing, DirectoryScan};
use crate::fs::fat_constants::{FIRST_DATA_CLUSTER, NATIVE_SECTOR_SIZE, ROOT_CLUSTER};
use crate::fs::fat_table::{ClusterRef, FatTable};

#[derive(Debug)]
pub enum FsError {
    /// The block device failed to return the requested sectors.
    Io(DeviceError),
    Boot(FatError),
    /// The FAT buffer could not be allocated.
    OutOfMemory { bytes: usize },
    /// A directory listing could not grow.
    AllocationExhausted,
    NotFound(String),
    NotADirectory(String),
    IsADirectory(String),
    /// Writing streamed file data to the caller's sink failed.
    Sink(std::io::Error),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Io(e) => write!(f, "{}", e),
            FsError::Boot(e) => write!(f, "{}", e),
            FsError::OutOfMemory { bytes } => write!(f, "out of memory allocating {} bytes for the FAT", bytes),
            FsError::AllocationExhausted => write!(f, "out of memory growing directory listing"),
            FsError::NotFound(name) => write!(f, "{}: not found", name),
            FsError::NotADirectory(name) => write!(f, "{}: not a directory", name),
            FsError::IsADirectory(name) => write!(f, "{}: is a directory", name),
            FsError::Sink(e) => write!(f, "output error: {}", e),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Io(e) => Some(e),
            FsError::Boot(e) => Some(e),
            FsError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for FsError {
    fn from(e: DeviceError) -> Self {
        FsError::Io(e)
    }
}

impl From<FatError> for FsError {
    fn from(e: FatError) -> Self {
        FsError::Boot(e)
    }
}

/// Knobs for an open volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeOptions {
    /// Stop file output at the directory entry's recorded size instead of
    /// emitting whole clusters.
    pub truncate_to_file_size: bool,
    /// Load every FAT copy at open time and report copies that differ.
    pub check_fat_mirrors: bool,
}

impl VolumeOptions {
    pub fn truncate_to_file_size(mut self, on: bool) -> Self {
        self.truncate_to_file_size = on;
        self
    }

    pub fn check_fat_mirrors(mut self, on: bool) -> Self {
        self.check_fat_mirrors = on;
        self
    }
}

/// Outcome of streaming a cluster chain into a sink.
#[derive(Debug, Default)]
pub struct FileStream {
    pub bytes_written: u64,
    pub clusters_read: u32,
    /// Set when streaming stopped early; bytes already written stay written.
    pub error: Option<FsError>,
}

impl FileStream {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<u64, FsError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.bytes_written),
        }
    }
}

/// An open FAT12 volume: the device plus the geometry and FAT read at open.
pub struct Volume<D: BlockDevice> {
    device: D,
    boot_sector: BootSector,
    geometry: Geometry,
    fat: FatTable,
    options: VolumeOptions,
}

impl<D: BlockDevice> Volume<D> {
    pub fn open(device: D) -> Result<Self, FsError> {
        Self::open_with(device, VolumeOptions::default())
    }

    pub fn open_with(mut device: D, options: VolumeOptions) -> Result<Self, FsError> {
        let mut buf = vec![0u8; device.sector_size().max(NATIVE_SECTOR_SIZE)];
        device.read_sector(0, &mut buf)?;
        let boot_sector = BootSector::parse(&buf)?;
        if !boot_sector.has_boot_signature() {
            log::warn!("boot sector has no 0x55AA signature, continuing");
        }
        let geometry = boot_sector.geometry()?;

        if device.sector_size() != geometry.bytes_per_sector as usize {
            device.set_sector_size(geometry.bytes_per_sector as usize)?;
        }

        let fat = FatTable::load(&mut device, &geometry)?;
        if options.check_fat_mirrors {
            for index in 1..geometry.fat_count {
                let copy = FatTable::load_copy(&mut device, &geometry, index)?;
                if copy != fat {
                    log::warn!("FAT copy {} differs from copy 0", index);
                }
            }
        }

        log::info!(
            "opened FAT12 volume: {} B/sector, {} sectors/cluster, {} FATs x {} sectors, {} root entries, {} clusters",
            geometry.bytes_per_sector,
            geometry.sectors_per_cluster,
            geometry.fat_count,
            geometry.fat_size,
            geometry.root_entry_count,
            geometry.cluster_count
        );

        Ok(Volume { device, boot_sector, geometry, fat, options })
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn fat(&self) -> &FatTable {
        &self.fat
    }

    pub fn options(&self) -> VolumeOptions {
        self.options
    }

    pub fn next_cluster(&self, cluster: u32) -> ClusterRef {
        self.fat.next_cluster(cluster)
    }

    /// Release the underlying device.
    pub fn into_device(self) -> D {
        self.device
    }

    /// List the root directory (`None` / cluster 0) or the directory whose
    /// chain starts at `cluster`. Entries are rebuilt on every call.
    pub fn read_directory(&mut self, cluster: Option<u32>) -> DirectoryListing {
        match cluster {
            None | Some(ROOT_CLUSTER) => self.read_root(),
            Some(c) => self.read_subdirectory(c),
        }
    }

    fn read_root(&mut self) -> DirectoryListing {
        let geo = self.geometry;
        let mut scan = DirectoryScan::new();
        let mut sector = vec![0u8; geo.bytes_per_sector as usize];
        for i in 0..geo.root_dir_sector_count {
            let lba = geo.root_dir_start_sector + i;
            if let Err(e) = self.device.read_sector(lba, &mut sector) {
                log::warn!("root directory read failed at sector {}: {}", lba, e);
                return scan.fail(e.into());
            }
            match scan.feed(&sector) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return scan.fail(e),
            }
        }
        scan.finish()
    }

    fn read_subdirectory(&mut self, start: u32) -> DirectoryListing {
        let geo = self.geometry;
        let mut scan = DirectoryScan::new();
        let mut cluster_buf = vec![0u8; geo.bytes_per_cluster()];
        for cluster in self.fat.chain(start) {
            let Some(lba) = geo.cluster_to_sector(cluster) else { break };
            log::debug!("directory cluster {} at sector {}", cluster, lba);
            if let Err(e) = self.device.read_sectors(lba, geo.sectors_per_cluster, &mut cluster_buf) {
                log::warn!("directory read failed at cluster {}: {}", cluster, e);
                return scan.fail(e.into());
            }
            match scan.feed(&cluster_buf) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return scan.fail(e),
            }
        }
        scan.finish()
    }

    /// Stream every cluster of the chain starting at `first_cluster` into
    /// `sink`, whole clusters at a time.
    pub fn read_file<W: Write + ?Sized>(&mut self, first_cluster: u32, sink: &mut W) -> FileStream {
        self.stream_chain(first_cluster, None, sink)
    }

    /// Stream a file entry, honoring `truncate_to_file_size`.
    pub fn read_entry<W: Write + ?Sized>(&mut self, entry: &DirectoryEntry, sink: &mut W) -> FileStream {
        if entry.is_dir() {
            return FileStream { error: Some(FsError::IsADirectory(entry.name.clone())), ..FileStream::default() };
        }
        let limit = self.options.truncate_to_file_size.then_some(entry.file_size as u64);
        self.stream_chain(entry.first_cluster, limit, sink)
    }

    /// Collect a file entry's bytes. Fails if the stream was cut short.
    pub fn read_to_vec(&mut self, entry: &DirectoryEntry) -> Result<Vec<u8>, FsError> {
        let mut out = Vec::new();
        self.read_entry(entry, &mut out).into_result()?;
        Ok(out)
    }

    fn stream_chain<W: Write + ?Sized>(&mut self, first_cluster: u32, limit: Option<u64>, sink: &mut W) -> FileStream {
        let geo = self.geometry;
        let mut stream = FileStream::default();
        if first_cluster < FIRST_DATA_CLUSTER {
            return stream;
        }
        let mut cluster_buf = vec![0u8; geo.bytes_per_cluster()];
        for cluster in self.fat.chain(first_cluster) {
            if let Some(limit) = limit {
                if stream.bytes_written >= limit {
                    break;
                }
            }
            let Some(lba) = geo.cluster_to_sector(cluster) else { break };
            log::debug!("file cluster {} at sector {}", cluster, lba);
            if let Err(e) = self.device.read_sectors(lba, geo.sectors_per_cluster, &mut cluster_buf) {
                log::warn!("file read failed at cluster {}: {}", cluster, e);
                stream.error = Some(e.into());
                break;
            }
            stream.clusters_read += 1;

            let take = match limit {
                Some(limit) => ((limit - stream.bytes_written) as usize).min(cluster_buf.len()),
                None => cluster_buf.len(),
            };
            if let Err(e) = sink.write_all(&cluster_buf[..take]) {
                stream.error = Some(FsError::Sink(e));
                break;
            }
            stream.bytes_written += take as u64;
        }
        stream
    }

    /// Resolve a `/`-separated path of 8.3 names from the root.
    /// The empty path and `/` name the root directory itself.
    pub fn find(&mut self, path: &str) -> Result<Option<DirectoryEntry>, FsError> {
        let mut dir = ROOT_CLUSTER;
        let mut found: Option<DirectoryEntry> = None;
        let mut walked = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            walked.push('/');
            walked.push_str(part);
            if let Some(entry) = &found {
                if !entry.is_dir() {
                    return Err(FsError::NotADirectory(entry.name.clone()));
                }
            }
            let mut listing = self.read_directory(Some(dir));
            let entry = match listing.entries.iter().position(|e| e.matches(part)) {
                Some(i) => listing.entries.swap_remove(i),
                None => return Err(listing.error.unwrap_or(FsError::NotFound(walked))),
            };
            dir = entry.first_cluster;
            found = Some(entry);
        }
        Ok(found)
    }

    /// Volume label from the root directory, falling back to the boot sector.
    pub fn volume_label(&mut self) -> Option<String> {
        self.read_directory(None).volume_label.or_else(|| self.boot_sector.volume_label_str())
    }
}
