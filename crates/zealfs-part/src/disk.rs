//! The `Disk` record, grounded on `hadris-common::part::mbr::MbrPartitionTable`
//! for the parsed-table shape and on the orphan `crates/img`/`crates/mbr` experiment's
//! `Image::create_new` for writing a fresh MBR signature into a freshly sized image.

use std::path::PathBuf;

use zealfs_common::mbr::{MbrPartitionEntry, MbrSector};

/// Disks larger than this are hidden from the registry to protect internal drives.
pub const MAX_DISK_SIZE_BYTES: u64 = 32 * 1024 * 1024 * 1024;

/// A staged partition-scratch buffer: the freshly formatted bytes of a partition
/// allocated or reformatted in the editor, owned by the staged slot until commit or
/// revert.
pub type PartitionBuffer = Vec<u8>;

#[derive(Debug, Clone)]
pub struct Disk {
    pub path: Option<PathBuf>,
    pub display_name: String,
    pub size_bytes: u64,
    pub is_valid: bool,
    pub is_image: bool,
    pub has_mbr: bool,
    pub committed_mbr: MbrSector,
    pub committed_partitions: [MbrPartitionEntry; 4],
    pub staged_mbr: MbrSector,
    pub staged_partitions: [MbrPartitionEntry; 4],
    pub staged_buffers: [Option<PartitionBuffer>; 4],
    pub has_staged_changes: bool,
    pub free_part_idx: Option<usize>,
}

impl Disk {
    pub fn from_image(path: PathBuf, size_bytes: u64, mbr: MbrSector) -> Self {
        let has_mbr = mbr.has_signature();
        let partitions = mbr.partitions();
        let free_part_idx = compute_free_part_idx(&partitions, has_mbr);
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path: Some(path),
            display_name,
            size_bytes,
            is_valid: size_bytes <= MAX_DISK_SIZE_BYTES,
            is_image: true,
            has_mbr,
            committed_mbr: mbr.clone(),
            committed_partitions: partitions,
            staged_mbr: mbr,
            staged_partitions: partitions,
            staged_buffers: [None, None, None, None],
            has_staged_changes: false,
            free_part_idx,
        }
    }
}

/// "first inactive slot" rule, preserved exactly including the MBR-less corner case:
/// when `has_mbr` is false only slot 0 is ever usable.
pub fn compute_free_part_idx(partitions: &[MbrPartitionEntry; 4], has_mbr: bool) -> Option<usize> {
    if !has_mbr {
        return if partitions[0].is_active() { None } else { Some(0) };
    }
    partitions.iter().position(|entry| !entry.is_active())
}
