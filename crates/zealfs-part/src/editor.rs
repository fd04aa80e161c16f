//! The staged MBR partition editor, grounded on
//! `hadris-common::part::mbr::MbrPartitionTable` for the entry layout and on the orphan
//! `crates/img` experiment's pattern of building a fresh partition-table region in memory
//! before it ever touches a device.

use zealfs_common::mbr::{MbrPartitionEntry, MbrSector, ZEALFS_PARTITION_TYPE};
use zealfs_fs::layout::{build_fat_pages, build_header_page, Layout};
use zealfs_io::BlockDevice;

use crate::disk::{compute_free_part_idx, Disk};
use crate::error::EditorError;

const SECTOR_SIZE: u64 = 512;

/// A formatted partition's staged scratch buffer is always three ZealFS pages (header
/// page plus up to two FAT pages); when the FAT is only one page long (256 B page size)
/// the third page is unused padding.
fn build_partition_buffer(partition_size_bytes: u64) -> Vec<u8> {
    let layout = Layout::compute(partition_size_bytes);
    let mut buffer = vec![0u8; 3 * layout.page_size_bytes];
    let header = build_header_page(&layout);
    let fat = build_fat_pages(&layout);
    buffer[..header.len()].copy_from_slice(&header);
    buffer[layout.page_size_bytes..layout.page_size_bytes + fat.len()].copy_from_slice(&fat);
    buffer
}

/// Operates on one disk's staged view.
pub struct Editor<'a> {
    disk: &'a mut Disk,
}

impl<'a> Editor<'a> {
    pub fn new(disk: &'a mut Disk) -> Self {
        Self { disk }
    }

    pub fn partitions(&self) -> &[MbrPartitionEntry; 4] {
        &self.disk.staged_partitions
    }

    /// Largest free gap in the staged partition table: returns `(start_lba, len_sectors)`.
    /// Sector 0 is always reserved for the MBR; on an MBR-less disk the entire disk,
    /// starting at LBA 0, is the only gap.
    pub fn free_gap(&self) -> Option<(u64, u64)> {
        let disk_sectors = self.disk.size_bytes / SECTOR_SIZE;
        if !self.disk.has_mbr {
            return if self.disk.staged_partitions[0].is_active() {
                None
            } else {
                Some((0, disk_sectors))
            };
        }
        let mut active: Vec<_> = self
            .disk
            .staged_partitions
            .iter()
            .filter(|p| p.is_active())
            .collect();
        active.sort_by_key(|p| p.start_lba);

        let mut cursor = 1u64;
        let mut best: Option<(u64, u64)> = None;
        for entry in &active {
            if entry.start_lba as u64 > cursor {
                let len = entry.start_lba as u64 - cursor;
                if best.map(|(_, best_len)| len > best_len).unwrap_or(true) {
                    best = Some((cursor, len));
                }
            }
            cursor = cursor.max(entry.end_lba());
        }
        if disk_sectors > cursor {
            let len = disk_sectors - cursor;
            if best.map(|(_, best_len)| len > best_len).unwrap_or(true) {
                best = Some((cursor, len));
            }
        }
        best
    }

    /// Rounds the chosen gap's starting byte offset up to `align_bytes` and returns the
    /// usable `(start_lba, len_sectors)` after the wasted alignment padding.
    pub fn max_partition_size(&self, gap: (u64, u64), align_bytes: u64) -> (u64, u64) {
        let (start_lba, len_sectors) = gap;
        let align_sectors = (align_bytes / SECTOR_SIZE).max(1);
        let aligned_start = start_lba.div_ceil(align_sectors) * align_sectors;
        let wasted = aligned_start.saturating_sub(start_lba);
        (aligned_start, len_sectors.saturating_sub(wasted))
    }

    pub fn allocate_partition(&mut self, start_lba: u64, size_sectors: u64) -> Result<usize, EditorError> {
        let slot = self.disk.free_part_idx.ok_or(EditorError::NoFreeSlot)?;
        let entry = MbrPartitionEntry {
            boot_flag: 0,
            partition_type: ZEALFS_PARTITION_TYPE,
            start_lba: start_lba as u32,
            size_sectors: size_sectors as u32,
        };
        self.disk.staged_partitions[slot] = entry;
        self.disk.staged_mbr.set_partition(slot, &entry);
        self.disk.staged_buffers[slot] = Some(build_partition_buffer(size_sectors * SECTOR_SIZE));
        self.disk.has_staged_changes = true;
        self.disk.free_part_idx = compute_free_part_idx(&self.disk.staged_partitions, self.disk.has_mbr);
        Ok(slot)
    }

    /// Re-formats an already-active slot in place, leaving LBA and size untouched;
    /// returns an error if the slot is not active rather than silently retyping it.
    pub fn format_partition(&mut self, slot: usize) -> Result<(), EditorError> {
        let entry = self.disk.staged_partitions[slot];
        if !entry.is_active() {
            return Err(EditorError::SlotNotActive(slot));
        }
        self.disk.staged_buffers[slot] = Some(build_partition_buffer(entry.size_sectors as u64 * SECTOR_SIZE));
        self.disk.has_staged_changes = true;
        Ok(())
    }

    pub fn delete_partition(&mut self, slot: usize) -> Result<(), EditorError> {
        self.disk.staged_buffers[slot] = None;
        self.disk.staged_partitions[slot] = MbrPartitionEntry::zeroed();
        self.disk.staged_mbr.set_partition(slot, &MbrPartitionEntry::zeroed());
        self.disk.has_staged_changes = true;
        if self.disk.free_part_idx.is_none() {
            self.disk.free_part_idx = compute_free_part_idx(&self.disk.staged_partitions, self.disk.has_mbr);
        }
        Ok(())
    }

    /// Discards every staged edit, restoring the committed view byte-for-byte.
    pub fn revert_changes(&mut self) {
        self.disk.staged_buffers = [None, None, None, None];
        self.disk.staged_mbr = self.disk.committed_mbr.clone();
        self.disk.staged_partitions = self.disk.committed_partitions;
        self.disk.free_part_idx = compute_free_part_idx(&self.disk.staged_partitions, self.disk.has_mbr);
        self.disk.has_staged_changes = false;
    }

    /// Writes every staged change through `device`, then promotes staged state to
    /// committed. On failure, staging is left intact; the on-disk state may be
    /// partially written, and no rollback is attempted.
    pub fn write_changes(&mut self, device: &mut dyn BlockDevice) -> Result<(), EditorError> {
        if self.disk.has_mbr {
            device.write(0, self.disk.staged_mbr.as_bytes())?;
        }
        for slot in 0..4 {
            if let Some(buffer) = &self.disk.staged_buffers[slot] {
                let offset = self.disk.staged_partitions[slot].start_lba as u64 * SECTOR_SIZE;
                device.write(offset, buffer)?;
            }
        }
        self.disk.staged_buffers = [None, None, None, None];
        self.disk.committed_mbr = self.disk.staged_mbr.clone();
        self.disk.committed_partitions = self.disk.staged_partitions;
        self.disk.has_staged_changes = false;
        Ok(())
    }

    /// Stamps a fresh MBR signature onto a blank disk and commits immediately.
    pub fn create_mbr(&mut self, device: &mut dyn BlockDevice) -> Result<(), EditorError> {
        self.disk.has_mbr = true;
        self.disk.staged_mbr = MbrSector::zeroed();
        self.disk.staged_partitions = [MbrPartitionEntry::zeroed(); 4];
        self.write_changes(device)?;
        self.disk.free_part_idx = compute_free_part_idx(&self.disk.staged_partitions, self.disk.has_mbr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use zealfs_io::MemoryDevice;

    fn blank_disk(size_bytes: u64) -> Disk {
        Disk::from_image(PathBuf::from("test.img"), size_bytes, MbrSector::zeroed())
    }

    #[test]
    fn free_gap_on_blank_disk_starts_at_lba_one() {
        let mut disk = blank_disk(1 << 20);
        let editor = Editor::new(&mut disk);
        assert_eq!(editor.free_gap(), Some((1, (1 << 20) / 512 - 1)));
    }

    #[test]
    fn allocate_then_commit_then_reload_round_trips() {
        let mut disk = blank_disk(1 << 20);
        let mut device = MemoryDevice::zeroed(1 << 20);
        let mut editor = Editor::new(&mut disk);
        let gap = editor.free_gap().unwrap();
        let (start, len) = editor.max_partition_size(gap, 1024 * 1024);
        let slot = editor.allocate_partition(start, len).unwrap();
        editor.write_changes(&mut device).unwrap();
        assert!(disk.committed_partitions[slot].is_active());
        assert!(!disk.has_staged_changes);
    }

    #[test]
    fn revert_restores_committed_view() {
        let mut disk = blank_disk(1 << 20);
        let mut editor = Editor::new(&mut disk);
        let gap = editor.free_gap().unwrap();
        editor.allocate_partition(gap.0, gap.1).unwrap();
        assert!(disk.has_staged_changes);
        let mut editor = Editor::new(&mut disk);
        editor.revert_changes();
        assert!(!disk.has_staged_changes);
        assert_eq!(disk.staged_partitions, disk.committed_partitions);
    }

    #[test]
    fn format_partition_requires_active_slot() {
        let mut disk = blank_disk(1 << 20);
        let mut editor = Editor::new(&mut disk);
        assert!(matches!(
            editor.format_partition(0).unwrap_err(),
            EditorError::SlotNotActive(0)
        ));
    }
}
