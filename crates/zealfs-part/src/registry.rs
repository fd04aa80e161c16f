//! The disk registry: a bounded list of `Disk` records plus the current selection.
//! Grounded on `hadris-common::part::mbr` for parsing, with a "refuse while staged
//! changes are pending" discipline on top to keep `refresh` from discarding edits.

use std::path::{Path, PathBuf};

use log::{info, warn};
use zealfs_common::mbr::MbrSector;
use zealfs_io::{BlockDevice, ImageFile};

use crate::disk::Disk;
use crate::error::EditorError;

pub const MAX_DISKS: usize = 32;

/// Enumerates candidate devices and loaded image files and keeps the current selection.
///
/// Physical-device probing is an external collaborator this repository does not
/// implement; `refresh()` therefore re-validates only the
/// image-file disks already tracked, which is the full extent of the merge logic a
/// platform probe would need once wired in.
#[derive(Debug, Default)]
pub struct Registry {
    disks: Vec<Disk>,
    selected_disk: Option<usize>,
    selected_partition: Option<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    pub fn current_disk(&self) -> Option<&Disk> {
        self.selected_disk.and_then(|index| self.disks.get(index))
    }

    pub fn current_disk_mut(&mut self) -> Option<&mut Disk> {
        self.selected_disk.and_then(move |index| self.disks.get_mut(index))
    }

    pub fn current_partition(&self) -> Option<usize> {
        self.selected_partition
    }

    pub fn select(&mut self, disk_index: usize, partition_index: Option<usize>) {
        self.selected_disk = Some(disk_index);
        self.selected_partition = partition_index;
    }

    /// Re-scans the image disks already tracked; refuses if the current selection has
    /// staged changes, to prevent silent loss.
    pub fn refresh(&mut self) -> Result<(), EditorError> {
        if let Some(disk) = self.current_disk() {
            if disk.has_staged_changes {
                return Err(EditorError::Kind(zealfs_common::ErrorKind::StagedChangesPresent));
            }
        }
        for disk in &mut self.disks {
            let Some(path) = disk.path.clone() else { continue };
            match reread_image(&path) {
                Ok(fresh) => *disk = fresh,
                Err(err) => warn!("dropping stale image {}: {err}", path.display()),
            }
        }
        Ok(())
    }

    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<usize, EditorError> {
        let path = path.as_ref().to_path_buf();
        if self.disks.iter().any(|d| d.path.as_deref() == Some(path.as_path())) {
            return Err(EditorError::DuplicateImage(path.display().to_string()));
        }
        if self.disks.len() >= MAX_DISKS {
            return Err(EditorError::RegistryFull);
        }
        let disk = reread_image(&path)?;
        self.disks.push(disk);
        info!("loaded image {}", path.display());
        Ok(self.disks.len() - 1)
    }

    /// Creates a sparse file of exactly `size` bytes, optionally stamping a minimal MBR
    /// signature, and tracks it.
    pub fn create_image(
        &mut self,
        path: impl AsRef<Path>,
        size: u64,
        with_mbr: bool,
    ) -> Result<usize, EditorError> {
        let path = path.as_ref().to_path_buf();
        if self.disks.len() >= MAX_DISKS {
            return Err(EditorError::RegistryFull);
        }
        let mut image = ImageFile::create_sparse(&path, size)?;
        let mbr = if with_mbr {
            MbrSector::zeroed()
        } else {
            MbrSector::from_bytes([0u8; 512])
        };
        image.write(0, mbr.as_bytes())?;
        let disk = Disk::from_image(path.clone(), size, mbr);
        self.disks.push(disk);
        info!("created image {} ({} bytes, mbr={with_mbr})", path.display(), size);
        Ok(self.disks.len() - 1)
    }
}

fn reread_image(path: &Path) -> Result<Disk, EditorError> {
    let mut file = ImageFile::open(path)?;
    let size = file.size();
    let mut sector = [0u8; 512];
    file.read(0, &mut sector)?;
    Ok(Disk::from_image(path.to_path_buf(), size, MbrSector::from_bytes(sector)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_image_stamps_signature_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let mut registry = Registry::new();
        let index = registry.create_image(&path, 1 << 20, true).unwrap();
        assert!(registry.disks()[index].has_mbr);
    }

    #[test]
    fn load_image_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let mut registry = Registry::new();
        registry.create_image(&path, 1 << 20, true).unwrap();
        assert!(registry.load_image(&path).is_err());
    }

    #[test]
    fn refresh_refuses_when_staged_changes_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let mut registry = Registry::new();
        let index = registry.create_image(&path, 1 << 20, true).unwrap();
        registry.select(index, None);
        registry.current_disk_mut().unwrap().has_staged_changes = true;
        assert!(registry.refresh().is_err());
    }
}
