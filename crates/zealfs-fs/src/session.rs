//! The ZealFS v2 engine session: format, lazy mount, path resolution,
//! the bitmap allocator, FAT chain walking, and the file/directory operation surface.
//!
//! Grounded on `hadris-fat::fs::FatFs32` for overall shape (a struct bound to a
//! `dyn Reader`/`dyn Writer`-style device, exposing `create_file`/`list_dir`/`flush`), and
//! on `hadris_core::disk::{DiskReader, DiskWriter}` for the offset-adding read/write thunks
//! a `Session` wraps around its `BlockDevice`.

use log::{debug, warn};
use zealfs_common::{ErrorKind, TimeSource};
use zealfs_io::BlockDevice;

use crate::error::FsError;
use crate::layout::{self, Layout};
use crate::path::split_path;
use crate::raw::RawDirEntry;

/// An open file: its directory entry (kept in sync by `read`/`write`/`flush`) and the
/// absolute byte address, relative to the partition start, of that entry on disk.
#[derive(Debug, Clone)]
pub struct FileHandle {
    entry: RawDirEntry,
    addr: u64,
}

impl FileHandle {
    pub fn len(&self) -> u32 {
        self.entry.size()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.size() == 0
    }
}

/// An open directory, positioned at the first page of its entry chain.
#[derive(Debug, Clone, Copy)]
pub struct DirHandle {
    start_page: u16,
    is_root: bool,
}

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SpaceReport {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl SpaceReport {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

enum Lookup {
    Found { entry: RawDirEntry, addr: u64 },
    NotFound { free_addr: Option<u64>, last_page: u16 },
}

/// A bound `(BlockDevice, partition byte offset)` pair through which every ZealFS v2
/// operation flows.
pub struct Session<D> {
    device: D,
    partition_offset: u64,
    layout: Option<Layout>,
    /// Cache of page 0: fixed header + bitmap + root directory entries.
    page0: Vec<u8>,
    /// Cache of the FAT page(s).
    fat: Vec<u8>,
}

impl<D: BlockDevice> Session<D> {
    pub fn new(device: D, partition_offset: u64) -> Self {
        Self {
            device,
            partition_offset,
            layout: None,
            page0: Vec::new(),
            fat: Vec::new(),
        }
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Returns the session to the `unmounted` state.
    pub fn destroy(&mut self) {
        self.layout = None;
        self.page0.clear();
        self.fat.clear();
    }

    fn dev_read(&mut self, rel_offset: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.device.read(self.partition_offset + rel_offset, buf)?;
        Ok(())
    }

    fn dev_write(&mut self, rel_offset: u64, buf: &[u8]) -> Result<(), FsError> {
        self.device.write(self.partition_offset + rel_offset, buf)?;
        Ok(())
    }

    fn layout(&self) -> Layout {
        self.layout.expect("session must be mounted before use")
    }

    /// Prepares a fresh ZealFS v2 image in memory and writes it through to the device.
    /// Leaves the session mounted against the new layout.
    pub fn format(&mut self, partition_size_bytes: u64) -> Result<(), FsError> {
        let layout = Layout::compute(partition_size_bytes);
        let header_page = layout::build_header_page(&layout);
        let fat_pages = layout::build_fat_pages(&layout);
        debug!(
            "formatting ZealFS v2 partition: page_size={} total_pages={} bitmap_size={}",
            layout.page_size_bytes, layout.total_pages, layout.bitmap_size
        );
        self.dev_write(0, &header_page)?;
        self.dev_write(layout.fat_offset() as u64, &fat_pages)?;
        self.page0 = header_page;
        self.fat = fat_pages;
        self.layout = Some(layout);
        Ok(())
    }

    /// Implicit `check_header`: lazily mounts the session on first use.
    fn ensure_mounted(&mut self) -> Result<(), FsError> {
        if self.layout.is_some() {
            return Ok(());
        }
        let mut probe = vec![0u8; layout::HEADER_FIXED_LEN];
        self.dev_read(0, &mut probe)?;
        if probe[0] != layout::MAGIC {
            return Err(ErrorKind::InvalidDisk("missing ZealFS v2 magic byte".into()).into());
        }
        if probe[1] != layout::VERSION {
            return Err(ErrorKind::InvalidDisk(format!(
                "unsupported ZealFS version {}",
                probe[1]
            ))
            .into());
        }
        let bitmap_size = u16::from_le_bytes([probe[2], probe[3]]) as usize;
        let free_pages = u16::from_le_bytes([probe[4], probe[5]]);
        let page_size_code = probe[6];
        let layout = Layout::from_persisted(page_size_code, bitmap_size, free_pages);

        let mut page0 = vec![0u8; layout.page_size_bytes];
        self.dev_read(0, &mut page0)?;
        let mut fat = vec![0u8; layout.fat_size_bytes()];
        self.dev_read(layout.fat_offset() as u64, &mut fat)?;

        self.page0 = page0;
        self.fat = fat;
        self.layout = Some(layout);
        Ok(())
    }

    // ---- bitmap allocator ----

    fn bitmap_mut(&mut self) -> &mut [u8] {
        let layout = self.layout();
        &mut self.page0[layout::HEADER_FIXED_LEN..layout::HEADER_FIXED_LEN + layout.bitmap_size]
    }

    fn set_free_pages(&mut self, free_pages: u16) {
        self.page0[4..6].copy_from_slice(&free_pages.to_le_bytes());
        if let Some(layout) = self.layout.as_mut() {
            layout.free_pages = free_pages;
        }
    }

    fn allocate_page(&mut self) -> Result<u16, FsError> {
        let layout = self.layout();
        let bitmap = self.bitmap_mut();
        let mut found = None;
        for (byte_index, byte) in bitmap.iter_mut().enumerate() {
            if *byte != 0xFF {
                let bit_index = (0..8).find(|bit| *byte & (1 << bit) == 0).unwrap();
                *byte |= 1 << bit_index;
                found = Some(byte_index * 8 + bit_index);
                break;
            }
        }
        let page = found.ok_or(ErrorKind::NoSpace)?;
        self.set_free_pages(layout.free_pages.saturating_sub(1));
        Ok(page as u16)
    }

    fn free_page(&mut self, page: u16) {
        assert_ne!(page, 0, "page 0 is never freed");
        let layout = self.layout();
        let byte_index = page as usize / 8;
        let bit_index = page as usize % 8;
        self.bitmap_mut()[byte_index] &= !(1 << bit_index);
        self.set_free_pages(layout.free_pages + 1);
    }

    // ---- FAT operations ----

    fn get_next(&self, page: u16) -> u16 {
        let offset = page as usize * 2;
        u16::from_le_bytes([self.fat[offset], self.fat[offset + 1]])
    }

    fn set_next(&mut self, page: u16, next: u16) {
        let offset = page as usize * 2;
        self.fat[offset..offset + 2].copy_from_slice(&next.to_le_bytes());
    }

    fn write_header(&mut self) -> Result<(), FsError> {
        let page0 = self.page0.clone();
        self.dev_write(0, &page0)
    }

    fn write_fat(&mut self) -> Result<(), FsError> {
        let layout = self.layout();
        let fat = self.fat.clone();
        self.dev_write(layout.fat_offset() as u64, &fat)
    }

    fn zero_page(&mut self, page: u16) -> Result<(), FsError> {
        let layout = self.layout();
        let zeros = vec![0u8; layout.page_size_bytes];
        self.dev_write(page as u64 * layout.page_size_bytes as u64, &zeros)
    }

    fn read_page(&mut self, page: u16) -> Result<Vec<u8>, FsError> {
        let layout = self.layout();
        if page == 0 {
            return Ok(self.page0.clone());
        }
        let mut buf = vec![0u8; layout.page_size_bytes];
        self.dev_read(page as u64 * layout.page_size_bytes as u64, &mut buf)?;
        Ok(buf)
    }

    fn write_entry_bytes(&mut self, addr: u64, entry: &RawDirEntry) -> Result<(), FsError> {
        let bytes = entry.as_bytes();
        let page_size = self.layout().page_size_bytes as u64;
        if addr < page_size {
            let off = addr as usize;
            self.page0[off..off + 32].copy_from_slice(&bytes);
        }
        self.dev_write(addr, &bytes)
    }

    /// Scans one directory's entry chain (starting at `start_page`) for `name`.
    fn find_in_directory(
        &mut self,
        start_page: u16,
        is_root: bool,
        name: &str,
    ) -> Result<Lookup, FsError> {
        let layout = self.layout();
        let mut page = start_page;
        let mut first = true;
        loop {
            let (entry_offset, max_entries) = if first && is_root {
                (layout.header_size, layout.root_dir_max_entries())
            } else {
                (0, layout.dir_max_entries())
            };
            let page_bytes = self.read_page(page)?;
            let mut free_addr = None;
            for slot in 0..max_entries {
                let off = entry_offset + slot * layout::DIR_ENTRY_SIZE;
                let entry = RawDirEntry::from_bytes(&page_bytes[off..off + layout::DIR_ENTRY_SIZE]);
                if entry.is_occupied() {
                    if entry.name_str() == name {
                        let addr = page as u64 * layout.page_size_bytes as u64 + off as u64;
                        return Ok(Lookup::Found { entry, addr });
                    }
                } else if free_addr.is_none() {
                    free_addr = Some(page as u64 * layout.page_size_bytes as u64 + off as u64);
                }
            }
            let next = self.get_next(page);
            if next == 0 {
                return Ok(Lookup::NotFound {
                    free_addr,
                    last_page: page,
                });
            }
            page = next;
            first = false;
        }
    }

    /// Resolves `path`, descending through intermediate directories.
    fn browse_path(&mut self, path: &str) -> Result<Lookup, FsError> {
        let components = split_path(path)?;
        let mut dir_page = 0u16;
        let mut is_root = true;
        if components.is_empty() {
            // The root itself: synthesize a directory entry, it has no backing slot.
            let mut root = RawDirEntry::zeroed();
            root.set_start_page(0);
            return Ok(Lookup::Found { entry: root, addr: 0 });
        }
        for (index, name) in components.iter().enumerate() {
            let last = index + 1 == components.len();
            match self.find_in_directory(dir_page, is_root, name)? {
                Lookup::Found { entry, addr } => {
                    if last {
                        return Ok(Lookup::Found { entry, addr });
                    }
                    if !entry.is_dir() {
                        return Err(ErrorKind::NotDirectory.into());
                    }
                    dir_page = entry.start_page();
                    is_root = false;
                }
                Lookup::NotFound { free_addr, last_page } => {
                    if last {
                        return Ok(Lookup::NotFound { free_addr, last_page });
                    }
                    return Err(ErrorKind::NotFound.into());
                }
            }
        }
        unreachable!("non-empty component list always returns inside the loop")
    }

    /// Places a new entry named `name` into the directory ending at `last_page`
    /// (allocating a fresh directory page if `free_addr` is `None`), and returns its
    /// address.
    fn place_new_entry(&mut self, free_addr: Option<u64>, last_page: u16) -> Result<u64, FsError> {
        match free_addr {
            Some(addr) => Ok(addr),
            None => {
                let new_page = self.allocate_page()?;
                self.set_next(last_page, new_page);
                self.zero_page(new_page)?;
                Ok(new_page as u64 * self.layout().page_size_bytes as u64)
            }
        }
    }

    fn create_inner(
        &mut self,
        path: &str,
        is_dir: bool,
        time_source: &dyn TimeSource,
    ) -> Result<FileHandle, FsError> {
        self.ensure_mounted()?;
        let components = split_path(path)?;
        let name = match components.last() {
            Some(name) => name.to_string(),
            None => return Err(ErrorKind::IsDirectory.into()),
        };
        let lookup = self.browse_path(path)?;
        let (free_addr, last_page) = match lookup {
            Lookup::Found { .. } => return Err(ErrorKind::Exists.into()),
            Lookup::NotFound { free_addr, last_page } => (free_addr, last_page),
        };

        let entry_addr = self.place_new_entry(free_addr, last_page)?;
        let start_page = self.allocate_page()?;
        self.zero_page(start_page)?;
        let initial_size = if is_dir {
            self.layout().page_size_bytes as u32
        } else {
            0
        };
        let entry = RawDirEntry::new(&name, is_dir, start_page, initial_size, time_source.now());
        self.write_entry_bytes(entry_addr, &entry)?;
        self.write_header()?;
        self.write_fat()?;
        Ok(FileHandle { entry, addr: entry_addr })
    }

    /// Opens an existing path, returning `IsDirectory` if it names a directory and
    /// `NotFound` if it does not exist.
    pub fn open(&mut self, path: &str) -> Result<FileHandle, FsError> {
        self.ensure_mounted()?;
        match self.browse_path(path)? {
            Lookup::Found { entry, addr } => {
                if entry.is_dir() {
                    Err(ErrorKind::IsDirectory.into())
                } else {
                    Ok(FileHandle { entry, addr })
                }
            }
            Lookup::NotFound { .. } => Err(ErrorKind::NotFound.into()),
        }
    }

    pub fn create(&mut self, path: &str, time_source: &dyn TimeSource) -> Result<FileHandle, FsError> {
        self.create_inner(path, false, time_source)
    }

    pub fn mkdir(&mut self, path: &str, time_source: &dyn TimeSource) -> Result<FileHandle, FsError> {
        self.create_inner(path, true, time_source)
    }

    /// Walks `steps` FAT links from `start`, growing the chain by exactly one page when
    /// the final step lands past the current end (the write path's one-step-grow rule);
    /// any deeper seek into unallocated territory is rejected.
    fn walk_or_grow(&mut self, start: u16, steps: usize, allow_grow: bool) -> Result<u16, FsError> {
        let mut page = start;
        for step in 0..steps {
            let next = self.get_next(page);
            if next != 0 {
                page = next;
                continue;
            }
            if allow_grow && step + 1 == steps {
                let new_page = self.allocate_page()?;
                self.set_next(page, new_page);
                self.zero_page(new_page)?;
                page = new_page;
                continue;
            }
            return Err(ErrorKind::SeekOutOfRange.into());
        }
        Ok(page)
    }

    pub fn read(&mut self, handle: &FileHandle, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        self.ensure_mounted()?;
        let size = handle.entry.size() as u64;
        if offset >= size {
            return Ok(0);
        }
        let to_read = (buf.len() as u64).min(size - offset) as usize;
        let page_size = self.layout().page_size_bytes;
        let jump_pages = (offset / page_size as u64) as usize;
        let mut offset_in_page = (offset % page_size as u64) as usize;

        let mut page = self.walk_or_grow(handle.entry.start_page(), jump_pages, false)?;
        let mut done = 0usize;
        while done < to_read {
            let page_bytes = self.read_page(page)?;
            let take = (page_size - offset_in_page).min(to_read - done);
            buf[done..done + take].copy_from_slice(&page_bytes[offset_in_page..offset_in_page + take]);
            done += take;
            offset_in_page = 0;
            if done < to_read {
                let next = self.get_next(page);
                if next == 0 {
                    warn!("file chain ended before declared size was satisfied");
                    break;
                }
                page = next;
            }
        }
        Ok(done)
    }

    pub fn write(&mut self, handle: &mut FileHandle, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        self.ensure_mounted()?;
        let page_size = self.layout().page_size_bytes;
        let offset_in_page = (offset % page_size as u64) as usize;
        let available = self.free_space() + (page_size - offset_in_page) as u64;
        if (buf.len() as u64) > available {
            return Err(ErrorKind::NoSpace.into());
        }
        let jump_pages = (offset / page_size as u64) as usize;
        let mut page = self.walk_or_grow(handle.entry.start_page(), jump_pages, true)?;
        let mut off_in_page = offset_in_page;
        let mut written = 0usize;
        while written < buf.len() {
            let take = (page_size - off_in_page).min(buf.len() - written);
            let addr = page as u64 * page_size as u64 + off_in_page as u64;
            self.dev_write(addr, &buf[written..written + take])?;
            if page == 0 {
                self.page0[off_in_page..off_in_page + take]
                    .copy_from_slice(&buf[written..written + take]);
            }
            written += take;
            off_in_page = 0;
            if written < buf.len() {
                let next = self.get_next(page);
                let next = if next == 0 {
                    let grown = self.allocate_page()?;
                    self.set_next(page, grown);
                    self.zero_page(grown)?;
                    grown
                } else {
                    next
                };
                page = next;
            }
        }
        let new_size = (offset + written as u64).max(handle.entry.size() as u64);
        handle.entry.set_size(new_size as u32);
        Ok(written)
    }

    /// Flushes a file handle's entry, then the header, then the FAT — this ordering
    /// guarantees data pages (already on disk) are referenced only after everything
    /// upstream of them is committed too.
    pub fn flush(&mut self, handle: &FileHandle) -> Result<(), FsError> {
        self.write_entry_bytes(handle.addr, &handle.entry)?;
        self.write_header()?;
        self.write_fat()?;
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        self.ensure_mounted()?;
        let (entry, addr) = match self.browse_path(path)? {
            Lookup::Found { entry, addr } => (entry, addr),
            Lookup::NotFound { .. } => return Err(ErrorKind::NotFound.into()),
        };
        if entry.is_dir() {
            return Err(ErrorKind::IsDirectory.into());
        }
        self.free_chain(entry.start_page())?;
        self.write_entry_bytes(addr, &RawDirEntry::zeroed())?;
        self.write_header()?;
        self.write_fat()?;
        Ok(())
    }

    fn free_chain(&mut self, start_page: u16) -> Result<(), FsError> {
        let mut page = start_page;
        loop {
            let next = self.get_next(page);
            self.set_next(page, 0);
            self.free_page(page);
            if next == 0 {
                break;
            }
            page = next;
        }
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> Result<(), FsError> {
        self.ensure_mounted()?;
        let components = split_path(path)?;
        if components.is_empty() {
            return Err(FsError::RootIsNotRemovable);
        }
        let (entry, addr) = match self.browse_path(path)? {
            Lookup::Found { entry, addr } => (entry, addr),
            Lookup::NotFound { .. } => return Err(ErrorKind::NotFound.into()),
        };
        if !entry.is_dir() {
            return Err(ErrorKind::NotDirectory.into());
        }
        if self.directory_has_occupied_entry(entry.start_page(), false)? {
            return Err(ErrorKind::NotEmpty.into());
        }
        self.free_chain(entry.start_page())?;
        self.write_entry_bytes(addr, &RawDirEntry::zeroed())?;
        self.write_header()?;
        self.write_fat()?;
        Ok(())
    }

    fn directory_has_occupied_entry(&mut self, start_page: u16, is_root: bool) -> Result<bool, FsError> {
        let layout = self.layout();
        let mut page = start_page;
        let mut first = true;
        loop {
            let (entry_offset, max_entries) = if first && is_root {
                (layout.header_size, layout.root_dir_max_entries())
            } else {
                (0, layout.dir_max_entries())
            };
            let page_bytes = self.read_page(page)?;
            for slot in 0..max_entries {
                let off = entry_offset + slot * layout::DIR_ENTRY_SIZE;
                let entry = RawDirEntry::from_bytes(&page_bytes[off..off + layout::DIR_ENTRY_SIZE]);
                if entry.is_occupied() {
                    return Ok(true);
                }
            }
            let next = self.get_next(page);
            if next == 0 {
                return Ok(false);
            }
            page = next;
            first = false;
        }
    }

    pub fn opendir(&mut self, path: &str) -> Result<DirHandle, FsError> {
        self.ensure_mounted()?;
        let components = split_path(path)?;
        if components.is_empty() {
            return Ok(DirHandle { start_page: 0, is_root: true });
        }
        match self.browse_path(path)? {
            Lookup::Found { entry, .. } if entry.is_dir() => Ok(DirHandle {
                start_page: entry.start_page(),
                is_root: false,
            }),
            Lookup::Found { .. } => Err(ErrorKind::NotDirectory.into()),
            Lookup::NotFound { .. } => Err(ErrorKind::NotFound.into()),
        }
    }

    pub fn readdir(&mut self, dir: &DirHandle, max: usize) -> Result<Vec<DirEntryInfo>, FsError> {
        self.ensure_mounted()?;
        let layout = self.layout();
        let mut out = Vec::new();
        let mut page = dir.start_page;
        let mut first = true;
        'chain: loop {
            let (entry_offset, max_entries) = if first && dir.is_root {
                (layout.header_size, layout.root_dir_max_entries())
            } else {
                (0, layout.dir_max_entries())
            };
            let page_bytes = self.read_page(page)?;
            for slot in 0..max_entries {
                let off = entry_offset + slot * layout::DIR_ENTRY_SIZE;
                let entry = RawDirEntry::from_bytes(&page_bytes[off..off + layout::DIR_ENTRY_SIZE]);
                if entry.is_occupied() {
                    out.push(DirEntryInfo {
                        name: entry.name_str().to_string(),
                        is_dir: entry.is_dir(),
                        size: entry.size(),
                    });
                    if out.len() == max {
                        break 'chain;
                    }
                }
            }
            let next = self.get_next(page);
            if next == 0 {
                break;
            }
            page = next;
            first = false;
        }
        Ok(out)
    }

    pub fn free_space(&self) -> u64 {
        let layout = self.layout();
        layout.free_pages as u64 * layout.page_size_bytes as u64
    }

    pub fn total_space(&self) -> u64 {
        let layout = self.layout();
        layout.bitmap_size as u64 * 8 * layout.page_size_bytes as u64
    }

    pub fn df(&self) -> SpaceReport {
        SpaceReport {
            total_bytes: self.total_space(),
            free_bytes: self.free_space(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zealfs_common::FixedTimeSource;
    use zealfs_io::MemoryDevice;

    fn fixed_time() -> FixedTimeSource {
        FixedTimeSource(zealfs_common::ZealTimestamp {
            year: 2026,
            month: 7,
            day: 30,
            weekday: 4,
            hour: 12,
            minute: 0,
            second: 0,
        })
    }

    fn formatted_session(size: usize) -> Session<MemoryDevice> {
        let device = MemoryDevice::zeroed(size);
        let mut session = Session::new(device, 0);
        session.format(size as u64).unwrap();
        session
    }

    #[test]
    fn format_reports_free_space_matching_reserved_pages() {
        let session = formatted_session(16 * 1024 * 1024);
        let layout = session.layout();
        let expected = (layout.total_pages - 1 - layout.fat_pages) as u64 * layout.page_size_bytes as u64;
        assert_eq!(session.free_space(), expected);
    }

    #[test]
    fn create_write_read_round_trip() {
        let mut session = formatted_session(16 * 1024 * 1024);
        let time = fixed_time();
        let mut handle = session.create("/big.bin", &time).unwrap();
        let data = vec![0xABu8; 2 * 1024 * 1024];
        let written = session.write(&mut handle, &data, 0).unwrap();
        assert_eq!(written, data.len());
        session.flush(&handle).unwrap();

        let reopened = session.open("/big.bin").unwrap();
        let mut out = vec![0u8; data.len()];
        let read = session.read(&reopened, &mut out, 0).unwrap();
        assert_eq!(read, data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn directory_hierarchy_and_readdir() {
        let mut session = formatted_session(1024 * 1024);
        let time = fixed_time();
        session.mkdir("/a", &time).unwrap();
        session.mkdir("/a/b", &time).unwrap();
        session.create("/a/b/c", &time).unwrap();

        let dir = session.opendir("/a/b").unwrap();
        let entries = session.readdir(&dir, 16).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "c");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].size, 0);
    }

    #[test]
    fn unlink_reclaims_pages() {
        let mut session = formatted_session(1024 * 1024);
        let time = fixed_time();
        let mut handle = session.create("/four.bin", &time).unwrap();
        let data = vec![0x11u8; 4 * session.layout().page_size_bytes];
        session.write(&mut handle, &data, 0).unwrap();
        session.flush(&handle).unwrap();

        let free_before = session.free_space();
        session.unlink("/four.bin").unwrap();
        assert!(session.free_space() > free_before);
        assert!(matches!(
            session.open("/four.bin").unwrap_err(),
            FsError::Kind(ErrorKind::NotFound)
        ));
    }

    #[test]
    fn rmdir_refuses_non_empty_then_succeeds_once_emptied() {
        let mut session = formatted_session(1024 * 1024);
        let time = fixed_time();
        session.mkdir("/d", &time).unwrap();
        session.create("/d/x", &time).unwrap();

        assert!(matches!(
            session.rmdir("/d").unwrap_err(),
            FsError::Kind(ErrorKind::NotEmpty)
        ));
        session.unlink("/d/x").unwrap();
        session.rmdir("/d").unwrap();
    }

    #[test]
    fn writing_past_capacity_returns_no_space() {
        let mut session = formatted_session(64 * 1024);
        let time = fixed_time();
        let page_size = session.layout().page_size_bytes;

        // Exhaust every free page on the first file; its own start page already supplies
        // the one page of headroom the second file's start page needs.
        let mut handle = session.create("/f.bin", &time).unwrap();
        let leave_one_page = session.free_space() as usize;
        session.write(&mut handle, &vec![0u8; leave_one_page], 0).unwrap();
        session.flush(&handle).unwrap();

        // /g.bin's creation consumes the last free page as its own start page.
        let mut again = session.create("/g.bin", &time).unwrap();
        assert_eq!(session.free_space(), 0);
        session.write(&mut again, &vec![0u8; page_size], 0).unwrap();

        // Growing the chain by one more page now has nowhere to come from.
        assert!(matches!(
            session.write(&mut again, &[0u8], page_size as u64).unwrap_err(),
            FsError::Kind(ErrorKind::NoSpace)
        ));
    }

    #[test]
    fn name_longer_than_sixteen_bytes_is_rejected() {
        let mut session = formatted_session(64 * 1024);
        let time = fixed_time();
        assert!(matches!(
            session.create("/abcdefghijklmnopq", &time).unwrap_err(),
            FsError::Kind(ErrorKind::NameTooLong)
        ));
    }
}
