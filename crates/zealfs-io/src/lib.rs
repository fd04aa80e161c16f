//! Sector-aligned block I/O abstraction.
//!
//! This is the narrowest layer of the stack (layer A of the engine design): a
//! `BlockDevice` exposes positional read/write over arbitrary byte offsets and lengths,
//! the same contract `hadris_core::disk::{DiskReader, DiskWriter}` expose over fixed
//! 512-byte sectors, but generalized so a caller never has to reason about sector
//! boundaries. Implementations that sit on top of sector-only hardware (the macOS
//! raw-character-disk case) get there via `SectorAligned`, which performs the
//! read-modify-write envelope needed to satisfy that constraint.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const SECTOR_SIZE: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("unable to open disk at {path}: {source}")]
    Open { path: String, source: std::io::Error },
    #[error("i/o failure: {0}")]
    IoFailure(#[from] std::io::Error),
    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    #[error("short write at offset {offset}: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        offset: u64,
        expected: usize,
        actual: usize,
    },
}

/// A handle to a block device or backing image file.
///
/// Implementations are not required to be sector-aligned internally; `read`/`write` take
/// arbitrary offsets and lengths.
pub trait BlockDevice {
    /// Total addressable size of the device, in bytes.
    fn size(&self) -> u64;
    /// Reads exactly `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IoError>;
    /// Writes exactly `buf.len()` bytes starting at `offset`.
    fn write(&mut self, offset: u64, buf: &[u8]) -> Result<(), IoError>;
}

/// A block device backed by a regular file. Image files are byte-granular — there is no
/// sector-alignment restriction to honor, unlike a raw character device — so reads and
/// writes pass straight through to the file.
pub struct ImageFile {
    file: File,
    size: u64,
}

impl ImageFile {
    /// Opens an existing image file for read-write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path_ref = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path_ref)
            .map_err(|source| IoError::Open {
                path: path_ref.display().to_string(),
                source,
            })?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }

    /// Creates a new sparse image file of exactly `size` bytes, truncating any existing
    /// file at `path`. Used by the registry's `create_image`.
    pub fn create_sparse(path: impl AsRef<Path>, size: u64) -> Result<Self, IoError> {
        let path_ref = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path_ref)
            .map_err(|source| IoError::Open {
                path: path_ref.display().to_string(),
                source,
            })?;
        file.set_len(size)?;
        Ok(Self { file, size })
    }
}

impl BlockDevice for ImageFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let read = self.file.read(buf)?;
        if read != buf.len() {
            return Err(IoError::ShortRead {
                offset,
                expected: buf.len(),
                actual: read,
            });
        }
        Ok(())
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> Result<(), IoError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}

/// An in-memory block device, used by tests in this crate and throughout `zealfs-part`
/// and `zealfs-fs` in place of a real disk.
pub struct MemoryDevice {
    data: Vec<u8>,
}

impl MemoryDevice {
    pub fn zeroed(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDevice for MemoryDevice {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        let offset = offset as usize;
        if offset + buf.len() > self.data.len() {
            return Err(IoError::ShortRead {
                offset: offset as u64,
                expected: buf.len(),
                actual: self.data.len().saturating_sub(offset),
            });
        }
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> Result<(), IoError> {
        let offset = offset as usize;
        if offset + buf.len() > self.data.len() {
            return Err(IoError::ShortWrite {
                offset: offset as u64,
                expected: buf.len(),
                actual: self.data.len().saturating_sub(offset),
            });
        }
        self.data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

/// Wraps an inner device that only accepts whole-sector, sector-aligned I/O (the macOS
/// raw-character-disk case) and exposes the arbitrary-offset
/// `BlockDevice` contract over it.
///
/// The inner device is addressed only at `SECTOR_SIZE`-aligned offsets with
/// `SECTOR_SIZE`-multiple lengths; `SectorAligned` splits a request into whole-sector
/// chunks plus a leading/trailing unaligned remainder, round-tripping the remainder
/// through a scratch sector.
pub struct SectorAligned<D> {
    inner: D,
}

impl<D: SectorDevice> SectorAligned<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

/// The narrower contract a truly sector-only device satisfies.
pub trait SectorDevice {
    fn size(&self) -> u64;
    fn read_sector(&mut self, sector: u64, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), IoError>;
    fn write_sector(&mut self, sector: u64, buf: &[u8; SECTOR_SIZE]) -> Result<(), IoError>;
}

impl<D: SectorDevice> BlockDevice for SectorAligned<D> {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut done = 0usize;
        let mut cursor = offset;
        while done < buf.len() {
            let sector = cursor / SECTOR_SIZE as u64;
            let in_sector = (cursor % SECTOR_SIZE as u64) as usize;
            let mut scratch = [0u8; SECTOR_SIZE];
            self.inner.read_sector(sector, &mut scratch)?;
            let take = (SECTOR_SIZE - in_sector).min(buf.len() - done);
            buf[done..done + take].copy_from_slice(&scratch[in_sector..in_sector + take]);
            done += take;
            cursor += take as u64;
        }
        Ok(())
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> Result<(), IoError> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut done = 0usize;
        let mut cursor = offset;
        while done < buf.len() {
            let sector = cursor / SECTOR_SIZE as u64;
            let in_sector = (cursor % SECTOR_SIZE as u64) as usize;
            let take = (SECTOR_SIZE - in_sector).min(buf.len() - done);
            if in_sector == 0 && take == SECTOR_SIZE {
                // Whole, aligned sector: write straight through, no RMW needed.
                let mut sector_buf = [0u8; SECTOR_SIZE];
                sector_buf.copy_from_slice(&buf[done..done + SECTOR_SIZE]);
                self.inner.write_sector(sector, &sector_buf)?;
            } else {
                // Partial sector: read the existing contents first so bytes outside
                // [in_sector, in_sector + take) survive the write.
                let mut scratch = [0u8; SECTOR_SIZE];
                self.inner.read_sector(sector, &mut scratch)?;
                scratch[in_sector..in_sector + take].copy_from_slice(&buf[done..done + take]);
                self.inner.write_sector(sector, &scratch)?;
            }
            done += take;
            cursor += take as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SectorMemory {
        data: Vec<u8>,
    }

    impl SectorDevice for SectorMemory {
        fn size(&self) -> u64 {
            self.data.len() as u64
        }
        fn read_sector(&mut self, sector: u64, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), IoError> {
            let off = sector as usize * SECTOR_SIZE;
            buf.copy_from_slice(&self.data[off..off + SECTOR_SIZE]);
            Ok(())
        }
        fn write_sector(&mut self, sector: u64, buf: &[u8; SECTOR_SIZE]) -> Result<(), IoError> {
            let off = sector as usize * SECTOR_SIZE;
            self.data[off..off + SECTOR_SIZE].copy_from_slice(buf);
            Ok(())
        }
    }

    #[test]
    fn memory_device_round_trip() {
        let mut dev = MemoryDevice::zeroed(4096);
        dev.write(10, b"hello").unwrap();
        let mut buf = [0u8; 5];
        dev.read(10, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn memory_device_out_of_range() {
        let mut dev = MemoryDevice::zeroed(16);
        let mut buf = [0u8; 32];
        assert!(dev.read(0, &mut buf).is_err());
    }

    #[test]
    fn sector_aligned_handles_unaligned_tail() {
        let mut dev = SectorAligned::new(SectorMemory {
            data: vec![0u8; SECTOR_SIZE * 2],
        });
        // Write 10 bytes starting 500 bytes into the first sector: crosses into the
        // second sector and is neither start- nor end-aligned.
        dev.write(500, &[0xAB; 10]).unwrap();
        let mut buf = [0u8; 10];
        dev.read(500, &mut buf).unwrap();
        assert_eq!(buf, [0xAB; 10]);
        // Bytes before the write within the same sector must be untouched.
        let mut prefix = [0u8; 4];
        dev.read(496, &mut prefix).unwrap();
        assert_eq!(prefix, [0u8; 4]);
    }

    #[test]
    fn sector_aligned_whole_sector_write_skips_rmw() {
        let mut dev = SectorAligned::new(SectorMemory {
            data: vec![0xFFu8; SECTOR_SIZE],
        });
        dev.write(0, &[0u8; SECTOR_SIZE]).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];
        dev.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0u8; SECTOR_SIZE]);
    }

    #[test]
    fn image_file_create_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.img");
        {
            let mut img = ImageFile::create_sparse(&path, 1 << 20).unwrap();
            assert_eq!(img.size(), 1 << 20);
            img.write(0, &[0x55, 0xAA]).unwrap();
        }
        let mut img = ImageFile::open(&path).unwrap();
        let mut buf = [0u8; 2];
        img.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0x55, 0xAA]);
    }
}
