//! The 32-byte on-disk directory entry, grounded on
//! `hadris-fat::structures::raw::directory::RawFileEntry` — a packed struct with
//! multi-byte fields stored as byte arrays rather than native integers, so the layout
//! never depends on host endianness or alignment.

use zealfs_common::time::{ZealTimestamp, ENCODED_LEN as TIME_LEN};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        const IS_DIR = 0b0000_0001;
        const OCCUPIED = 0b1000_0000;
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct RawDirEntry {
    pub flags: u8,
    pub name: [u8; 16],
    pub start_page: [u8; 2],
    pub size: [u8; 4],
    pub timestamp: [u8; TIME_LEN],
}

pub const MAX_NAME_LEN: usize = 16;

impl RawDirEntry {
    pub fn zeroed() -> Self {
        Self {
            flags: 0,
            name: [0; 16],
            start_page: [0; 2],
            size: [0; 4],
            timestamp: [0; TIME_LEN],
        }
    }

    pub fn new(name: &str, is_dir: bool, start_page: u16, size: u32, when: ZealTimestamp) -> Self {
        let mut name_bytes = [0u8; MAX_NAME_LEN];
        name_bytes[..name.len()].copy_from_slice(name.as_bytes());
        let mut flags = EntryFlags::OCCUPIED;
        if is_dir {
            flags |= EntryFlags::IS_DIR;
        }
        Self {
            flags: flags.bits(),
            name: name_bytes,
            start_page: start_page.to_le_bytes(),
            size: size.to_le_bytes(),
            timestamp: when.encode(),
        }
    }

    pub fn flags(&self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.flags)
    }

    pub fn is_occupied(&self) -> bool {
        self.flags().contains(EntryFlags::OCCUPIED)
    }

    pub fn is_dir(&self) -> bool {
        self.flags().contains(EntryFlags::IS_DIR)
    }

    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    pub fn start_page(&self) -> u16 {
        u16::from_le_bytes(self.start_page)
    }

    pub fn set_start_page(&mut self, page: u16) {
        self.start_page = page.to_le_bytes();
    }

    pub fn size(&self) -> u32 {
        u32::from_le_bytes(self.size)
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = size.to_le_bytes();
    }

    pub fn timestamp(&self) -> ZealTimestamp {
        ZealTimestamp::decode(&self.timestamp)
    }

    pub fn as_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0] = self.flags;
        out[1..17].copy_from_slice(&self.name);
        out[17..19].copy_from_slice(&self.start_page);
        out[19..23].copy_from_slice(&self.size);
        out[23..32].copy_from_slice(&self.timestamp);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            flags: bytes[0],
            name: bytes[1..17].try_into().unwrap(),
            start_page: bytes[17..19].try_into().unwrap(),
            size: bytes[19..23].try_into().unwrap(),
            timestamp: bytes[23..32].try_into().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, offset_of, size_of};
    use static_assertions::const_assert_eq;

    const_assert_eq!(size_of::<RawDirEntry>(), 32);
    const_assert_eq!(align_of::<RawDirEntry>(), 1);

    const_assert_eq!(offset_of!(RawDirEntry, flags), 0);
    const_assert_eq!(offset_of!(RawDirEntry, name), 1);
    const_assert_eq!(offset_of!(RawDirEntry, start_page), 17);
    const_assert_eq!(offset_of!(RawDirEntry, size), 19);
    const_assert_eq!(offset_of!(RawDirEntry, timestamp), 23);

    #[test]
    fn round_trips_through_bytes() {
        let entry = RawDirEntry::new("readme.txt", false, 5, 1024, ZealTimestamp::zero());
        let bytes = entry.as_bytes();
        let decoded = RawDirEntry::from_bytes(&bytes);
        assert_eq!(decoded.name_str(), "readme.txt");
        assert_eq!(decoded.start_page(), 5);
        assert_eq!(decoded.size(), 1024);
        assert!(decoded.is_occupied());
        assert!(!decoded.is_dir());
    }

    #[test]
    fn empty_entry_is_not_occupied() {
        assert!(!RawDirEntry::zeroed().is_occupied());
    }
}
