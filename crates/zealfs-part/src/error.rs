use zealfs_common::ErrorKind;
use zealfs_io::IoError;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("i/o error: {0}")]
    Io(#[from] IoError),
    #[error("{0}")]
    Kind(#[from] ErrorKind),
    #[error("partition slot {0} is not active")]
    SlotNotActive(usize),
    #[error("no free partition slot available")]
    NoFreeSlot,
    #[error("registry already holds an image loaded from {0}")]
    DuplicateImage(String),
    #[error("registry is full (32 disks already tracked)")]
    RegistryFull,
    #[error("no disk is currently selected")]
    NoDiskSelected,
}
