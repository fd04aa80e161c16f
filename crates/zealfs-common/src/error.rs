//! Shared error taxonomy. This enumerates *kinds*, not full error trees —
//! each dependent crate composes its own `thiserror` enum around these plus whatever
//! lower-layer errors (I/O, MBR parsing) it needs, the way `hadris-fat::FileSystemError`
//! wraps `hadris_core::ReadWriteError` rather than duplicating it.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("underlying block operation failed")]
    IoFailure,
    #[error("platform refused access: not running as administrator")]
    NotAdmin,
    #[error("platform refused access: not running as root")]
    NotRoot,
    #[error("disk is invalid: {0}")]
    InvalidDisk(String),
    #[error("not enough free space")]
    NoSpace,
    #[error("no such file or directory")]
    NotFound,
    #[error("file or directory already exists")]
    Exists,
    #[error("is a directory")]
    IsDirectory,
    #[error("not a directory")]
    NotDirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("name exceeds 16 bytes")]
    NameTooLong,
    #[error("seek target is not reachable by a one-step chain grow")]
    SeekOutOfRange,
    #[error("disk has staged changes that would be lost")]
    StagedChangesPresent,
}
