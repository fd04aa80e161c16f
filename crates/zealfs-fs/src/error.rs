use zealfs_common::ErrorKind;
use zealfs_io::IoError;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("i/o error: {0}")]
    Io(#[from] IoError),
    #[error("{0}")]
    Kind(#[from] ErrorKind),
    #[error("the root directory cannot be removed")]
    RootIsNotRemovable,
}

impl FsError {
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Self::Kind(kind) => Some(kind),
            Self::Io(_) => None,
        }
    }
}
