//! The ZealFS v2 page-allocated filesystem engine.

pub mod error;
pub mod layout;
pub mod path;
pub mod raw;
pub mod session;

pub use error::FsError;
pub use layout::Layout;
pub use raw::RawDirEntry;
pub use session::{DirEntryInfo, DirHandle, FileHandle, Session, SpaceReport};
