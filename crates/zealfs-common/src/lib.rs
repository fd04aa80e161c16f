//! Shared types used by every layer of the ZealFS tooling stack: the error-kind
//! taxonomy, the MBR byte layout, and BCD directory timestamps.

pub mod error;
pub mod mbr;
pub mod time;

pub use error::ErrorKind;
pub use mbr::{MbrPartitionEntry, MbrSector};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource, ZealTimestamp};
