//! POSIX-style path splitting for `browse_path`, trimmed down from
//! `hadris_core::path::Path` to what ZealFS needs: a flat sequence of up-to-16-byte
//! components, no `.`/`..` handling (the on-disk format has no concept of either).

use zealfs_common::ErrorKind;

use crate::error::FsError;
use crate::raw::MAX_NAME_LEN;

/// Splits `path` into its non-empty components, rejecting any component longer than
/// [`MAX_NAME_LEN`] bytes.
pub fn split_path(path: &str) -> Result<Vec<&str>, FsError> {
    let mut components = Vec::new();
    for part in path.split('/') {
        if part.is_empty() {
            continue;
        }
        if part.len() > MAX_NAME_LEN {
            return Err(ErrorKind::NameTooLong.into());
        }
        components.push(part);
    }
    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_ignores_repeated_separators() {
        assert_eq!(split_path("/a/b//c").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(split_path("/").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn rejects_overlong_component() {
        assert!(split_path("/abcdefghijklmnopq").is_err());
    }
}
