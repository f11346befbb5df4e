//! Filesystem primitives shared by the artifex crates.
//!
//! - `staging` - tracked temporary files with idempotent cleanup
//! - `permissions` - Unix mode helpers and cross-platform permission modes
//! - [`replace_with_symlink`] - swap a path for a symbolic link

mod error;
pub mod permissions;
mod staging;

pub use error::{Error, Result};
pub use permissions::PermissionMode;
pub use staging::{StagingArea, StagingFile};

use std::path::Path;

/// Replace whatever is at `link` with a symlink pointing to `target`.
///
/// The link is created under a temporary name and renamed into place, so a
/// reader never observes a missing path.
#[cfg(unix)]
pub fn replace_with_symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let target = target.as_ref();
    let link = link.as_ref();

    let file_name = link.file_name().unwrap_or_default().to_string_lossy();
    let tmp_link = link.with_file_name(format!(".{file_name}.lnk.tmp"));
    let _ = std::fs::remove_file(&tmp_link);

    std::os::unix::fs::symlink(target, &tmp_link).map_err(|e| Error::Write {
        path: tmp_link.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp_link, link).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_link);
        Error::Write {
            path: link.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
pub fn replace_with_symlink(_target: impl AsRef<Path>, _link: impl AsRef<Path>) -> Result<()> {
    Err(Error::SymlinkNotSupported)
}

/// Remove a file or symlink if present; a missing path is not an error.
pub fn remove_file_if_exists(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn test_replace_with_symlink() -> Result<()> {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");

        std::fs::write(&target, "data").unwrap();
        std::fs::write(&link, "stale").unwrap();
        replace_with_symlink(&target, &link)?;

        assert!(link.is_symlink());
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "data");
        Ok(())
    }

    #[test]
    fn test_remove_file_if_exists() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");

        remove_file_if_exists(&path)?;
        std::fs::write(&path, "x").unwrap();
        remove_file_if_exists(&path)?;

        assert!(!path.exists());
        Ok(())
    }
}
