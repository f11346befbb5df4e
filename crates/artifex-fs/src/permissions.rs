use std::path::Path;

use crate::{Error, Result};

/// File type mask of a Unix `st_mode`.
pub const S_IFMT: u32 = 0o170000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040000;
/// Symbolic link type bits.
pub const S_IFLNK: u32 = 0o120000;

/// `rwxr-xr-x` regular file, the mode given to shell scripts when packing.
pub const FILE_RWXR_XR_X: u32 = S_IFREG | 0o755;

/// Returns true when the mode carries the symlink file type.
pub fn is_symlink_mode(mode: u32) -> bool {
    mode & S_IFMT == S_IFLNK
}

/// Permission bits (`0o7777`) of a full Unix mode, file type stripped.
pub fn permission_bits(mode: u32) -> u32 {
    mode & 0o7777
}

/// Permission modes applied to extracted files.
///
/// On Windows only the read-only flag can be expressed; every other mode
/// clears it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PermissionMode {
    /// Leave whatever the process umask produced.
    #[default]
    Inherit,

    /// `0o444` on Unix, the `readonly` attribute on Windows.
    ReadOnly,

    /// Raw permission bits; file type bits are ignored.
    Custom(u32),
}

impl PermissionMode {
    /// Apply the mode to an existing file or directory.
    pub fn apply_to_path(self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = match self {
                Self::Inherit => return Ok(()),
                Self::ReadOnly => 0o444,
                Self::Custom(mode) => permission_bits(mode),
            };
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(
                |e| Error::Write {
                    path: path.to_path_buf(),
                    source: e,
                },
            )?;
        }

        #[cfg(not(unix))]
        {
            let readonly = match self {
                Self::Inherit => return Ok(()),
                Self::ReadOnly => true,
                Self::Custom(mode) => mode & 0o222 == 0,
            };
            let mut perms = std::fs::metadata(path)
                .map_err(|e| Error::Read {
                    path: path.to_path_buf(),
                    source: e,
                })?
                .permissions();
            perms.set_readonly(readonly);
            std::fs::set_permissions(path, perms).map_err(|e| Error::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_type_predicates() {
        assert!(is_symlink_mode(0o120777));
        assert!(!is_symlink_mode(0o100644));
        assert_eq!(permission_bits(0o104755), 0o4755);
    }

    #[cfg(unix)]
    #[test]
    fn apply_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes");
        std::fs::write(&path, "text").unwrap();

        PermissionMode::ReadOnly.apply_to_path(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
    }

    #[cfg(unix)]
    #[test]
    fn apply_custom_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool");
        std::fs::write(&path, "#!/bin/sh").unwrap();

        PermissionMode::Custom(0o100750).apply_to_path(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn apply_inherit_is_noop_for_missing_path() {
        assert!(PermissionMode::Inherit
            .apply_to_path(Path::new("/definitely/not/here"))
            .is_ok());
    }
}
