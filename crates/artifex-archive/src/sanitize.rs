//! Zip-slip checks for entry names and symlink targets.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// True unless `name` climbs out of its root.
///
/// Entry names use `/` as separator; backslashes are treated as `/` first.
/// A name is refused when it equals `..`, starts with `../` or contains
/// `/../`.
pub fn is_name_allowed(name: &str) -> bool {
    let name = name.replace('\\', "/");
    !(name == ".." || name.starts_with("../") || name.contains("/../"))
}

/// Turn an entry name, relative to the extraction root, into a path that
/// cannot leave the root.
///
/// Empty and `.` components are dropped, so a leading `/` or `//` yields a
/// relative path. Any `..`, drive prefix or root component is rejected.
pub fn entry_relative_path(name: &str) -> Result<PathBuf> {
    let rejected = || Error::Rejected {
        entry: name.to_string(),
    };
    if !is_name_allowed(name) {
        return Err(rejected());
    }

    let mut result = PathBuf::new();
    for part in name.split(['/', '\\']) {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(rejected());
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(normal)), None) => result.push(normal),
            _ => return Err(rejected()),
        }
    }
    Ok(result)
}

/// Check that a symlink at `link` (relative to the root) pointing to
/// `target` resolves inside the root.
pub fn check_symlink_target(target: &str, link: &Path) -> Result<()> {
    let rejected = || Error::Rejected {
        entry: format!("{} -> {target}", link.display()),
    };
    let target_path = Path::new(target);
    if target_path.is_absolute() || target.starts_with('/') || target.starts_with('\\') {
        return Err(rejected());
    }

    let mut depth: Vec<&std::ffi::OsStr> = Vec::new();
    if let Some(parent) = link.parent() {
        for component in parent.components() {
            if let Component::Normal(part) = component {
                depth.push(part);
            }
        }
    }
    for part in target.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if depth.pop().is_none() {
                    return Err(rejected());
                }
            }
            other => {
                let mut components = Path::new(other).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(normal)), None) => depth.push(normal),
                    _ => return Err(rejected()),
                }
            }
        }
    }
    Ok(())
}
