use std::path::PathBuf;

use tracing::warn;

use crate::resolve::ResolveOptions;

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const MIN_BUFFER_SIZE: usize = 512;
pub const DEFAULT_SPOOL_THRESHOLD: usize = 1024 * 1024;

pub const ENV_BUFFER_SIZE: &str = "ARTIFEX_BUFFER_SIZE";
pub const ENV_STAGING_DIR: &str = "ARTIFEX_STAGING_DIR";
pub const ENV_SPOOL_THRESHOLD: &str = "ARTIFEX_SPOOL_THRESHOLD";

/// Process-level tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Copy buffer for extraction and packing.
    pub buffer_size: usize,
    pub staging_dir: Option<PathBuf>,
    pub spool_threshold: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            staging_dir: None,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

impl Settings {
    /// Read `ARTIFEX_*` variables; unset or unparsable ones keep defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let buffer_size = parse_size(&lookup, ENV_BUFFER_SIZE)
            .map_or(defaults.buffer_size, |size| size.max(MIN_BUFFER_SIZE));
        let spool_threshold =
            parse_size(&lookup, ENV_SPOOL_THRESHOLD).unwrap_or(defaults.spool_threshold);
        let staging_dir = lookup(ENV_STAGING_DIR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Self {
            buffer_size,
            staging_dir,
            spool_threshold,
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            staging_dir: self.staging_dir.clone(),
            spool_threshold: self.spool_threshold,
        }
    }
}

fn parse_size(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(size) => Some(size),
        Err(_) => {
            warn!(key, value = %raw, "ignoring non-numeric setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(settings(&[]), Settings::default());
    }

    #[test]
    fn reads_all_variables() {
        let s = settings(&[
            (ENV_BUFFER_SIZE, "8192"),
            (ENV_STAGING_DIR, "/var/tmp/stage"),
            (ENV_SPOOL_THRESHOLD, "10"),
        ]);
        assert_eq!(s.buffer_size, 8192);
        assert_eq!(s.staging_dir, Some(PathBuf::from("/var/tmp/stage")));
        assert_eq!(s.spool_threshold, 10);
    }

    #[test]
    fn small_buffer_is_clamped() {
        assert_eq!(settings(&[(ENV_BUFFER_SIZE, "16")]).buffer_size, MIN_BUFFER_SIZE);
    }

    #[test]
    fn garbage_keeps_default() {
        let s = settings(&[(ENV_BUFFER_SIZE, "lots"), (ENV_STAGING_DIR, "  ")]);
        assert_eq!(s.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(s.staging_dir, None);
    }
}
