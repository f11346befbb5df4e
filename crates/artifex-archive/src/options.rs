use std::path::{Path, PathBuf};
use std::sync::Arc;

use artifex_fs::PermissionMode;

use crate::error::Result;
use crate::settings::{DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE, Settings};

/// What happens to the target directory before and after extraction.
///
/// Required on every extraction call; there is no default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetMode {
    /// Delete and recreate the target first; on failure delete it again.
    Clean,
    /// Write into whatever is there; on failure leave partial output.
    Merge,
}

/// Reaction to an entry whose name escapes the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RejectionPolicy {
    /// Log a warning, skip the entry and keep going.
    #[default]
    Skip,
    /// Fail the whole extraction with `Error::Rejected`.
    Abort,
}

/// How symlink entries are materialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SymlinkPolicy {
    /// Write the link target text as the file content.
    #[default]
    WriteTarget,
    /// Create an OS symlink when the target stays inside the target
    /// directory.
    Create,
}

/// Permission application strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PermissionStrategy {
    /// Leave what the process umask produced.
    #[default]
    Inherit,
    /// Apply the entry's Unix mode when the archive records one.
    Preserve,
    ReadOnly,
}

impl PermissionStrategy {
    pub fn resolve(self, mode: Option<u32>) -> PermissionMode {
        match self {
            Self::Inherit => PermissionMode::Inherit,
            Self::Preserve => mode.map_or(PermissionMode::Inherit, PermissionMode::Custom),
            Self::ReadOnly => PermissionMode::ReadOnly,
        }
    }

    pub fn apply_to_path(self, path: &Path, mode: Option<u32>) -> Result<()> {
        self.resolve(mode).apply_to_path(path)?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Progress {
    pub entries_processed: u64,
    pub bytes_processed: u64,
    pub total_bytes: Option<u64>,
    pub current_file: Option<PathBuf>,
}

impl Progress {
    pub fn percentage(&self) -> Option<f32> {
        self.total_bytes.map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.bytes_processed as f32 / total as f32) * 100.0
            }
        })
    }
}

#[derive(Clone)]
pub struct ExtractOptions {
    pub rejection: RejectionPolicy,
    pub symlinks: SymlinkPolicy,
    pub perm_strategy: PermissionStrategy,
    pub preserve_mtime: bool,
    pub buffer_size: usize,
    pub expected_total_bytes: Option<u64>,
    pub on_progress: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            rejection: RejectionPolicy::default(),
            symlinks: SymlinkPolicy::default(),
            perm_strategy: PermissionStrategy::default(),
            preserve_mtime: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
            expected_total_bytes: None,
            on_progress: None,
        }
    }
}

impl ExtractOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::default().buffer_size(settings.buffer_size)
    }

    pub fn rejection(mut self, policy: RejectionPolicy) -> Self {
        self.rejection = policy;
        self
    }

    /// Shorthand for [`RejectionPolicy::Abort`].
    pub fn strict(self) -> Self {
        self.rejection(RejectionPolicy::Abort)
    }

    pub fn symlinks(mut self, policy: SymlinkPolicy) -> Self {
        self.symlinks = policy;
        self
    }

    pub fn permission_strategy(mut self, strategy: PermissionStrategy) -> Self {
        self.perm_strategy = strategy;
        self
    }

    pub fn preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }

    pub fn expected_total_bytes(mut self, bytes: u64) -> Self {
        self.expected_total_bytes = Some(bytes);
        self
    }

    pub fn on_progress(mut self, callback: Arc<dyn Fn(Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl std::fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("rejection", &self.rejection)
            .field("symlinks", &self.symlinks)
            .field("perm_strategy", &self.perm_strategy)
            .field("preserve_mtime", &self.preserve_mtime)
            .field("buffer_size", &self.buffer_size)
            .field("expected_total_bytes", &self.expected_total_bytes)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_strategy_resolution() {
        assert_eq!(PermissionStrategy::Inherit.resolve(Some(0o755)), PermissionMode::Inherit);
        assert_eq!(
            PermissionStrategy::Preserve.resolve(Some(0o100755)),
            PermissionMode::Custom(0o100755)
        );
        assert_eq!(PermissionStrategy::Preserve.resolve(None), PermissionMode::Inherit);
        assert_eq!(PermissionStrategy::ReadOnly.resolve(Some(0o777)), PermissionMode::ReadOnly);
    }

    #[test]
    fn builder_sets_fields() {
        let options = ExtractOptions::default()
            .strict()
            .symlinks(SymlinkPolicy::Create)
            .buffer_size(1);
        assert_eq!(options.rejection, RejectionPolicy::Abort);
        assert_eq!(options.symlinks, SymlinkPolicy::Create);
        assert_eq!(options.buffer_size, MIN_BUFFER_SIZE);
        assert!(options.preserve_mtime);
    }

    #[test]
    fn progress_percentage() {
        let progress = Progress {
            entries_processed: 1,
            bytes_processed: 50,
            total_bytes: Some(200),
            current_file: None,
        };
        assert_eq!(progress.percentage(), Some(25.0));
        let unknown = Progress {
            total_bytes: None,
            ..progress
        };
        assert_eq!(unknown.percentage(), None);
    }
}
