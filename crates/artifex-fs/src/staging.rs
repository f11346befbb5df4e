//! Tracked scratch files for multi-stage decompression.
//!
//! A [`StagingArea`] hands out uniquely named files in one parent directory
//! and remembers them until [`StagingArea::cleanup`] deletes them. The parent
//! can be placed next to the archive being processed so that a large
//! decompressed intermediate stays on the same volume.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::{Error, Result};

const TEMP_FILE_PREFIX: &str = "artifex_stage_";
const TEMP_FILE_SUFFIX: &str = "_decompressed";

#[derive(Debug, Default)]
struct Inner {
    parent: Option<PathBuf>,
    files: Vec<PathBuf>,
}

/// A set of temporary files owned until cleanup.
///
/// All methods take `&self`; the tracking list sits behind a mutex so one
/// area can be shared by concurrent extraction jobs.
#[derive(Debug, Default)]
pub struct StagingArea {
    inner: Mutex<Inner>,
}

/// One staged file: its path and a read/write handle positioned at 0.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    file: File,
}

impl StagingFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    /// Open a fresh read handle on the staged file.
    pub fn reopen(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| Error::Read {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl StagingArea {
    /// An area placing files in the platform temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// An area placing files in `parent`.
    pub fn in_dir(parent: impl Into<PathBuf>) -> Self {
        let area = Self::new();
        area.set_parent(parent);
        area
    }

    /// Change where subsequent staging files are created.
    pub fn set_parent(&self, parent: impl Into<PathBuf>) {
        let parent = parent.into();
        debug!(parent = %parent.display(), "set staging parent");
        self.lock().parent = Some(parent);
    }

    /// The directory new files go to.
    pub fn parent(&self) -> PathBuf {
        self.lock()
            .parent
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Allocate and track a new uniquely named file.
    pub fn create_temp_file(&self) -> Result<StagingFile> {
        let mut inner = self.lock();
        let dir = inner.parent.clone().unwrap_or_else(std::env::temp_dir);

        let (file, path) = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(TEMP_FILE_SUFFIX)
            .tempfile_in(&dir)
            .and_then(|tmp| tmp.keep().map_err(|e| e.error))
            .map_err(|e| Error::CreateStaging {
                dir: dir.clone(),
                source: e,
            })?;

        debug!(path = %path.display(), "staging file created");
        inner.files.push(path.clone());
        Ok(StagingFile { path, file })
    }

    /// Number of files currently tracked.
    pub fn tracked(&self) -> usize {
        self.lock().files.len()
    }

    /// Delete every tracked file.
    ///
    /// Each file leaves the tracking list whether or not its deletion
    /// succeeded. Returns true when none of the files remain on disk. A
    /// second call with nothing tracked does nothing and returns true.
    pub fn cleanup(&self) -> bool {
        let files = std::mem::take(&mut self.lock().files);
        let mut all_gone = true;

        for path in files {
            let parent_exists = path.parent().is_some_and(Path::exists);
            if !parent_exists {
                debug!(path = %path.display(), "staging parent already gone");
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "staging file cleaned"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "staging file already removed")
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not delete staging file");
                    all_gone = false;
                }
            }
        }

        all_gone
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.cleanup() {
            warn!("staging area dropped with undeletable files");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::sync::Arc;

    #[test]
    fn create_places_file_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::in_dir(dir.path());

        let staged = area.create_temp_file().unwrap();

        assert_eq!(staged.path().parent(), Some(dir.path()));
        let name = staged.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(TEMP_FILE_PREFIX));
        assert!(name.ends_with(TEMP_FILE_SUFFIX));
        assert_eq!(area.tracked(), 1);
    }

    #[test]
    fn staged_file_is_writable_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::in_dir(dir.path());
        let mut staged = area.create_temp_file().unwrap();

        staged.file().write_all(b"payload").unwrap();
        staged.file().seek(SeekFrom::Start(0)).unwrap();

        let mut content = String::new();
        staged.reopen().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "payload");
    }

    #[test]
    fn cleanup_deletes_and_untracks() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::in_dir(dir.path());
        let a = area.create_temp_file().unwrap().path().to_path_buf();
        let b = area.create_temp_file().unwrap().path().to_path_buf();

        assert!(area.cleanup());

        assert!(!a.exists());
        assert!(!b.exists());
        assert_eq!(area.tracked(), 0);
    }

    #[test]
    fn cleanup_twice_is_true_both_times() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::in_dir(dir.path());
        area.create_temp_file().unwrap();

        assert!(area.cleanup());
        assert!(area.cleanup());
    }

    #[test]
    fn cleanup_tolerates_vanished_parent() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("scratch");
        std::fs::create_dir(&parent).unwrap();
        let area = StagingArea::in_dir(&parent);
        area.create_temp_file().unwrap();

        std::fs::remove_dir_all(&parent).unwrap();

        assert!(area.cleanup());
        assert_eq!(area.tracked(), 0);
    }

    #[test]
    fn create_in_missing_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::in_dir(dir.path().join("missing"));

        let result = area.create_temp_file();

        assert!(matches!(result, Err(Error::CreateStaging { .. })));
        assert_eq!(area.tracked(), 0);
    }

    #[test]
    fn drop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let area = StagingArea::in_dir(dir.path());
            area.create_temp_file().unwrap().path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_create_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let area = Arc::new(StagingArea::in_dir(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let area = Arc::clone(&area);
                std::thread::spawn(move || {
                    for _ in 0..4 {
                        area.create_temp_file().unwrap();
                    }
                    area.cleanup()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert!(area.cleanup());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
