//! Zip packing of filesystem trees.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use artifex_fs::permissions::{FILE_RWXR_XR_X, is_symlink_mode, permission_bits};
use tracing::{debug, info, warn};
use zip::ZipWriter;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

use crate::entry::to_zip_datetime;
use crate::error::{Error, Result};
use crate::settings::{DEFAULT_BUFFER_SIZE, MIN_BUFFER_SIZE, Settings};

pub type SkipFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct PackOptions {
    /// Files for which this returns true are left out. Directories are
    /// always walked.
    pub skip: Option<SkipFilter>,
    /// Unix modes keyed by archive-relative entry name.
    pub unix_modes: HashMap<String, u32>,
    /// Mark every `.sh` file `rwxr-xr-x`, whatever `unix_modes` says.
    pub mark_executable_scripts: bool,
    pub buffer_size: usize,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            skip: None,
            unix_modes: HashMap::new(),
            mark_executable_scripts: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl PackOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::default().buffer_size(settings.buffer_size)
    }

    pub fn skip(mut self, filter: SkipFilter) -> Self {
        self.skip = Some(filter);
        self
    }

    pub fn unix_mode(mut self, entry: impl Into<String>, mode: u32) -> Self {
        self.unix_modes.insert(entry.into(), mode);
        self
    }

    pub fn unix_modes(mut self, modes: HashMap<String, u32>) -> Self {
        self.unix_modes = modes;
        self
    }

    pub fn mark_executable_scripts(mut self, mark: bool) -> Self {
        self.mark_executable_scripts = mark;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }

    fn mode_for(&self, entry: &str, file_name: &str) -> Option<u32> {
        if self.mark_executable_scripts && file_name.to_lowercase().ends_with(".sh") {
            return Some(FILE_RWXR_XR_X);
        }
        self.unix_modes.get(entry).copied()
    }
}

impl std::fmt::Debug for PackOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackOptions")
            .field("skip", &self.skip.is_some())
            .field("unix_modes", &self.unix_modes)
            .field("mark_executable_scripts", &self.mark_executable_scripts)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

/// Pack `sources` into a zip written to `output`.
///
/// A source directory contributes its contents without its own name; a
/// source file becomes a top-level entry. The zip is finished even when a
/// file fails, and the first failure is returned.
pub fn pack<W, P>(sources: &[P], output: W, options: &PackOptions) -> Result<W>
where
    W: Write + Seek,
    P: AsRef<Path>,
{
    let mut zip = ZipWriter::new(output);
    let mut packer = Packer {
        zip: &mut zip,
        options,
        buffer: vec![0; options.buffer_size.max(1)],
        entries: 0,
    };

    let mut outcome = Ok(());
    for source in sources {
        let mut name = String::new();
        outcome = packer.walk(source.as_ref(), &mut name, true);
        if outcome.is_err() {
            break;
        }
    }
    let entries = packer.entries;

    let finished = zip.finish().map_err(|e| write_error("failed to finish zip", e));
    outcome?;
    debug!(entries, "zip finished");
    finished
}

/// [`pack`] into a new file at `dest`.
pub fn pack_to_file<P: AsRef<Path>>(sources: &[P], dest: &Path, options: &PackOptions) -> Result<()> {
    info!(sources = sources.len(), dest = %dest.display(), "packing");
    let result = File::create(dest)
        .map_err(|e| Error::io(format!("failed to create {}", dest.display()), e))
        .and_then(|file| pack(sources, BufWriter::new(file), options))
        .and_then(|mut out| {
            out.flush()
                .map_err(|e| Error::io(format!("failed to write {}", dest.display()), e))
        });
    if let Err(e) = &result {
        warn!(dest = %dest.display(), error = %e, "failed to pack zip");
    }
    result
}

struct Packer<'z, 'o, W: Write + Seek> {
    zip: &'z mut ZipWriter<W>,
    options: &'o PackOptions,
    buffer: Vec<u8>,
    entries: u64,
}

impl<W: Write + Seek> Packer<'_, '_, W> {
    /// `name` holds the archive path of `path`'s parent and is restored on
    /// return.
    fn walk(&mut self, path: &Path, name: &mut String, is_root: bool) -> Result<()> {
        let meta = fs::metadata(path)
            .map_err(|e| Error::io(format!("failed to stat {}", path.display()), e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let len = name.len();

        if meta.is_file() {
            name.push_str(&file_name);
            let result = self.add_file(path, name, &file_name, &meta);
            name.truncate(len);
            return result;
        }

        if !is_root {
            name.push_str(&file_name);
            name.push('/');
        }
        let mut children = fs::read_dir(path)
            .map_err(|e| Error::io(format!("failed to list {}", path.display()), e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| Error::io(format!("failed to list {}", path.display()), e))?;
        children.sort();

        let result = children
            .iter()
            .try_for_each(|child| self.walk(child, name, false));
        name.truncate(len);
        result
    }

    fn add_file(&mut self, path: &Path, name: &str, file_name: &str, meta: &fs::Metadata) -> Result<()> {
        if self.options.skip.as_ref().is_some_and(|skip| skip(path)) {
            debug!(path = %path.display(), "skipped by filter");
            return Ok(());
        }

        let mut entry_options = SimpleFileOptions::default().large_file(meta.len() >= u64::from(u32::MAX));
        if let Ok(modified) = meta.modified() {
            entry_options = entry_options.last_modified_time(to_zip_datetime(modified));
        }
        let mode = self.options.mode_for(name, file_name);
        if let Some(mode) = mode {
            entry_options = entry_options.unix_permissions(permission_bits(mode));
        }

        if mode.is_some_and(is_symlink_mode) {
            let target = fs::read_link(path)
                .map_err(|e| Error::io(format!("failed to read link {}", path.display()), e))?;
            self.zip
                .add_symlink(name, target.to_string_lossy(), entry_options)
                .map_err(|e| write_error(format!("failed to add {name}"), e))?;
            self.entries += 1;
            debug!(entry = name, target = %target.display(), "symlink packed");
            return Ok(());
        }

        self.zip
            .start_file(name, entry_options)
            .map_err(|e| write_error(format!("failed to add {name}"), e))?;
        let written = self.copy_file(path)?;
        self.entries += 1;
        debug!(entry = name, bytes = written, "file packed");
        Ok(())
    }

    fn copy_file(&mut self, path: &Path) -> Result<u64> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("failed to open {}", path.display()), e))?;
        let mut input = BufReader::new(file);
        let mut written = 0u64;
        loop {
            let n = match input.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io(format!("failed to read {}", path.display()), e)),
            };
            self.zip
                .write_all(&self.buffer[..n])
                .map_err(|e| Error::io(format!("failed to pack {}", path.display()), e))?;
            written += n as u64;
        }
        Ok(written)
    }
}

fn write_error(context: impl Into<String>, error: ZipError) -> Error {
    match error {
        ZipError::Io(e) => Error::io(context, e),
        other => Error::io(context, io::Error::other(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::ZipArchive;

    fn names(bytes: Vec<u8>) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("bar");
        fs::create_dir_all(root.join("baz")).unwrap();
        fs::write(root.join("File1"), "one").unwrap();
        fs::write(root.join("File2"), "two").unwrap();
        fs::write(root.join("baz/File3"), "three").unwrap();
        dir
    }

    #[test]
    fn root_directory_name_is_omitted() {
        let dir = tree();
        let out = pack(&[dir.path().join("bar")], Cursor::new(Vec::new()), &PackOptions::default()).unwrap();
        let mut names = names(out.into_inner());
        names.sort();
        assert_eq!(names, ["File1", "File2", "baz/File3"]);
    }

    #[test]
    fn single_file_root_keeps_its_name() {
        let dir = tree();
        let out = pack(
            &[dir.path().join("bar/baz/File3")],
            Cursor::new(Vec::new()),
            &PackOptions::default(),
        )
        .unwrap();
        assert_eq!(names(out.into_inner()), ["File3"]);
    }

    #[test]
    fn filter_skips_files_but_walks_directories() {
        let dir = tree();
        let options = PackOptions::default().skip(Arc::new(|p: &Path| {
            p.file_name().is_some_and(|n| n == "File1")
        }));
        let out = pack(&[dir.path().join("bar")], Cursor::new(Vec::new()), &options).unwrap();
        let mut names = names(out.into_inner());
        names.sort();
        assert_eq!(names, ["File2", "baz/File3"]);
    }

    #[test]
    fn shell_scripts_win_over_mode_map() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.sh"), "#!/bin/sh").unwrap();
        fs::write(dir.path().join("tool"), "bin").unwrap();
        let options = PackOptions::default()
            .mark_executable_scripts(true)
            .unix_mode("run.sh", 0o100600)
            .unix_mode("tool", 0o100700);
        let out = pack(&[dir.path()], Cursor::new(Vec::new()), &options).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(out.into_inner())).unwrap();
        let script = archive.by_name("run.sh").unwrap().unix_mode().unwrap();
        assert_eq!(script & 0o777, 0o755);
        let tool = archive.by_name("tool").unwrap().unix_mode().unwrap();
        assert_eq!(tool & 0o777, 0o700);
    }

    #[test]
    fn missing_source_fails_after_finishing() {
        let dir = tempfile::tempdir().unwrap();
        let err = pack(
            &[dir.path().join("missing")],
            Cursor::new(Vec::new()),
            &PackOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_mode_writes_link_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), "data").unwrap();
        std::os::unix::fs::symlink("real.txt", dir.path().join("link")).unwrap();
        let options = PackOptions::default().unix_mode("link", 0o120777);
        let out = pack(&[dir.path()], Cursor::new(Vec::new()), &options).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(out.into_inner())).unwrap();
        let mut link = archive.by_name("link").unwrap();
        assert!(is_symlink_mode(link.unix_mode().unwrap()));
        let mut text = String::new();
        link.read_to_string(&mut text).unwrap();
        assert_eq!(text, "real.txt");
    }
}
