//! Streaming entries to disk without letting any of them escape the target.
//!
//! # Platform Behavior
//!
//! **Unix**: `PermissionStrategy::Preserve` applies entry modes and
//! `SymlinkPolicy::Create` creates real symlinks.
//!
//! **Windows**: only the read-only flag is applied; `SymlinkPolicy::Create`
//! falls back to writing the link target as file content.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use artifex_fs::StagingArea;
use filetime::FileTime;
use tracing::{debug, info, warn};

use crate::codec::Flow;
use crate::descriptor::{ArchiveDescriptor, FileDescriptor};
use crate::entry::ArchiveEntry;
use crate::error::{Error, Result};
use crate::format::{self, FormatTag};
use crate::options::{ExtractOptions, Progress, RejectionPolicy, SymlinkPolicy, TargetMode};
use crate::path::{self, CompoundPath};
use crate::resolve::Resolver;
use crate::sanitize;

/// Outcome of an extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
    /// Raw names of entries skipped because they escape the target.
    pub rejected: Vec<String>,
}

/// Picks where each entry of [`extract_files`] goes.
pub trait ArchiveFileSelector {
    /// Destination for `entry_name`, or `None` to skip the entry.
    fn destination(&self, entry_name: &str) -> Option<PathBuf>;
}

impl<F> ArchiveFileSelector for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn destination(&self, entry_name: &str) -> Option<PathBuf> {
        self(entry_name)
    }
}

/// Extract every entry of `archive` under `prefix` into `target`.
///
/// `prefix` may cross archive layers: `inner.tar.gz!/data/` extracts the
/// `data/` folder of the nested tarball. The part after the last separator
/// is matched against raw entry names and removed from the output paths.
pub fn extract_all(
    resolver: &Resolver,
    archive: &dyn ArchiveDescriptor,
    target: &Path,
    prefix: &str,
    mode: TargetMode,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    info!(
        archive = %archive.identity(),
        target = %target.display(),
        prefix,
        ?mode,
        "extracting"
    );
    prepare_target(target, mode)?;

    match extract_into(resolver, archive, target, prefix, options) {
        Ok(report) => {
            info!(
                files = report.files,
                directories = report.directories,
                bytes = report.bytes,
                rejected = report.rejected.len(),
                "extraction finished"
            );
            Ok(report)
        }
        Err(e) => {
            if mode == TargetMode::Clean {
                rollback(target);
            }
            Err(e)
        }
    }
}

fn extract_into(
    resolver: &Resolver,
    archive: &dyn ArchiveDescriptor,
    target: &Path,
    prefix: &str,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let split = CompoundPath::split(prefix, true);
    let filter = split.last().unwrap_or_default().replace('\\', "/");
    let mut writer = EntryWriter::new(target, options);

    resolver.for_each_entry(archive, prefix, &mut |entry, reader| {
        let name = entry.name.replace('\\', "/");
        let Some(rest) = name.strip_prefix(filter.as_str()) else {
            return Ok(Flow::Continue);
        };
        let relative = rest.strip_prefix('/').unwrap_or(rest);
        if !relative.is_empty() {
            writer.extract(relative, entry, reader)?;
        }
        Ok(Flow::Continue)
    })?;

    Ok(writer.report)
}

/// Offer every entry of the archive at `archive_path` to `selector` and
/// write the chosen ones.
///
/// A zstd-wrapped input is first decompressed into a staging file next to
/// the archive. When the staged bytes are an archive its entries are offered;
/// otherwise the single file is offered under the archive name minus its
/// last extension.
pub fn extract_files(
    resolver: &Resolver,
    archive_path: &Path,
    selector: &dyn ArchiveFileSelector,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let descriptor = FileDescriptor::new(archive_path);
    if !is_zstd(descriptor.name(), archive_path)? {
        return select_entries(resolver, &descriptor, selector, options);
    }

    let parent = archive_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let staging = StagingArea::in_dir(parent);
    let result = extract_staged_zstd(resolver, &descriptor, &staging, selector, options);
    if !staging.cleanup() {
        warn!(archive = %archive_path.display(), "staging files left behind");
    }
    result
}

fn is_zstd(name: &str, path: &Path) -> Result<bool> {
    match format::detect(name) {
        FormatTag::Zstd => Ok(true),
        FormatTag::Unknown => {
            let mut file = File::open(path)
                .map_err(|e| Error::io(format!("failed to open {}", path.display()), e))?;
            let tag = format::detect_from_reader(&mut file)
                .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
            Ok(tag == Some(FormatTag::Zstd))
        }
        _ => Ok(false),
    }
}

fn extract_staged_zstd(
    resolver: &Resolver,
    archive: &FileDescriptor,
    staging: &StagingArea,
    selector: &dyn ArchiveFileSelector,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let provider = resolver
        .registry()
        .decompressor(FormatTag::Zstd)
        .ok_or_else(|| Error::UnsupportedFormat {
            format: FormatTag::Zstd,
            name: archive.name().to_string(),
        })?;

    let mut staged = staging.create_temp_file()?;
    let input = archive
        .open()
        .map_err(|e| Error::io(format!("failed to open {}", archive.identity()), e))?;
    let mut decoded = provider
        .decompress(input)
        .map_err(|e| Error::decode(archive.name(), e))?;
    io::copy(&mut decoded, staged.file()).map_err(|e| Error::decode(archive.name(), e))?;
    debug!(archive = %archive.identity(), staged = %staged.path().display(), "zstd input staged");

    let mut probe = staged.reopen()?;
    let inner = format::detect_from_reader(&mut probe)
        .map_err(|e| Error::io(format!("failed to read {}", staged.path().display()), e))?
        .filter(|tag| tag.is_archive());

    if inner.is_some() {
        let staged_archive = FileDescriptor::new(staged.path());
        return select_entries(resolver, &staged_archive, selector, options);
    }

    let single_name = path::strip_extension(archive.name()).to_string();
    let mut report = ExtractReport::default();
    if let Some(dest) = selector.destination(&single_name) {
        let mut writer = EntryWriter::new(Path::new(""), options);
        let mut reader = BufReader::new(probe);
        writer.write_selected(&dest, &ArchiveEntry::new(single_name), &mut reader)?;
        report = writer.report;
    }
    Ok(report)
}

fn select_entries(
    resolver: &Resolver,
    archive: &dyn ArchiveDescriptor,
    selector: &dyn ArchiveFileSelector,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let mut writer = EntryWriter::new(Path::new(""), options);
    resolver.for_each_entry(archive, "", &mut |entry, reader| {
        if entry.is_directory() {
            return Ok(Flow::Continue);
        }
        if !sanitize::is_name_allowed(&entry.name) {
            writer.reject(&entry.name)?;
            return Ok(Flow::Continue);
        }
        if let Some(dest) = selector.destination(&entry.name) {
            writer.write_selected(&dest, entry, reader)?;
        }
        Ok(Flow::Continue)
    })?;
    Ok(writer.report)
}

fn prepare_target(target: &Path, mode: TargetMode) -> Result<()> {
    if mode == TargetMode::Clean && target.exists() {
        debug!(target = %target.display(), "clearing target");
        fs::remove_dir_all(target)
            .map_err(|e| Error::io(format!("failed to clear {}", target.display()), e))?;
    }
    fs::create_dir_all(target)
        .map_err(|e| Error::io(format!("failed to create {}", target.display()), e))
}

fn rollback(target: &Path) {
    match fs::remove_dir_all(target) {
        Ok(()) => info!(target = %target.display(), "removed partially extracted target"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(target = %target.display(), error = %e, "could not remove partial target"),
    }
}

struct EntryWriter<'o> {
    target: &'o Path,
    options: &'o ExtractOptions,
    buffer: Vec<u8>,
    report: ExtractReport,
    entries_processed: u64,
}

impl<'o> EntryWriter<'o> {
    fn new(target: &'o Path, options: &'o ExtractOptions) -> Self {
        Self {
            target,
            options,
            buffer: vec![0; options.buffer_size.max(1)],
            report: ExtractReport::default(),
            entries_processed: 0,
        }
    }

    fn reject(&mut self, name: &str) -> Result<()> {
        match self.options.rejection {
            RejectionPolicy::Skip => {
                warn!(entry = name, "skipping entry outside the target directory");
                self.report.rejected.push(name.to_string());
                Ok(())
            }
            RejectionPolicy::Abort => Err(Error::Rejected {
                entry: name.to_string(),
            }),
        }
    }

    /// Extract one entry at `relative` below the target.
    fn extract(&mut self, relative: &str, entry: &ArchiveEntry, reader: &mut dyn Read) -> Result<()> {
        let rel = match sanitize::entry_relative_path(relative) {
            Ok(rel) => rel,
            Err(Error::Rejected { .. }) => return self.reject(&entry.name),
            Err(e) => return Err(e),
        };
        if rel.as_os_str().is_empty() {
            return Ok(());
        }
        let dest = self.target.join(&rel);

        if entry.is_directory() {
            create_dir(&dest)?;
            self.report.directories += 1;
            debug!(path = %dest.display(), "directory created");
        } else if entry.is_symlink() {
            self.write_symlink(&rel, &dest, entry, reader)?;
        } else {
            self.write_file(&dest, entry, reader)?;
        }
        self.progress(&rel);
        Ok(())
    }

    fn write_selected(&mut self, dest: &Path, entry: &ArchiveEntry, reader: &mut dyn Read) -> Result<()> {
        if entry.is_symlink() {
            let text = link_text(entry, reader)?;
            self.write_file(dest, entry, &mut text.as_bytes())?;
        } else {
            self.write_file(dest, entry, reader)?;
        }
        self.progress(dest);
        Ok(())
    }

    fn write_file(&mut self, dest: &Path, entry: &ArchiveEntry, reader: &mut dyn Read) -> Result<()> {
        if let Some(parent) = dest.parent() {
            create_dir(parent)?;
        }
        artifex_fs::remove_file_if_exists(dest)?;
        let mut out = File::create(dest)
            .map_err(|e| Error::io(format!("failed to create {}", dest.display()), e))?;

        let mut written = 0u64;
        loop {
            let n = match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::decode(&entry.name, e)),
            };
            out.write_all(&self.buffer[..n])
                .map_err(|e| Error::io(format!("failed to write {}", dest.display()), e))?;
            written += n as u64;
        }
        drop(out);

        if self.options.preserve_mtime {
            if let Some(modified) = entry.modified {
                if let Err(e) = filetime::set_file_mtime(dest, FileTime::from_system_time(modified)) {
                    debug!(path = %dest.display(), error = %e, "could not set mtime");
                }
            }
        }
        self.options
            .perm_strategy
            .apply_to_path(dest, entry.unix_mode)?;

        self.report.files += 1;
        self.report.bytes += written;
        debug!(path = %dest.display(), bytes = written, "file written");
        Ok(())
    }

    fn write_symlink(
        &mut self,
        rel: &Path,
        dest: &Path,
        entry: &ArchiveEntry,
        reader: &mut dyn Read,
    ) -> Result<()> {
        let text = link_text(entry, reader)?;
        if self.options.symlinks == SymlinkPolicy::Create {
            if let Err(Error::Rejected { .. }) = sanitize::check_symlink_target(&text, rel) {
                return self.reject(&entry.name);
            }
            if let Some(parent) = dest.parent() {
                create_dir(parent)?;
            }
            match artifex_fs::replace_with_symlink(&text, dest) {
                Ok(()) => {
                    self.report.files += 1;
                    debug!(path = %dest.display(), target = %text, "symlink created");
                    return Ok(());
                }
                Err(artifex_fs::Error::SymlinkNotSupported) => {
                    debug!(path = %dest.display(), "symlinks unsupported, writing target text");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.write_file(dest, &ArchiveEntry { unix_mode: None, ..entry.clone() }, &mut text.as_bytes())
    }

    fn progress(&mut self, current: &Path) {
        self.entries_processed += 1;
        if let Some(callback) = &self.options.on_progress {
            callback(Progress {
                entries_processed: self.entries_processed,
                bytes_processed: self.report.bytes,
                total_bytes: self.options.expected_total_bytes,
                current_file: Some(current.to_path_buf()),
            });
        }
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::io(format!("failed to create {}", path.display()), e))
}

/// Link target from the header (tar) or the entry content (zip).
fn link_text(entry: &ArchiveEntry, reader: &mut dyn Read) -> Result<String> {
    if let Some(target) = &entry.link_target {
        return Ok(target.clone());
    }
    let mut raw = Vec::new();
    reader
        .read_to_end(&mut raw)
        .map_err(|e| Error::decode(&entry.name, e))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
