//! Walking compound paths through nested archive layers.
//!
//! Each layer is opened lazily from the content of the matching entry of the
//! layer above it. A nested layer lives inside the visitor call of its
//! parent, so streams close innermost first on every exit path, and the
//! staging files of one call are deleted when the call returns.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use artifex_fs::StagingArea;
use tracing::{debug, trace};

use crate::codec::{CodecRegistry, EntryStream, Flow, Opened, Support, Visitor};
use crate::descriptor::ArchiveDescriptor;
use crate::entry::{ArchiveEntry, ArchivedFileInfo, EntryHandle};
use crate::error::{Error, Result};
use crate::format::{self, FormatTag, MAGIC_LEN, Peeked};
use crate::path::{self, CompoundPath};
use crate::settings::DEFAULT_SPOOL_THRESHOLD;

#[derive(Clone, Debug)]
pub struct ResolveOptions {
    /// Parent directory for staging and spill files. `None` means the
    /// platform temp directory.
    pub staging_dir: Option<PathBuf>,
    /// Largest entry [`Resolver::resolve`] keeps in memory.
    pub spool_threshold: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            staging_dir: None,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

impl ResolveOptions {
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn spool_threshold(mut self, bytes: usize) -> Self {
        self.spool_threshold = bytes;
        self
    }
}

/// Resolves compound paths against archive descriptors.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    registry: CodecRegistry,
    options: ResolveOptions,
}

impl Resolver {
    pub fn new(registry: CodecRegistry) -> Self {
        Self {
            registry,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub(crate) fn staging_parent(&self) -> PathBuf {
        self.options
            .staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Stream the entry addressed by `path` into `f`.
    ///
    /// The reader is bounded to the entry and valid only inside `f`; every
    /// layer above it is closed when this returns.
    pub fn with_entry<T, F>(&self, archive: &dyn ArchiveDescriptor, path: &str, f: F) -> Result<T>
    where
        F: FnOnce(&ArchiveEntry, &mut dyn Read) -> Result<T>,
    {
        let segments = segments_of(CompoundPath::split(path, false));
        let mut f = Some(f);
        let mut out = None;
        let mut found = |entry: &ArchiveEntry, reader: &mut dyn Read| -> Result<()> {
            if let Some(f) = f.take() {
                out = Some(f(entry, reader)?);
            }
            Ok(())
        };
        self.run(archive, path, &segments, &mut Leaf::Entry(&mut found))?;
        out.ok_or_else(|| not_found(path, archive))
    }

    /// Resolve `path` to its entry and a detached copy of its content.
    pub fn resolve(
        &self,
        archive: &dyn ArchiveDescriptor,
        path: &str,
    ) -> Result<(ArchiveEntry, EntryHandle)> {
        let spill_dir = self.staging_parent();
        let threshold = self.options.spool_threshold;
        self.with_entry(archive, path, |entry, reader| {
            let handle = EntryHandle::spool(reader, threshold, &spill_dir)
                .map_err(|e| Error::decode(&entry.name, e))?;
            Ok((entry.clone(), handle))
        })
    }

    /// Immediate children of the folder addressed by `folder`.
    ///
    /// Deeper entries collapse into one synthesized directory per first path
    /// component. Order follows the first appearance of each child.
    pub fn list_folder(
        &self,
        archive: &dyn ArchiveDescriptor,
        folder: &str,
    ) -> Result<Vec<ArchivedFileInfo>> {
        let segments = segments_of(CompoundPath::split(folder, true));
        let prefix = folder_prefix(segments.last().map_or("", String::as_str));
        let mut listing = Listing::default();

        let mut visit = |entry: &ArchiveEntry, _: &mut dyn Read| -> Result<Flow> {
            let collapsed = path::convert_and_collapse_slashes(&entry.name);
            let name = path::strip_leading_slash(&collapsed);
            if path::path_eq(name, &prefix) || !name.starts_with(prefix.as_str()) {
                return Ok(Flow::Continue);
            }
            let child = name[prefix.len()..].trim_matches('/');
            if child.trim().is_empty() {
                return Ok(Flow::Continue);
            }
            listing.add(child, entry);
            Ok(Flow::Continue)
        };
        self.run(archive, folder, &segments, &mut Leaf::Scan(&mut visit))?;

        debug!(folder, children = listing.items.len(), "listed folder");
        Ok(listing.into_infos())
    }

    /// Visit every entry of the innermost layer named by `prefix`.
    ///
    /// Segments before the last separator name archive layers; the part after
    /// it is not interpreted here, callers filter by it.
    pub fn for_each_entry(
        &self,
        archive: &dyn ArchiveDescriptor,
        prefix: &str,
        visit: &mut Visitor<'_>,
    ) -> Result<()> {
        let segments = segments_of(CompoundPath::split(prefix, true));
        self.run(archive, prefix, &segments, &mut Leaf::Scan(visit))
    }

    fn run(
        &self,
        archive: &dyn ArchiveDescriptor,
        path: &str,
        segments: &[String],
        leaf: &mut Leaf<'_, '_>,
    ) -> Result<()> {
        let walk = Walk {
            registry: &self.registry,
            staging: StagingArea::in_dir(self.staging_parent()),
            path,
            archive: archive.identity(),
        };
        let source = archive
            .open()
            .map_err(|e| Error::io(format!("failed to open {}", walk.archive), e))?;
        let layer = Layer {
            tag: format::detect(archive.name()),
            name: archive.name().to_string(),
            source,
            local_path: archive.local_path(),
        };
        walk.descend(layer, segments, leaf)
    }
}

/// Split `path` into an archive file on disk and the compound path inside
/// it: `dist/outer.zip!/inner.tar.gz!/a.txt` gives `dist/outer.zip` and
/// `inner.tar.gz!/a.txt`. `None` when `path` names no inner entry.
pub fn split_archive_path(path: &str) -> Option<(PathBuf, String)> {
    let (file, inner) = path.split_once(path::SEPARATOR)?;
    Some((PathBuf::from(file), inner.to_string()))
}

fn segments_of(path: CompoundPath) -> Vec<String> {
    let segments = path.into_segments();
    if segments.is_empty() {
        vec![String::new()]
    } else {
        segments
    }
}

fn folder_prefix(segment: &str) -> String {
    let collapsed = path::convert_and_collapse_slashes(segment);
    let mut prefix = path::strip_leading_slash(&collapsed).to_string();
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

fn not_found(path: &str, archive: &dyn ArchiveDescriptor) -> Error {
    Error::NotFound {
        path: path.to_string(),
        archive: archive.identity(),
    }
}

type Found<'f> = dyn FnMut(&ArchiveEntry, &mut dyn Read) -> Result<()> + 'f;

/// What to do once the last segment is reached.
enum Leaf<'f, 'v> {
    /// Hand over the first entry matching the last segment.
    Entry(&'f mut Found<'v>),
    /// Visit every entry of the innermost layer.
    Scan(&'f mut Visitor<'v>),
}

struct Layer<'a> {
    tag: FormatTag,
    name: String,
    source: Box<dyn Read + 'a>,
    local_path: Option<&'a Path>,
}

struct Walk<'w> {
    registry: &'w CodecRegistry,
    staging: StagingArea,
    path: &'w str,
    archive: String,
}

impl Walk<'_> {
    fn not_found(&self) -> Error {
        Error::NotFound {
            path: self.path.to_string(),
            archive: self.archive.clone(),
        }
    }

    fn open<'a>(&self, layer: Layer<'a>) -> Result<EntryStream<'a>> {
        let Layer {
            mut tag,
            name,
            mut source,
            local_path,
        } = layer;

        if tag == FormatTag::Unknown {
            let peeked = Peeked::new(source, MAGIC_LEN).map_err(|e| Error::decode(&name, e))?;
            tag = self
                .registry
                .detect_by_magic(peeked.prefix())
                .unwrap_or(FormatTag::Unknown);
            debug!(name, %tag, "detected by content");
            source = Box::new(peeked);
        }

        match self
            .registry
            .open(tag, &name, source, local_path, &self.staging)?
        {
            Opened::Entries(stream) => Ok(stream),
            Opened::Decompressed(decoded) => {
                let inner_name = path::strip_extension(&name).to_string();
                let peeked =
                    Peeked::new(decoded, MAGIC_LEN).map_err(|e| Error::decode(&name, e))?;
                match self.registry.detect_by_magic(peeked.prefix()) {
                    Some(inner) if self.registry.support(inner) != Support::Unsupported => {
                        debug!(name, %inner, "decompressed layer holds an archive");
                        self.open(Layer {
                            tag: inner,
                            name: inner_name,
                            source: Box::new(peeked),
                            local_path: None,
                        })
                    }
                    _ => {
                        debug!(name, entry = inner_name, "decompressed layer is a single file");
                        Ok(EntryStream::single(inner_name, Box::new(peeked)))
                    }
                }
            }
        }
    }

    fn descend(
        &self,
        layer: Layer<'_>,
        segments: &[String],
        leaf: &mut Leaf<'_, '_>,
    ) -> Result<()> {
        let Some((segment, rest)) = segments.split_first() else {
            return Err(self.not_found());
        };
        let mut stream = self.open(layer)?;

        if rest.is_empty() {
            return match leaf {
                Leaf::Scan(visit) => stream.for_each(&mut **visit),
                Leaf::Entry(found) => {
                    let mut hit = false;
                    stream.for_each(&mut |entry, reader| {
                        if !path::entry_matches(&entry.name, segment) {
                            return Ok(Flow::Continue);
                        }
                        hit = true;
                        (**found)(entry, reader)?;
                        Ok(Flow::Stop)
                    })?;
                    if hit { Ok(()) } else { Err(self.not_found()) }
                }
            };
        }

        let mut descended = None;
        stream.for_each(&mut |entry, reader| {
            if !path::entry_matches(&entry.name, segment) {
                return Ok(Flow::Continue);
            }
            let name = path::convert_and_collapse_slashes(&entry.name);
            trace!(layer = path::file_name(&name), "descending");
            let child = Layer {
                tag: format::detect(&name),
                name,
                source: Box::new(reader),
                local_path: None,
            };
            descended = Some(self.descend(child, rest, leaf));
            Ok(Flow::Stop)
        })?;
        descended.unwrap_or_else(|| Err(self.not_found()))
    }
}

/// Folder children keyed by first path component, in first-seen order.
#[derive(Default)]
struct Listing {
    index: HashMap<String, usize>,
    items: Vec<(String, Option<ArchiveEntry>)>,
}

impl Listing {
    fn add(&mut self, child: &str, entry: &ArchiveEntry) {
        let (key, value) = match child.split_once('/') {
            Some((first, _)) => (first, None),
            None => (child, Some(entry.clone())),
        };
        match self.index.get(key) {
            Some(&at) => self.items[at].1 = value,
            None => {
                self.index.insert(key.to_string(), self.items.len());
                self.items.push((key.to_string(), value));
            }
        }
    }

    fn into_infos(self) -> Vec<ArchivedFileInfo> {
        self.items
            .into_iter()
            .map(|(name, entry)| match entry {
                Some(entry) => ArchivedFileInfo::from_entry(name, &entry),
                None => ArchivedFileInfo::synthesized_dir(name),
            })
            .collect()
    }
}
