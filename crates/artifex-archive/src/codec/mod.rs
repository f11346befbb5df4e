//! Format dispatch: from a [`FormatTag`] and raw bytes to an entry stream.
//!
//! Archive formats (zip family, tar, tar.gz, 7z) open as an [`EntryStream`].
//! Pure compression wrappers (zstd) open as a decompressed byte stream that
//! the caller re-detects. Compression is supplied by [`Decompressor`]
//! providers injected into the [`CodecRegistry`].

mod gzip;
#[cfg(feature = "sevenz")]
mod sevenz;
#[cfg(feature = "zstd")]
mod zstd;

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use artifex_fs::StagingArea;
use tracing::debug;

use crate::entry::ArchiveEntry;
use crate::error::{Error, Result};
use crate::format::{self, FormatTag};

pub use self::gzip::GzipDecompressor;
#[cfg(feature = "zstd")]
pub use self::zstd::ZstdDecompressor;

/// A pluggable compression codec.
pub trait Decompressor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Does this byte prefix look like my format?
    fn matches(&self, prefix: &[u8]) -> bool;

    /// Wrap `input` in a decoder.
    fn decompress<'a>(&self, input: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>>;
}

/// Whether a visitor wants more entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Callback receiving each entry with a reader bounded to its content.
pub type Visitor<'v> = dyn FnMut(&ArchiveEntry, &mut dyn Read) -> Result<Flow> + 'v;

/// How a tag would open, without opening anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Support {
    Entries,
    Decompressed,
    Unsupported,
}

/// Result of [`CodecRegistry::open`].
pub enum Opened<'a> {
    Entries(EntryStream<'a>),
    /// Output of a compression wrapper; detect again to find out what it is.
    Decompressed(Box<dyn Read + 'a>),
}

/// Maps format tags to the way their bytes are read.
#[derive(Clone)]
pub struct CodecRegistry {
    decompressors: HashMap<FormatTag, Arc<dyn Decompressor>>,
}

impl CodecRegistry {
    /// A registry with no compression providers: zip, tar and 7z only.
    pub fn empty() -> Self {
        Self {
            decompressors: HashMap::new(),
        }
    }

    /// A registry using the given providers.
    ///
    /// `FormatTag::TarGz` selects the provider decoding the outer layer of a
    /// compressed tarball, `FormatTag::Zstd` the standalone zstd wrapper.
    pub fn new(providers: impl IntoIterator<Item = (FormatTag, Arc<dyn Decompressor>)>) -> Self {
        Self {
            decompressors: providers.into_iter().collect(),
        }
    }

    /// Replace the provider for `tag`.
    pub fn with_decompressor(mut self, tag: FormatTag, provider: Arc<dyn Decompressor>) -> Self {
        self.decompressors.insert(tag, provider);
        self
    }

    pub fn decompressor(&self, tag: FormatTag) -> Option<&Arc<dyn Decompressor>> {
        self.decompressors.get(&tag)
    }

    pub fn support(&self, tag: FormatTag) -> Support {
        match tag {
            FormatTag::Zip | FormatTag::Jar | FormatTag::Apk | FormatTag::Tar => Support::Entries,
            FormatTag::SevenZip if cfg!(feature = "sevenz") => Support::Entries,
            FormatTag::TarGz if self.decompressors.contains_key(&tag) => Support::Entries,
            FormatTag::Zstd if self.decompressors.contains_key(&tag) => Support::Decompressed,
            _ => Support::Unsupported,
        }
    }

    /// Content detection: registered providers first, then the built-in
    /// signatures.
    pub fn detect_by_magic(&self, prefix: &[u8]) -> Option<FormatTag> {
        self.decompressors
            .iter()
            .find(|(_, provider)| provider.matches(prefix))
            .map(|(&tag, _)| tag)
            .or_else(|| format::detect_by_magic(prefix))
    }

    /// Open `source` as `tag`.
    ///
    /// `name` identifies the layer in errors. `local_path` is the file holding
    /// the same bytes when the layer is a file on disk; random-access formats
    /// (zip family, 7z) read it directly, otherwise they stage `source` first.
    pub fn open<'a>(
        &self,
        tag: FormatTag,
        name: &str,
        source: Box<dyn Read + 'a>,
        local_path: Option<&Path>,
        staging: &StagingArea,
    ) -> Result<Opened<'a>> {
        debug!(%tag, name, "opening layer");
        let kind = match tag {
            FormatTag::Zip | FormatTag::Jar | FormatTag::Apk => {
                let file = random_access(name, source, local_path, staging)?;
                StreamKind::Zip(zip::ZipArchive::new(BufReader::new(file)).map_err(|e| Error::zip(name, e))?)
            }
            FormatTag::Tar => StreamKind::Tar(Box::new(tar::Archive::new(source))),
            FormatTag::TarGz => {
                let decoded = self
                    .provider(tag, name)?
                    .decompress(source)
                    .map_err(|e| Error::decode(name, e))?;
                StreamKind::Tar(Box::new(tar::Archive::new(decoded)))
            }
            #[cfg(feature = "sevenz")]
            FormatTag::SevenZip => StreamKind::SevenZ(random_access(name, source, local_path, staging)?),
            FormatTag::Zstd => {
                let decoded = self
                    .provider(tag, name)?
                    .decompress(source)
                    .map_err(|e| Error::decode(name, e))?;
                return Ok(Opened::Decompressed(decoded));
            }
            _ => {
                return Err(Error::UnsupportedFormat {
                    format: tag,
                    name: name.to_string(),
                });
            }
        };
        Ok(Opened::Entries(EntryStream {
            archive: name.to_string(),
            kind,
        }))
    }

    fn provider(&self, tag: FormatTag, name: &str) -> Result<&Arc<dyn Decompressor>> {
        self.decompressors
            .get(&tag)
            .ok_or_else(|| Error::UnsupportedFormat {
                format: tag,
                name: name.to_string(),
            })
    }
}

impl Default for CodecRegistry {
    /// Gzip for tarballs and, with the `zstd` feature, zstd.
    fn default() -> Self {
        let mut providers: Vec<(FormatTag, Arc<dyn Decompressor>)> =
            vec![(FormatTag::TarGz, Arc::new(GzipDecompressor))];
        #[cfg(feature = "zstd")]
        providers.push((FormatTag::Zstd, Arc::new(ZstdDecompressor)));
        Self::new(providers)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.decompressors.iter().map(|(tag, p)| (tag, p.name())))
            .finish()
    }
}

/// A seekable handle on the layer's bytes: the local file when there is one,
/// otherwise a copy of `source` in the staging area.
///
/// Zip entries written with a trailing data descriptor cannot be read
/// forward-only, so zip layers go through here like 7z.
fn random_access(
    name: &str,
    mut source: Box<dyn Read + '_>,
    local_path: Option<&Path>,
    staging: &StagingArea,
) -> Result<File> {
    if let Some(path) = local_path {
        return File::open(path)
            .map_err(|e| Error::io(format!("failed to open {}", path.display()), e));
    }

    let mut staged = staging.create_temp_file()?;
    debug!(name, path = %staged.path().display(), "staging layer");
    io::copy(&mut source, staged.file()).map_err(|e| Error::decode(name, e))?;
    Ok(staged.reopen()?)
}

enum StreamKind<'a> {
    /// Central-directory reader over a local or staged file.
    Zip(zip::ZipArchive<BufReader<File>>),
    Tar(Box<tar::Archive<Box<dyn Read + 'a>>>),
    #[cfg(feature = "sevenz")]
    SevenZ(File),
    Single {
        entry: ArchiveEntry,
        reader: Box<dyn Read + 'a>,
    },
}

/// The entries of one opened archive layer, read forward once.
pub struct EntryStream<'a> {
    archive: String,
    kind: StreamKind<'a>,
}

impl<'a> EntryStream<'a> {
    /// A stream of one anonymous entry: decompressed bytes that are not an
    /// archive themselves.
    pub fn single(name: impl Into<String>, reader: Box<dyn Read + 'a>) -> Self {
        let name = name.into();
        Self {
            archive: name.clone(),
            kind: StreamKind::Single {
                entry: ArchiveEntry::new(name),
                reader,
            },
        }
    }

    /// Name of the layer, for diagnostics.
    pub fn archive(&self) -> &str {
        &self.archive
    }

    /// Hand each entry to `visit` in stream order until it returns
    /// [`Flow::Stop`] or the entries run out.
    pub fn for_each(&mut self, visit: &mut Visitor<'_>) -> Result<()> {
        let archive = self.archive.as_str();
        match &mut self.kind {
            StreamKind::Zip(zip) => {
                for index in 0..zip.len() {
                    let mut file = zip.by_index(index).map_err(|e| Error::zip(archive, e))?;
                    let entry = ArchiveEntry::from_zip(&file);
                    if visit(&entry, &mut file)? == Flow::Stop {
                        break;
                    }
                }
                Ok(())
            }
            StreamKind::Tar(tar) => {
                let entries = tar.entries().map_err(|e| Error::decode(archive, e))?;
                for next in entries {
                    let mut item = next.map_err(|e| Error::decode(archive, e))?;
                    let entry = ArchiveEntry::from_tar(&item);
                    if visit(&entry, &mut item)? == Flow::Stop {
                        break;
                    }
                }
                Ok(())
            }
            #[cfg(feature = "sevenz")]
            StreamKind::SevenZ(file) => sevenz::for_each(archive, file, visit),
            StreamKind::Single { entry, reader } => {
                visit(entry, reader)?;
                Ok(())
            }
        }
    }
}
