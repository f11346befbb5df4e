//! Whole-archive summaries and exact-name lookups.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::codec::Flow;
use crate::descriptor::ArchiveDescriptor;
use crate::error::{Error, Result};
use crate::resolve::Resolver;

/// Size of every entry, keyed by raw entry name.
///
/// Entries of unknown size map to [`SIZE_UNKNOWN`](crate::entry::SIZE_UNKNOWN).
pub fn entry_sizes(resolver: &Resolver, archive: &dyn ArchiveDescriptor) -> Result<BTreeMap<String, i64>> {
    let mut sizes = BTreeMap::new();
    resolver.for_each_entry(archive, "", &mut |entry, _| {
        sizes.insert(entry.name.clone(), entry.size);
        Ok(Flow::Continue)
    })?;
    Ok(sizes)
}

/// Unix mode of every entry that records one.
pub fn entry_unix_modes(
    resolver: &Resolver,
    archive: &dyn ArchiveDescriptor,
) -> Result<BTreeMap<String, u32>> {
    let mut modes = BTreeMap::new();
    resolver.for_each_entry(archive, "", &mut |entry, _| {
        if let Some(mode) = entry.unix_mode {
            modes.insert(entry.name.clone(), mode);
        }
        Ok(Flow::Continue)
    })?;
    Ok(modes)
}

/// True when the zip file at `zip` has an entry named exactly `name`.
pub fn zip_contains_entry(zip: &Path, name: &str) -> Result<bool> {
    let file = File::open(zip).map_err(|e| Error::io(format!("failed to open {}", zip.display()), e))?;
    let label = zip.display().to_string();
    let archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| Error::zip(&label, e))?;
    let found = archive.file_names().any(|entry| entry == name);
    Ok(found)
}

/// Read the entry named exactly `name` from zip bytes in `input`.
///
/// `input` is copied to an anonymous temp file and read through the central
/// directory, so entries that end in a data descriptor are found too.
pub fn find_entry<R: Read>(input: &mut R, name: &str) -> Result<Option<Vec<u8>>> {
    let mut spool = tempfile::tempfile().map_err(|e| Error::io("failed to create temp file", e))?;
    io::copy(input, &mut spool).map_err(|e| Error::decode("zip stream", e))?;
    spool
        .seek(SeekFrom::Start(0))
        .map_err(|e| Error::io("failed to rewind temp file", e))?;

    let mut archive = zip::ZipArchive::new(BufReader::new(spool)).map_err(|e| Error::zip("zip stream", e))?;
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Error::zip("zip stream", e)),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| Error::decode("zip stream", e))?;
    Ok(Some(content))
}
