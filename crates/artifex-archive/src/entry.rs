use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use artifex_fs::permissions::{self, S_IFDIR, S_IFLNK, S_IFREG};
use chrono::{Datelike, NaiveDate, Timelike, Utc};

use crate::error::{Error, Result};
use crate::path;

/// Size sentinel for entries whose length the format does not record.
pub const SIZE_UNKNOWN: i64 = -1;

/// One item of an archive's entry stream, as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Raw name; may contain backslashes or a leading slash.
    pub name: String,
    pub size: i64,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
    /// Full Unix mode including file type bits, where the format has one.
    pub unix_mode: Option<u32>,
    /// Link target for formats that keep it in the header (tar).
    pub link_target: Option<String>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: SIZE_UNKNOWN,
            modified: None,
            is_dir: false,
            unix_mode: None,
            link_target: None,
        }
    }

    pub(crate) fn from_zip<R: Read>(file: &zip::read::ZipFile<'_, R>) -> Self {
        Self {
            name: file.name().to_string(),
            size: i64::try_from(file.size()).unwrap_or(SIZE_UNKNOWN),
            modified: file.last_modified().and_then(from_zip_datetime),
            is_dir: file.is_dir(),
            unix_mode: file.unix_mode(),
            link_target: None,
        }
    }

    pub(crate) fn from_tar<R: Read>(entry: &tar::Entry<'_, R>) -> Self {
        let header = entry.header();
        let kind = header.entry_type();
        let file_type = if kind.is_dir() {
            S_IFDIR
        } else if kind.is_symlink() {
            S_IFLNK
        } else {
            S_IFREG
        };
        let unix_mode = header.mode().ok().map(|m| file_type | permissions::permission_bits(m));
        let link_target = entry
            .link_name_bytes()
            .filter(|_| kind.is_symlink())
            .map(|b| String::from_utf8_lossy(&b).into_owned());

        Self {
            name: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
            size: i64::try_from(entry.size()).unwrap_or(SIZE_UNKNOWN),
            modified: header
                .mtime()
                .ok()
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
            is_dir: kind.is_dir(),
            unix_mode,
            link_target,
        }
    }

    /// Name in comparison form, see [`path::normalize`].
    pub fn normalized_name(&self) -> String {
        path::normalize(&self.name)
    }

    pub fn is_symlink(&self) -> bool {
        self.unix_mode.is_some_and(permissions::is_symlink_mode)
    }

    /// Directory by flag or by a trailing separator in the stored name.
    pub fn is_directory(&self) -> bool {
        self.is_dir || self.name.ends_with('/') || self.name.ends_with('\\')
    }
}

/// A folder listing item: an entry or a synthesized directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchivedFileInfo {
    pub name: String,
    pub size: i64,
    pub modified: Option<SystemTime>,
    pub is_directory: bool,
}

impl ArchivedFileInfo {
    pub(crate) fn synthesized_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: SIZE_UNKNOWN,
            modified: None,
            is_directory: true,
        }
    }

    pub(crate) fn from_entry(name: impl Into<String>, entry: &ArchiveEntry) -> Self {
        Self {
            name: name.into(),
            size: entry.size,
            modified: entry.modified,
            is_directory: entry.is_directory(),
        }
    }
}

enum Spool {
    Memory(Cursor<Vec<u8>>),
    Disk(File),
}

/// Content of one resolved entry, detached from the archive that held it.
///
/// Small entries stay in memory; larger ones spill to an anonymous file that
/// the OS removes once the handle is dropped.
pub struct EntryHandle {
    spool: Spool,
    len: u64,
}

impl EntryHandle {
    /// Copy `reader` to the end into a new handle.
    pub(crate) fn spool(reader: &mut dyn Read, threshold: usize, spill_dir: &Path) -> io::Result<Self> {
        let mut head = Vec::new();
        let limit = u64::try_from(threshold).unwrap_or(u64::MAX).saturating_add(1);
        (&mut *reader).take(limit).read_to_end(&mut head)?;
        if head.len() <= threshold {
            let len = head.len() as u64;
            return Ok(Self {
                spool: Spool::Memory(Cursor::new(head)),
                len,
            });
        }

        let mut file = tempfile::tempfile_in(spill_dir)?;
        file.write_all(&head)?;
        let len = head.len() as u64 + io::copy(reader, &mut file)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            spool: Spool::Disk(file),
            len,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.spool, Spool::Memory(_))
    }

    /// Read the remaining content into memory.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len as usize);
        self.read_to_end(&mut out)
            .map_err(|e| Error::io("failed to read spooled entry", e))?;
        Ok(out)
    }
}

impl Read for EntryHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.spool {
            Spool::Memory(cursor) => cursor.read(buf),
            Spool::Disk(file) => file.read(buf),
        }
    }
}

impl std::fmt::Debug for EntryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryHandle")
            .field("len", &self.len)
            .field("in_memory", &self.is_in_memory())
            .finish()
    }
}

pub(crate) fn from_zip_datetime(dt: zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(dt.year().into(), dt.month().into(), dt.day().into())?
        .and_hms_opt(dt.hour().into(), dt.minute().into(), dt.second().into())?;
    Some(naive.and_utc().into())
}

/// Zip timestamp for `time`; dates outside the DOS range clamp to 1980-01-01.
pub(crate) fn to_zip_datetime(time: SystemTime) -> zip::DateTime {
    let dt: chrono::DateTime<Utc> = time.into();
    let (Ok(year), Ok(month), Ok(day), Ok(hour), Ok(minute), Ok(second)) = (
        u16::try_from(dt.year()),
        u8::try_from(dt.month()),
        u8::try_from(dt.day()),
        u8::try_from(dt.hour()),
        u8::try_from(dt.minute()),
        u8::try_from(dt.second()),
    ) else {
        return zip::DateTime::default();
    };
    zip::DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap_or_default()
}
