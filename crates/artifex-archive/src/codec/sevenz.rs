//! 7z needs random access; a layer that is not a file on disk is staged.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::time::SystemTime;

use sevenz_rust::{Password, SevenZReader};

use super::{Flow, Visitor};
use crate::entry::{ArchiveEntry, SIZE_UNKNOWN};
use crate::error::{Error, Result};

pub(super) fn for_each(archive: &str, file: &mut File, visit: &mut Visitor<'_>) -> Result<()> {
    let context = || format!("failed to read {archive}");
    let len = file
        .seek(SeekFrom::End(0))
        .map_err(|e| Error::io(context(), e))?;
    file.rewind().map_err(|e| Error::io(context(), e))?;

    let mut reader = SevenZReader::new(file, len, Password::empty()).map_err(|e| corrupt(archive, e))?;

    let mut failure = None;
    let outcome = reader.for_each_entries(|item, data| {
        let mut entry = ArchiveEntry::new(item.name());
        entry.size = i64::try_from(item.size()).unwrap_or(SIZE_UNKNOWN);
        entry.is_dir = item.is_directory();
        if item.has_last_modified_date {
            entry.modified = Some(SystemTime::from(item.last_modified_date()));
        }

        match visit(&entry, data) {
            Ok(Flow::Continue) => match io::copy(data, &mut io::sink()) {
                Ok(_) => Ok(true),
                Err(e) => {
                    failure = Some(Error::decode(archive, e));
                    Ok(false)
                }
            },
            Ok(Flow::Stop) => Ok(false),
            Err(e) => {
                failure = Some(e);
                Ok(false)
            }
        }
    });

    if let Some(e) = failure {
        return Err(e);
    }
    outcome.map_err(|e| corrupt(archive, e))
}

fn corrupt(archive: &str, e: sevenz_rust::Error) -> Error {
    Error::Corrupt {
        archive: archive.to_string(),
        reason: e.to_string(),
    }
}
