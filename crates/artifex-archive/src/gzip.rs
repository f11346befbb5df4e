//! Single-stream gzip helpers.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tracing::debug;

use crate::error::{Error, Result};

pub const PACKED_SUFFIX: &str = ".gz";

/// Gzip everything `input` yields into `output`.
///
/// Neither stream is closed; the gzip trailer is always written.
pub fn pack_stream<W: Write, R: Read>(output: W, input: &mut R) -> io::Result<u64> {
    let mut encoder = GzEncoder::new(output, Compression::default());
    let copied = io::copy(input, &mut encoder);
    let finished = encoder.try_finish();
    let copied = copied?;
    finished?;
    Ok(copied)
}

/// Inflate the gzip stream `input` into `output`.
pub fn unpack_stream<W: Write, R: Read>(output: &mut W, input: R) -> io::Result<u64> {
    io::copy(&mut MultiGzDecoder::new(input), output)
}

pub fn pack_bytes(unpacked: &[u8]) -> Result<Vec<u8>> {
    let mut packed = Vec::new();
    pack_stream(&mut packed, &mut &*unpacked).map_err(|e| Error::io("failed to pack bytes", e))?;
    Ok(packed)
}

pub fn unpack_bytes(packed: &[u8]) -> Result<Vec<u8>> {
    let mut unpacked = Vec::with_capacity(packed.len());
    unpack_stream(&mut unpacked, packed).map_err(|e| Error::decode("gzip bytes", e))?;
    Ok(unpacked)
}

pub fn packed_file_name(file_name: &str) -> String {
    format!("{file_name}{PACKED_SUFFIX}")
}

pub fn is_packed_file_name(file_name: &str) -> bool {
    file_name.ends_with(PACKED_SUFFIX)
}

/// Write `<src>.gz` next to `src`, replacing any existing file.
pub fn pack_file(src: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::io(
                format!("cannot pack {}", src.display()),
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
    let dest = src.with_file_name(packed_file_name(&name));
    pack_file_to(&dest, src)?;
    Ok(dest)
}

pub fn pack_file_to(dest: &Path, src: &Path) -> Result<()> {
    let input = File::open(src).map_err(|e| Error::io(format!("failed to open {}", src.display()), e))?;
    let output =
        File::create(dest).map_err(|e| Error::io(format!("failed to create {}", dest.display()), e))?;
    let mut output = BufWriter::new(output);
    let bytes = pack_stream(&mut output, &mut BufReader::new(input))
        .and_then(|bytes| output.flush().map(|()| bytes))
        .map_err(|e| Error::io(format!("failed to pack {}", src.display()), e))?;
    debug!(src = %src.display(), dest = %dest.display(), bytes, "file packed");
    Ok(())
}
