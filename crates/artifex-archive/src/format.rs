use std::fmt;
use std::io::{self, Cursor, Read, Seek};

/// Number of leading bytes inspected by content detection.
///
/// The tar signature sits at offset 257 of the first 512-byte header block.
pub const MAGIC_LEN: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Zip,
    Jar,
    Apk,
    Tar,
    TarGz,
    SevenZip,
    Zstd,
    Unknown,
}

impl FormatTag {
    /// Formats whose bytes decode to a sequence of entries.
    pub fn is_archive(self) -> bool {
        !matches!(self, Self::Zstd | Self::Unknown)
    }

    /// Formats read with the zip entry reader.
    pub fn is_zip_family(self) -> bool {
        matches!(self, Self::Zip | Self::Jar | Self::Apk)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zip => "zip",
            Self::Jar => "jar",
            Self::Apk => "apk",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::SevenZip => "7z",
            Self::Zstd => "zstd",
            Self::Unknown => "unknown",
        })
    }
}

/// Extension table, most specific suffix first.
const EXTENSIONS: &[(&str, FormatTag)] = &[
    (".tar.gzip", FormatTag::TarGz),
    (".tar.gz", FormatTag::TarGz),
    (".tgz", FormatTag::TarGz),
    (".tar", FormatTag::Tar),
    (".snupkg", FormatTag::Zip),
    (".nupkg", FormatTag::Zip),
    (".zip", FormatTag::Zip),
    (".sit", FormatTag::Zip),
    (".jar", FormatTag::Jar),
    (".war", FormatTag::Jar),
    (".ear", FormatTag::Jar),
    (".apk", FormatTag::Apk),
    (".7z", FormatTag::SevenZip),
    (".zst", FormatTag::Zstd),
];

/// Format of a file judged by its name alone. Case-insensitive.
pub fn detect(name: &str) -> FormatTag {
    let lower = name.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(ext, _)| lower.ends_with(ext))
        .map_or(FormatTag::Unknown, |&(_, tag)| tag)
}

/// Format of a byte stream judged by its leading bytes.
///
/// A gzip stream is reported as `TarGz`; a bare gzip member without a tar
/// inside fails later as a corrupt tar.
pub fn detect_by_magic(data: &[u8]) -> Option<FormatTag> {
    match data {
        [0x28, 0xB5, 0x2F, 0xFD, ..] => Some(FormatTag::Zstd),
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] => Some(FormatTag::Zip),
        [0x1F, 0x8B, ..] => Some(FormatTag::TarGz),
        [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, ..] => Some(FormatTag::SevenZip),
        _ if is_tar_header(data) => Some(FormatTag::Tar),
        _ => None,
    }
}

// Matches both POSIX "ustar\0" and GNU "ustar  ".
fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 263 && data[257..262] == *b"ustar"
}

/// Peek at a seekable reader's magic and rewind it.
pub fn detect_from_reader<R: Read + Seek>(reader: &mut R) -> io::Result<Option<FormatTag>> {
    let mut header = Vec::with_capacity(MAGIC_LEN);
    reader.by_ref().take(MAGIC_LEN as u64).read_to_end(&mut header)?;
    reader.rewind()?;
    Ok(detect_by_magic(&header))
}

/// A reader whose first bytes have been read ahead for inspection.
///
/// Reading from a `Peeked` yields the prefix first and then the rest of the
/// inner stream, so detection never loses bytes a later stage needs.
pub struct Peeked<R> {
    head: Cursor<Vec<u8>>,
    inner: R,
}

impl<R: Read> Peeked<R> {
    /// Read up to `len` bytes ahead. A shorter prefix means the stream ended.
    pub fn new(mut inner: R, len: usize) -> io::Result<Self> {
        let mut head = Vec::with_capacity(len);
        inner.by_ref().take(len as u64).read_to_end(&mut head)?;
        Ok(Self {
            head: Cursor::new(head),
            inner,
        })
    }

    pub fn prefix(&self) -> &[u8] {
        self.head.get_ref()
    }
}

impl<R: Read> Read for Peeked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if (self.head.position() as usize) < self.head.get_ref().len() {
            return self.head.read(buf);
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_documented_extensions() {
        let cases = [
            ("a.zip", FormatTag::Zip),
            ("a.nupkg", FormatTag::Zip),
            ("a.snupkg", FormatTag::Zip),
            ("a.sit", FormatTag::Zip),
            ("a.jar", FormatTag::Jar),
            ("a.war", FormatTag::Jar),
            ("a.ear", FormatTag::Jar),
            ("a.apk", FormatTag::Apk),
            ("a.tar.gz", FormatTag::TarGz),
            ("a.tgz", FormatTag::TarGz),
            ("a.tar.gzip", FormatTag::TarGz),
            ("a.tar", FormatTag::Tar),
            ("a.7z", FormatTag::SevenZip),
            ("a.zst", FormatTag::Zstd),
        ];
        for (name, tag) in cases {
            assert_eq!(detect(name), tag, "{name}");
        }
    }

    #[test]
    fn detect_is_case_insensitive() {
        assert_eq!(detect("BUILD.TAR.GZ"), FormatTag::TarGz);
        assert_eq!(detect("Lib.Jar"), FormatTag::Jar);
    }

    #[test]
    fn detect_unknown() {
        assert_eq!(detect("notes.txt"), FormatTag::Unknown);
        assert_eq!(detect("archive.gz"), FormatTag::Unknown);
        assert_eq!(detect(""), FormatTag::Unknown);
    }

    #[test]
    fn detect_nested_name_uses_last_component() {
        assert_eq!(detect("outer.zip!/inner.tar.gz"), FormatTag::TarGz);
    }

    #[test]
    fn magic_signatures() {
        assert_eq!(
            detect_by_magic(&[0x28, 0xB5, 0x2F, 0xFD, 0x00]),
            Some(FormatTag::Zstd)
        );
        assert_eq!(
            detect_by_magic(&[0x50, 0x4B, 0x03, 0x04, 0x14]),
            Some(FormatTag::Zip)
        );
        assert_eq!(detect_by_magic(&[0x1F, 0x8B, 0x08]), Some(FormatTag::TarGz));
        assert_eq!(
            detect_by_magic(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00]),
            Some(FormatTag::SevenZip)
        );
        assert_eq!(detect_by_magic(&[0xDE, 0xAD, 0xBE, 0xEF]), None);
        assert_eq!(detect_by_magic(&[]), None);
    }

    #[test]
    fn magic_tar_posix_and_gnu() {
        let mut posix = [0u8; 512];
        posix[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(detect_by_magic(&posix), Some(FormatTag::Tar));

        let mut gnu = [0u8; 512];
        gnu[257..265].copy_from_slice(b"ustar  \0");
        assert_eq!(detect_by_magic(&gnu), Some(FormatTag::Tar));

        assert_eq!(detect_by_magic(&[0u8; 256]), None);
    }

    #[test]
    fn detect_from_reader_rewinds() {
        let mut cursor = Cursor::new(vec![0x50, 0x4B, 0x03, 0x04, 0xAA]);
        assert_eq!(detect_from_reader(&mut cursor).unwrap(), Some(FormatTag::Zip));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn peeked_replays_prefix() {
        let data: Vec<u8> = (0..=255u8).cycle().take(2000).collect();
        let mut peeked = Peeked::new(Cursor::new(data.clone()), MAGIC_LEN).unwrap();
        assert_eq!(peeked.prefix(), &data[..MAGIC_LEN]);

        let mut out = Vec::new();
        peeked.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn peeked_short_stream() {
        let mut peeked = Peeked::new(Cursor::new(b"abc".to_vec()), MAGIC_LEN).unwrap();
        assert_eq!(peeked.prefix(), b"abc");
        let mut out = String::new();
        peeked.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
    }
}
