use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// A source of archive bytes.
///
/// `name` drives extension detection; `identity` is what error messages
/// show. A descriptor may be opened more than once.
pub trait ArchiveDescriptor {
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;

    fn name(&self) -> &str;

    fn identity(&self) -> String {
        self.name().to_string()
    }

    /// The file on disk holding the bytes, if any. Formats needing random
    /// access read it directly instead of staging a copy.
    fn local_path(&self) -> Option<&Path> {
        None
    }
}

/// An archive stored in a file.
#[derive(Clone, Debug)]
pub struct FileDescriptor {
    path: PathBuf,
    name: String,
}

impl FileDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    /// A file whose on-disk name does not reflect its format.
    pub fn with_name(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveDescriptor for FileDescriptor {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        self.path.display().to_string()
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// An archive held in memory.
#[derive(Clone, Debug)]
pub struct BytesDescriptor<'a> {
    name: String,
    bytes: Cow<'a, [u8]>,
}

impl<'a> BytesDescriptor<'a> {
    pub fn new(name: impl Into<String>, bytes: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl ArchiveDescriptor for BytesDescriptor<'_> {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(&self.bytes[..]))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        format!("{} (in memory)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_descriptor_name_from_path() {
        let desc = FileDescriptor::new("/tmp/builds/outer.zip");
        assert_eq!(desc.name(), "outer.zip");
        assert_eq!(desc.identity(), "/tmp/builds/outer.zip");
        assert_eq!(desc.local_path(), Some(Path::new("/tmp/builds/outer.zip")));
    }

    #[test]
    fn file_descriptor_with_name() {
        let desc = FileDescriptor::with_name("/tmp/stage_1", "report.tar");
        assert_eq!(desc.name(), "report.tar");
        assert_eq!(desc.path(), Path::new("/tmp/stage_1"));
    }

    #[test]
    fn bytes_descriptor_reopens() {
        let desc = BytesDescriptor::new("a.bin", b"abc".to_vec());
        for _ in 0..2 {
            let mut out = String::new();
            desc.open().unwrap().read_to_string(&mut out).unwrap();
            assert_eq!(out, "abc");
        }
        assert!(desc.local_path().is_none());
    }
}
