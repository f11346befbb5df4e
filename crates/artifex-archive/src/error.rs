use std::io;

use crate::format::FormatTag;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file '{path}' not found in {archive}")]
    NotFound { path: String, archive: String },

    #[error("unsupported archive format {format} for '{name}'")]
    UnsupportedFormat { format: FormatTag, name: String },

    #[error("entry '{entry}' rejected: path escapes the target directory")]
    Rejected { entry: String },

    #[error("{context}: {source}")]
    Io { context: String, source: io::Error },

    #[error("archive {archive} is corrupted: {reason}")]
    Corrupt { archive: String, reason: String },

    #[error(transparent)]
    Staging(#[from] artifex_fs::Error),
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify a failure surfaced while decoding `archive`.
    ///
    /// Codec libraries report malformed input through `io::Error` kinds other
    /// than the ones the OS produces; those become `Corrupt`.
    pub(crate) fn decode(archive: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Other => Self::Corrupt {
                archive: archive.to_string(),
                reason: source.to_string(),
            },
            _ => Self::Io {
                context: format!("failed to read {archive}"),
                source,
            },
        }
    }

    pub(crate) fn zip(archive: &str, source: zip::result::ZipError) -> Self {
        match source {
            zip::result::ZipError::Io(e) => Self::decode(archive, e),
            other => Self::Corrupt {
                archive: archive.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_maps_malformed_input_to_corrupt() {
        let err = Error::decode(
            "a.tar",
            io::Error::new(io::ErrorKind::InvalidData, "bad header"),
        );
        assert!(matches!(err, Error::Corrupt { ref archive, .. } if archive == "a.tar"));
    }

    #[test]
    fn decode_keeps_os_errors_as_io() {
        let err = Error::decode("a.tar", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn not_found_message_names_path_and_archive() {
        let err = Error::NotFound {
            path: "outer.zip!/x".into(),
            archive: "/tmp/outer.zip".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("outer.zip!/x"));
        assert!(msg.contains("/tmp/outer.zip"));
        assert!(err.is_not_found());
    }
}
