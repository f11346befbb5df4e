//! Archive detection, nested-path resolution, zip-slip safe extraction and
//! packing for build artifacts.
//!
//! A compound path such as `outer.zip!/inner.tar.gz!/data/file.txt` names an
//! entry inside an archive inside an archive; [`Resolver`] walks it without
//! materializing the intermediate layers.
//!
//! # Architecture
//!
//! - `format.rs` - Type detection by name and by magic bytes
//! - `codec/` - Codec registry and per-format entry streams
//! - `path.rs` - The `!/` path grammar
//! - `resolve.rs` - Nested resolution, folder listing
//! - `sanitize.rs` - Zip-slip checks
//! - `extract.rs` - Extraction into a target directory
//! - `pack.rs` - Zip packing of directory trees
//! - `gzip.rs` - Single-stream gzip helpers
//! - `inventory.rs` - Entry size and mode maps

pub mod codec;
pub mod descriptor;
pub mod entry;
mod error;
pub mod extract;
pub mod format;
pub mod gzip;
pub mod inventory;
pub mod options;
pub mod pack;
pub mod path;
pub mod resolve;
pub mod sanitize;
pub mod settings;

pub use codec::{CodecRegistry, Decompressor, Flow, Support};
pub use descriptor::{ArchiveDescriptor, BytesDescriptor, FileDescriptor};
pub use entry::{ArchiveEntry, ArchivedFileInfo, EntryHandle, SIZE_UNKNOWN};
pub use error::{Error, Result};
pub use extract::{ArchiveFileSelector, ExtractReport, extract_all, extract_files};
pub use format::{FormatTag, detect, detect_by_magic};
pub use inventory::{entry_sizes, entry_unix_modes, zip_contains_entry};
pub use options::{
    ExtractOptions, PermissionStrategy, Progress, RejectionPolicy, SymlinkPolicy, TargetMode,
};
pub use pack::{PackOptions, pack, pack_to_file};
pub use path::{CompoundPath, SEPARATOR};
pub use resolve::{ResolveOptions, Resolver, split_archive_path};
pub use sanitize::is_name_allowed;
pub use settings::Settings;
