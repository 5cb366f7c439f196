//! Cross-platform file metadata, directory traversal, reparse-point
//! resolution and hole-preserving sparse copies.
//!
//! Every public operation goes through a per-platform backend selected in
//! [`platform`]; the free functions at module level use the default backend.

pub mod buffer;
pub mod config;
pub mod dir_cursor;
pub mod errors;
pub mod fsops;
pub mod metadata;
pub mod path_codec;
pub mod platform;
#[cfg(windows)]
pub mod privilege;
pub mod reparse;
pub mod security;
pub mod sparse;
pub mod streams;
pub mod volume;

pub use config::FsConfig;
pub use dir_cursor::{open_dir, DirectoryCursor, DirectoryEntry};
pub use errors::{ErrorKind, FsError, FsResult};
pub use metadata::{canonical_path, lstat, stat, FileFlags, FileKind, FileMetadata};
pub use platform::{capabilities, Capabilities, PlatformFs};
pub use reparse::{classify_path, final_path, ReparseClassification, ReparseTag};
pub use sparse::{copy_sparse, query_extents, SparseCopyReport, SparseExtent};
