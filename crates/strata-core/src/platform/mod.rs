//! Platform backends.
//!
//! Each backend implements the provider traits ([`MetadataProvider`],
//! [`DirectoryProvider`], [`ExtentProvider`], [`ReparseSource`] on Windows,
//! plus the collaborator traits) once, and is re-exported here as
//! [`PlatformFs`]. Callers never name a backend type directly.
//!
//! [`MetadataProvider`]: crate::metadata::MetadataProvider
//! [`DirectoryProvider`]: crate::dir_cursor::DirectoryProvider
//! [`ExtentProvider`]: crate::sparse::ExtentProvider
//! [`ReparseSource`]: crate::reparse::ReparseSource

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::{UnixDirStream as NativeDirStream, UnixFs as PlatformFs};
#[cfg(windows)]
pub use windows::{FindStream as NativeDirStream, WindowsFs as PlatformFs};

/// What the running platform can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Capabilities {
    /// Allocated-range discovery for sparse files.
    pub sparse_extents: bool,
    pub reparse_points: bool,
    pub security_descriptors: bool,
    pub alternate_streams: bool,
    /// Windows-style volume GUID enumeration.
    pub volume_guids: bool,
}

/// Runtime introspection of a backend.
pub trait FilesystemCapability {
    fn capabilities(&self) -> Capabilities;

    fn config(&self) -> &crate::config::FsConfig;
}

/// Capabilities of the default backend.
pub fn capabilities() -> Capabilities {
    PlatformFs::default().capabilities()
}
