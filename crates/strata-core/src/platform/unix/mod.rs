//! POSIX backend: `stat`/`lstat` through `std::fs`, `opendir`/`readdir`
//! through `nix`, hole discovery through `lseek`.

mod dir;
mod sparse;
mod volume;

pub use dir::UnixDirStream;

use super::{Capabilities, FilesystemCapability};
use crate::config::FsConfig;
use crate::dir_cursor::DirectoryProvider;
use crate::errors::{record, FsError, FsResult};
use crate::metadata::{FileMetadata, MetadataProvider, PosixStat};
use crate::security::SecurityDescriptorAccessor;
use crate::sparse::{ExtentProvider, SparseExtent};
use crate::streams::{AlternateStreamSource, StreamInfo};
use std::fs::{self, File};
use std::os::unix::fs::MetadataExt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default)]
pub struct UnixFs {
    config: FsConfig,
}

impl UnixFs {
    pub fn with_config(config: FsConfig) -> Self {
        Self { config }
    }

    /// Fully resolved path with every symlink followed.
    pub fn final_path(&self, path: &str) -> FsResult<String> {
        record(
            fs::canonicalize(path)
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|err| FsError::from_io("final path", path, &err)),
        )
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

fn posix_stat(md: &fs::Metadata) -> PosixStat {
    PosixStat {
        ino: md.ino(),
        dev: md.dev(),
        mode: md.mode(),
        nlink: md.nlink(),
        uid: u64::from(md.uid()),
        gid: u64::from(md.gid()),
        size: md.size(),
        atime: md.atime(),
        mtime: md.mtime(),
        ctime: md.ctime(),
        birthtime: md.created().ok().map(unix_seconds),
    }
}

impl MetadataProvider for UnixFs {
    fn stat(&self, path: &str) -> FsResult<FileMetadata> {
        record(
            fs::metadata(path)
                .map(|md| FileMetadata::from_posix(&posix_stat(&md)))
                .map_err(|err| FsError::from_io("stat", path, &err)),
        )
    }

    fn lstat(&self, path: &str) -> FsResult<FileMetadata> {
        record(
            fs::symlink_metadata(path)
                .map(|md| FileMetadata::from_posix(&posix_stat(&md)))
                .map_err(|err| FsError::from_io("lstat", path, &err)),
        )
    }

    fn canonical_path(&self, path: &str) -> FsResult<String> {
        record(
            fs::canonicalize(path)
                .map(|p| p.to_string_lossy().into_owned())
                .map_err(|err| FsError::from_io("canonical path", path, &err)),
        )
    }
}

impl DirectoryProvider for UnixFs {
    type Stream = UnixDirStream;

    fn open_stream(&self, path: &str) -> FsResult<UnixDirStream> {
        UnixDirStream::open(path)
    }
}

impl ExtentProvider for UnixFs {
    fn file_extents(
        &self,
        file: &File,
        metadata: &FileMetadata,
        path: &str,
    ) -> FsResult<Vec<SparseExtent>> {
        sparse::seek_extents(file, metadata.size(), path)
    }

    fn prepare_sparse_destination(&self, _file: &File, _path: &str) -> FsResult<()> {
        // Unwritten ranges of a pre-sized file are holes already.
        Ok(())
    }

    fn copy_buffer_size(&self) -> usize {
        self.config.copy_buffer_size
    }
}

impl SecurityDescriptorAccessor for UnixFs {
    fn get_security_descriptor(&self, path: &str) -> FsResult<String> {
        record(Err(FsError::not_supported(
            "get security descriptor",
            path,
            "security descriptors are a Windows feature",
        )))
    }

    fn set_security_descriptor(&self, path: &str, _sddl: &str) -> FsResult<()> {
        record(Err(FsError::not_supported(
            "set security descriptor",
            path,
            "security descriptors are a Windows feature",
        )))
    }
}

impl AlternateStreamSource for UnixFs {
    fn list_streams(&self, path: &str) -> FsResult<Vec<StreamInfo>> {
        record(Err(FsError::not_supported(
            "list streams",
            path,
            "alternate data streams are an NTFS feature",
        )))
    }
}

impl FilesystemCapability for UnixFs {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sparse_extents: sparse::HOLE_SEEK_SUPPORTED,
            reparse_points: false,
            security_descriptors: false,
            alternate_streams: false,
            volume_guids: false,
        }
    }

    fn config(&self) -> &FsConfig {
        &self.config
    }
}
