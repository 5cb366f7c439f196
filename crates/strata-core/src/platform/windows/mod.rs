//! Windows backend: handle-based metadata, `FindFirstFileW` enumeration,
//! reparse-point queries and allocated-range discovery.

mod dir;
mod handle;
mod reparse;
mod security;
mod sparse;
mod streams;
mod volume;

pub use dir::FindStream;

use super::{Capabilities, FilesystemCapability};
use crate::buffer::{fill_with_retry, BufferFill};
use crate::config::FsConfig;
use crate::dir_cursor::DirectoryProvider;
use crate::errors::{record, FsError, FsResult};
use crate::metadata::{FileMetadata, MetadataProvider, WindowsFileRecord};
use crate::path_codec::strip_verbatim_prefix;
use handle::{open_for_query, raw_handle, win_error, Follow};
use normpath::PathExt;
use std::path::Path;
use windows::Win32::Foundation::GENERIC_READ;
use windows::Win32::Storage::FileSystem::{
    GetFileInformationByHandle, GetFinalPathNameByHandleW, BY_HANDLE_FILE_INFORMATION,
    FILE_NAME_NORMALIZED,
};

#[derive(Debug, Clone, Default)]
pub struct WindowsFs {
    config: FsConfig,
}

impl WindowsFs {
    pub fn with_config(config: FsConfig) -> Self {
        Self { config }
    }

    fn query(&self, path: &str, follow: Follow, op: &'static str) -> FsResult<FileMetadata> {
        let file = open_for_query(path, follow, GENERIC_READ.0, op)?;
        let mut info = BY_HANDLE_FILE_INFORMATION::default();
        // SAFETY: `file` owns a valid handle for the duration of the call and
        // `info` is a properly sized out-parameter.
        unsafe { GetFileInformationByHandle(raw_handle(&file), &mut info) }
            .map_err(|err| win_error(op, path, err))?;
        Ok(FileMetadata::from_windows(
            &file_record(&info),
            &self.config,
        ))
    }

    /// Fully resolved path with every link followed, via
    /// `GetFinalPathNameByHandleW`. Long results get one resized retry.
    pub fn final_path(&self, path: &str) -> FsResult<String> {
        record(self.final_path_inner(path))
    }

    fn final_path_inner(&self, path: &str) -> FsResult<String> {
        let file = open_for_query(path, Follow::Target, 0, "final path")?;
        let handle = raw_handle(&file);
        let wide = fill_with_retry::<u16, _>("final path", path, self.config.path_buffer_len, |buf| {
            // SAFETY: `handle` stays valid while `file` is alive; `buf` is a
            // writable slice whose length is passed implicitly.
            let written = unsafe { GetFinalPathNameByHandleW(handle, buf, FILE_NAME_NORMALIZED) } as usize;
            if written == 0 {
                Err(FsError::last_os("final path", path))
            } else if written >= buf.len() {
                // On overflow the return value is the size needed, NUL included.
                Ok(BufferFill::TooSmall {
                    required: written.max(buf.len() + 1),
                })
            } else {
                Ok(BufferFill::Complete(written))
            }
        })?;
        Ok(strip_verbatim_prefix(&String::from_utf16_lossy(&wide)))
    }
}

fn file_record(info: &BY_HANDLE_FILE_INFORMATION) -> WindowsFileRecord {
    WindowsFileRecord {
        attributes: info.dwFileAttributes,
        creation_time: (info.ftCreationTime.dwLowDateTime, info.ftCreationTime.dwHighDateTime),
        last_access_time: (
            info.ftLastAccessTime.dwLowDateTime,
            info.ftLastAccessTime.dwHighDateTime,
        ),
        last_write_time: (info.ftLastWriteTime.dwLowDateTime, info.ftLastWriteTime.dwHighDateTime),
        volume_serial_number: info.dwVolumeSerialNumber,
        file_size_high: info.nFileSizeHigh,
        file_size_low: info.nFileSizeLow,
        number_of_links: info.nNumberOfLinks,
        file_index_high: info.nFileIndexHigh,
        file_index_low: info.nFileIndexLow,
    }
}

impl MetadataProvider for WindowsFs {
    fn stat(&self, path: &str) -> FsResult<FileMetadata> {
        record(self.query(path, Follow::Target, "stat"))
    }

    fn lstat(&self, path: &str) -> FsResult<FileMetadata> {
        record(self.query(path, Follow::Link, "lstat"))
    }

    fn canonical_path(&self, path: &str) -> FsResult<String> {
        record(
            Path::new(path)
                .normalize()
                .map(|p| p.into_path_buf().to_string_lossy().into_owned())
                .map_err(|err| FsError::from_io("canonical path", path, &err)),
        )
    }
}

impl DirectoryProvider for WindowsFs {
    type Stream = FindStream;

    fn open_stream(&self, path: &str) -> FsResult<FindStream> {
        FindStream::open(path)
    }
}

impl FilesystemCapability for WindowsFs {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            sparse_extents: true,
            reparse_points: true,
            security_descriptors: true,
            alternate_streams: true,
            volume_guids: true,
        }
    }

    fn config(&self) -> &FsConfig {
        &self.config
    }
}
