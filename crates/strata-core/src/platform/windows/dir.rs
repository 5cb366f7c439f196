use super::handle::{win_error, FindHandle};
use crate::dir_cursor::{DirStream, EntryFlags, EntryRecord};
use crate::errors::{ErrorKind, FsError, FsResult};
use crate::metadata::{combine_dwords, filetime_to_unix, WindowsAttributes};
use crate::path_codec::{from_wide, join_entry_path, NativePath};
use crate::reparse::ReparseTag;
use std::fmt;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_NO_MORE_FILES, FILETIME};
use windows::Win32::Storage::FileSystem::{FindFirstFileW, FindNextFileW, WIN32_FIND_DATAW};

/// A `FindFirstFileW` search over `dir\*.*`. The first record arrives with
/// the handle and is held until the first read.
pub struct FindStream {
    path: String,
    handle: Option<FindHandle>,
    pending: Option<WIN32_FIND_DATAW>,
    closed: bool,
}

impl FindStream {
    pub(crate) fn open(path: &str) -> FsResult<Self> {
        match std::fs::metadata(path) {
            Ok(md) if !md.is_dir() => {
                return Err(FsError::new(ErrorKind::NotADirectory, "open directory", path))
            }
            Ok(_) => {}
            Err(err) => return Err(FsError::from_io("open directory", path, &err)),
        }

        let pattern = join_entry_path(path, "*.*", '\\');
        let native = NativePath::encode(&pattern)?;
        let mut data = WIN32_FIND_DATAW::default();
        // SAFETY: `native` is NUL-terminated and `data` is a valid out-parameter.
        match unsafe { FindFirstFileW(native.as_pcwstr(), &mut data) } {
            Ok(handle) => Ok(Self {
                path: path.to_string(),
                handle: Some(FindHandle(handle)),
                pending: Some(data),
                closed: false,
            }),
            // An existing directory with nothing matching the pattern.
            Err(err) if err.code() == ERROR_FILE_NOT_FOUND.to_hresult() => Ok(Self {
                path: path.to_string(),
                handle: None,
                pending: None,
                closed: false,
            }),
            Err(err) => Err(win_error("open directory", path, err)),
        }
    }
}

fn unix_time(ft: FILETIME) -> i64 {
    filetime_to_unix(ft.dwLowDateTime, ft.dwHighDateTime)
}

fn entry_record(data: &WIN32_FIND_DATAW) -> EntryRecord {
    let attrs = WindowsAttributes(data.dwFileAttributes);
    EntryRecord {
        name: from_wide(&data.cFileName),
        flags: EntryFlags::Windows(attrs),
        unique_id: None,
        size: Some(combine_dwords(data.nFileSizeLow, data.nFileSizeHigh)),
        access_time: Some(unix_time(data.ftLastAccessTime)),
        creation_time: Some(unix_time(data.ftCreationTime)),
        modify_time: Some(unix_time(data.ftLastWriteTime)),
        // dwReserved0 holds the tag only when the reparse attribute is set.
        reparse_tag: attrs.is_reparse_point().then_some(ReparseTag(data.dwReserved0)),
    }
}

impl DirStream for FindStream {
    fn read_next(&mut self) -> FsResult<Option<EntryRecord>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(first) = self.pending.take() {
            return Ok(Some(entry_record(&first)));
        }
        let Some(handle) = self.handle.as_ref() else {
            return Ok(None);
        };
        let mut data = WIN32_FIND_DATAW::default();
        // SAFETY: the search handle is open and `data` is a valid out-parameter.
        match unsafe { FindNextFileW(handle.0, &mut data) } {
            Ok(()) => Ok(Some(entry_record(&data))),
            Err(err) if err.code() == ERROR_NO_MORE_FILES.to_hresult() => Ok(None),
            Err(err) => Err(win_error("read directory", &self.path, err)),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.pending = None;
            self.handle = None;
            log::trace!("closed find handle for {}", self.path);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for FindStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindStream")
            .field("path", &self.path)
            .field("closed", &self.closed)
            .finish()
    }
}
