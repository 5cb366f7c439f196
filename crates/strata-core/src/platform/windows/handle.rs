use crate::errors::{FsError, FsResult};
use std::fs::{File, OpenOptions};
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use windows::Win32::Foundation::{HANDLE, HLOCAL, LocalFree};
use windows::Win32::Storage::FileSystem::{
    FindClose, FindVolumeClose, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OPEN_REPARSE_POINT,
    FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
};

/// Whether a query should land on a final reparse point or on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Follow {
    Target,
    Link,
}

/// Open `path` for metadata-style queries. Backup semantics let directories
/// and privileged files open; `Follow::Link` opens the reparse point itself.
/// The returned `File` closes the handle when dropped.
pub(crate) fn open_for_query(
    path: &str,
    follow: Follow,
    access: u32,
    op: &'static str,
) -> FsResult<File> {
    let mut flags = FILE_FLAG_BACKUP_SEMANTICS.0;
    if follow == Follow::Link {
        flags |= FILE_FLAG_OPEN_REPARSE_POINT.0;
    }
    OpenOptions::new()
        .access_mode(access)
        .share_mode((FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE).0)
        .custom_flags(flags)
        .open(path)
        .map_err(|err| FsError::from_io(op, path, &err))
}

pub(crate) fn raw_handle(file: &File) -> HANDLE {
    HANDLE(file.as_raw_handle())
}

/// Search handle from `FindFirstFileW` / `FindFirstStreamW`.
#[derive(Debug)]
pub(crate) struct FindHandle(pub(crate) HANDLE);

impl Drop for FindHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful FindFirst* call and is
        // closed only here.
        unsafe {
            let _ = FindClose(self.0);
        }
    }
}

/// Search handle from `FindFirstVolumeW`.
#[derive(Debug)]
pub(crate) struct VolumeFindHandle(pub(crate) HANDLE);

impl Drop for VolumeFindHandle {
    fn drop(&mut self) {
        // SAFETY: as above, for FindFirstVolumeW.
        unsafe {
            let _ = FindVolumeClose(self.0);
        }
    }
}

/// Memory returned by security APIs that must go back through `LocalFree`.
pub(crate) struct LocalBuffer(pub(crate) *mut core::ffi::c_void);

impl Drop for LocalBuffer {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer was allocated by the OS with LocalAlloc.
            unsafe {
                let _ = LocalFree(Some(HLOCAL(self.0)));
            }
        }
    }
}

/// Convert a `windows` crate error into an [`FsError`]. Win32 failures arrive
/// wrapped as `HRESULT_FROM_WIN32`; the plain error code is unwrapped so it
/// categorizes like a `GetLastError` value.
pub(crate) fn win_error(op: &'static str, path: &str, err: windows::core::Error) -> FsError {
    let hresult = err.code().0 as u32;
    let code = if hresult & 0xFFFF_0000 == 0x8007_0000 {
        (hresult & 0xFFFF) as i32
    } else {
        hresult as i32
    };
    FsError::from_io(op, path, &std::io::Error::from_raw_os_error(code))
}
