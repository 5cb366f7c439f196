//! Error taxonomy for filesystem queries.
//!
//! Every core operation fails with an [`FsError`] that names the operation,
//! the path it was applied to, a coarse [`ErrorKind`] and the raw OS error
//! code (`errno` on POSIX, `GetLastError` on Windows).
//!
//! The most recent failure on the current thread is also kept in a
//! thread-local slot, so callers that only test a result for presence can
//! still fetch the OS code afterwards via [`last_error`].
//!
//! Nothing in this crate retries a failed OS call. The single exception is
//! output-buffer sizing, see [`crate::buffer`].

use std::cell::RefCell;
use std::fmt;
use std::io;

/// Coarse category of a filesystem failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    NotADirectory,
    /// The platform or the filesystem lacks the feature (e.g. hole reporting).
    NotSupported,
    /// The target already exists (sparse copy never overwrites).
    AlreadyExists,
    /// Any other OS-level failure; inspect the raw code.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::NotADirectory => "not a directory",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(text)
    }
}

/// A failed filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} failed for {path}: {kind}{}{}", detail_suffix(.detail), code_suffix(.code))]
pub struct FsError {
    kind: ErrorKind,
    op: &'static str,
    path: String,
    code: Option<i32>,
    detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({detail})"),
        None => String::new(),
    }
}

fn code_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (os error {code})"),
        None => String::new(),
    }
}

impl FsError {
    pub fn new(kind: ErrorKind, op: &'static str, path: impl Into<String>) -> Self {
        Self {
            kind,
            op,
            path: path.into(),
            code: None,
            detail: None,
        }
    }

    pub fn not_supported(op: &'static str, path: impl Into<String>, detail: &str) -> Self {
        Self::new(ErrorKind::NotSupported, op, path).with_detail(detail)
    }

    /// Build an error from an `io::Error`, keeping its raw OS code.
    pub fn from_io(op: &'static str, path: impl Into<String>, err: &io::Error) -> Self {
        let mut error = Self::new(categorize_io_error(err), op, path);
        error.code = err.raw_os_error();
        if error.code.is_none() {
            error.detail = Some(err.to_string());
        }
        error
    }

    /// Build an error from the calling thread's last OS error.
    pub fn last_os(op: &'static str, path: impl Into<String>) -> Self {
        Self::from_io(op, path, &io::Error::last_os_error())
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw platform error code, when the failure came from the OS.
    pub fn os_code(&self) -> Option<i32> {
        self.code
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        match err.code {
            Some(code) => io::Error::from_raw_os_error(code),
            None => {
                let kind = match err.kind {
                    ErrorKind::NotFound => io::ErrorKind::NotFound,
                    ErrorKind::AccessDenied => io::ErrorKind::PermissionDenied,
                    ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
                    ErrorKind::NotSupported => io::ErrorKind::Unsupported,
                    ErrorKind::NotADirectory | ErrorKind::Io => io::ErrorKind::Other,
                };
                io::Error::new(kind, err)
            }
        }
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Categorize an IO error. Raw OS codes take precedence over `io::ErrorKind`
/// because the standard library folds several of them into `Other`.
pub fn categorize_io_error(err: &io::Error) -> ErrorKind {
    if let Some(kind) = err.raw_os_error().and_then(categorize_os_code) {
        return kind;
    }
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        io::ErrorKind::Unsupported => ErrorKind::NotSupported,
        _ => ErrorKind::Io,
    }
}

#[cfg(unix)]
fn categorize_os_code(code: i32) -> Option<ErrorKind> {
    match code {
        libc::ENOENT => Some(ErrorKind::NotFound),
        libc::EACCES | libc::EPERM => Some(ErrorKind::AccessDenied),
        libc::ENOTDIR => Some(ErrorKind::NotADirectory),
        libc::EEXIST => Some(ErrorKind::AlreadyExists),
        libc::ENOSYS => Some(ErrorKind::NotSupported),
        c if c == libc::ENOTSUP || c == libc::EOPNOTSUPP => Some(ErrorKind::NotSupported),
        _ => None,
    }
}

#[cfg(windows)]
fn categorize_os_code(code: i32) -> Option<ErrorKind> {
    use windows::Win32::Foundation::{
        ERROR_ACCESS_DENIED, ERROR_ALREADY_EXISTS, ERROR_BAD_NETPATH, ERROR_DIRECTORY,
        ERROR_FILE_EXISTS, ERROR_FILE_NOT_FOUND, ERROR_INVALID_FUNCTION, ERROR_NOT_SUPPORTED,
        ERROR_PATH_NOT_FOUND, ERROR_PRIVILEGE_NOT_HELD,
    };

    let code = code as u32;
    if code == ERROR_FILE_NOT_FOUND.0 || code == ERROR_PATH_NOT_FOUND.0 || code == ERROR_BAD_NETPATH.0
    {
        Some(ErrorKind::NotFound)
    } else if code == ERROR_ACCESS_DENIED.0 || code == ERROR_PRIVILEGE_NOT_HELD.0 {
        Some(ErrorKind::AccessDenied)
    } else if code == ERROR_DIRECTORY.0 {
        Some(ErrorKind::NotADirectory)
    } else if code == ERROR_FILE_EXISTS.0 || code == ERROR_ALREADY_EXISTS.0 {
        Some(ErrorKind::AlreadyExists)
    } else if code == ERROR_INVALID_FUNCTION.0 || code == ERROR_NOT_SUPPORTED.0 {
        Some(ErrorKind::NotSupported)
    } else {
        None
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<FsError>> = const { RefCell::new(None) };
}

/// The most recent failure recorded on this thread, if any.
pub fn last_error() -> Option<FsError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Raw OS code of the most recent failure on this thread.
pub fn last_os_error_code() -> Option<i32> {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().and_then(FsError::os_code))
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}

/// Pass a result through, remembering its error (if any) as this thread's
/// last failure.
pub(crate) fn record<T>(result: FsResult<T>) -> FsResult<T> {
    if let Err(err) = &result {
        log::trace!("{err}");
        LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err.clone()));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_onto_taxonomy() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(categorize_io_error(&missing), ErrorKind::NotFound);

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(categorize_io_error(&denied), ErrorKind::AccessDenied);

        let exists = io::Error::new(io::ErrorKind::AlreadyExists, "exists");
        assert_eq!(categorize_io_error(&exists), ErrorKind::AlreadyExists);

        let other = io::Error::new(io::ErrorKind::InvalidData, "bad");
        assert_eq!(categorize_io_error(&other), ErrorKind::Io);
    }

    #[cfg(unix)]
    #[test]
    fn raw_codes_take_precedence() {
        let not_dir = io::Error::from_raw_os_error(libc::ENOTDIR);
        assert_eq!(categorize_io_error(&not_dir), ErrorKind::NotADirectory);

        let unsupported = io::Error::from_raw_os_error(libc::EOPNOTSUPP);
        assert_eq!(categorize_io_error(&unsupported), ErrorKind::NotSupported);

        let err = FsError::from_io("stat", "/x", &io::Error::from_raw_os_error(libc::ENOENT));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.os_code(), Some(libc::ENOENT));
    }

    #[test]
    fn display_names_operation_and_code() {
        let err = FsError::new(ErrorKind::NotFound, "stat", "/tmp/missing").with_code(2);
        assert_eq!(
            err.to_string(),
            "stat failed for /tmp/missing: not found (os error 2)"
        );

        let err = FsError::not_supported("query extents", "/d", "path is a directory");
        assert_eq!(
            err.to_string(),
            "query extents failed for /d: not supported (path is a directory)"
        );
    }

    #[test]
    fn last_error_tracks_recorded_failures() {
        clear_last_error();
        assert!(last_error().is_none());

        let ok: FsResult<u8> = record(Ok(1));
        assert!(ok.is_ok());
        assert!(last_error().is_none());

        let failed: FsResult<u8> =
            record(Err(FsError::new(ErrorKind::AccessDenied, "opendir", "/root").with_code(13)));
        assert!(failed.is_err());
        assert_eq!(last_error().map(|e| e.kind()), Some(ErrorKind::AccessDenied));
        assert_eq!(last_os_error_code(), Some(13));

        clear_last_error();
        assert!(last_os_error_code().is_none());
    }

    #[test]
    fn last_error_is_per_thread() {
        clear_last_error();
        let _: FsResult<()> = record(Err(FsError::new(ErrorKind::Io, "stat", "/a")));
        let seen_elsewhere = std::thread::spawn(|| last_error().is_some())
            .join()
            .expect("thread join");
        assert!(!seen_elsewhere);
        assert!(last_error().is_some());
        clear_last_error();
    }
}
