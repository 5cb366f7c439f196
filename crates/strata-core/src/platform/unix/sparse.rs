use crate::errors::{ErrorKind, FsError, FsResult};
use crate::sparse::SparseExtent;
use std::fs::File;

pub(super) const HOLE_SEEK_SUPPORTED: bool = cfg!(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd"
));

/// Walk `file` with `SEEK_DATA`/`SEEK_HOLE`, emitting one extent per data
/// region. `ENXIO` from `SEEK_DATA` means only a trailing hole remains.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub(super) fn seek_extents(file: &File, size: u64, path: &str) -> FsResult<Vec<SparseExtent>> {
    use std::io;
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let size = libc::off_t::try_from(size).unwrap_or(libc::off_t::MAX);
    let mut extents = Vec::new();
    let mut pos: libc::off_t = 0;

    while pos < size {
        // SAFETY: `fd` is a valid descriptor owned by `file` for this call.
        let data = unsafe { libc::lseek(fd, pos, libc::SEEK_DATA) };
        if data < 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::ENXIO) => Ok(extents),
                Some(code) if code == libc::EINVAL || code == libc::ENOTSUP || code == libc::EOPNOTSUPP => {
                    Err(FsError::new(ErrorKind::NotSupported, "query extents", path)
                        .with_code(code)
                        .with_detail("filesystem does not report holes"))
                }
                _ => Err(FsError::from_io("query extents", path, &err)),
            };
        }

        // SAFETY: as above.
        let hole = unsafe { libc::lseek(fd, data, libc::SEEK_HOLE) };
        if hole < 0 {
            return Err(FsError::last_os("query extents", path));
        }

        let end = hole.min(size);
        if end > data {
            extents.push(SparseExtent::new(data as u64, (end - data) as u64));
        }
        if hole <= pos {
            break;
        }
        pos = hole;
    }
    log::trace!("{path}: seek walk found {} data region(s)", extents.len());
    Ok(extents)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
pub(super) fn seek_extents(_file: &File, _size: u64, path: &str) -> FsResult<Vec<SparseExtent>> {
    Err(FsError::not_supported(
        "query extents",
        path,
        "SEEK_DATA/SEEK_HOLE unavailable on this platform",
    ))
}
