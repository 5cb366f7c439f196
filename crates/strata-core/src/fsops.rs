//! Directory creation and symlink creation.

use crate::errors::{record, FsError, FsResult};
use std::fs;
use std::path::Path;

/// Create `path` and every missing parent. An existing directory is success;
/// an existing non-directory is `AlreadyExists`.
pub fn mkdir_recursive(path: &str) -> FsResult<()> {
    record(mkdir_all(path))
}

fn mkdir_all(path: &str) -> FsResult<()> {
    match fs::create_dir_all(path) {
        Ok(()) => {
            log::debug!("created directory tree {path}");
            Ok(())
        }
        Err(err) => {
            let target = Path::new(path);
            if target.exists() && !target.is_dir() {
                return Err(FsError::from_io("mkdir", path, &err)
                    .with_detail("path exists and is not a directory"));
            }
            Err(FsError::from_io("mkdir", path, &err))
        }
    }
}

/// Create a symbolic link at `link` pointing to `target`. `is_dir` selects a
/// directory link on Windows and is ignored on POSIX.
pub fn create_symlink(target: &str, link: &str, is_dir: bool) -> FsResult<()> {
    record(symlink_impl(target, link, is_dir))
}

#[cfg(unix)]
fn symlink_impl(target: &str, link: &str, _is_dir: bool) -> FsResult<()> {
    std::os::unix::fs::symlink(target, link).map_err(|err| FsError::from_io("symlink", link, &err))
}

#[cfg(windows)]
fn symlink_impl(target: &str, link: &str, is_dir: bool) -> FsResult<()> {
    use crate::path_codec::NativePath;
    use windows::Win32::Storage::FileSystem::{
        CreateSymbolicLinkW, SYMBOLIC_LINK_FLAGS, SYMBOLIC_LINK_FLAG_ALLOW_UNPRIVILEGED_CREATE,
        SYMBOLIC_LINK_FLAG_DIRECTORY,
    };

    if !crate::privilege::has_privilege("SeCreateSymbolicLinkPrivilege") {
        log::debug!("SeCreateSymbolicLinkPrivilege not held; relying on developer mode");
    }

    let target_w = NativePath::encode(target)?;
    let link_w = NativePath::encode(link)?;
    let mut flags: SYMBOLIC_LINK_FLAGS = SYMBOLIC_LINK_FLAG_ALLOW_UNPRIVILEGED_CREATE;
    if is_dir {
        flags |= SYMBOLIC_LINK_FLAG_DIRECTORY;
    }

    // SAFETY: both wide strings are NUL-terminated and outlive the call.
    let created = unsafe { CreateSymbolicLinkW(link_w.as_pcwstr(), target_w.as_pcwstr(), flags) };
    if created.as_bool() {
        Ok(())
    } else {
        Err(FsError::last_os("symlink", link))
    }
}
