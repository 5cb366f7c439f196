use super::handle::{open_for_query, raw_handle, win_error, FindHandle, Follow};
use super::WindowsFs;
use crate::errors::FsResult;
use crate::metadata::WindowsAttributes;
use crate::path_codec::{from_wide, NativePath};
use crate::reparse::{ReparseSource, ReparseTag};
use crate::volume::VolumeEnumerator;
use std::ffi::c_void;
use windows::Win32::Storage::FileSystem::{
    FindFirstFileW, GetVolumeNameForVolumeMountPointW, WIN32_FIND_DATAW,
};
use windows::Win32::System::Ioctl::FSCTL_GET_REPARSE_POINT;
use windows::Win32::System::IO::DeviceIoControl;

/// `\\?\Volume{GUID}\` plus NUL fits comfortably.
const VOLUME_NAME_LEN: usize = 64;

impl ReparseSource for WindowsFs {
    fn reparse_tag(&self, path: &str) -> FsResult<Option<ReparseTag>> {
        // FindFirstFileW on the path itself reports the link, not its target.
        let native = NativePath::encode(path)?;
        let mut data = WIN32_FIND_DATAW::default();
        // SAFETY: `native` is NUL-terminated and `data` is a valid out-parameter.
        let handle = unsafe { FindFirstFileW(native.as_pcwstr(), &mut data) }
            .map_err(|err| win_error("reparse tag", path, err))?;
        let _guard = FindHandle(handle);
        let attrs = WindowsAttributes(data.dwFileAttributes);
        Ok(attrs.is_reparse_point().then_some(ReparseTag(data.dwReserved0)))
    }

    fn reparse_buffer(&self, path: &str) -> FsResult<Vec<u8>> {
        let file = open_for_query(path, Follow::Link, 0, "read reparse data")?;
        let mut buf = vec![0u8; self.config.reparse_buffer_size];
        let mut returned = 0u32;
        // SAFETY: `buf` is writable for its full length and the handle is open.
        unsafe {
            DeviceIoControl(
                raw_handle(&file),
                FSCTL_GET_REPARSE_POINT,
                None,
                0,
                Some(buf.as_mut_ptr() as *mut c_void),
                buf.len() as u32,
                Some(&mut returned),
                None,
            )
        }
        .map_err(|err| win_error("read reparse data", path, err))?;
        buf.truncate(returned as usize);
        Ok(buf)
    }

    fn mount_point_volume(&self, path: &str) -> FsResult<Option<String>> {
        let mut mount = path.to_string();
        if !mount.ends_with('\\') {
            mount.push('\\');
        }
        let native = NativePath::encode(&mount)?;
        let mut name = [0u16; VOLUME_NAME_LEN];
        // SAFETY: `native` is NUL-terminated; `name` is a writable buffer.
        let resolved = unsafe { GetVolumeNameForVolumeMountPointW(native.as_pcwstr(), &mut name) };
        if let Err(err) = resolved {
            log::debug!("{path} is not a volume mount point: {err}");
            return Ok(None);
        }
        Ok(Some(from_wide(&name)))
    }

    fn volume_device(&self, volume: &str) -> FsResult<String> {
        self.volume_device_name(volume)
    }
}
