use super::handle::{win_error, VolumeFindHandle};
use super::WindowsFs;
use crate::buffer::{fill_with_retry, BufferFill};
use crate::errors::{FsError, FsResult};
use crate::path_codec::{from_wide, split_multi_sz, NativePath};
use crate::volume::{volume_device_query_name, Volume, VolumeEnumerator};
use windows::Win32::Foundation::{ERROR_MORE_DATA, ERROR_NO_MORE_FILES};
use windows::Win32::Storage::FileSystem::{
    FindFirstVolumeW, FindNextVolumeW, GetLogicalDriveStringsW, GetVolumePathNamesForVolumeNameW,
    QueryDosDeviceW,
};

const VOLUME_NAME_LEN: usize = 64;

impl VolumeEnumerator for WindowsFs {
    fn volumes(&self) -> FsResult<Vec<Volume>> {
        let mut name = [0u16; VOLUME_NAME_LEN];
        // SAFETY: `name` is a writable buffer for the first volume name.
        let handle = unsafe { FindFirstVolumeW(&mut name) }
            .map_err(|err| win_error("enumerate volumes", "", err))?;
        let guard = VolumeFindHandle(handle);

        let volume = |name: &[u16]| Volume::new(from_wide(name)).with_config(self.config.clone());
        let mut volumes = vec![volume(&name)];
        loop {
            name.fill(0);
            // SAFETY: the search handle is open and `name` is writable.
            match unsafe { FindNextVolumeW(guard.0, &mut name) } {
                Ok(()) => volumes.push(volume(&name)),
                Err(err) if err.code() == ERROR_NO_MORE_FILES.to_hresult() => break,
                Err(err) => return Err(win_error("enumerate volumes", "", err)),
            }
        }
        Ok(volumes)
    }

    fn volume_device_name(&self, volume: &str) -> FsResult<String> {
        let query = volume_device_query_name(volume)?;
        let native = NativePath::encode(query)?;
        let wide = fill_with_retry::<u16, _>("query device", volume, self.config.path_buffer_len, |buf| {
            // SAFETY: `native` is NUL-terminated and `buf` is writable.
            let written = unsafe { QueryDosDeviceW(native.as_pcwstr(), Some(buf)) } as usize;
            if written > 0 {
                return Ok(BufferFill::Complete(written));
            }
            let err = FsError::last_os("query device", volume);
            if err.os_code() == Some(windows::Win32::Foundation::ERROR_INSUFFICIENT_BUFFER.0 as i32) {
                Ok(BufferFill::TooSmall {
                    required: buf.len() * 4,
                })
            } else {
                Err(err)
            }
        })?;
        Ok(split_multi_sz(&wide).into_iter().next().unwrap_or_default())
    }

    fn volume_mount_paths(&self, volume: &str) -> FsResult<Vec<String>> {
        volume_device_query_name(volume)?;
        let native = NativePath::encode(volume)?;
        let wide = fill_with_retry::<u16, _>("volume paths", volume, self.config.path_buffer_len, |buf| {
            let mut needed = 0u32;
            // SAFETY: `native` is NUL-terminated, `buf` is writable for its
            // length and `needed` receives the required size.
            let result = unsafe {
                GetVolumePathNamesForVolumeNameW(native.as_pcwstr(), Some(buf), &mut needed)
            };
            match result {
                Ok(()) => Ok(BufferFill::Complete((needed as usize).min(buf.len()))),
                Err(err) if err.code() == ERROR_MORE_DATA.to_hresult() => Ok(BufferFill::TooSmall {
                    required: needed as usize,
                }),
                Err(err) => Err(win_error("volume paths", volume, err)),
            }
        })?;
        Ok(split_multi_sz(&wide))
    }

    fn drives(&self) -> FsResult<Vec<String>> {
        let wide = fill_with_retry::<u16, _>("list drives", "", self.config.path_buffer_len, |buf| {
            // SAFETY: `buf` is writable for its full length.
            let written = unsafe { GetLogicalDriveStringsW(Some(buf)) } as usize;
            if written == 0 {
                Err(FsError::last_os("list drives", ""))
            } else if written > buf.len() {
                Ok(BufferFill::TooSmall { required: written })
            } else {
                Ok(BufferFill::Complete(written))
            }
        })?;
        Ok(split_multi_sz(&wide))
    }
}
