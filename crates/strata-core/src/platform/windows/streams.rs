use super::handle::{win_error, FindHandle};
use super::WindowsFs;
use crate::errors::{record, FsResult};
use crate::path_codec::{from_wide, NativePath};
use crate::streams::{is_primary_stream, AlternateStreamSource, StreamInfo};
use std::ffi::c_void;
use windows::Win32::Foundation::ERROR_HANDLE_EOF;
use windows::Win32::Storage::FileSystem::{
    FindFirstStreamW, FindNextStreamW, FindStreamInfoStandard, WIN32_FIND_STREAM_DATA,
};

fn stream_info(data: &WIN32_FIND_STREAM_DATA) -> StreamInfo {
    StreamInfo {
        name: from_wide(&data.cStreamName),
        size: data.StreamSize.max(0) as u64,
    }
}

impl WindowsFs {
    fn named_streams(&self, path: &str) -> FsResult<Vec<StreamInfo>> {
        let native = NativePath::encode(path)?;
        let mut data = WIN32_FIND_STREAM_DATA::default();
        // SAFETY: `native` is NUL-terminated and `data` matches the
        // FindStreamInfoStandard layout.
        let first = unsafe {
            FindFirstStreamW(
                native.as_pcwstr(),
                FindStreamInfoStandard,
                &mut data as *mut WIN32_FIND_STREAM_DATA as *mut c_void,
                None,
            )
        };
        let handle = match first {
            Ok(handle) => FindHandle(handle),
            // Directories without named streams have no stream at all.
            Err(err) if err.code() == ERROR_HANDLE_EOF.to_hresult() => return Ok(Vec::new()),
            Err(err) => return Err(win_error("list streams", path, err)),
        };

        let mut streams = Vec::new();
        loop {
            let info = stream_info(&data);
            if !is_primary_stream(&info.name) {
                streams.push(info);
            }
            data = WIN32_FIND_STREAM_DATA::default();
            // SAFETY: the search handle is open and `data` is writable.
            let next = unsafe {
                FindNextStreamW(handle.0, &mut data as *mut WIN32_FIND_STREAM_DATA as *mut c_void)
            };
            match next {
                Ok(()) => {}
                Err(err) if err.code() == ERROR_HANDLE_EOF.to_hresult() => break,
                Err(err) => return Err(win_error("list streams", path, err)),
            }
        }
        Ok(streams)
    }
}

impl AlternateStreamSource for WindowsFs {
    fn list_streams(&self, path: &str) -> FsResult<Vec<StreamInfo>> {
        record(self.named_streams(path))
    }
}
