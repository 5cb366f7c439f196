use super::handle::{raw_handle, win_error};
use super::WindowsFs;
use crate::errors::FsResult;
use crate::metadata::FileMetadata;
use crate::sparse::{collect_allocated_ranges, ExtentProvider, RangeBatch, SparseExtent};
use std::ffi::c_void;
use std::fs::File;
use std::mem::size_of;
use windows::Win32::Foundation::{ERROR_MORE_DATA, HANDLE};
use windows::Win32::System::Ioctl::{FSCTL_QUERY_ALLOCATED_RANGES, FSCTL_SET_SPARSE};
use windows::Win32::System::IO::DeviceIoControl;

/// `FILE_ALLOCATED_RANGE_BUFFER`: used both as the query window and as each
/// returned range.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct AllocatedRange {
    file_offset: i64,
    length: i64,
}

#[repr(C)]
struct FileSetSparseBuffer {
    set_sparse: u8,
}

fn query_batch(
    handle: HANDLE,
    start: u64,
    len: u64,
    batch: usize,
    path: &str,
) -> FsResult<RangeBatch> {
    let window = AllocatedRange {
        file_offset: start as i64,
        length: len as i64,
    };
    let mut out = vec![AllocatedRange::default(); batch.max(1)];
    let mut returned = 0u32;
    // SAFETY: input and output buffers are live, correctly sized repr(C)
    // structures and the handle belongs to an open file.
    let result = unsafe {
        DeviceIoControl(
            handle,
            FSCTL_QUERY_ALLOCATED_RANGES,
            Some(&window as *const AllocatedRange as *const c_void),
            size_of::<AllocatedRange>() as u32,
            Some(out.as_mut_ptr() as *mut c_void),
            (out.len() * size_of::<AllocatedRange>()) as u32,
            Some(&mut returned),
            None,
        )
    };
    let more = match result {
        Ok(()) => false,
        Err(err) if err.code() == ERROR_MORE_DATA.to_hresult() => true,
        Err(err) => return Err(win_error("query extents", path, err)),
    };
    let count = (returned as usize / size_of::<AllocatedRange>()).min(out.len());
    Ok(RangeBatch {
        extents: out[..count]
            .iter()
            .map(|r| SparseExtent::new(r.file_offset.max(0) as u64, r.length.max(0) as u64))
            .collect(),
        more,
    })
}

impl ExtentProvider for WindowsFs {
    fn file_extents(
        &self,
        file: &File,
        metadata: &FileMetadata,
        path: &str,
    ) -> FsResult<Vec<SparseExtent>> {
        if !metadata.is_sparse_file() {
            return Ok(vec![SparseExtent::new(0, metadata.size())]);
        }
        let handle = raw_handle(file);
        let batch = self.config.extent_batch_size;
        collect_allocated_ranges(path, metadata.size(), |start, len| {
            query_batch(handle, start, len, batch, path)
        })
    }

    fn prepare_sparse_destination(&self, file: &File, path: &str) -> FsResult<()> {
        let input = FileSetSparseBuffer { set_sparse: 1 };
        let mut returned = 0u32;
        // SAFETY: the input buffer is a live repr(C) struct and the handle
        // belongs to a file opened for writing.
        unsafe {
            DeviceIoControl(
                raw_handle(file),
                FSCTL_SET_SPARSE,
                Some(&input as *const FileSetSparseBuffer as *const c_void),
                size_of::<FileSetSparseBuffer>() as u32,
                None,
                0,
                Some(&mut returned),
                None,
            )
        }
        .map_err(|err| win_error("mark sparse", path, err))
    }

    fn copy_buffer_size(&self) -> usize {
        self.config.copy_buffer_size
    }
}
