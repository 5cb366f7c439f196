//! Sparse-file extent discovery and hole-preserving copy.
//!
//! An extent is a physically allocated `(offset, length)` range; anything not
//! covered by an extent is a hole. Windows reports allocated ranges in
//! batches (`FSCTL_QUERY_ALLOCATED_RANGES`); POSIX walks the file with
//! `SEEK_DATA`/`SEEK_HOLE`. Both produce ascending, non-overlapping lists.
//!
//! The copy pre-sizes the destination to the source's logical length and then
//! writes only the bytes inside extents, so every hole in the source stays a
//! hole in the destination.

use crate::errors::{record, ErrorKind, FsError, FsResult};
use crate::metadata::{FileMetadata, MetadataProvider};
use crate::platform::PlatformFs;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A physically allocated byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SparseExtent {
    pub offset: u64,
    pub length: u64,
}

impl SparseExtent {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// First byte past the extent.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }
}

/// Summary of a completed sparse copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SparseCopyReport {
    pub logical_size: u64,
    pub bytes_copied: u64,
    pub extents: Vec<SparseExtent>,
}

impl SparseCopyReport {
    /// Bytes of the logical size that were left as holes.
    pub fn hole_bytes(&self) -> u64 {
        self.logical_size.saturating_sub(self.bytes_copied)
    }
}

/// One reply of a batched allocated-range query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeBatch {
    pub extents: Vec<SparseExtent>,
    /// The OS reported that more ranges follow the last one returned.
    pub more: bool,
}

/// Drive a batched range query over `[0, file_size)`.
///
/// `query(start, len)` returns up to one batch of ranges inside the window.
/// While it reports more data, the window restarts right after the last range
/// received. A batch that does not move the window forward is an error.
pub fn collect_allocated_ranges<F>(
    path: &str,
    file_size: u64,
    mut query: F,
) -> FsResult<Vec<SparseExtent>>
where
    F: FnMut(u64, u64) -> FsResult<RangeBatch>,
{
    let mut extents: Vec<SparseExtent> = Vec::new();
    let mut start = 0u64;
    while start < file_size {
        let batch = query(start, file_size - start)?;
        extents.extend(batch.extents);
        if !batch.more {
            break;
        }
        let next = extents.last().map(SparseExtent::end).unwrap_or(start);
        if next <= start {
            return Err(FsError::new(ErrorKind::Io, "query extents", path)
                .with_detail(format!("range query made no progress at offset {start}")));
        }
        log::debug!("{path}: more allocated ranges, advancing window to {next}");
        start = next;
    }
    Ok(extents)
}

/// Clamp extents to `logical_size`, drop empty ones, sort, and merge
/// overlaps.
pub fn normalize_extents(mut extents: Vec<SparseExtent>, logical_size: u64) -> Vec<SparseExtent> {
    extents.sort_unstable();
    let mut out: Vec<SparseExtent> = Vec::with_capacity(extents.len());
    for extent in extents {
        let end = extent.end().min(logical_size);
        if end <= extent.offset {
            continue;
        }
        match out.last_mut() {
            Some(prev) if extent.offset < prev.end() => {
                prev.length = end.max(prev.end()) - prev.offset;
            }
            _ => out.push(SparseExtent::new(extent.offset, end - extent.offset)),
        }
    }
    out
}

/// Copy the bytes of every extent from `src` to `dst` through a buffer of
/// `buffer_size` bytes. Both sides are positioned at the extent's current
/// offset before each chunk. Returns the number of bytes copied.
pub fn copy_extents<R, W>(
    src: &mut R,
    dst: &mut W,
    extents: &[SparseExtent],
    buffer_size: usize,
) -> io::Result<u64>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;
    for extent in extents {
        let mut pos = extent.offset;
        let end = extent.end();
        while pos < end {
            let chunk = (end - pos).min(buf.len() as u64) as usize;
            src.seek(SeekFrom::Start(pos))?;
            dst.seek(SeekFrom::Start(pos))?;
            src.read_exact(&mut buf[..chunk])?;
            dst.write_all(&buf[..chunk])?;
            pos += chunk as u64;
            copied += chunk as u64;
        }
    }
    dst.flush()?;
    Ok(copied)
}

/// Per-platform extent discovery. The query and copy algorithms are shared;
/// backends supply the native range query and destination preparation.
pub trait ExtentProvider: MetadataProvider {
    /// Allocated ranges of an open, non-empty regular file.
    fn file_extents(
        &self,
        file: &File,
        metadata: &FileMetadata,
        path: &str,
    ) -> FsResult<Vec<SparseExtent>>;

    /// Make a freshly created destination able to hold holes.
    fn prepare_sparse_destination(&self, file: &File, path: &str) -> FsResult<()>;

    fn copy_buffer_size(&self) -> usize;

    /// Allocated extents of `path`, ascending and non-overlapping. A
    /// zero-length file has none.
    fn query_extents(&self, path: &str) -> FsResult<Vec<SparseExtent>> {
        record(query_extents_with(self, path))
    }

    /// Copy `src` to the new file `dst`, reproducing the source's holes.
    /// `dst` must not exist. A destination left behind by a failed copy is not
    /// removed.
    fn copy_sparse(&self, src: &str, dst: &str) -> FsResult<SparseCopyReport> {
        record(copy_sparse_with(self, src, dst))
    }
}

fn open_for_extents(path: &str) -> FsResult<File> {
    File::open(path).map_err(|err| FsError::from_io("open", path, &err))
}

fn extents_of<P>(provider: &P, file: &File, metadata: &FileMetadata, path: &str) -> FsResult<Vec<SparseExtent>>
where
    P: ExtentProvider + ?Sized,
{
    if metadata.size() == 0 {
        return Ok(Vec::new());
    }
    let extents = provider.file_extents(file, metadata, path)?;
    Ok(normalize_extents(extents, metadata.size()))
}

fn query_extents_with<P>(provider: &P, path: &str) -> FsResult<Vec<SparseExtent>>
where
    P: ExtentProvider + ?Sized,
{
    let metadata = provider.stat(path)?;
    if metadata.is_directory() {
        return Err(FsError::not_supported(
            "query extents",
            path,
            "path is a directory",
        ));
    }
    if metadata.size() == 0 {
        return Ok(Vec::new());
    }
    let file = open_for_extents(path)?;
    let extents = extents_of(provider, &file, &metadata, path)?;
    log::debug!("{path}: {} allocated extent(s)", extents.len());
    Ok(extents)
}

fn copy_sparse_with<P>(provider: &P, src: &str, dst: &str) -> FsResult<SparseCopyReport>
where
    P: ExtentProvider + ?Sized,
{
    let metadata = provider.stat(src)?;
    if !metadata.is_regular() {
        return Err(FsError::not_supported(
            "copy sparse",
            src,
            "source is not a regular file",
        ));
    }

    let mut source = open_for_extents(src)?;
    let extents = extents_of(provider, &source, &metadata, src)?;

    let mut dest = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .map_err(|err| FsError::from_io("create destination", dst, &err))?;
    provider.prepare_sparse_destination(&dest, dst)?;
    dest.set_len(metadata.size())
        .map_err(|err| FsError::from_io("size destination", dst, &err))?;

    let bytes_copied = copy_extents(&mut source, &mut dest, &extents, provider.copy_buffer_size())
        .map_err(|err| FsError::from_io("copy sparse", dst, &err))?;

    log::debug!(
        "copied {bytes_copied} of {} bytes from {src} to {dst} across {} extent(s)",
        metadata.size(),
        extents.len()
    );
    Ok(SparseCopyReport {
        logical_size: metadata.size(),
        bytes_copied,
        extents,
    })
}

/// Allocated extents of `path` using the default platform backend.
pub fn query_extents(path: &str) -> FsResult<Vec<SparseExtent>> {
    PlatformFs::default().query_extents(path)
}

/// Hole-preserving copy using the default platform backend.
pub fn copy_sparse(src: &str, dst: &str) -> FsResult<SparseCopyReport> {
    PlatformFs::default().copy_sparse(src, dst)
}
