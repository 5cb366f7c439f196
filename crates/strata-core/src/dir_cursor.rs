//! External iteration over a directory listing.
//!
//! A [`DirectoryCursor`] owns one native stream (a `DIR*` on POSIX, a find
//! handle on Windows) and yields the platform's raw listing one entry at a
//! time. `.` and `..` are passed through on POSIX; filtering them is up to the
//! caller.
//!
//! ```text
//! open ──► HasEntry ──advance──► HasEntry
//!   │          │
//!   └──────────┴──advance/error──► Exhausted (terminal)
//! ```
//!
//! The stream is released exactly once: by [`DirectoryCursor::close`] or, as
//! a backstop, when the cursor is dropped.

use crate::errors::{record, FsError, FsResult};
use crate::metadata::{FileKind, WindowsAttributes};
use crate::path_codec::{join_entry_path, PLATFORM_SEPARATOR};
use crate::platform::{NativeDirStream, PlatformFs};
use crate::reparse::ReparseTag;
use serde::Serialize;

/// `d_type` of a POSIX directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirentType {
    /// The filesystem did not report a type (`DT_UNKNOWN`).
    Unknown,
    Pipe,
    CharDevice,
    Directory,
    BlockDevice,
    Regular,
    Symlink,
    Socket,
}

impl DirentType {
    pub fn kind(self) -> FileKind {
        match self {
            DirentType::Unknown => FileKind::Unknown,
            DirentType::Pipe => FileKind::Pipe,
            DirentType::CharDevice => FileKind::CharDevice,
            DirentType::Directory => FileKind::Directory,
            DirentType::BlockDevice => FileKind::BlockDevice,
            DirentType::Regular => FileKind::Regular,
            DirentType::Symlink => FileKind::Symlink,
            DirentType::Socket => FileKind::Socket,
        }
    }
}

/// Flags carried by an enumeration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "platform", content = "value", rename_all = "snake_case")]
pub enum EntryFlags {
    Posix(DirentType),
    Windows(WindowsAttributes),
}

impl EntryFlags {
    pub fn kind(self) -> FileKind {
        match self {
            EntryFlags::Posix(t) => t.kind(),
            EntryFlags::Windows(attrs) => attrs.kind(),
        }
    }
}

/// One record as read from a native stream, before the full path is joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub name: String,
    pub flags: EntryFlags,
    pub unique_id: Option<u64>,
    pub size: Option<u64>,
    pub access_time: Option<i64>,
    pub creation_time: Option<i64>,
    pub modify_time: Option<i64>,
    pub reparse_tag: Option<ReparseTag>,
}

impl EntryRecord {
    /// A record carrying only a name and its POSIX type.
    pub fn posix(name: impl Into<String>, kind: DirentType, ino: u64) -> Self {
        Self {
            name: name.into(),
            flags: EntryFlags::Posix(kind),
            unique_id: Some(ino),
            size: None,
            access_time: None,
            creation_time: None,
            modify_time: None,
            reparse_tag: None,
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    name: String,
    full_path: String,
    kind: FileKind,
    flags: EntryFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    unique_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    creation_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modify_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reparse_tag: Option<ReparseTag>,
}

impl DirectoryEntry {
    fn from_record(dir_path: &str, rec: EntryRecord) -> Self {
        Self {
            full_path: join_entry_path(dir_path, &rec.name, PLATFORM_SEPARATOR),
            name: rec.name,
            kind: rec.flags.kind(),
            flags: rec.flags,
            unique_id: rec.unique_id,
            size: rec.size,
            access_time: rec.access_time,
            creation_time: rec.creation_time,
            modify_time: rec.modify_time,
            reparse_tag: rec.reparse_tag,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opening directory path joined with [`Self::name`].
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Inode number on POSIX; not carried by Windows find records.
    pub fn unique_id(&self) -> Option<u64> {
        self.unique_id
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn access_time(&self) -> Option<i64> {
        self.access_time
    }

    pub fn creation_time(&self) -> Option<i64> {
        self.creation_time
    }

    pub fn modify_time(&self) -> Option<i64> {
        self.modify_time
    }

    /// Reparse tag from the find record, when the reparse attribute is set.
    pub fn reparse_tag(&self) -> Option<ReparseTag> {
        self.reparse_tag
    }

    /// `true` for the `.` and `..` pseudo-entries.
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// A native directory stream.
pub trait DirStream {
    /// Read the next record; `Ok(None)` once the listing is exhausted.
    fn read_next(&mut self) -> FsResult<Option<EntryRecord>>;

    /// Release the native resource. Calling this again is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Opens native directory streams.
pub trait DirectoryProvider {
    type Stream: DirStream;

    fn open_stream(&self, path: &str) -> FsResult<Self::Stream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    HasEntry,
    Exhausted,
}

/// Single-owner cursor over one directory listing.
#[derive(Debug)]
pub struct DirectoryCursor<S: DirStream = NativeDirStream> {
    dir_path: String,
    stream: S,
    current: Option<DirectoryEntry>,
    deferred_error: Option<FsError>,
}

impl DirectoryCursor<NativeDirStream> {
    /// Open `path` with the default platform backend.
    pub fn open(path: &str) -> FsResult<Self> {
        Self::open_with(&PlatformFs::default(), path)
    }
}

impl<S: DirStream> DirectoryCursor<S> {
    pub fn open_with<P>(provider: &P, path: &str) -> FsResult<Self>
    where
        P: DirectoryProvider<Stream = S>,
    {
        let stream = record(provider.open_stream(path))?;
        Self::from_stream(path, stream)
    }

    /// Wrap an already-open stream and read its first record. A failed first
    /// read closes the stream and fails the open.
    pub fn from_stream(path: &str, stream: S) -> FsResult<Self> {
        let mut cursor = Self {
            dir_path: path.to_string(),
            stream,
            current: None,
            deferred_error: None,
        };
        cursor.advance()?;
        log::debug!("opened directory cursor on {path}");
        Ok(cursor)
    }

    pub fn dir_path(&self) -> &str {
        &self.dir_path
    }

    pub fn state(&self) -> CursorState {
        if self.current.is_some() {
            CursorState::HasEntry
        } else {
            CursorState::Exhausted
        }
    }

    /// The current entry; `None` once exhausted.
    pub fn entry(&self) -> Option<&DirectoryEntry> {
        self.current.as_ref()
    }

    /// Move to the next entry. Returns `Ok(false)` when the listing is
    /// exhausted. An error also leaves the cursor exhausted.
    pub fn advance(&mut self) -> FsResult<bool> {
        if self.stream.is_closed() {
            self.current = None;
            return Ok(false);
        }
        match record(self.stream.read_next()) {
            Ok(Some(rec)) => {
                self.current = Some(DirectoryEntry::from_record(&self.dir_path, rec));
                Ok(true)
            }
            Ok(None) => {
                self.current = None;
                Ok(false)
            }
            Err(err) => {
                self.current = None;
                self.stream.close();
                Err(err)
            }
        }
    }

    /// Release the native stream early. Safe to call more than once.
    pub fn close(&mut self) {
        self.current = None;
        self.stream.close();
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }
}

impl<S: DirStream> Iterator for DirectoryCursor<S> {
    type Item = FsResult<DirectoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current.take() {
            Some(entry) => {
                if let Err(err) = self.advance() {
                    self.deferred_error = Some(err);
                }
                Some(Ok(entry))
            }
            None => self.deferred_error.take().map(Err),
        }
    }
}

impl<S: DirStream> Drop for DirectoryCursor<S> {
    fn drop(&mut self) {
        self.stream.close();
    }
}

/// Open a cursor on `path` with the default platform backend.
pub fn open_dir(path: &str) -> FsResult<DirectoryCursor> {
    DirectoryCursor::open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Debug)]
    struct FakeStream {
        items: VecDeque<FsResult<EntryRecord>>,
        releases: Rc<Cell<u32>>,
        closed: bool,
    }

    impl FakeStream {
        fn new(items: Vec<FsResult<EntryRecord>>) -> (Self, Rc<Cell<u32>>) {
            let releases = Rc::new(Cell::new(0));
            let stream = Self {
                items: items.into(),
                releases: Rc::clone(&releases),
                closed: false,
            };
            (stream, releases)
        }
    }

    impl DirStream for FakeStream {
        fn read_next(&mut self) -> FsResult<Option<EntryRecord>> {
            self.items.pop_front().transpose()
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                self.releases.set(self.releases.get() + 1);
            }
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    fn names(entries: &[&str]) -> Vec<FsResult<EntryRecord>> {
        entries
            .iter()
            .enumerate()
            .map(|(ino, name)| Ok(EntryRecord::posix(*name, DirentType::Regular, ino as u64)))
            .collect()
    }

    #[test]
    fn walks_entries_then_exhausts() {
        let (stream, releases) = FakeStream::new(names(&[".", "..", "a"]));
        let mut cursor = DirectoryCursor::from_stream("/data", stream).expect("open");

        assert_eq!(cursor.state(), CursorState::HasEntry);
        assert_eq!(cursor.entry().map(|e| e.name()), Some("."));
        assert!(cursor.advance().expect("advance"));
        assert!(cursor.advance().expect("advance"));
        let expected = format!("/data{PLATFORM_SEPARATOR}a");
        assert_eq!(cursor.entry().map(|e| e.full_path()), Some(expected.as_str()));
        assert!(!cursor.advance().expect("advance"));
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(!cursor.advance().expect("exhausted stays exhausted"));

        drop(cursor);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn empty_listing_opens_exhausted() {
        let (stream, _) = FakeStream::new(Vec::new());
        let cursor = DirectoryCursor::from_stream("/empty", stream).expect("open");
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(cursor.entry().is_none());
    }

    #[test]
    fn close_twice_then_drop_releases_once() {
        let (stream, releases) = FakeStream::new(names(&["a", "b"]));
        let mut cursor = DirectoryCursor::from_stream("/d", stream).expect("open");
        cursor.close();
        cursor.close();
        assert!(cursor.is_closed());
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(!cursor.advance().expect("closed cursor"));
        drop(cursor);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn read_error_exhausts_and_releases() {
        let mut items = names(&["a"]);
        items.push(Err(FsError::new(ErrorKind::Io, "readdir", "/d").with_code(5)));
        items.extend(names(&["never"]));
        let (stream, releases) = FakeStream::new(items);

        let mut cursor = DirectoryCursor::from_stream("/d", stream).expect("open");
        let err = cursor.advance().expect_err("second read fails");
        assert_eq!(err.os_code(), Some(5));
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert_eq!(releases.get(), 1);
        drop(cursor);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn failed_first_read_fails_open() {
        let items = vec![Err(FsError::new(ErrorKind::AccessDenied, "readdir", "/d"))];
        let (stream, releases) = FakeStream::new(items);
        let err = DirectoryCursor::from_stream("/d", stream).expect_err("open fails");
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn iterator_yields_every_entry_then_error() {
        let mut items = names(&["x", "y"]);
        items.push(Err(FsError::new(ErrorKind::Io, "readdir", "/d")));
        let (stream, releases) = FakeStream::new(items);

        let cursor = DirectoryCursor::from_stream("/d/", stream).expect("open");
        let results: Vec<_> = cursor.collect();
        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().map(|e| e.full_path().to_string()),
            Ok("/d/x".to_string())
        );
        assert!(results[2].is_err());
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn dot_entries_are_recognised() {
        let rec = EntryRecord::posix("..", DirentType::Directory, 2);
        let entry = DirectoryEntry::from_record("/", rec);
        assert!(entry.is_dot_entry());
        assert!(entry.is_directory());
        assert_eq!(entry.unique_id(), Some(2));
    }
}
