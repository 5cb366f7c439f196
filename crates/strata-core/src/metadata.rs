//! Unified file metadata.
//!
//! POSIX `stat` and Windows `BY_HANDLE_FILE_INFORMATION` are reconciled into
//! one immutable [`FileMetadata`] snapshot. The platform-specific flag bits are
//! kept verbatim in [`FileFlags`] so nothing is lost in translation; the
//! shared surface (identity, size, timestamps, ownership, link count) is
//! normalised to 64-bit integers and Unix-epoch seconds.
//!
//! Flag decoding is pure and compiled on every platform, so both models are
//! unit-tested regardless of the host.

use crate::config::FsConfig;
use crate::errors::FsResult;
use crate::platform::PlatformFs;
use serde::Serialize;

// POSIX file-type bits (st_mode & S_IFMT).
pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

// Win32 FILE_ATTRIBUTE_* bits.
pub const FILE_ATTRIBUTE_READONLY: u32 = 0x0000_0001;
pub const FILE_ATTRIBUTE_HIDDEN: u32 = 0x0000_0002;
pub const FILE_ATTRIBUTE_SYSTEM: u32 = 0x0000_0004;
pub const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;
pub const FILE_ATTRIBUTE_ARCHIVE: u32 = 0x0000_0020;
pub const FILE_ATTRIBUTE_NORMAL: u32 = 0x0000_0080;
pub const FILE_ATTRIBUTE_TEMPORARY: u32 = 0x0000_0100;
pub const FILE_ATTRIBUTE_SPARSE_FILE: u32 = 0x0000_0200;
pub const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0000_0400;
pub const FILE_ATTRIBUTE_COMPRESSED: u32 = 0x0000_0800;
pub const FILE_ATTRIBUTE_OFFLINE: u32 = 0x0000_1000;
pub const FILE_ATTRIBUTE_ENCRYPTED: u32 = 0x0000_4000;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;
/// FILETIME resolution: 100 ns ticks.
const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// Join two 32-bit halves into one 64-bit value.
pub const fn combine_dwords(low: u32, high: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

/// Convert a FILETIME (100 ns ticks since 1601) to Unix-epoch seconds.
/// Instants before 1970 come out negative.
pub fn filetime_to_unix(low: u32, high: u32) -> i64 {
    let ticks = i64::try_from(combine_dwords(low, high)).unwrap_or(i64::MAX);
    ticks.div_euclid(FILETIME_TICKS_PER_SEC) - FILETIME_EPOCH_OFFSET_SECS
}

/// Coarse object type, derived once from the platform flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Directory,
    Regular,
    Symlink,
    Pipe,
    CharDevice,
    BlockDevice,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Directory => "directory",
            FileKind::Regular => "regular",
            FileKind::Symlink => "symlink",
            FileKind::Pipe => "pipe",
            FileKind::CharDevice => "char device",
            FileKind::BlockDevice => "block device",
            FileKind::Socket => "socket",
            FileKind::Unknown => "unknown",
        }
    }
}

/// A POSIX `st_mode` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PosixMode(pub u32);

impl PosixMode {
    fn file_type(self) -> u32 {
        self.0 & S_IFMT
    }

    pub fn is_regular(self) -> bool {
        self.file_type() == S_IFREG
    }

    pub fn is_directory(self) -> bool {
        self.file_type() == S_IFDIR
    }

    pub fn is_pipe(self) -> bool {
        self.file_type() == S_IFIFO
    }

    pub fn is_char_device(self) -> bool {
        self.file_type() == S_IFCHR
    }

    pub fn is_block_device(self) -> bool {
        self.file_type() == S_IFBLK
    }

    pub fn is_symlink(self) -> bool {
        self.file_type() == S_IFLNK
    }

    pub fn is_socket(self) -> bool {
        self.file_type() == S_IFSOCK
    }

    /// Permission and set-id bits.
    pub fn permissions(self) -> u32 {
        self.0 & 0o7777
    }

    pub fn kind(self) -> FileKind {
        match self.file_type() {
            S_IFDIR => FileKind::Directory,
            S_IFREG => FileKind::Regular,
            S_IFLNK => FileKind::Symlink,
            S_IFIFO => FileKind::Pipe,
            S_IFCHR => FileKind::CharDevice,
            S_IFBLK => FileKind::BlockDevice,
            S_IFSOCK => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }

    /// Upper-case names of the type flags that hold, e.g. `["REGULAR"]`.
    pub fn names(self) -> Vec<&'static str> {
        let table: [(bool, &'static str); 7] = [
            (self.is_regular(), "REGULAR"),
            (self.is_directory(), "DIRECTORY"),
            (self.is_pipe(), "PIPE"),
            (self.is_char_device(), "CHAR"),
            (self.is_block_device(), "BLOCK"),
            (self.is_symlink(), "SYMLINK"),
            (self.is_socket(), "SOCKET"),
        ];
        table
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect()
    }
}

/// A Win32 `FILE_ATTRIBUTE_*` bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WindowsAttributes(pub u32);

impl WindowsAttributes {
    fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn is_archive(self) -> bool {
        self.has(FILE_ATTRIBUTE_ARCHIVE)
    }

    pub fn is_compressed(self) -> bool {
        self.has(FILE_ATTRIBUTE_COMPRESSED)
    }

    pub fn is_encrypted(self) -> bool {
        self.has(FILE_ATTRIBUTE_ENCRYPTED)
    }

    pub fn is_sparse_file(self) -> bool {
        self.has(FILE_ATTRIBUTE_SPARSE_FILE)
    }

    pub fn is_hidden(self) -> bool {
        self.has(FILE_ATTRIBUTE_HIDDEN)
    }

    pub fn is_offline(self) -> bool {
        self.has(FILE_ATTRIBUTE_OFFLINE)
    }

    pub fn is_read_only(self) -> bool {
        self.has(FILE_ATTRIBUTE_READONLY)
    }

    pub fn is_system(self) -> bool {
        self.has(FILE_ATTRIBUTE_SYSTEM)
    }

    pub fn is_temporary(self) -> bool {
        self.has(FILE_ATTRIBUTE_TEMPORARY)
    }

    pub fn is_normal(self) -> bool {
        self.has(FILE_ATTRIBUTE_NORMAL)
    }

    pub fn is_reparse_point(self) -> bool {
        self.has(FILE_ATTRIBUTE_REPARSE_POINT)
    }

    pub fn is_directory(self) -> bool {
        self.has(FILE_ATTRIBUTE_DIRECTORY)
    }

    pub fn kind(self) -> FileKind {
        if self.is_directory() {
            FileKind::Directory
        } else {
            FileKind::Regular
        }
    }

    /// Upper-case names of the attributes that are set, e.g. `["ARCHIVE", "SPARSE"]`.
    pub fn names(self) -> Vec<&'static str> {
        let table: [(bool, &'static str); 11] = [
            (self.is_archive(), "ARCHIVE"),
            (self.is_compressed(), "COMPRESSED"),
            (self.is_encrypted(), "ENCRYPTED"),
            (self.is_sparse_file(), "SPARSE"),
            (self.is_hidden(), "HIDDEN"),
            (self.is_offline(), "OFFLINE"),
            (self.is_read_only(), "READONLY"),
            (self.is_system(), "SYSTEM"),
            (self.is_temporary(), "TEMP"),
            (self.is_normal(), "NORMAL"),
            (self.is_reparse_point(), "REPARSE_POINT"),
        ];
        table
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect()
    }
}

/// Platform flag set carried by a metadata snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "platform", content = "bits", rename_all = "snake_case")]
pub enum FileFlags {
    Posix(PosixMode),
    Windows(WindowsAttributes),
}

impl FileFlags {
    pub fn kind(self) -> FileKind {
        match self {
            FileFlags::Posix(mode) => mode.kind(),
            FileFlags::Windows(attrs) => attrs.kind(),
        }
    }

    pub fn names(self) -> Vec<&'static str> {
        match self {
            FileFlags::Posix(mode) => mode.names(),
            FileFlags::Windows(attrs) => attrs.names(),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            FileFlags::Posix(PosixMode(bits)) | FileFlags::Windows(WindowsAttributes(bits)) => bits,
        }
    }
}

/// Raw fields of a POSIX `stat` result.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixStat {
    pub ino: u64,
    pub dev: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u64,
    pub gid: u64,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    /// Birth time, where the filesystem reports one.
    pub birthtime: Option<i64>,
}

/// Raw fields of `BY_HANDLE_FILE_INFORMATION`, with FILETIMEs as
/// `(low, high)` pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsFileRecord {
    pub attributes: u32,
    pub creation_time: (u32, u32),
    pub last_access_time: (u32, u32),
    pub last_write_time: (u32, u32),
    pub volume_serial_number: u32,
    pub file_size_high: u32,
    pub file_size_low: u32,
    pub number_of_links: u32,
    pub file_index_high: u32,
    pub file_index_low: u32,
}

/// Immutable snapshot of one file's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    unique_id: u64,
    access_time: i64,
    creation_time: i64,
    modify_time: i64,
    size: u64,
    user_id: u64,
    group_id: u64,
    device_id: u64,
    links_count: u64,
    kind: FileKind,
    flags: FileFlags,
}

impl FileMetadata {
    pub fn from_posix(st: &PosixStat) -> Self {
        let mode = PosixMode(st.mode);
        Self {
            unique_id: st.ino,
            access_time: st.atime,
            creation_time: st.birthtime.unwrap_or(st.ctime),
            modify_time: st.mtime,
            size: st.size,
            user_id: st.uid,
            group_id: st.gid,
            device_id: st.dev,
            links_count: st.nlink,
            kind: mode.kind(),
            flags: FileFlags::Posix(mode),
        }
    }

    /// Build a snapshot from a handle-information record. Windows has no
    /// POSIX ownership, so the configured placeholders are reported.
    pub fn from_windows(rec: &WindowsFileRecord, config: &FsConfig) -> Self {
        let attrs = WindowsAttributes(rec.attributes);
        let (c_lo, c_hi) = rec.creation_time;
        let (a_lo, a_hi) = rec.last_access_time;
        let (w_lo, w_hi) = rec.last_write_time;
        Self {
            unique_id: combine_dwords(rec.file_index_low, rec.file_index_high),
            access_time: filetime_to_unix(a_lo, a_hi),
            creation_time: filetime_to_unix(c_lo, c_hi),
            modify_time: filetime_to_unix(w_lo, w_hi),
            size: combine_dwords(rec.file_size_low, rec.file_size_high),
            user_id: config.placeholder_uid,
            group_id: config.placeholder_gid,
            device_id: u64::from(rec.volume_serial_number),
            links_count: u64::from(rec.number_of_links),
            kind: attrs.kind(),
            flags: FileFlags::Windows(attrs),
        }
    }

    /// Inode number, or the volume-scoped file index on Windows.
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn access_time(&self) -> i64 {
        self.access_time
    }

    /// Birth time where available; POSIX backends without one report the
    /// status-change time.
    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn modify_time(&self) -> i64 {
        self.modify_time
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn group_id(&self) -> u64 {
        self.group_id
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    pub fn links_count(&self) -> u64 {
        self.links_count
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn flags(&self) -> FileFlags {
        self.flags
    }

    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_regular(&self) -> bool {
        self.kind == FileKind::Regular
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    pub fn is_reparse_point(&self) -> bool {
        matches!(self.flags, FileFlags::Windows(attrs) if attrs.is_reparse_point())
    }

    /// Only the Windows backend tracks sparseness as an attribute.
    pub fn is_sparse_file(&self) -> bool {
        matches!(self.flags, FileFlags::Windows(attrs) if attrs.is_sparse_file())
    }
}

/// Per-platform metadata queries.
pub trait MetadataProvider {
    /// Query `path`, following a final symlink or reparse point.
    fn stat(&self, path: &str) -> FsResult<FileMetadata>;

    /// Query `path` itself without following a final link.
    fn lstat(&self, path: &str) -> FsResult<FileMetadata>;

    /// The OS-normalised absolute form of `path`.
    fn canonical_path(&self, path: &str) -> FsResult<String>;
}

/// Query `path` with the default platform backend.
pub fn stat(path: &str) -> FsResult<FileMetadata> {
    PlatformFs::default().stat(path)
}

pub fn lstat(path: &str) -> FsResult<FileMetadata> {
    PlatformFs::default().lstat(path)
}

pub fn canonical_path(path: &str) -> FsResult<String> {
    PlatformFs::default().canonical_path(path)
}
