//! Reparse-point classification.
//!
//! Windows marks symlinks, junctions, volume mount points and a zoo of
//! vendor objects with the same attribute bit. Telling them apart takes the
//! reparse tag from a find record plus, for some tags, the raw reparse data
//! block. Junctions and volume mount points even share a tag
//! (`IO_REPARSE_TAG_MOUNT_POINT`); they are separated by first asking the OS to
//! resolve the path as a volume mount point and only then parsing it as a
//! junction.
//!
//! The buffer decoder and the classification logic are pure and compiled on
//! every platform; only the [`ReparseSource`] implementation is Windows-only.

use crate::errors::{record, ErrorKind, FsError, FsResult};
use crate::path_codec::strip_verbatim_prefix;
use crate::platform::PlatformFs;
use serde::Serialize;
use std::fmt;

/// A Windows reparse tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReparseTag(pub u32);

impl ReparseTag {
    pub const MOUNT_POINT: Self = Self(0xA000_0003);
    pub const HSM: Self = Self(0xC000_0004);
    pub const HSM2: Self = Self(0x8000_0006);
    pub const SIS: Self = Self(0x8000_0007);
    pub const WIM: Self = Self(0x8000_0008);
    pub const CSV: Self = Self(0x8000_0009);
    pub const DFS: Self = Self(0x8000_000A);
    pub const SYMLINK: Self = Self(0xA000_000C);
    pub const DFSR: Self = Self(0x8000_0012);
    pub const DEDUP: Self = Self(0x8000_0013);
    pub const NFS: Self = Self(0x8000_0014);
    pub const FILE_PLACEHOLDER: Self = Self(0x8000_0015);
    pub const WOF: Self = Self(0x8000_0017);
    pub const WCI: Self = Self(0x8000_0018);
    pub const CLOUD: Self = Self(0x9000_001A);
    pub const APPEXECLINK: Self = Self(0x8000_001B);
    pub const PROJFS: Self = Self(0x9000_001C);
    pub const LX_SYMLINK: Self = Self(0xA000_001D);
    pub const STORAGE_SYNC: Self = Self(0x8000_001E);
    pub const ONEDRIVE: Self = Self(0x8000_0021);
    pub const AF_UNIX: Self = Self(0x8000_0023);
    pub const LX_FIFO: Self = Self(0x8000_0024);
    pub const LX_CHR: Self = Self(0x8000_0025);
    pub const LX_BLK: Self = Self(0x8000_0026);

    /// `CLOUD_1` through `CLOUD_F` differ from `CLOUD` only in bits 12..16.
    const CLOUD_MASK: u32 = 0xFFFF_0FFF;

    /// Microsoft-owned tags have the high bit set.
    pub fn is_microsoft(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Name-surrogate tags point at another named entity (symlinks, junctions).
    pub fn is_name_surrogate(self) -> bool {
        self.0 & 0x2000_0000 != 0
    }

    pub fn is_cloud(self) -> bool {
        self.0 & Self::CLOUD_MASK == Self::CLOUD.0
    }

    pub fn name(self) -> Option<&'static str> {
        if self.is_cloud() {
            return Some("CLOUD");
        }
        let name = match self {
            Self::MOUNT_POINT => "MOUNT_POINT",
            Self::HSM => "HSM",
            Self::HSM2 => "HSM2",
            Self::SIS => "SIS",
            Self::WIM => "WIM",
            Self::CSV => "CSV",
            Self::DFS => "DFS",
            Self::SYMLINK => "SYMLINK",
            Self::DFSR => "DFSR",
            Self::DEDUP => "DEDUP",
            Self::NFS => "NFS",
            Self::FILE_PLACEHOLDER => "FILE_PLACEHOLDER",
            Self::WOF => "WOF",
            Self::WCI => "WCI",
            Self::APPEXECLINK => "APPEXECLINK",
            Self::PROJFS => "PROJFS",
            Self::LX_SYMLINK => "LX_SYMLINK",
            Self::STORAGE_SYNC => "STORAGE_SYNC",
            Self::ONEDRIVE => "ONEDRIVE",
            Self::AF_UNIX => "AF_UNIX",
            Self::LX_FIFO => "LX_FIFO",
            Self::LX_CHR => "LX_CHR",
            Self::LX_BLK => "LX_BLK",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ReparseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08X})", self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

// REPARSE_DATA_BUFFER layout.
const HEADER_LEN: usize = 8;
const NAME_FIELDS_END: usize = 16;
const SYMLINK_PATH_BUFFER: usize = 20;
const MOUNT_POINT_PATH_BUFFER: usize = 16;
const SYMLINK_FLAG_RELATIVE: u32 = 0x1;

/// Decoded reparse data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReparseData {
    SymbolicLink {
        substitute_name: String,
        print_name: String,
        relative: bool,
    },
    MountPoint {
        substitute_name: String,
        print_name: String,
    },
    /// A tag whose payload this crate does not interpret.
    Other { tag: ReparseTag, data_len: usize },
}

impl ReparseData {
    /// The user-facing target: the print name, or the substitute name with
    /// its NT prefix removed when no print name was stored.
    pub fn target(&self) -> Option<String> {
        match self {
            ReparseData::SymbolicLink {
                substitute_name,
                print_name,
                ..
            }
            | ReparseData::MountPoint {
                substitute_name,
                print_name,
            } => Some(if print_name.is_empty() {
                strip_verbatim_prefix(substitute_name)
            } else {
                print_name.clone()
            }),
            ReparseData::Other { .. } => None,
        }
    }
}

fn malformed(detail: impl Into<String>) -> FsError {
    FsError::new(ErrorKind::Io, "decode reparse data", "<buffer>").with_detail(detail)
}

fn read_u16(buf: &[u8], at: usize) -> FsResult<u16> {
    buf.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| malformed(format!("truncated at offset {at}")))
}

fn read_u32(buf: &[u8], at: usize) -> FsResult<u32> {
    buf.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| malformed(format!("truncated at offset {at}")))
}

fn read_name(buf: &[u8], path_buffer: usize, offset: u16, len: u16) -> FsResult<String> {
    let (offset, len) = (usize::from(offset), usize::from(len));
    if offset % 2 != 0 || len % 2 != 0 {
        return Err(malformed("name span is not UTF-16 aligned"));
    }
    let start = path_buffer + offset;
    let bytes = buf
        .get(start..start + len)
        .ok_or_else(|| malformed(format!("name span {start}+{len} exceeds buffer")))?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

/// Decode a raw `REPARSE_DATA_BUFFER`. Every length and offset is checked
/// against the buffer before use.
pub fn decode_reparse_buffer(buf: &[u8]) -> FsResult<ReparseData> {
    let tag = ReparseTag(read_u32(buf, 0)?);
    let data_len = usize::from(read_u16(buf, 4)?);
    let end = HEADER_LEN + data_len;
    if end > buf.len() {
        return Err(malformed(format!(
            "data length {data_len} exceeds buffer of {} bytes",
            buf.len()
        )));
    }
    let buf = &buf[..end];

    let fixed_end = match tag {
        ReparseTag::SYMLINK => SYMLINK_PATH_BUFFER,
        ReparseTag::MOUNT_POINT => MOUNT_POINT_PATH_BUFFER,
        _ => return Ok(ReparseData::Other { tag, data_len }),
    };
    if buf.len() < fixed_end.max(NAME_FIELDS_END) {
        return Err(malformed(format!("{tag} body shorter than its fixed fields")));
    }

    let substitute_offset = read_u16(buf, 8)?;
    let substitute_len = read_u16(buf, 10)?;
    let print_offset = read_u16(buf, 12)?;
    let print_len = read_u16(buf, 14)?;

    let substitute_name = read_name(buf, fixed_end, substitute_offset, substitute_len)?;
    let print_name = read_name(buf, fixed_end, print_offset, print_len)?;

    if tag == ReparseTag::SYMLINK {
        let flags = read_u32(buf, 16)?;
        Ok(ReparseData::SymbolicLink {
            substitute_name,
            print_name,
            relative: flags & SYMLINK_FLAG_RELATIVE != 0,
        })
    } else {
        Ok(ReparseData::MountPoint {
            substitute_name,
            print_name,
        })
    }
}

/// What a reparse point is. Exactly one variant applies to a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReparseClassification {
    SymbolicLink { target: String, relative: bool },
    JunctionPoint { target: String },
    VolumeMountPoint { device_name: String },
    FilesystemSpecific { tag: ReparseTag },
    NotReparsePoint,
}

/// OS queries needed to classify a reparse point.
pub trait ReparseSource {
    /// Tag from the directory-enumeration record of `path` itself; `None`
    /// when the record carries no reparse attribute.
    fn reparse_tag(&self, path: &str) -> FsResult<Option<ReparseTag>>;

    /// Raw reparse data block of `path`, read without following it.
    fn reparse_buffer(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Volume GUID name (`\\?\Volume{...}\`) mounted at `path`; `None` when
    /// `path` is not a volume mount point.
    fn mount_point_volume(&self, path: &str) -> FsResult<Option<String>>;

    /// NT device name backing a volume GUID name.
    fn volume_device(&self, volume: &str) -> FsResult<String>;
}

fn mismatch(path: &str, tag: ReparseTag, data: &ReparseData) -> FsError {
    FsError::new(ErrorKind::Io, "classify reparse point", path)
        .with_detail(format!("tag {tag} but data decoded as {data:?}"))
}

fn decoded_target(path: &str, data: &ReparseData) -> FsResult<String> {
    data.target().ok_or_else(|| {
        FsError::new(ErrorKind::Io, "classify reparse point", path).with_detail("no target name")
    })
}

/// Classify `path` using `source`.
///
/// Symlink targets come from the print name in the reparse data. A
/// `MOUNT_POINT` tag is first resolved as a volume mount point; only when that
/// yields nothing is the data parsed as a junction. A resolved volume whose
/// device name cannot be read is reported under its volume GUID name. Every other tag, known or
/// not, is reported as filesystem-specific with the raw value preserved.
pub fn classify<S>(source: &S, path: &str) -> FsResult<ReparseClassification>
where
    S: ReparseSource + ?Sized,
{
    let Some(tag) = source.reparse_tag(path)? else {
        return Ok(ReparseClassification::NotReparsePoint);
    };
    log::debug!("{path}: reparse tag {tag}");

    match tag {
        ReparseTag::SYMLINK => {
            let data = decode_reparse_buffer(&source.reparse_buffer(path)?)?;
            match &data {
                ReparseData::SymbolicLink { relative, .. } => {
                    Ok(ReparseClassification::SymbolicLink {
                        target: decoded_target(path, &data)?,
                        relative: *relative,
                    })
                }
                _ => Err(mismatch(path, tag, &data)),
            }
        }
        ReparseTag::MOUNT_POINT => {
            match source.mount_point_volume(path) {
                Ok(Some(volume)) => {
                    let device_name = source.volume_device(&volume).unwrap_or_else(|err| {
                        log::debug!("{path}: no device name for {volume} ({err})");
                        volume.clone()
                    });
                    return Ok(ReparseClassification::VolumeMountPoint { device_name });
                }
                Ok(None) => log::debug!("{path}: not a volume mount point, parsing as junction"),
                Err(err) => log::debug!("{path}: mount point resolution failed ({err}), parsing as junction"),
            }
            let data = decode_reparse_buffer(&source.reparse_buffer(path)?)?;
            match &data {
                ReparseData::MountPoint { .. } => Ok(ReparseClassification::JunctionPoint {
                    target: decoded_target(path, &data)?,
                }),
                _ => Err(mismatch(path, tag, &data)),
            }
        }
        other => {
            if other.name().is_none() {
                log::debug!("{path}: unrecognised reparse tag {other}");
            }
            Ok(ReparseClassification::FilesystemSpecific { tag: other })
        }
    }
}

/// Classify `path` with the default platform backend. Paths whose metadata
/// lacks the reparse attribute are [`ReparseClassification::NotReparsePoint`].
#[cfg(windows)]
pub fn classify_path(path: &str) -> FsResult<ReparseClassification> {
    use crate::metadata::MetadataProvider;

    let fs = PlatformFs::default();
    if !fs.lstat(path)?.is_reparse_point() {
        return Ok(ReparseClassification::NotReparsePoint);
    }
    record(classify(&fs, path))
}

#[cfg(not(windows))]
pub fn classify_path(path: &str) -> FsResult<ReparseClassification> {
    record(Err(FsError::not_supported(
        "classify reparse point",
        path,
        "reparse points exist only on Windows; symlinks appear as a file type",
    )))
}

/// Fully resolved path of `path` with every link followed.
pub fn final_path(path: &str) -> FsResult<String> {
    PlatformFs::default().final_path(path)
}

/// Target a link points at, as stored in the link.
#[cfg(windows)]
pub fn read_link_target(path: &str) -> FsResult<String> {
    match classify_path(path)? {
        ReparseClassification::SymbolicLink { target, .. }
        | ReparseClassification::JunctionPoint { target } => Ok(target),
        ReparseClassification::VolumeMountPoint { device_name } => Ok(device_name),
        _ => record(Err(FsError::new(ErrorKind::Io, "read link", path)
            .with_detail("not a symbolic link or junction"))),
    }
}

#[cfg(not(windows))]
pub fn read_link_target(path: &str) -> FsResult<String> {
    record(
        std::fs::read_link(path)
            .map(|target| target.to_string_lossy().into_owned())
            .map_err(|err| FsError::from_io("read link", path, &err)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    /// Assemble a reparse buffer with the substitute name first and the print
    /// name right after it.
    fn build(tag: ReparseTag, substitute: &str, print: &str, flags: Option<u32>) -> Vec<u8> {
        let sub = utf16le(substitute);
        let prn = utf16le(print);
        let mut body = Vec::new();
        body.extend(0u16.to_le_bytes());
        body.extend((sub.len() as u16).to_le_bytes());
        body.extend((sub.len() as u16).to_le_bytes());
        body.extend((prn.len() as u16).to_le_bytes());
        if let Some(flags) = flags {
            body.extend(flags.to_le_bytes());
        }
        body.extend(&sub);
        body.extend(&prn);

        let mut buf = Vec::new();
        buf.extend(tag.0.to_le_bytes());
        buf.extend((body.len() as u16).to_le_bytes());
        buf.extend(0u16.to_le_bytes());
        buf.extend(body);
        buf
    }

    #[test]
    fn decodes_absolute_symlink() {
        let buf = build(ReparseTag::SYMLINK, r"\??\C:\target", r"C:\target", Some(0));
        let data = decode_reparse_buffer(&buf).expect("decode");
        assert_eq!(
            data,
            ReparseData::SymbolicLink {
                substitute_name: r"\??\C:\target".into(),
                print_name: r"C:\target".into(),
                relative: false,
            }
        );
        assert_eq!(data.target().as_deref(), Some(r"C:\target"));
    }

    #[test]
    fn relative_flag_is_reported() {
        let buf = build(ReparseTag::SYMLINK, r"..\peer", r"..\peer", Some(1));
        match decode_reparse_buffer(&buf).expect("decode") {
            ReparseData::SymbolicLink { relative, .. } => assert!(relative),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_print_name_falls_back_to_substitute() {
        let buf = build(ReparseTag::MOUNT_POINT, r"\??\D:\data", "", None);
        let data = decode_reparse_buffer(&buf).expect("decode");
        assert_eq!(data.target().as_deref(), Some(r"D:\data"));
    }

    #[test]
    fn out_of_range_name_is_rejected() {
        let mut buf = build(ReparseTag::SYMLINK, "abc", "abc", Some(0));
        // Print name length (bytes 14..16) pointing past the end.
        buf[14..16].copy_from_slice(&400u16.to_le_bytes());
        assert!(decode_reparse_buffer(&buf).is_err());
    }

    #[test]
    fn odd_length_name_is_rejected() {
        let mut buf = build(ReparseTag::MOUNT_POINT, "abc", "abc", None);
        buf[10..12].copy_from_slice(&5u16.to_le_bytes());
        assert!(decode_reparse_buffer(&buf).is_err());
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        assert!(decode_reparse_buffer(&[]).is_err());
        assert!(decode_reparse_buffer(&ReparseTag::SYMLINK.0.to_le_bytes()).is_err());

        let buf = build(ReparseTag::SYMLINK, "a", "a", Some(0));
        assert!(decode_reparse_buffer(&buf[..buf.len() - 1]).is_err());

        // Header claiming fewer bytes than the fixed fields need.
        let mut short = Vec::new();
        short.extend(ReparseTag::SYMLINK.0.to_le_bytes());
        short.extend(4u16.to_le_bytes());
        short.extend(0u16.to_le_bytes());
        short.extend([0u8; 4]);
        assert!(decode_reparse_buffer(&short).is_err());
    }

    #[test]
    fn foreign_tags_are_not_parsed() {
        let mut buf = Vec::new();
        buf.extend(ReparseTag::DEDUP.0.to_le_bytes());
        buf.extend(3u16.to_le_bytes());
        buf.extend(0u16.to_le_bytes());
        buf.extend([1, 2, 3]);
        assert_eq!(
            decode_reparse_buffer(&buf).expect("decode"),
            ReparseData::Other {
                tag: ReparseTag::DEDUP,
                data_len: 3
            }
        );
    }

    #[test]
    fn tag_names_cover_cloud_variants() {
        assert_eq!(ReparseTag(0x9000_301A).name(), Some("CLOUD"));
        assert_eq!(ReparseTag::SYMLINK.name(), Some("SYMLINK"));
        assert!(ReparseTag::SYMLINK.is_name_surrogate());
        assert!(!ReparseTag::DEDUP.is_name_surrogate());
        assert_eq!(ReparseTag(0x1234).name(), None);
        assert_eq!(ReparseTag(0x1234).to_string(), "0x00001234");
        assert_eq!(ReparseTag::NFS.to_string(), "NFS (0x80000014)");
    }

    struct FakeSource {
        tag: Option<ReparseTag>,
        buffer: Vec<u8>,
        volume: FsResult<Option<String>>,
        device: FsResult<String>,
        buffer_reads: Cell<u32>,
        mount_queries: Cell<u32>,
    }

    impl FakeSource {
        fn new(tag: Option<ReparseTag>, buffer: Vec<u8>, volume: FsResult<Option<String>>) -> Self {
            Self {
                tag,
                buffer,
                volume,
                device: Ok(r"\Device\HarddiskVolume3".into()),
                buffer_reads: Cell::new(0),
                mount_queries: Cell::new(0),
            }
        }
    }

    impl ReparseSource for FakeSource {
        fn reparse_tag(&self, _path: &str) -> FsResult<Option<ReparseTag>> {
            Ok(self.tag)
        }

        fn reparse_buffer(&self, _path: &str) -> FsResult<Vec<u8>> {
            self.buffer_reads.set(self.buffer_reads.get() + 1);
            Ok(self.buffer.clone())
        }

        fn mount_point_volume(&self, _path: &str) -> FsResult<Option<String>> {
            self.mount_queries.set(self.mount_queries.get() + 1);
            self.volume.clone()
        }

        fn volume_device(&self, _volume: &str) -> FsResult<String> {
            self.device.clone()
        }
    }

    #[test]
    fn symlink_classification_uses_print_name() {
        let source = FakeSource::new(
            Some(ReparseTag::SYMLINK),
            build(ReparseTag::SYMLINK, r"\??\C:\real", r"C:\real", Some(0)),
            Ok(None),
        );
        assert_eq!(
            classify(&source, r"C:\link").expect("classify"),
            ReparseClassification::SymbolicLink {
                target: r"C:\real".into(),
                relative: false
            }
        );
        assert_eq!(source.mount_queries.get(), 0);
    }

    #[test]
    fn mount_point_resolution_wins_over_junction_parsing() {
        let source = FakeSource::new(
            Some(ReparseTag::MOUNT_POINT),
            build(ReparseTag::MOUNT_POINT, r"\??\Volume{abc}\", "", None),
            Ok(Some(r"\\?\Volume{abc}\".into())),
        );
        assert_eq!(
            classify(&source, r"C:\mnt\disk").expect("classify"),
            ReparseClassification::VolumeMountPoint {
                device_name: r"\Device\HarddiskVolume3".into()
            }
        );
        assert_eq!(source.buffer_reads.get(), 0);
    }

    #[test]
    fn mount_point_without_device_name_keeps_volume_name() {
        let mut source = FakeSource::new(
            Some(ReparseTag::MOUNT_POINT),
            build(ReparseTag::MOUNT_POINT, r"\??\Volume{abc}\", "", None),
            Ok(Some(r"\\?\Volume{abc}\".into())),
        );
        source.device = Err(FsError::new(ErrorKind::NotFound, "query dos device", "Volume{abc}"));
        assert_eq!(
            classify(&source, r"C:\mnt\disk").expect("classify"),
            ReparseClassification::VolumeMountPoint {
                device_name: r"\\?\Volume{abc}\".into()
            }
        );
        assert_eq!(source.buffer_reads.get(), 0);
    }

    #[test]
    fn unresolvable_mount_point_is_a_junction() {
        for device in [
            Ok(None),
            Err(FsError::new(ErrorKind::Io, "resolve mount point", r"C:\j")),
        ] {
            let source = FakeSource::new(
                Some(ReparseTag::MOUNT_POINT),
                build(ReparseTag::MOUNT_POINT, r"\??\C:\elsewhere", r"C:\elsewhere", None),
                device,
            );
            assert_eq!(
                classify(&source, r"C:\j").expect("classify"),
                ReparseClassification::JunctionPoint {
                    target: r"C:\elsewhere".into()
                }
            );
            assert_eq!(source.mount_queries.get(), 1);
        }
    }

    #[test]
    fn other_tags_are_filesystem_specific() {
        for tag in [ReparseTag::NFS, ReparseTag(0x9000_F01A), ReparseTag(0x0000_0BAD)] {
            let source = FakeSource::new(Some(tag), Vec::new(), Ok(None));
            assert_eq!(
                classify(&source, "x").expect("classify"),
                ReparseClassification::FilesystemSpecific { tag }
            );
            assert_eq!(source.buffer_reads.get(), 0);
        }
    }

    #[test]
    fn missing_tag_means_not_a_reparse_point() {
        let source = FakeSource::new(None, Vec::new(), Ok(None));
        assert_eq!(
            classify(&source, "plain.txt").expect("classify"),
            ReparseClassification::NotReparsePoint
        );
    }

    #[test]
    fn tag_and_payload_mismatch_is_an_error() {
        let source = FakeSource::new(
            Some(ReparseTag::SYMLINK),
            build(ReparseTag::MOUNT_POINT, "a", "a", None),
            Ok(None),
        );
        let err = classify(&source, "x").expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn classification_serializes_with_kind() {
        let value = serde_json::to_value(ReparseClassification::JunctionPoint {
            target: "C:\\x".into(),
        })
        .expect("serialize");
        assert_eq!(value["kind"], "junction_point");
        assert_eq!(value["target"], "C:\\x");
    }
}
