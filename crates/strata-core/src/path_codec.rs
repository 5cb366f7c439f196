//! Conversion of caller-supplied UTF-8 path text into the representation the
//! native APIs consume: the unchanged byte string on POSIX, NUL-terminated
//! UTF-16 on Windows.

use crate::errors::{ErrorKind, FsError, FsResult};

/// Separator used when joining directory entries.
pub const PLATFORM_SEPARATOR: char = if cfg!(windows) { '\\' } else { '/' };

/// Paths this long (in UTF-16 units) get the `\\?\` long-path prefix.
#[cfg(windows)]
const LONG_PATH_THRESHOLD: usize = 260;

#[cfg(windows)]
const VERBATIM_PREFIX: &str = r"\\?\";

/// A path encoded for the platform's native calls.
#[derive(Debug, Clone)]
pub struct NativePath {
    #[cfg(unix)]
    inner: std::ffi::CString,
    #[cfg(windows)]
    inner: Vec<u16>,
}

impl NativePath {
    /// Encode `path`. Interior NUL characters cannot be represented natively
    /// and are rejected.
    pub fn encode(path: &str) -> FsResult<Self> {
        if path.contains('\0') {
            return Err(FsError::new(ErrorKind::Io, "encode path", path)
                .with_detail("path contains an interior NUL"));
        }
        Ok(Self::encode_checked(path))
    }

    #[cfg(unix)]
    fn encode_checked(path: &str) -> Self {
        // NUL was ruled out above, so the conversion cannot fail.
        let inner = std::ffi::CString::new(path.as_bytes()).unwrap_or_default();
        Self { inner }
    }

    #[cfg(windows)]
    fn encode_checked(path: &str) -> Self {
        let wide_len = path.encode_utf16().count();
        let inner = if wide_len >= LONG_PATH_THRESHOLD {
            to_wide(&ensure_long_path(path))
        } else {
            to_wide(path)
        };
        Self { inner }
    }

    #[cfg(unix)]
    pub fn as_c_str(&self) -> &std::ffi::CStr {
        &self.inner
    }

    #[cfg(windows)]
    pub fn as_pcwstr(&self) -> windows::core::PCWSTR {
        windows::core::PCWSTR(self.inner.as_ptr())
    }

    /// Encoded units without the terminating NUL.
    #[cfg(windows)]
    pub fn as_wide(&self) -> &[u16] {
        &self.inner[..self.inner.len().saturating_sub(1)]
    }
}

fn is_separator(c: char, separator: char) -> bool {
    c == separator || (separator == '\\' && c == '/')
}

/// Join a directory path and an entry name, inserting `separator` only when
/// the directory path does not already end with one.
pub fn join_entry_path(dir: &str, name: &str, separator: char) -> String {
    let mut joined = String::with_capacity(dir.len() + name.len() + 1);
    joined.push_str(dir);
    if !dir.chars().next_back().is_some_and(|c| is_separator(c, separator)) {
        joined.push(separator);
    }
    joined.push_str(name);
    joined
}

/// Split a buffer of NUL-separated strings terminated by an empty string
/// (the `REG_MULTI_SZ` layout Windows uses for drive and mount-path lists).
pub fn split_multi_sz(buf: &[u16]) -> Vec<String> {
    buf.split(|&unit| unit == 0)
        .take_while(|segment| !segment.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// UTF-16 units up to the first NUL, decoded lossily.
pub fn from_wide(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

/// Remove a Win32 verbatim (`\\?\`) or NT object (`\??\`) prefix so a path
/// reads the way users type it. `\\?\UNC\server\share` becomes
/// `\\server\share`; volume GUID paths are left untouched.
pub fn strip_verbatim_prefix(path: &str) -> String {
    for prefix in [r"\\?\", r"\??\"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            if let Some(unc) = rest.strip_prefix(r"UNC\") {
                return format!(r"\\{unc}");
            }
            if rest.starts_with("Volume{") {
                return path.to_string();
            }
            return rest.to_string();
        }
    }
    path.to_string()
}

/// NUL-terminated UTF-16 encoding of `text`.
pub fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Verbatim form of `path` for paths past `MAX_PATH`: `\\server\share`
/// becomes `\\?\UNC\server\share`, absolute paths gain `\\?\` after
/// `.`/`..` are resolved. Verbatim and relative paths pass through.
#[cfg(windows)]
pub fn ensure_long_path(path: &str) -> String {
    use normpath::PathExt;

    if path.starts_with(VERBATIM_PREFIX) {
        return path.to_string();
    }
    if let Some(share) = path.strip_prefix(r"\\") {
        return format!(r"{VERBATIM_PREFIX}UNC\{share}");
    }
    match std::path::Path::new(path).normalize() {
        Ok(resolved) if resolved.as_path().is_absolute() => {
            format!("{VERBATIM_PREFIX}{}", resolved.as_path().display())
        }
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_adds_separator_only_when_missing() {
        assert_eq!(join_entry_path("/tmp", "a.txt", '/'), "/tmp/a.txt");
        assert_eq!(join_entry_path("/tmp/", "a.txt", '/'), "/tmp/a.txt");
        assert_eq!(join_entry_path("/", "etc", '/'), "/etc");
        assert_eq!(join_entry_path(r"C:\data", "x", '\\'), r"C:\data\x");
        assert_eq!(join_entry_path(r"C:\", "x", '\\'), r"C:\x");
    }

    #[test]
    fn windows_join_accepts_forward_slash_suffix() {
        assert_eq!(join_entry_path("C:/data/", "x", '\\'), "C:/data/x");
        // A trailing backslash is an ordinary character on POSIX.
        assert_eq!(join_entry_path("dir\\", "x", '/'), "dir\\/x");
    }

    #[test]
    fn empty_directory_yields_rooted_name() {
        assert_eq!(join_entry_path("", "x", '/'), "/x");
    }

    #[cfg(windows)]
    #[test]
    fn long_path_form_is_verbatim() {
        assert_eq!(ensure_long_path(r"\\?\C:\x"), r"\\?\C:\x");
        assert_eq!(ensure_long_path(r"\\srv\share\f"), r"\\?\UNC\srv\share\f");
        assert_eq!(ensure_long_path(r"C:\a\..\b"), r"\\?\C:\b");
    }

    #[test]
    fn interior_nul_is_rejected() {
        let err = NativePath::encode("bad\0path").expect_err("nul must fail");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(NativePath::encode("fine/path").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn posix_encoding_keeps_bytes() {
        let native = NativePath::encode("/tmp/\u{e9}t\u{e9}").expect("encode");
        assert_eq!(native.as_c_str().to_bytes(), "/tmp/\u{e9}t\u{e9}".as_bytes());
    }

    #[test]
    fn multi_sz_stops_at_double_nul() {
        let mut buf = Vec::new();
        for part in ["C:\\", "D:\\"] {
            buf.extend(part.encode_utf16());
            buf.push(0);
        }
        buf.push(0);
        buf.extend("junk".encode_utf16());
        assert_eq!(split_multi_sz(&buf), vec!["C:\\".to_string(), "D:\\".to_string()]);
        assert!(split_multi_sz(&[0, 0]).is_empty());
    }

    #[test]
    fn wide_roundtrip_stops_at_nul() {
        let wide = to_wide("volume");
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(from_wide(&wide), "volume");
        assert_eq!(from_wide(&[0x41, 0x42]), "AB");
    }

    #[test]
    fn verbatim_prefixes_are_stripped() {
        assert_eq!(strip_verbatim_prefix(r"\\?\C:\data"), r"C:\data");
        assert_eq!(strip_verbatim_prefix(r"\??\C:\target"), r"C:\target");
        assert_eq!(strip_verbatim_prefix(r"\\?\UNC\srv\share"), r"\\srv\share");
        assert_eq!(
            strip_verbatim_prefix(r"\\?\Volume{1234}\"),
            r"\\?\Volume{1234}\"
        );
        assert_eq!(strip_verbatim_prefix("/usr/lib"), "/usr/lib");
    }
}
