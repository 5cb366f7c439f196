//! Named (alternate) data streams.

use crate::errors::FsResult;
use crate::platform::PlatformFs;
use serde::Serialize;

/// A named data stream, e.g. `:Zone.Identifier:$DATA`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub name: String,
    pub size: u64,
}

pub trait AlternateStreamSource {
    /// Named streams of `path`, excluding the unnamed primary stream.
    fn list_streams(&self, path: &str) -> FsResult<Vec<StreamInfo>>;
}

/// Name of the unnamed primary data stream.
pub const PRIMARY_STREAM: &str = "::$DATA";

/// `true` when `name` refers to the primary stream.
pub fn is_primary_stream(name: &str) -> bool {
    name.eq_ignore_ascii_case(PRIMARY_STREAM)
}

pub fn list_streams(path: &str) -> FsResult<Vec<StreamInfo>> {
    PlatformFs::default().list_streams(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_stream_is_recognised_case_insensitively() {
        assert!(is_primary_stream("::$DATA"));
        assert!(is_primary_stream("::$data"));
        assert!(!is_primary_stream(":Zone.Identifier:$DATA"));
    }
}
