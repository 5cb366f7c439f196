//! Output-buffer sizing for OS calls that write into caller-provided storage.
//!
//! Several native calls (final-path lookup, mount-path listing) fail when the
//! buffer is too small and report the length they need. [`fill_with_retry`]
//! retries such a call exactly once with a buffer of the reported size. This
//! is the only internal retry in the crate and it always terminates.

use crate::errors::{ErrorKind, FsError, FsResult};

/// Outcome of one attempt to fill an output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFill {
    /// The call succeeded and wrote this many elements.
    Complete(usize),
    /// The buffer was too small; the OS needs at least `required` elements.
    TooSmall { required: usize },
}

/// Run `fill` against a buffer of `initial_len` elements. If it reports
/// [`BufferFill::TooSmall`], grow the buffer to the reported size and run it
/// once more. A second `TooSmall` is an error rather than another retry.
///
/// On success the returned vector is truncated to the written length.
pub fn fill_with_retry<T, F>(
    op: &'static str,
    path: &str,
    initial_len: usize,
    mut fill: F,
) -> FsResult<Vec<T>>
where
    T: Copy + Default,
    F: FnMut(&mut [T]) -> FsResult<BufferFill>,
{
    let mut buf = vec![T::default(); initial_len.max(1)];
    let required = match fill(&mut buf)? {
        BufferFill::Complete(written) => {
            buf.truncate(written.min(buf.len()));
            return Ok(buf);
        }
        BufferFill::TooSmall { required } => required,
    };

    if required <= buf.len() {
        return Err(FsError::new(ErrorKind::Io, op, path).with_detail(format!(
            "buffer of {} reported too small but {required} required",
            buf.len()
        )));
    }

    log::debug!("{op}: growing output buffer from {} to {required}", buf.len());
    buf = vec![T::default(); required];
    match fill(&mut buf)? {
        BufferFill::Complete(written) => {
            buf.truncate(written.min(buf.len()));
            Ok(buf)
        }
        BufferFill::TooSmall { required } => Err(FsError::new(ErrorKind::Io, op, path)
            .with_detail(format!("output still too small after resize ({required} required)"))),
    }
}
