//! Security descriptors in SDDL text form.

use crate::errors::FsResult;
use crate::platform::PlatformFs;

pub trait SecurityDescriptorAccessor {
    /// Owner, group and DACL of `path` as an SDDL string.
    fn get_security_descriptor(&self, path: &str) -> FsResult<String>;

    /// Apply the owner, group and DACL parts of `sddl` to `path`.
    fn set_security_descriptor(&self, path: &str, sddl: &str) -> FsResult<()>;
}

pub fn get_security_descriptor(path: &str) -> FsResult<String> {
    PlatformFs::default().get_security_descriptor(path)
}

pub fn set_security_descriptor(path: &str, sddl: &str) -> FsResult<()> {
    PlatformFs::default().set_security_descriptor(path, sddl)
}
