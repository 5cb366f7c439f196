use super::handle::{win_error, LocalBuffer};
use super::WindowsFs;
use crate::errors::{record, ErrorKind, FsError, FsResult};
use crate::path_codec::NativePath;
use crate::privilege;
use crate::security::SecurityDescriptorAccessor;
use windows::core::PWSTR;
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::Security::Authorization::{
    ConvertSecurityDescriptorToStringSecurityDescriptorW,
    ConvertStringSecurityDescriptorToSecurityDescriptorW, GetNamedSecurityInfoW, SDDL_REVISION_1,
    SE_FILE_OBJECT,
};
use windows::Win32::Security::{
    SetFileSecurityW, DACL_SECURITY_INFORMATION, GROUP_SECURITY_INFORMATION,
    OBJECT_SECURITY_INFORMATION, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR,
};

fn requested_parts() -> OBJECT_SECURITY_INFORMATION {
    OWNER_SECURITY_INFORMATION | GROUP_SECURITY_INFORMATION | DACL_SECURITY_INFORMATION
}

impl WindowsFs {
    fn read_sddl(&self, path: &str) -> FsResult<String> {
        let native = NativePath::encode(path)?;
        let mut descriptor = PSECURITY_DESCRIPTOR::default();
        // SAFETY: `native` is NUL-terminated; the descriptor out-pointer is
        // released through `LocalBuffer` below.
        let status = unsafe {
            GetNamedSecurityInfoW(
                native.as_pcwstr(),
                SE_FILE_OBJECT,
                requested_parts(),
                None,
                None,
                None,
                None,
                &mut descriptor,
            )
        };
        if status != ERROR_SUCCESS {
            let err = std::io::Error::from_raw_os_error(status.0 as i32);
            return Err(FsError::from_io("get security descriptor", path, &err));
        }
        let _descriptor = LocalBuffer(descriptor.0);

        let mut text = PWSTR::null();
        // SAFETY: `descriptor` is valid until `_descriptor` drops; `text` is
        // released through `LocalBuffer`.
        unsafe {
            ConvertSecurityDescriptorToStringSecurityDescriptorW(
                descriptor,
                SDDL_REVISION_1,
                requested_parts(),
                &mut text,
                None,
            )
        }
        .map_err(|err| win_error("get security descriptor", path, err))?;
        let _text = LocalBuffer(text.0.cast());

        // SAFETY: the OS returned a NUL-terminated wide string.
        unsafe { text.to_string() }.map_err(|err| {
            FsError::new(ErrorKind::Io, "get security descriptor", path).with_detail(err.to_string())
        })
    }

    fn write_sddl(&self, path: &str, sddl: &str) -> FsResult<()> {
        if !privilege::enable_privilege("SeRestorePrivilege") {
            log::debug!("SeRestorePrivilege unavailable; owner changes may be refused");
        }
        let native = NativePath::encode(path)?;
        let text = NativePath::encode(sddl)?;
        let mut descriptor = PSECURITY_DESCRIPTOR::default();
        // SAFETY: `text` is NUL-terminated; the descriptor is released through
        // `LocalBuffer`.
        unsafe {
            ConvertStringSecurityDescriptorToSecurityDescriptorW(
                text.as_pcwstr(),
                SDDL_REVISION_1,
                &mut descriptor,
                None,
            )
        }
        .map_err(|err| win_error("parse security descriptor", path, err))?;
        let _descriptor = LocalBuffer(descriptor.0);

        // SAFETY: both arguments are valid for the duration of the call.
        let applied = unsafe { SetFileSecurityW(native.as_pcwstr(), requested_parts(), descriptor) };
        if applied.as_bool() {
            Ok(())
        } else {
            Err(FsError::last_os("set security descriptor", path))
        }
    }
}

impl SecurityDescriptorAccessor for WindowsFs {
    fn get_security_descriptor(&self, path: &str) -> FsResult<String> {
        record(self.read_sddl(path))
    }

    fn set_security_descriptor(&self, path: &str, sddl: &str) -> FsResult<()> {
        record(self.write_sddl(path, sddl))
    }
}
