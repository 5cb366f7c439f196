//! Process token privileges (Windows only).

use crate::path_codec::to_wide;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{CloseHandle, GetLastError, BOOL, HANDLE, LUID, WIN32_ERROR},
        Security::{
            AdjustTokenPrivileges, LookupPrivilegeValueW, PrivilegeCheck, LUID_AND_ATTRIBUTES,
            PRIVILEGE_SET, SE_PRIVILEGE_ENABLED, TOKEN_ACCESS_MASK, TOKEN_ADJUST_PRIVILEGES,
            TOKEN_PRIVILEGES, TOKEN_QUERY,
        },
        System::Threading::{GetCurrentProcess, OpenProcessToken},
    },
};

struct Token(HANDLE);

impl Token {
    fn open(access: TOKEN_ACCESS_MASK) -> Option<Self> {
        let mut handle = HANDLE::default();
        // SAFETY: `handle` is a valid out-parameter for the current process.
        unsafe { OpenProcessToken(GetCurrentProcess(), access, &mut handle) }.ok()?;
        Some(Self(handle))
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcessToken and is closed once.
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn lookup(name: &str) -> Option<LUID> {
    let wide = to_wide(name);
    let mut luid = LUID::default();
    // SAFETY: `wide` is NUL-terminated and outlives the call.
    unsafe { LookupPrivilegeValueW(None, PCWSTR(wide.as_ptr()), &mut luid) }.ok()?;
    Some(luid)
}

/// `true` when the named privilege is enabled in the process token.
pub fn has_privilege(name: &str) -> bool {
    let Some(token) = Token::open(TOKEN_QUERY) else {
        return false;
    };
    let Some(luid) = lookup(name) else {
        return false;
    };
    let mut set = PRIVILEGE_SET {
        PrivilegeCount: 1,
        Control: 0,
        Privilege: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    let mut held = BOOL(0);
    // SAFETY: `set` and `held` are stack values that outlive the call.
    let ok = unsafe { PrivilegeCheck(token.0, &mut set, &mut held) }.is_ok();
    ok && held.as_bool()
}

/// Try to enable the named privilege. Returns `true` if it is now enabled.
pub fn enable_privilege(name: &str) -> bool {
    let Some(token) = Token::open(TOKEN_QUERY | TOKEN_ADJUST_PRIVILEGES) else {
        return false;
    };
    let Some(luid) = lookup(name) else {
        return false;
    };
    let mut privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    // SAFETY: `privileges` is a stack value that outlives the call.
    if unsafe { AdjustTokenPrivileges(token.0, false, Some(&mut privileges), 0, None, None) }
        .is_err()
    {
        return false;
    }
    // AdjustTokenPrivileges succeeds with ERROR_NOT_ALL_ASSIGNED when the
    // privilege is not held at all.
    // SAFETY: reads the calling thread's last-error value.
    let last = unsafe { GetLastError() };
    log::debug!("enable {name}: last error {}", last.0);
    last == WIN32_ERROR(0)
}
