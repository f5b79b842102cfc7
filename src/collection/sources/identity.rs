//! Process owner lookups against the operating system.

use std::sync::Mutex;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use super::IdentitySource;
use crate::collection::{Pid, Uid};

/// An [`IdentitySource`] using the local system.
///
/// The user id of a process comes from sysinfo; the username lookup goes
/// through the system user database (`getpwuid_r` on Unix), which may consult
/// a network directory service.
#[derive(Debug)]
pub struct OsIdentity {
    system: Mutex<System>,
}

impl Default for OsIdentity {
    fn default() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl IdentitySource for OsIdentity {
    fn uid_of(&self, pid: Pid) -> Option<Uid> {
        let sys_pid = sysinfo::Pid::from_u32(pid);
        let mut sys = self
            .system
            .lock()
            .expect("identity lock should not be poisoned");

        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing().with_user(UpdateKind::Always),
        );

        let uid = sys.process(sys_pid)?.user_id()?;
        uid_to_raw(uid)
    }

    fn username_of(&self, uid: Uid) -> Option<String> {
        lookup_username(uid)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_family = "unix")] {
        #[inline]
        fn uid_to_raw(uid: &sysinfo::Uid) -> Option<Uid> {
            Some(**uid)
        }

        fn lookup_username(uid: Uid) -> Option<String> {
            use std::ffi::CStr;

            // Start with a reasonably sized buffer, and grow it if the entry doesn't fit.
            let mut buf_len = 1024;

            loop {
                let mut buf = vec![0 as libc::c_char; buf_len];
                // SAFETY: passwd is plain old data, zeroed is a valid state for it.
                let mut passwd: libc::passwd = unsafe { std::mem::zeroed() };
                let mut result: *mut libc::passwd = std::ptr::null_mut();

                // SAFETY: All pointers are valid for the duration of the call, and buf_len is
                // the real length of buf.
                let ret = unsafe {
                    libc::getpwuid_r(uid, &mut passwd, buf.as_mut_ptr(), buf_len, &mut result)
                };

                if ret == libc::ERANGE && buf_len < (1 << 20) {
                    buf_len *= 2;
                    continue;
                }

                if ret != 0 || result.is_null() || passwd.pw_name.is_null() {
                    return None;
                }

                // SAFETY: On success, pw_name points to a NUL-terminated string inside buf,
                // which is still alive here.
                let name = unsafe { CStr::from_ptr(passwd.pw_name) };
                return Some(name.to_string_lossy().into_owned());
            }
        }
    } else {
        #[inline]
        fn uid_to_raw(_uid: &sysinfo::Uid) -> Option<Uid> {
            None
        }

        fn lookup_username(_uid: Uid) -> Option<String> {
            None
        }
    }
}
