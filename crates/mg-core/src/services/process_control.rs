use crate::error::{GatewayError, Result};

/// Whether a process with this pid currently exists.
pub fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    #[cfg(windows)]
    {
        use std::os::windows::io::FromRawHandle;
        unsafe {
            let handle = windows_sys::Win32::System::Threading::OpenProcess(0x00100000, 0, pid); // SYNCHRONIZE
            if handle.is_null() {
                false
            } else {
                let _ = std::os::windows::io::OwnedHandle::from_raw_handle(handle as *mut _);
                true
            }
        }
    }
    #[cfg(unix)]
    {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if unsafe { libc::kill(raw, 0) } == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to someone else.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

/// Whether `pid` names a single process other than this one. Pid 0 (and
/// negative values on Unix) address process groups.
pub fn is_signallable(pid: u32) -> bool {
    pid != 0 && pid != std::process::id() && i32::try_from(pid).is_ok()
}

/// Ask a process to terminate: SIGTERM on Unix, `TerminateProcess` on Windows.
pub fn terminate(pid: u32) -> Result<()> {
    if !is_signallable(pid) {
        return Err(GatewayError::Signal(format!("refusing to signal pid {pid}")));
    }
    #[cfg(windows)]
    {
        use std::os::windows::io::FromRawHandle;
        unsafe {
            let handle = windows_sys::Win32::System::Threading::OpenProcess(0x0001, 0, pid); // PROCESS_TERMINATE
            if handle.is_null() {
                return Err(GatewayError::Signal(format!("process {pid} not found")));
            }
            let ok = windows_sys::Win32::System::Threading::TerminateProcess(handle, 1);
            let _ = std::os::windows::io::OwnedHandle::from_raw_handle(handle as *mut _);
            if ok == 0 {
                return Err(GatewayError::Signal(format!(
                    "terminate {pid}: {}",
                    std::io::Error::last_os_error()
                )));
            }
            Ok(())
        }
    }
    #[cfg(unix)]
    {
        let raw = i32::try_from(pid)
            .map_err(|_| GatewayError::Signal(format!("pid {pid} out of range")))?;
        if unsafe { libc::kill(raw, libc::SIGTERM) } == 0 {
            Ok(())
        } else {
            Err(GatewayError::Signal(format!(
                "SIGTERM to {pid}: {}",
                std::io::Error::last_os_error()
            )))
        }
    }
}
