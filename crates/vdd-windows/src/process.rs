use std::mem;

use vdd_core::{VddError, VddResult};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, INFINITE, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_TERMINATE, TerminateProcess, WaitForSingleObject,
};
use windows::Win32::UI::Shell::{SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW, ShellExecuteExW};
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;
use windows::core::PCWSTR;

use crate::registry::wide;

/// Checks whether a process with the given PID is still alive.
///
/// Uses `OpenProcess` with minimal access rights. If the handle can be
/// opened, the process exists. This is used to detect stale PID files
/// left behind when the daemon is killed without a clean shutdown.
pub fn is_process_alive(pid: u32) -> bool {
    // SAFETY: OpenProcess attempts to open an existing process.
    // PROCESS_QUERY_LIMITED_INFORMATION is the least-privilege access
    // right that still lets us confirm the process exists.
    let result = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) };

    match result {
        Ok(handle) => {
            close(handle);
            true
        }
        Err(_) => false,
    }
}

/// Forcibly terminates a process. Returns whether it was killed.
pub fn kill_process(pid: u32) -> bool {
    // SAFETY: OpenProcess with terminate rights only; closed below.
    let Ok(handle) = (unsafe { OpenProcess(PROCESS_TERMINATE, false, pid) }) else {
        return false;
    };
    // SAFETY: the handle was opened with PROCESS_TERMINATE above.
    let killed = unsafe { TerminateProcess(handle, 1) }.is_ok();
    close(handle);
    killed
}

/// Runs the current executable elevated (UAC prompt) with `args`, waits
/// for it and returns its exit code.
pub fn run_elevated(args: &str) -> VddResult<u32> {
    let exe = std::env::current_exe()
        .map_err(|e| VddError::Os(format!("could not resolve exe path: {e}")))?;
    let verb = wide("runas");
    let file = wide(&exe.display().to_string());
    let params = wide(args);

    let mut info = SHELLEXECUTEINFOW {
        cbSize: mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOCLOSEPROCESS,
        lpVerb: PCWSTR(verb.as_ptr()),
        lpFile: PCWSTR(file.as_ptr()),
        lpParameters: PCWSTR(params.as_ptr()),
        nShow: SW_HIDE.0,
        ..Default::default()
    };
    // SAFETY: every string in `info` is NUL-terminated and outlives the
    // call. The returned process handle is closed below.
    unsafe { ShellExecuteExW(&mut info) }
        .map_err(|e| VddError::Os(format!("elevation was refused or failed: {e}")))?;

    if info.hProcess.is_invalid() {
        return Err(VddError::os("elevated process handle was not returned"));
    }

    let mut code = 0u32;
    // SAFETY: hProcess is a valid process handle owned by this function.
    let waited = unsafe {
        WaitForSingleObject(info.hProcess, INFINITE);
        GetExitCodeProcess(info.hProcess, &mut code)
    };
    close(info.hProcess);
    waited.map_err(VddError::os)?;
    Ok(code)
}

fn close(handle: HANDLE) {
    // SAFETY: callers pass a handle they own and never use it again.
    unsafe {
        let _ = CloseHandle(handle);
    }
}
