//! The overlapped communication handle to the driver.

use std::ffi::c_void;
use std::mem;

use vdd_core::driver::INTERFACE_GUID;
use vdd_core::ioctl::{DriverChannel, DriverCommand, ExchangeError};
use vdd_core::{VddError, VddResult};
use windows::Win32::Foundation::{
    CloseHandle, ERROR_IO_PENDING, GENERIC_READ, GENERIC_WRITE, HANDLE, WAIT_OBJECT_0,
    WAIT_TIMEOUT,
};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_FLAG_NO_BUFFERING, FILE_FLAG_OVERLAPPED,
    FILE_FLAG_WRITE_THROUGH, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::IO::{CancelIoEx, DeviceIoControl, GetOverlappedResult, OVERLAPPED};
use windows::Win32::System::Threading::{CreateEventW, WaitForSingleObject};
use windows::core::PCWSTR;

use crate::device;
use crate::registry::wide;

/// An open handle to the driver's device interface, closed on drop.
pub struct DeviceHandle(HANDLE);

// SAFETY: the handle is opened for overlapped I/O. Every exchange uses its
// own OVERLAPPED and event, so concurrent exchanges from several threads
// are allowed by the OS.
unsafe impl Send for DeviceHandle {}
// SAFETY: see above; `&DeviceHandle` only issues independent requests.
unsafe impl Sync for DeviceHandle {}

impl DeviceHandle {
    /// Opens the first present interface of the driver.
    pub fn open() -> VddResult<Self> {
        for path in device::interface_paths(INTERFACE_GUID)? {
            let wide_path = wide(&path);
            // SAFETY: the path is NUL-terminated. The handle is closed by Drop.
            let opened = unsafe {
                CreateFileW(
                    PCWSTR(wide_path.as_ptr()),
                    (GENERIC_READ | GENERIC_WRITE).0,
                    FILE_SHARE_READ | FILE_SHARE_WRITE,
                    None,
                    OPEN_EXISTING,
                    FILE_ATTRIBUTE_NORMAL
                        | FILE_FLAG_NO_BUFFERING
                        | FILE_FLAG_OVERLAPPED
                        | FILE_FLAG_WRITE_THROUGH,
                    None,
                )
            };
            match opened {
                Ok(handle) => {
                    tracing::debug!(%path, "opened driver interface");
                    return Ok(Self(handle));
                }
                Err(e) => tracing::debug!(%path, error = %e, "could not open driver interface"),
            }
        }
        Err(VddError::HandleAcquisition)
    }
}

impl DriverChannel for DeviceHandle {
    fn exchange(&self, command: DriverCommand) -> Result<u32, ExchangeError> {
        let input = command.input();
        let mut output = [0u8; 4];
        let output_len = command.output_len();
        let timeout_ms = u32::try_from(command.timeout().as_millis()).unwrap_or(u32::MAX);

        let event = Event::new()?;
        // SAFETY: OVERLAPPED is plain data; all-zero is its documented
        // initial state.
        let mut ov: OVERLAPPED = unsafe { mem::zeroed() };
        ov.hEvent = event.0;
        let mut transferred = 0u32;

        let out_ptr = (output_len > 0).then(|| output.as_mut_ptr().cast::<c_void>());
        // SAFETY: input, output, `ov` and the event all outlive the request:
        // every path below waits for completion or cancellation before they
        // are dropped.
        let issued = unsafe {
            DeviceIoControl(
                self.0,
                command.code(),
                Some(input.as_ptr().cast::<c_void>()),
                input.len() as u32,
                out_ptr,
                output_len as u32,
                Some(&mut transferred),
                Some(&mut ov),
            )
        };

        match issued {
            Ok(()) => {}
            Err(e) if e.code() == ERROR_IO_PENDING.to_hresult() => {
                // SAFETY: the event is owned by `event` and still open.
                let wait = unsafe { WaitForSingleObject(event.0, timeout_ms) };
                if wait == WAIT_OBJECT_0 {
                    // SAFETY: the request has completed; this only collects
                    // its byte count.
                    unsafe { GetOverlappedResult(self.0, &ov, &mut transferred, false) }
                        .map_err(|e| ExchangeError::Failed(e.to_string()))?;
                } else {
                    // SAFETY: cancels only this request, then blocks until the
                    // driver has released the buffers.
                    unsafe {
                        let _ = CancelIoEx(self.0, Some(&ov));
                        let _ = GetOverlappedResult(self.0, &ov, &mut transferred, true);
                    }
                    if wait == WAIT_TIMEOUT {
                        return Err(ExchangeError::TimedOut);
                    }
                    return Err(ExchangeError::Failed(format!("wait failed: {wait:?}")));
                }
            }
            Err(e) => return Err(ExchangeError::Failed(e.to_string())),
        }

        if output_len == 0 {
            return Ok(0);
        }
        Ok(u32::from_le_bytes(output))
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was opened by `open` and is closed once.
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Manual-reset event for one overlapped request.
struct Event(HANDLE);

impl Event {
    fn new() -> Result<Self, ExchangeError> {
        // SAFETY: creates an unnamed event; closed by Drop.
        unsafe { CreateEventW(None, true, false, PCWSTR::null()) }
            .map(Self)
            .map_err(|e| ExchangeError::Failed(format!("CreateEventW: {e}")))
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        // SAFETY: the event was created by `new` and is closed once.
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}
