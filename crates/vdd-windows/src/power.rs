//! Keeps the monitors from blanking while the daemon runs.

use windows::Win32::System::Power::{ES_CONTINUOUS, ES_DISPLAY_REQUIRED, SetThreadExecutionState};

/// Requests that the display stay on. The request belongs to the calling
/// thread, so call this from a thread that lives as long as it matters.
pub fn keep_screen_on() {
    // SAFETY: SetThreadExecutionState only changes this thread's
    // power request flags.
    let previous = unsafe { SetThreadExecutionState(ES_CONTINUOUS | ES_DISPLAY_REQUIRED) };
    if previous.0 == 0 {
        tracing::warn!("could not request the display to stay on");
    }
}

/// Clears a previous [`keep_screen_on`] request on this thread.
pub fn allow_screen_off() {
    // SAFETY: see `keep_screen_on`.
    let _ = unsafe { SetThreadExecutionState(ES_CONTINUOUS) };
}
