//! Windows autostart registration via the HKCU Run registry key.
//!
//! Writes a `vdd` value under
//! `HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Run`
//! so that `vdd start` is executed on user logon. No elevation is
//! required since HKCU is per-user.

use vdd_core::{VddError, VddResult};
use windows::Win32::System::Registry::{HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE};

use crate::registry::RegKey;

const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
const VALUE_NAME: &str = "vdd";

/// Registers the daemon to start on Windows logon.
///
/// Writes `"<exe_path>" start` to the registry Run key.
pub fn enable() -> VddResult<()> {
    let value = exe_command()?;
    RegKey::open(HKEY_CURRENT_USER, RUN_KEY, KEY_SET_VALUE)?.set_string(VALUE_NAME, &value)
}

/// Removes the autostart entry. A missing entry is not an error.
pub fn disable() -> VddResult<()> {
    RegKey::open(HKEY_CURRENT_USER, RUN_KEY, KEY_SET_VALUE)?.delete_value(VALUE_NAME)
}

/// Checks whether the autostart entry exists in the registry.
pub fn is_enabled() -> bool {
    RegKey::open(HKEY_CURRENT_USER, RUN_KEY, KEY_QUERY_VALUE)
        .is_ok_and(|key| key.has_value(VALUE_NAME))
}

/// Returns `"<exe_path>" start` for the registry value.
fn exe_command() -> VddResult<String> {
    let exe = std::env::current_exe()
        .map_err(|e| VddError::Os(format!("could not resolve exe path: {e}")))?;
    Ok(format!("\"{}\" start", exe.display()))
}
