//! Settings the driver reads from the machine registry on startup.
//!
//! Both keys live under `HKEY_LOCAL_MACHINE`, so writing them requires
//! elevation. Reads work for any user.

use vdd_core::driver::{MAX_CUSTOM_MODES, ParentGpu};
use vdd_core::{Mode, VddResult};
use windows::Win32::System::Registry::HKEY_LOCAL_MACHINE;

use crate::registry::RegKey;

const MODES_KEY: &str = r"SOFTWARE\Parsec\vdd";
const PARAMETERS_KEY: &str =
    r"SOFTWARE\Microsoft\Windows NT\CurrentVersion\WUDF\Services\ParsecVDA\Parameters";
const PREFERRED_VENDOR: &str = "PreferredRenderAdapterVendorId";

/// Reads the custom modes, skipping slots that are missing or incomplete.
pub fn custom_modes() -> Vec<Mode> {
    (0..MAX_CUSTOM_MODES)
        .filter_map(|slot| {
            let key = RegKey::open_read(HKEY_LOCAL_MACHINE, &format!(r"{MODES_KEY}\{slot}")).ok()?;
            let field = |name: &str| key.dword(name).and_then(|v| u16::try_from(v).ok());
            Some(Mode::new(field("width")?, field("height")?, field("hz")?))
        })
        .collect()
}

/// Replaces the custom modes. Only the first five are kept; the remaining
/// slots are deleted.
pub fn set_custom_modes(modes: &[Mode]) -> VddResult<()> {
    let root = RegKey::create(HKEY_LOCAL_MACHINE, MODES_KEY)?;

    for slot in 0..MAX_CUSTOM_MODES {
        let name = slot.to_string();
        match modes.get(slot) {
            Some(mode) => {
                let key = RegKey::create(HKEY_LOCAL_MACHINE, &format!(r"{MODES_KEY}\{name}"))?;
                key.set_dword("width", u32::from(mode.width))?;
                key.set_dword("height", u32::from(mode.height))?;
                key.set_dword("hz", u32::from(mode.hz))?;
            }
            None => root.delete_subkey(&name)?,
        }
    }

    if modes.len() > MAX_CUSTOM_MODES {
        tracing::warn!(
            given = modes.len(),
            kept = MAX_CUSTOM_MODES,
            "extra custom modes ignored"
        );
    }
    Ok(())
}

/// Reads the preferred render GPU. A missing key or value is `Auto`.
pub fn parent_gpu() -> ParentGpu {
    RegKey::open_read(HKEY_LOCAL_MACHINE, PARAMETERS_KEY)
        .ok()
        .and_then(|key| key.dword(PREFERRED_VENDOR))
        .map_or(ParentGpu::Auto, ParentGpu::from_vendor_id)
}

pub fn set_parent_gpu(gpu: ParentGpu) -> VddResult<()> {
    let key = RegKey::create(HKEY_LOCAL_MACHINE, PARAMETERS_KEY)?;
    match gpu.vendor_id() {
        Some(vendor) => key.set_dword(PREFERRED_VENDOR, vendor),
        None => key.delete_value(PREFERRED_VENDOR),
    }
}
