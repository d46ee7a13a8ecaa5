//! [`DisplaySettings`] over the GDI display-settings API.

use std::mem;

use vdd_core::Orientation;
use vdd_core::mode_engine::{DisplaySettings, ModeIndex, RawMode};
use windows::Win32::Graphics::Gdi::{
    CDS_UPDATEREGISTRY, ChangeDisplaySettingsExW, DEVMODE_DISPLAY_ORIENTATION, DEVMODEW,
    DISP_CHANGE_SUCCESSFUL, DM_DISPLAYFREQUENCY, DM_DISPLAYORIENTATION, DM_PELSHEIGHT,
    DM_PELSWIDTH, ENUM_CURRENT_SETTINGS, ENUM_DISPLAY_SETTINGS_MODE, EnumDisplaySettingsW,
};
use windows::core::PCWSTR;

use crate::registry::wide;

pub struct GdiDisplaySettings;

impl GdiDisplaySettings {
    fn read(device: &str, index: ModeIndex) -> Option<DEVMODEW> {
        let name = wide(device);
        let which = match index {
            ModeIndex::Current => ENUM_CURRENT_SETTINGS,
            ModeIndex::Index(i) => ENUM_DISPLAY_SETTINGS_MODE(i),
        };
        let mut mode = DEVMODEW {
            dmSize: mem::size_of::<DEVMODEW>() as u16,
            ..Default::default()
        };
        // SAFETY: the name is NUL-terminated and dmSize is set.
        unsafe { EnumDisplaySettingsW(PCWSTR(name.as_ptr()), which, &mut mode) }
            .as_bool()
            .then_some(mode)
    }
}

impl DisplaySettings for GdiDisplaySettings {
    fn mode(&self, device: &str, index: ModeIndex) -> Option<RawMode> {
        let mode = Self::read(device, index)?;
        // SAFETY: display devices fill the display variant of the union.
        let orientation = unsafe { mode.Anonymous1.Anonymous2.dmDisplayOrientation };
        Some(RawMode {
            width: mode.dmPelsWidth,
            height: mode.dmPelsHeight,
            hz: mode.dmDisplayFrequency,
            orientation: Orientation::from_raw(orientation.0),
        })
    }

    fn apply(&self, device: &str, requested: RawMode) -> bool {
        let Some(mut mode) = Self::read(device, ModeIndex::Current) else {
            return false;
        };
        mode.dmPelsWidth = requested.width;
        mode.dmPelsHeight = requested.height;
        mode.dmDisplayFrequency = requested.hz;
        // SAFETY: display devices use the display variant of the union.
        unsafe {
            mode.Anonymous1.Anonymous2.dmDisplayOrientation =
                DEVMODE_DISPLAY_ORIENTATION(requested.orientation.raw());
        }
        mode.dmFields |= DM_PELSWIDTH | DM_PELSHEIGHT | DM_DISPLAYFREQUENCY | DM_DISPLAYORIENTATION;

        let name = wide(device);
        // SAFETY: the name is NUL-terminated and `mode` is a fully
        // initialized DEVMODEW read back from the same device.
        let result = unsafe {
            ChangeDisplaySettingsExW(
                PCWSTR(name.as_ptr()),
                Some(&mode),
                None,
                CDS_UPDATEREGISTRY,
                None,
            )
        };
        result == DISP_CHANGE_SUCCESSFUL
    }
}
