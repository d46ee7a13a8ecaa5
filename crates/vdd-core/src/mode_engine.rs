//! Reading and changing a monitor's display mode.
//!
//! The OS access sits behind [`DisplaySettings`]; the platform crate
//! implements it with `EnumDisplaySettingsW` / `ChangeDisplaySettingsExW`.

use crate::mode::{Mode, ModeRequest, ModeSet, Orientation, group_modes};

/// Which entry of a device's mode list to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeIndex {
    /// The mode currently in use.
    Current,
    /// The n-th supported mode.
    Index(u32),
}

/// The mode fields this crate reads and writes, in OS units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMode {
    pub width: u32,
    pub height: u32,
    pub hz: u32,
    pub orientation: Orientation,
}

impl RawMode {
    fn to_mode(self) -> Mode {
        let clamp = |v: u32| u16::try_from(v).unwrap_or(u16::MAX);
        Mode::new(clamp(self.width), clamp(self.height), clamp(self.hz))
    }
}

/// OS display-settings access for one device name (e.g. `\\.\DISPLAY3`).
pub trait DisplaySettings {
    /// Reads one mode. `None` once the index runs past the end of the list.
    fn mode(&self, device: &str, index: ModeIndex) -> Option<RawMode>;

    /// Applies a mode on top of the current settings. Returns whether the
    /// OS accepted it.
    fn apply(&self, device: &str, mode: RawMode) -> bool;
}

/// A device's current mode plus everything it supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayModes {
    pub current: Mode,
    pub orientation: Orientation,
    /// Every enumerated mode, in OS order, duplicates included.
    pub list: Vec<Mode>,
    pub supported: Vec<ModeSet>,
}

/// Enumerates the current mode and every supported mode of a device.
pub fn current_and_supported(settings: &impl DisplaySettings, device: &str) -> DisplayModes {
    let mut modes = DisplayModes::default();

    if let Some(current) = settings.mode(device, ModeIndex::Current) {
        modes.current = current.to_mode();
        modes.orientation = current.orientation;
    }

    let mut index = 0;
    while let Some(raw) = settings.mode(device, ModeIndex::Index(index)) {
        modes.list.push(raw.to_mode());
        index += 1;
    }

    modes.supported = group_modes(&modes.list);
    modes
}

/// Changes a device's mode and/or orientation.
///
/// Only the supplied fields are overwritten. When the rotation flips
/// between the landscape and portrait classes, width and height are
/// swapped so they are expressed in the rotated frame. Returns `false`
/// when the device cannot be read or the OS rejects the combination.
pub fn change_mode(
    settings: &impl DisplaySettings,
    device: &str,
    request: ModeRequest,
    orientation: Option<Orientation>,
) -> bool {
    let Some(mut mode) = settings.mode(device, ModeIndex::Current) else {
        return false;
    };
    let previous = mode.orientation;

    if let Some(width) = request.width {
        mode.width = u32::from(width);
    }
    if let Some(height) = request.height {
        mode.height = u32::from(height);
    }
    if let Some(hz) = request.hz {
        mode.hz = u32::from(hz);
    }

    if let Some(next) = orientation {
        mode.orientation = next;
        if previous.swaps_axes(next) {
            std::mem::swap(&mut mode.width, &mut mode.height);
        }
    }

    let applied = settings.apply(device, mode);
    if !applied {
        tracing::warn!(device, ?mode, "display mode rejected");
    }
    applied
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct FakeSettings {
        current: Option<RawMode>,
        modes: Vec<RawMode>,
        accept: bool,
        applied: RefCell<Vec<RawMode>>,
    }

    impl FakeSettings {
        fn new(current: RawMode) -> Self {
            Self {
                current: Some(current),
                modes: Vec::new(),
                accept: true,
                applied: RefCell::new(Vec::new()),
            }
        }
    }

    impl DisplaySettings for FakeSettings {
        fn mode(&self, _device: &str, index: ModeIndex) -> Option<RawMode> {
            match index {
                ModeIndex::Current => self.current,
                ModeIndex::Index(i) => self.modes.get(i as usize).copied(),
            }
        }

        fn apply(&self, _device: &str, mode: RawMode) -> bool {
            self.applied.borrow_mut().push(mode);
            self.accept
        }
    }

    fn raw(width: u32, height: u32, hz: u32, orientation: Orientation) -> RawMode {
        RawMode {
            width,
            height,
            hz,
            orientation,
        }
    }

    #[test]
    fn rotating_to_portrait_swaps_dimensions() {
        // Arrange
        let settings = FakeSettings::new(raw(1920, 1080, 60, Orientation::Landscape));

        // Act
        let ok = change_mode(
            &settings,
            r"\\.\DISPLAY3",
            ModeRequest::default(),
            Some(Orientation::Portrait),
        );

        // Assert
        assert!(ok);
        assert_eq!(
            settings.applied.borrow()[0],
            raw(1080, 1920, 60, Orientation::Portrait)
        );
    }

    #[test]
    fn flipping_within_the_same_class_keeps_dimensions() {
        let settings = FakeSettings::new(raw(1920, 1080, 60, Orientation::Landscape));

        change_mode(
            &settings,
            "dev",
            ModeRequest::default(),
            Some(Orientation::LandscapeFlipped),
        );

        assert_eq!(
            settings.applied.borrow()[0],
            raw(1920, 1080, 60, Orientation::LandscapeFlipped)
        );
    }

    #[test]
    fn only_supplied_fields_are_overwritten() {
        let settings = FakeSettings::new(raw(1920, 1080, 60, Orientation::Landscape));
        let request = ModeRequest {
            width: None,
            height: None,
            hz: Some(144),
        };

        change_mode(&settings, "dev", request, None);

        assert_eq!(
            settings.applied.borrow()[0],
            raw(1920, 1080, 144, Orientation::Landscape)
        );
    }

    #[test]
    fn rejected_change_returns_false() {
        let mut settings = FakeSettings::new(raw(1920, 1080, 60, Orientation::Landscape));
        settings.accept = false;

        assert!(!change_mode(&settings, "dev", "640x480".parse().unwrap(), None));
        assert_eq!(settings.applied.borrow().len(), 1);
    }

    #[test]
    fn unreadable_device_is_not_changed() {
        let mut settings = FakeSettings::new(raw(1920, 1080, 60, Orientation::Landscape));
        settings.current = None;

        assert!(!change_mode(&settings, "dev", ModeRequest::default(), None));
        assert!(settings.applied.borrow().is_empty());
    }

    #[test]
    fn enumerates_current_and_groups_the_rest() {
        // Arrange
        let mut settings = FakeSettings::new(raw(1080, 1920, 60, Orientation::Portrait));
        settings.modes = vec![
            raw(1920, 1080, 60, Orientation::Landscape),
            raw(1920, 1080, 30, Orientation::Landscape),
            raw(1280, 720, 60, Orientation::Landscape),
        ];

        // Act
        let modes = current_and_supported(&settings, "dev");

        // Assert
        assert_eq!(modes.current, Mode::new(1080, 1920, 60));
        assert_eq!(modes.orientation, Orientation::Portrait);
        assert_eq!(modes.list.len(), 3);
        assert_eq!(modes.supported.len(), 2);
        assert_eq!(modes.supported[0].refresh_rates, vec![30, 60]);
    }
}
