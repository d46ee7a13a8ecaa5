use std::fmt;

use serde::{Deserialize, Serialize};

use crate::driver::{DISPLAY_ADDRESS_BASE, DISPLAY_CODE};
use crate::mode::{Mode, ModeSet, Orientation};

/// One monitor as seen during a single topology resolution pass.
///
/// Records are rebuilt from scratch on every pass and never mutated
/// afterwards. `identifier` is only meaningful within its own snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    /// 1-based ordinal within the snapshot.
    pub identifier: u32,
    pub active: bool,
    /// Numeric suffix of the monitor interface path (`...&UID256` is 256).
    pub address: u32,
    /// Identifier of the display this one mirrors, or 0.
    pub clone_of: u32,
    /// OS output name, e.g. `\\.\DISPLAY3`.
    pub device_name: String,
    /// Vendor/product code from the interface id, e.g. `PSCCDD0`.
    pub display_name: String,
    pub current_mode: Mode,
    pub current_orientation: Orientation,
    pub mode_list: Vec<Mode>,
    pub supported_resolutions: Vec<ModeSet>,
    /// Description of the parent adapter.
    pub adapter: String,
    /// Device instance id of the parent adapter.
    pub adapter_instance: String,
    /// Monitor arrival time, in FILETIME ticks.
    pub last_arrival: u64,
    /// Adapter arrival time, in FILETIME ticks.
    pub adapter_arrival: u64,
}

impl Display {
    /// Index the driver knows this display by, if it is one of its own.
    pub fn driver_index(&self) -> Option<u16> {
        self.address
            .checked_sub(DISPLAY_ADDRESS_BASE)
            .and_then(|i| u16::try_from(i).ok())
    }

    /// Whether the display was created by the virtual display driver.
    pub fn is_ours(&self) -> bool {
        self.display_name.eq_ignore_ascii_case(DISPLAY_CODE)
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}#{})",
            self.identifier, self.device_name, self.display_name, self.address
        )?;
        if self.clone_of > 0 && self.clone_of < self.identifier {
            write!(f, " (clone of [{}])", self.clone_of)?;
        }
        Ok(())
    }
}

/// Parses the address out of a monitor instance path.
///
/// The address is the decimal number after the last `uid` (any case).
/// Returns 0 when there is none.
pub fn parse_address(path: &str) -> u32 {
    let lower = path.to_ascii_lowercase();
    let Some(pos) = lower.rfind("uid") else {
        return 0;
    };
    let digits: String = path[pos + 3..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Extracts the vendor/product code, the second `#` token of an
/// interface id such as `\\?\DISPLAY#PSCCDD0#5&1a2b&0&UID256#{...}`.
pub fn parse_display_code(device_id: &str) -> &str {
    let mut tokens = device_id.split('#');
    let first = tokens.next().unwrap_or_default();
    tokens.next().unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_comes_from_last_uid() {
        assert_eq!(parse_address(r"DISPLAY\PSCCDD0\5&1a2b3c&0&UID256"), 256);
        assert_eq!(parse_address(r"DISPLAY\uid9\5&0&Uid260"), 260);
    }

    #[test]
    fn address_without_uid_is_zero() {
        assert_eq!(parse_address(r"DISPLAY\GSM5B08\4&3a1c&0&12345"), 0);
        assert_eq!(parse_address(r"DISPLAY\X\UID"), 0);
    }

    #[test]
    fn display_code_is_second_token() {
        let id = r"\\?\DISPLAY#PSCCDD0#5&1a2b3c&0&UID256#{e6f07b5f-ee97-4a90-b076-33f57bf4eaa7}";

        assert_eq!(parse_display_code(id), "PSCCDD0");
        assert_eq!(parse_display_code("plain"), "plain");
    }

    #[test]
    fn driver_index_is_offset_from_base() {
        let ours = Display {
            address: 0x102,
            display_name: "psccdd0".into(),
            ..Display::default()
        };
        let foreign = Display {
            address: 0x20,
            display_name: "GSM5B08".into(),
            ..Display::default()
        };

        assert_eq!(ours.driver_index(), Some(2));
        assert!(ours.is_ours());
        assert_eq!(foreign.driver_index(), None);
        assert!(!foreign.is_ours());
    }

    #[test]
    fn formats_clone_suffix_only_on_the_later_display() {
        let first = Display {
            identifier: 1,
            clone_of: 2,
            device_name: r"\\.\DISPLAY1".into(),
            display_name: "PSCCDD0".into(),
            address: 256,
            ..Display::default()
        };
        let second = Display {
            identifier: 2,
            clone_of: 1,
            ..first.clone()
        };

        assert_eq!(first.to_string(), r"[1] \\.\DISPLAY1 (PSCCDD0#256)");
        assert_eq!(
            second.to_string(),
            r"[2] \\.\DISPLAY1 (PSCCDD0#256) (clone of [1])"
        );
    }
}
