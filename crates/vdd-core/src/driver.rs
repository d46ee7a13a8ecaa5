//! Identity of the one driver this crate manages.
//!
//! The class GUID and hardware id locate the device-manager entry used
//! for status queries. The interface GUID is what the communication
//! handle is opened against.

use std::fmt;
use std::str::FromStr;

/// Human readable adapter name shown in Device Manager.
pub const ADAPTER_NAME: &str = "Parsec Virtual Display Adapter";

/// Display device class (`Display adapters`).
pub const CLASS_GUID: &str = "{4d36e968-e325-11ce-bfc1-08002be10318}";

/// Hardware id of the virtual display adapter.
pub const HARDWARE_ID: &str = r"Root\Parsec\VDA";

/// Device interface the IOCTL handle is opened on.
pub const INTERFACE_GUID: &str = "{00b41627-04c4-429e-a26e-0265cf50c8fa}";

/// Vendor/product code the driver stamps on every monitor it creates.
pub const DISPLAY_CODE: &str = "PSCCDD0";

/// Name of the driver's user-mode service, used for its registry parameters.
pub const SERVICE_NAME: &str = "ParsecVDA";

/// The adapter supports 16 monitors; half of that avoids plugging lag.
pub const MAX_DISPLAYS: u32 = 8;

/// Monitor addresses start here; the driver index is the offset from it.
pub const DISPLAY_ADDRESS_BASE: u32 = 0x100;

/// Custom modes the driver reads from its settings key.
pub const MAX_CUSTOM_MODES: usize = 5;

/// Which GPU the virtual adapter renders on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentGpu {
    /// Let the driver pick.
    #[default]
    Auto,
    Nvidia,
    Amd,
}

impl ParentGpu {
    const NVIDIA_VENDOR: u32 = 0x10DE;
    const AMD_VENDOR: u32 = 0x1002;

    /// PCI vendor id stored in the driver parameters; `None` for auto.
    pub fn vendor_id(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Nvidia => Some(Self::NVIDIA_VENDOR),
            Self::Amd => Some(Self::AMD_VENDOR),
        }
    }

    /// Unknown vendor ids read as auto.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            Self::NVIDIA_VENDOR => Self::Nvidia,
            Self::AMD_VENDOR => Self::Amd,
            _ => Self::Auto,
        }
    }
}

impl fmt::Display for ParentGpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Nvidia => "nvidia",
            Self::Amd => "amd",
        })
    }
}

impl FromStr for ParentGpu {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "nvidia" => Ok(Self::Nvidia),
            "amd" => Ok(Self::Amd),
            other => Err(format!("unknown GPU '{other}' (expected auto, nvidia or amd)")),
        }
    }
}

/// Parses a `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}` GUID into its 128-bit value.
///
/// Braces are optional. Returns `None` for anything that is not 32 hex
/// digits in the 8-4-4-4-12 grouping.
pub fn parse_guid(text: &str) -> Option<u128> {
    let inner = text.trim().trim_start_matches('{').trim_end_matches('}');
    let groups: Vec<&str> = inner.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    if groups.len() != lengths.len() {
        return None;
    }
    if groups.iter().zip(lengths).any(|(g, len)| g.len() != len) {
        return None;
    }
    u128::from_str_radix(&groups.concat(), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interface_guid() {
        assert_eq!(
            parse_guid(INTERFACE_GUID),
            Some(0x00b41627_04c4_429e_a26e_0265cf50c8fa)
        );
    }

    #[test]
    fn parses_guid_without_braces() {
        assert_eq!(
            parse_guid("4d36e968-e325-11ce-bfc1-08002be10318"),
            Some(0x4d36e968_e325_11ce_bfc1_08002be10318)
        );
    }

    #[test]
    fn parent_gpu_vendor_ids() {
        assert_eq!(ParentGpu::Nvidia.vendor_id(), Some(0x10DE));
        assert_eq!(ParentGpu::Auto.vendor_id(), None);
        assert_eq!(ParentGpu::from_vendor_id(0x1002), ParentGpu::Amd);
        assert_eq!(ParentGpu::from_vendor_id(0x8086), ParentGpu::Auto);
    }

    #[test]
    fn parent_gpu_parses_case_insensitively() {
        assert_eq!("NVIDIA".parse(), Ok(ParentGpu::Nvidia));
        assert!("intel".parse::<ParentGpu>().is_err());
    }

    #[test]
    fn rejects_malformed_guid() {
        assert_eq!(parse_guid("{00b41627-04c4-429e-a26e}"), None);
        assert_eq!(parse_guid("not-a-guid"), None);
        assert_eq!(parse_guid("{zzb41627-04c4-429e-a26e-0265cf50c8fa}"), None);
    }
}
