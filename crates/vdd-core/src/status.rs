//! Driver health classification.
//!
//! The platform crate enumerates device-manager entries under a device
//! class and hands them over as [`DeviceNode`]s; everything from matching
//! the hardware id to mapping status bits onto a [`DeviceStatus`] happens
//! here, so it can be exercised without Windows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::VddResult;

/// Device node flag: a driver is registered for the device.
pub const DN_DRIVER_LOADED: u32 = 0x0000_0002;
/// Device node flag: the device is currently configured and running.
pub const DN_STARTED: u32 = 0x0000_0008;
/// Device node flag: the device has a problem code.
pub const DN_HAS_PROBLEM: u32 = 0x0000_0400;

/// Problem code: a restart is required.
pub const CM_PROB_NEED_RESTART: u32 = 0x0000_000E;
/// Problem code: the device instance is disabled.
pub const CM_PROB_DISABLED: u32 = 0x0000_0016;
/// Problem code: the hardware is disabled.
pub const CM_PROB_HARDWARE_DISABLED: u32 = 0x0000_001D;
/// Problem code: the service's start type is "disabled".
pub const CM_PROB_DISABLED_SERVICE: u32 = 0x0000_0020;
/// Problem code: the driver set the device to failed after starting.
pub const CM_PROB_FAILED_POST_START: u32 = 0x0000_002B;

/// Health of the virtual display driver.
///
/// The discriminants are the process exit codes of `vdd driver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    Ok = 0,
    Inaccessible,
    Unknown,
    UnknownProblem,
    Disabled,
    DriverError,
    RestartRequired,
    DisabledService,
    NotInstalled,
}

impl DeviceStatus {
    /// Stable numeric code for CLI exit statuses.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// One-line hint telling the user what to do about this status.
    pub fn hint(self) -> &'static str {
        match self {
            Self::Ok => "The driver is ready",
            Self::Inaccessible => "The device manager could not be queried",
            Self::Unknown => "The driver is in an unknown state",
            Self::UnknownProblem => "The driver reported an unknown problem",
            Self::Disabled => "The driver is disabled, enable it in Device Manager",
            Self::DriverError => "The driver failed after starting, reinstall it",
            Self::RestartRequired => "Restart the computer to finish installing the driver",
            Self::DisabledService => "The driver service is disabled",
            Self::NotInstalled => "The driver is not found, please install it first",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Inaccessible => "Inaccessible",
            Self::Unknown => "Unknown",
            Self::UnknownProblem => "UnknownProblem",
            Self::Disabled => "Disabled",
            Self::DriverError => "DriverError",
            Self::RestartRequired => "RestartRequired",
            Self::DisabledService => "DisabledService",
            Self::NotInstalled => "NotInstalled",
        };
        f.write_str(name)
    }
}

/// Major/minor driver version. Purely informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverVersion {
    pub major: u16,
    pub minor: u16,
}

impl DriverVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Decodes a packed 64-bit driver version (`major.minor.build.revision`,
    /// 16 bits each, major in the top word).
    pub const fn from_packed(packed: u64) -> Self {
        Self {
            major: (packed >> 48) as u16,
            minor: (packed >> 32) as u16,
        }
    }

    /// Decodes the 32-bit value returned by the VERSION IOCTL.
    pub const fn from_ioctl(value: u32) -> Self {
        Self {
            major: (value >> 16) as u16,
            minor: value as u16,
        }
    }

    /// Parses a dotted version string such as `"0.45.0.0"`.
    ///
    /// Only the first two components are kept. Returns `None` if either
    /// of them is missing or not a number.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = parts.next()?.trim().parse().ok()?;
        Some(Self { major, minor })
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Raw `CM_Get_DevNode_Status` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevNodeStatus {
    pub flags: u32,
    pub problem: u32,
}

/// One device-manager entry under the queried class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    /// Opaque device instance handle, passed back to [`DeviceSource`].
    pub instance: u32,
    /// Every string of the entry's hardware id list.
    pub hardware_ids: Vec<String>,
    /// `None` when the node status could not be read.
    pub status: Option<DevNodeStatus>,
}

/// Read access to the OS device manager.
pub trait DeviceSource {
    /// Lists the present devices of a device class.
    ///
    /// An error means the enumeration itself failed.
    fn class_devices(&self, class_guid: &str) -> VddResult<Vec<DeviceNode>>;

    /// Reads the installed driver's version for a device.
    fn driver_version(&self, node: &DeviceNode) -> DriverVersion;
}

/// Maps device node status bits and problem code onto a [`DeviceStatus`].
pub fn classify(node: DevNodeStatus) -> DeviceStatus {
    if node.flags & (DN_DRIVER_LOADED | DN_STARTED) != 0 {
        return DeviceStatus::Ok;
    }
    if node.flags & DN_HAS_PROBLEM == 0 {
        return DeviceStatus::Unknown;
    }
    match node.problem {
        CM_PROB_NEED_RESTART => DeviceStatus::RestartRequired,
        CM_PROB_DISABLED | CM_PROB_HARDWARE_DISABLED => DeviceStatus::Disabled,
        CM_PROB_DISABLED_SERVICE => DeviceStatus::DisabledService,
        CM_PROB_FAILED_POST_START => DeviceStatus::DriverError,
        _ => DeviceStatus::UnknownProblem,
    }
}

/// Splits little-endian UTF-16 `REG_SZ`/`REG_MULTI_SZ` bytes into strings.
pub fn decode_multi_sz(bytes: &[u8]) -> Vec<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    units
        .split(|&u| u == 0)
        .take_while(|s| !s.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// Queries the driver status for the device matching `hardware_id` exactly.
///
/// Never fails: a failed enumeration is [`DeviceStatus::Inaccessible`], a
/// class without the hardware id (or whose node status cannot be read) is
/// [`DeviceStatus::NotInstalled`]. The version is only read for a match.
pub fn query_status(
    source: &impl DeviceSource,
    class_guid: &str,
    hardware_id: &str,
) -> (DeviceStatus, DriverVersion) {
    let nodes = match source.class_devices(class_guid) {
        Ok(nodes) => nodes,
        Err(e) => {
            tracing::debug!(error = %e, "device enumeration failed");
            return (DeviceStatus::Inaccessible, DriverVersion::default());
        }
    };

    let Some(node) = nodes
        .iter()
        .find(|n| n.hardware_ids.iter().any(|id| id == hardware_id))
    else {
        return (DeviceStatus::NotInstalled, DriverVersion::default());
    };

    match node.status {
        Some(bits) => (classify(bits), source.driver_version(node)),
        None => (DeviceStatus::NotInstalled, DriverVersion::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VddError;

    struct FakeDevices {
        nodes: Option<Vec<DeviceNode>>,
    }

    impl DeviceSource for FakeDevices {
        fn class_devices(&self, _class_guid: &str) -> VddResult<Vec<DeviceNode>> {
            self.nodes
                .clone()
                .ok_or_else(|| VddError::Os("SetupDiGetClassDevsW failed".into()))
        }

        fn driver_version(&self, _node: &DeviceNode) -> DriverVersion {
            DriverVersion::new(0, 45)
        }
    }

    fn node(ids: &[&str], status: Option<DevNodeStatus>) -> DeviceNode {
        DeviceNode {
            instance: 1,
            hardware_ids: ids.iter().map(|s| s.to_string()).collect(),
            status,
        }
    }

    fn problem(code: u32) -> Option<DevNodeStatus> {
        Some(DevNodeStatus {
            flags: DN_HAS_PROBLEM,
            problem: code,
        })
    }

    fn query(nodes: Option<Vec<DeviceNode>>) -> (DeviceStatus, DriverVersion) {
        query_status(&FakeDevices { nodes }, "class", r"Root\Parsec\VDA")
    }

    fn multi_sz(ids: &[String]) -> Vec<u8> {
        let mut units: Vec<u16> = Vec::new();
        for id in ids {
            units.extend(id.encode_utf16());
            units.push(0);
        }
        units.push(0);
        units.iter().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_long_hardware_id_lists() {
        // Arrange
        let mut ids: Vec<String> = (0..40)
            .map(|i| format!(r"ROOT\OTHER\DEVICE{i:04}"))
            .collect();
        ids.push(r"Root\Parsec\VDA".to_string());
        let bytes = multi_sz(&ids);

        // Act
        let decoded = decode_multi_sz(&bytes);

        // Assert
        assert!(bytes.len() > 1024);
        assert_eq!(decoded, ids);
        assert_eq!(decoded.last().map(String::as_str), Some(r"Root\Parsec\VDA"));
    }

    #[test]
    fn decodes_a_single_string() {
        let bytes: Vec<u8> = "Root\\Parsec\\VDA\0"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();

        assert_eq!(decode_multi_sz(&bytes), vec![r"Root\Parsec\VDA".to_string()]);
    }

    #[test]
    fn need_restart_problem_is_restart_required() {
        // Arrange
        let nodes = vec![node(&[r"Root\Parsec\VDA"], problem(CM_PROB_NEED_RESTART))];

        // Act
        let (status, _) = query(Some(nodes));

        // Assert
        assert_eq!(status, DeviceStatus::RestartRequired);
    }

    #[test]
    fn missing_hardware_id_is_not_installed() {
        let nodes = vec![node(&[r"PCI\VEN_10DE"], problem(CM_PROB_DISABLED))];

        let (status, version) = query(Some(nodes));

        assert_eq!(status, DeviceStatus::NotInstalled);
        assert_eq!(version, DriverVersion::default());
    }

    #[test]
    fn empty_class_is_not_installed() {
        assert_eq!(query(Some(Vec::new())).0, DeviceStatus::NotInstalled);
    }

    #[test]
    fn failed_enumeration_is_inaccessible() {
        assert_eq!(query(None).0, DeviceStatus::Inaccessible);
    }

    #[test]
    fn unreadable_node_status_is_not_installed() {
        let nodes = vec![node(&[r"Root\Parsec\VDA"], None)];

        assert_eq!(query(Some(nodes)).0, DeviceStatus::NotInstalled);
    }

    #[test]
    fn started_driver_is_ok_and_reports_version() {
        let bits = Some(DevNodeStatus {
            flags: DN_DRIVER_LOADED | DN_STARTED,
            problem: 0,
        });
        let nodes = vec![node(&[r"Root\Parsec\VDA"], bits)];

        let (status, version) = query(Some(nodes));

        assert_eq!(status, DeviceStatus::Ok);
        assert_eq!(version, DriverVersion::new(0, 45));
    }

    #[test]
    fn matches_any_string_of_a_multi_sz_list() {
        let bits = Some(DevNodeStatus {
            flags: DN_STARTED,
            problem: 0,
        });
        let nodes = vec![
            node(&[r"PCI\VEN_8086"], problem(CM_PROB_DISABLED)),
            node(&[r"Root\Other", r"Root\Parsec\VDA"], bits),
        ];

        assert_eq!(query(Some(nodes)).0, DeviceStatus::Ok);
    }

    #[test]
    fn hardware_id_match_is_exact() {
        let nodes = vec![node(&[r"root\parsec\vda"], problem(CM_PROB_DISABLED))];

        assert_eq!(query(Some(nodes)).0, DeviceStatus::NotInstalled);
    }

    #[test]
    fn problem_codes_map_to_statuses() {
        let cases = [
            (CM_PROB_DISABLED, DeviceStatus::Disabled),
            (CM_PROB_HARDWARE_DISABLED, DeviceStatus::Disabled),
            (CM_PROB_DISABLED_SERVICE, DeviceStatus::DisabledService),
            (CM_PROB_FAILED_POST_START, DeviceStatus::DriverError),
            (0x1, DeviceStatus::UnknownProblem),
        ];
        for (code, expected) in cases {
            let bits = DevNodeStatus {
                flags: DN_HAS_PROBLEM,
                problem: code,
            };
            assert_eq!(classify(bits), expected, "problem code {code:#x}");
        }
    }

    #[test]
    fn node_without_flags_is_unknown() {
        let bits = DevNodeStatus {
            flags: 0,
            problem: CM_PROB_DISABLED,
        };

        assert_eq!(classify(bits), DeviceStatus::Unknown);
    }

    #[test]
    fn version_from_ioctl_splits_words() {
        assert_eq!(
            DriverVersion::from_ioctl(0x0001_002D),
            DriverVersion::new(1, 45)
        );
    }

    #[test]
    fn version_from_packed_uses_top_words() {
        let packed = (45u64 << 32) | (7u64 << 16) | 1;

        assert_eq!(DriverVersion::from_packed(packed), DriverVersion::new(0, 45));
    }

    #[test]
    fn version_parses_dotted_string() {
        assert_eq!(DriverVersion::parse("0.45.0.0"), Some(DriverVersion::new(0, 45)));
        assert_eq!(DriverVersion::parse("garbage"), None);
        assert_eq!(DriverVersion::parse("1"), None);
    }

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(DeviceStatus::Ok.code(), 0);
        assert_eq!(DeviceStatus::NotInstalled.code(), 8);
    }
}
