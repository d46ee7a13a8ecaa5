//! [`TopologySource`] over the monitor service registry and GDI display
//! device enumeration.

use std::mem;

use vdd_core::topology::{AdapterEntry, MonitorEntry, NodeInfo, TopologySource};
use windows::Win32::Graphics::Gdi::{DISPLAY_DEVICEW, EnumDisplayDevicesW};
use windows::Win32::System::Registry::HKEY_LOCAL_MACHINE;
use windows::core::PCWSTR;

use crate::device::{self, from_wide};
use crate::registry::{RegKey, wide};

const MONITOR_ENUM_KEY: &str = r"SYSTEM\CurrentControlSet\Services\monitor\Enum";
/// Report the monitor's device interface path in `DeviceID`.
const EDD_GET_DEVICE_INTERFACE_NAME: u32 = 0x1;

pub struct OsTopology;

impl OsTopology {
    /// Child `index` of `parent`, or of the root (adapters) when `None`.
    fn display_device(parent: Option<&[u16]>, index: u32, flags: u32) -> Option<DISPLAY_DEVICEW> {
        let mut device = DISPLAY_DEVICEW {
            cb: mem::size_of::<DISPLAY_DEVICEW>() as u32,
            ..Default::default()
        };
        let name = parent.map_or(PCWSTR::null(), |p| PCWSTR(p.as_ptr()));
        // SAFETY: `name` is null or a NUL-terminated buffer that outlives the
        // call, and `cb` is set.
        unsafe { EnumDisplayDevicesW(name, index, &mut device, flags) }
            .as_bool()
            .then_some(device)
    }
}

impl TopologySource for OsTopology {
    fn monitor_paths(&self) -> Vec<String> {
        let Ok(key) = RegKey::open_read(HKEY_LOCAL_MACHINE, MONITOR_ENUM_KEY) else {
            return Vec::new();
        };
        let count = key.dword("Count").unwrap_or(0);
        (0..count)
            .map(|i| key.string(&i.to_string()).unwrap_or_default())
            .collect()
    }

    fn adapters(&self) -> Vec<AdapterEntry> {
        let mut adapters = Vec::new();

        for i in 0.. {
            let Some(adapter) = Self::display_device(None, i, 0) else {
                break;
            };
            let device_name = from_wide(&adapter.DeviceName);
            let parent = wide(&device_name);

            let mut monitors = Vec::new();
            for j in 0.. {
                let Some(monitor) =
                    Self::display_device(Some(&parent), j, EDD_GET_DEVICE_INTERFACE_NAME)
                else {
                    break;
                };
                monitors.push(MonitorEntry {
                    device_id: from_wide(&monitor.DeviceID),
                    state_flags: monitor.StateFlags.0,
                });
            }

            adapters.push(AdapterEntry {
                device_name,
                monitors,
            });
        }
        adapters
    }

    fn node_info(&self, path: &str) -> NodeInfo {
        let mut info = NodeInfo::default();
        let Some(instance) = device::locate(path) else {
            tracing::debug!(path, "monitor device node not found");
            return info;
        };
        info.last_arrival = device::last_arrival(instance).unwrap_or(0);

        if let Some(parent) = device::parent(instance) {
            info.adapter_instance = device::instance_id(parent).unwrap_or_default();
            info.adapter = device::description(parent).unwrap_or_default();
            info.adapter_arrival = device::last_arrival(parent).unwrap_or(0);
        }
        info
    }
}
