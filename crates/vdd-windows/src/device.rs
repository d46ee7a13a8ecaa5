//! Device-manager access through SetupAPI and the configuration manager.

use std::mem;

use vdd_core::driver::parse_guid;
use vdd_core::status::{DevNodeStatus, DeviceNode, DeviceSource, decode_multi_sz};
use vdd_core::{DriverVersion, VddError, VddResult};
use windows::Win32::Devices::DeviceAndDriverInstallation::{
    CM_DEVNODE_STATUS_FLAGS, CM_Get_DevNode_PropertyW, CM_Get_DevNode_Status, CM_Get_Device_IDW,
    CM_Get_Parent, CM_LOCATE_DEVNODE_NORMAL, CM_Locate_DevNodeW, CM_PROB, CR_SUCCESS,
    DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO, MAX_DEVICE_ID_LEN, SETUP_DI_GET_CLASS_DEVS_FLAGS,
    SP_DEVICE_INTERFACE_DATA, SP_DEVICE_INTERFACE_DETAIL_DATA_W, SP_DEVINFO_DATA, SPDRP_HARDWAREID,
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInfo, SetupDiEnumDeviceInterfaces,
    SetupDiGetClassDevsW, SetupDiGetDeviceInterfaceDetailW, SetupDiGetDeviceRegistryPropertyW,
};
use windows::Win32::Devices::Properties::DEVPROPTYPE;
use windows::Win32::Foundation::DEVPROPKEY;
use windows::core::{GUID, PCWSTR};

use crate::registry::wide;

const LAST_ARRIVAL_DATE: DEVPROPKEY = DEVPROPKEY {
    fmtid: GUID::from_u128(0x83da6326_97a6_4088_9453_a1923f573b29),
    pid: 102,
};
const DEVICE_DESC: DEVPROPKEY = DEVPROPKEY {
    fmtid: GUID::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
    pid: 2,
};
const DRIVER_VERSION: DEVPROPKEY = DEVPROPKEY {
    fmtid: GUID::from_u128(0xa8b865dd_2e3d_4094_ad97_e593a70c75d6),
    pid: 3,
};

fn guid(text: &str) -> VddResult<GUID> {
    parse_guid(text)
        .map(GUID::from_u128)
        .ok_or_else(|| VddError::Os(format!("malformed GUID {text}")))
}

/// A SetupAPI device information set, destroyed on drop.
struct DeviceInfoSet(HDEVINFO);

impl DeviceInfoSet {
    fn open(guid: &GUID, flags: SETUP_DI_GET_CLASS_DEVS_FLAGS) -> VddResult<Self> {
        // SAFETY: SetupDiGetClassDevsW only reads the GUID. The returned set
        // is destroyed by Drop.
        let set = unsafe { SetupDiGetClassDevsW(Some(guid), PCWSTR::null(), None, flags) }
            .map_err(|e| VddError::Os(format!("SetupDiGetClassDevsW failed: {e}")))?;
        Ok(Self(set))
    }

    /// Hardware id strings of one device. Handles both `REG_SZ` and
    /// `REG_MULTI_SZ` data of any length.
    fn hardware_ids(&self, data: &SP_DEVINFO_DATA) -> Vec<String> {
        let mut required = 0u32;
        // SAFETY: size query only; no buffer is written.
        let _ = unsafe {
            SetupDiGetDeviceRegistryPropertyW(
                self.0,
                data,
                SPDRP_HARDWAREID,
                None,
                None,
                Some(&mut required),
            )
        };
        if required == 0 {
            return Vec::new();
        }

        let mut buffer = vec![0u8; required as usize];
        // SAFETY: `data` came from SetupDiEnumDeviceInfo on this set and the
        // buffer slice carries its own length.
        let read = unsafe {
            SetupDiGetDeviceRegistryPropertyW(
                self.0,
                data,
                SPDRP_HARDWAREID,
                None,
                Some(&mut buffer),
                None,
            )
        };
        if let Err(e) = read {
            tracing::debug!(error = %e, "could not read hardware ids");
            return Vec::new();
        }
        decode_multi_sz(&buffer)
    }
}

impl Drop for DeviceInfoSet {
    fn drop(&mut self) {
        // SAFETY: the set was created by `open` and is destroyed once.
        let _ = unsafe { SetupDiDestroyDeviceInfoList(self.0) };
    }
}

/// [`DeviceSource`] backed by SetupAPI.
pub struct SetupApiDevices;

impl DeviceSource for SetupApiDevices {
    fn class_devices(&self, class_guid: &str) -> VddResult<Vec<DeviceNode>> {
        let set = DeviceInfoSet::open(&guid(class_guid)?, DIGCF_PRESENT)?;
        let mut nodes = Vec::new();

        for index in 0.. {
            let mut data = SP_DEVINFO_DATA {
                cbSize: mem::size_of::<SP_DEVINFO_DATA>() as u32,
                ..Default::default()
            };
            // SAFETY: `data` is sized above; the set is valid while `set` lives.
            if unsafe { SetupDiEnumDeviceInfo(set.0, index, &mut data) }.is_err() {
                break;
            }
            nodes.push(DeviceNode {
                instance: data.DevInst,
                hardware_ids: set.hardware_ids(&data),
                status: node_status(data.DevInst),
            });
        }
        Ok(nodes)
    }

    fn driver_version(&self, node: &DeviceNode) -> DriverVersion {
        string_property(node.instance, &DRIVER_VERSION)
            .and_then(|text| DriverVersion::parse(&text))
            .unwrap_or_default()
    }
}

fn node_status(instance: u32) -> Option<DevNodeStatus> {
    let mut flags = CM_DEVNODE_STATUS_FLAGS::default();
    let mut problem = CM_PROB::default();
    // SAFETY: both out-pointers reference locals.
    let status = unsafe { CM_Get_DevNode_Status(&mut flags, &mut problem, instance, 0) };
    (status == CR_SUCCESS).then_some(DevNodeStatus {
        flags: flags.0,
        problem: problem.0,
    })
}

/// Lists the device paths of every present interface of `interface_guid`.
pub fn interface_paths(interface_guid: &str) -> VddResult<Vec<String>> {
    let interface = guid(interface_guid)?;
    let set = DeviceInfoSet::open(&interface, DIGCF_PRESENT | DIGCF_DEVICEINTERFACE)?;
    let mut paths = Vec::new();

    for index in 0.. {
        let mut iface = SP_DEVICE_INTERFACE_DATA {
            cbSize: mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
            ..Default::default()
        };
        // SAFETY: the set is valid and `iface` is sized above.
        if unsafe { SetupDiEnumDeviceInterfaces(set.0, None, &interface, index, &mut iface) }
            .is_err()
        {
            break;
        }

        let mut required = 0u32;
        // SAFETY: first call with no buffer only reports the required size.
        let _ = unsafe {
            SetupDiGetDeviceInterfaceDetailW(set.0, &iface, None, 0, Some(&mut required), None)
        };
        if required == 0 {
            continue;
        }

        // u32 storage keeps the detail struct aligned.
        let mut buffer = vec![0u32; (required as usize).div_ceil(4)];
        let detail = buffer.as_mut_ptr().cast::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>();
        // SAFETY: the buffer holds at least `required` bytes and is 4-byte
        // aligned, which is enough for the detail header.
        unsafe { (*detail).cbSize = mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32 };
        // SAFETY: `detail` points at `required` writable bytes with cbSize set.
        let filled = unsafe {
            SetupDiGetDeviceInterfaceDetailW(set.0, &iface, Some(detail), required, None, None)
        };
        if filled.is_ok() {
            // SAFETY: the call above wrote a NUL-terminated DevicePath.
            paths.push(unsafe { device_path(detail) });
        }
    }
    Ok(paths)
}

/// Reads the NUL-terminated `DevicePath` of a filled interface detail.
///
/// # Safety
/// `detail` must point to a detail struct filled by
/// `SetupDiGetDeviceInterfaceDetailW`.
unsafe fn device_path(detail: *const SP_DEVICE_INTERFACE_DETAIL_DATA_W) -> String {
    // SAFETY: the caller guarantees a filled struct; DevicePath is
    // NUL-terminated within the buffer the struct lives in.
    unsafe {
        let ptr = std::ptr::addr_of!((*detail).DevicePath).cast::<u16>();
        let mut len = 0;
        while *ptr.add(len) != 0 {
            len += 1;
        }
        String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
    }
}

/// Finds the device node of a device instance path.
pub fn locate(instance_path: &str) -> Option<u32> {
    let path = wide(instance_path);
    let mut instance = 0u32;
    // SAFETY: the path is NUL-terminated and the out-pointer is a local.
    let status = unsafe {
        CM_Locate_DevNodeW(&mut instance, PCWSTR(path.as_ptr()), CM_LOCATE_DEVNODE_NORMAL)
    };
    (status == CR_SUCCESS).then_some(instance)
}

pub fn parent(instance: u32) -> Option<u32> {
    let mut parent = 0u32;
    // SAFETY: the out-pointer is a local.
    let status = unsafe { CM_Get_Parent(&mut parent, instance, 0) };
    (status == CR_SUCCESS).then_some(parent)
}

/// Device instance id, e.g. `PCI\VEN_10DE&...`.
pub fn instance_id(instance: u32) -> Option<String> {
    let mut buffer = [0u16; MAX_DEVICE_ID_LEN as usize + 1];
    // SAFETY: the buffer slice carries its own length.
    let status = unsafe { CM_Get_Device_IDW(instance, &mut buffer, 0) };
    (status == CR_SUCCESS).then(|| from_wide(&buffer))
}

pub fn description(instance: u32) -> Option<String> {
    string_property(instance, &DEVICE_DESC)
}

/// `LastArrivalDate` as raw FILETIME ticks.
pub fn last_arrival(instance: u32) -> Option<u64> {
    let bytes = property(instance, &LAST_ARRIVAL_DATE, 8)?;
    let ticks: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(ticks))
}

fn string_property(instance: u32, key: &DEVPROPKEY) -> Option<String> {
    let bytes = property(instance, key, 512)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Some(from_wide(&units))
}

fn property(instance: u32, key: &DEVPROPKEY, capacity: usize) -> Option<Vec<u8>> {
    let mut kind = DEVPROPTYPE::default();
    let mut buffer = vec![0u8; capacity];
    let mut size = capacity as u32;
    // SAFETY: `size` is the buffer length; the call writes at most that.
    let status = unsafe {
        CM_Get_DevNode_PropertyW(
            instance,
            key,
            &mut kind,
            Some(buffer.as_mut_ptr()),
            &mut size,
            0,
        )
    };
    if status != CR_SUCCESS {
        return None;
    }
    buffer.truncate(size as usize);
    Some(buffer)
}

/// Decodes a NUL-terminated UTF-16 buffer.
pub(crate) fn from_wide(units: &[u16]) -> String {
    let len = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..len])
}
