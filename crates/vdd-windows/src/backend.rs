//! Windows implementation of [`DriverBackend`].

use vdd_core::driver::{CLASS_GUID, HARDWARE_ID};
use vdd_core::topology::{self, DisplaySnapshot};
use vdd_core::{DeviceStatus, Display, DriverBackend, DriverVersion, VddResult, status};

use crate::device::SetupApiDevices;
use crate::handle::DeviceHandle;
use crate::settings::GdiDisplaySettings;
use crate::topology::OsTopology;

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsBackend;

impl DriverBackend for WindowsBackend {
    type Channel = DeviceHandle;

    fn query_status(&self) -> (DeviceStatus, DriverVersion) {
        query_status()
    }

    fn open_channel(&self) -> VddResult<DeviceHandle> {
        DeviceHandle::open()
    }

    fn displays(&self) -> DisplaySnapshot {
        topology::driver_displays(&OsTopology, &GdiDisplaySettings)
    }
}

/// Probes the driver without a controller, e.g. for `vdd driver`.
pub fn query_status() -> (DeviceStatus, DriverVersion) {
    status::query_status(&SetupApiDevices, CLASS_GUID, HARDWARE_ID)
}

/// Every attached display, the driver's and the physical ones.
pub fn all_displays() -> Vec<Display> {
    topology::resolve(&OsTopology, &GdiDisplaySettings)
}
