//! Display topology resolution.
//!
//! Monitor entries enumerated per adapter are correlated with the
//! per-boot monitor enumeration order to get stable addresses, then
//! enriched with modes and device-node properties, sorted by adapter
//! arrival and numbered 1..N.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::display::{Display, parse_address, parse_display_code};
use crate::mode_engine::{DisplaySettings, current_and_supported};

/// `DISPLAY_DEVICE_ACTIVE`: the monitor is part of the desktop.
pub const MONITOR_ACTIVE: u32 = 0x1;
/// `DISPLAY_DEVICE_ATTACHED`: the monitor is connected.
pub const MONITOR_ATTACHED: u32 = 0x2;

/// A monitor entry enumerated under an adapter output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEntry {
    /// Interface id (`\\?\DISPLAY#...#{guid}`).
    pub device_id: String,
    pub state_flags: u32,
}

/// An adapter output and the monitors enumerated under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterEntry {
    /// Output name, e.g. `\\.\DISPLAY1`.
    pub device_name: String,
    pub monitors: Vec<MonitorEntry>,
}

/// Device-node properties of a monitor and its parent adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub last_arrival: u64,
    pub adapter: String,
    pub adapter_instance: String,
    pub adapter_arrival: u64,
}

/// OS access needed to resolve the topology.
pub trait TopologySource {
    /// Monitor instance paths in the per-boot enumeration order.
    fn monitor_paths(&self) -> Vec<String>;

    /// Every adapter output with its monitors.
    fn adapters(&self) -> Vec<AdapterEntry>;

    /// Device-node lookups for a monitor instance path. Missing
    /// properties are left at their defaults.
    fn node_info(&self, path: &str) -> NodeInfo;
}

/// The driver-owned displays at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub displays: Vec<Display>,
    /// The OS reported no monitors at all.
    pub no_monitors: bool,
}

impl DisplaySnapshot {
    /// Number of driver-owned displays.
    pub fn count(&self) -> usize {
        self.displays.len()
    }
}

/// Resolves every attached monitor into a [`Display`].
///
/// Each enumeration-order path is consumed at most once. The first active
/// monitor of an adapter output is the clone primary; every later active
/// monitor of that output is paired with it.
pub fn resolve(source: &impl TopologySource, settings: &impl DisplaySettings) -> Vec<Display> {
    let mut paths = source.monitor_paths();
    let mut displays: Vec<Display> = Vec::new();
    let mut clone_pairs: Vec<(usize, usize)> = Vec::new();

    for adapter in source.adapters() {
        let mut primary: Option<usize> = None;

        for monitor in &adapter.monitors {
            if monitor.state_flags & MONITOR_ATTACHED == 0 {
                continue;
            }
            let Some(pos) = paths
                .iter()
                .position(|p| interface_matches(&monitor.device_id, p))
            else {
                continue;
            };
            let path = paths.remove(pos);

            let mut display = Display {
                active: monitor.state_flags & MONITOR_ACTIVE != 0,
                address: parse_address(&path),
                device_name: adapter.device_name.clone(),
                display_name: parse_display_code(&monitor.device_id).to_string(),
                ..Display::default()
            };

            if display.active {
                match primary {
                    None => primary = Some(displays.len()),
                    Some(first) => clone_pairs.push((first, displays.len())),
                }

                let modes = current_and_supported(settings, &adapter.device_name);
                display.current_mode = modes.current;
                display.current_orientation = modes.orientation;
                display.mode_list = modes.list;
                display.supported_resolutions = modes.supported;
            }

            let info = source.node_info(&path);
            display.last_arrival = info.last_arrival;
            display.adapter = info.adapter;
            display.adapter_instance = info.adapter_instance;
            display.adapter_arrival = info.adapter_arrival;

            displays.push(display);
        }
    }

    number(displays, &clone_pairs)
}

/// Resolves the topology and keeps only the driver's own displays.
pub fn driver_displays(
    source: &impl TopologySource,
    settings: &impl DisplaySettings,
) -> DisplaySnapshot {
    let all = resolve(source, settings);
    let no_monitors = all.is_empty();
    DisplaySnapshot {
        displays: all.into_iter().filter(Display::is_ours).collect(),
        no_monitors,
    }
}

/// Case-insensitive containment of the `#`-separated form of `path`.
fn interface_matches(device_id: &str, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let needle = path.replace('\\', "#").to_ascii_lowercase();
    device_id.to_ascii_lowercase().contains(&needle)
}

fn display_order(a: &Display, b: &Display) -> Ordering {
    a.adapter_arrival
        .cmp(&b.adapter_arrival)
        .then_with(|| a.adapter_instance.cmp(&b.adapter_instance))
        .then_with(|| a.device_name.cmp(&b.device_name))
}

/// Sorts, assigns identifiers 1..N and applies the clone pairs.
fn number(mut displays: Vec<Display>, clone_pairs: &[(usize, usize)]) -> Vec<Display> {
    let mut order: Vec<usize> = (0..displays.len()).collect();
    order.sort_by(|&a, &b| display_order(&displays[a], &displays[b]));

    let mut identifiers = vec![0u32; displays.len()];
    for (rank, &slot) in order.iter().enumerate() {
        identifiers[slot] = rank as u32 + 1;
    }
    for (slot, display) in displays.iter_mut().enumerate() {
        display.identifier = identifiers[slot];
    }
    for &(first, second) in clone_pairs {
        displays[first].clone_of = identifiers[second];
        displays[second].clone_of = identifiers[first];
    }

    displays.sort_by_key(|d| d.identifier);
    displays
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::mode::{Mode, Orientation};
    use crate::mode_engine::{ModeIndex, RawMode};

    #[derive(Default)]
    struct FakeTopology {
        paths: Vec<String>,
        adapters: Vec<AdapterEntry>,
        nodes: HashMap<String, NodeInfo>,
    }

    impl FakeTopology {
        fn monitor(&mut self, output: &str, code: &str, uid: u32, flags: u32, node: NodeInfo) {
            let path = format!(r"DISPLAY\{code}\5&abc&0&UID{uid}");
            let device_id = format!(r"\\?\{}#{{e6f07b5f-ee97-4a90-b076-33f57bf4eaa7}}", path.replace('\\', "#"));
            self.paths.push(path.clone());
            self.nodes.insert(path, node);

            let monitor = MonitorEntry {
                device_id,
                state_flags: flags,
            };
            match self.adapters.iter_mut().find(|a| a.device_name == output) {
                Some(adapter) => adapter.monitors.push(monitor),
                None => self.adapters.push(AdapterEntry {
                    device_name: output.to_string(),
                    monitors: vec![monitor],
                }),
            }
        }
    }

    impl TopologySource for FakeTopology {
        fn monitor_paths(&self) -> Vec<String> {
            self.paths.clone()
        }

        fn adapters(&self) -> Vec<AdapterEntry> {
            self.adapters.clone()
        }

        fn node_info(&self, path: &str) -> NodeInfo {
            self.nodes.get(path).cloned().unwrap_or_default()
        }
    }

    struct FixedSettings;

    impl DisplaySettings for FixedSettings {
        fn mode(&self, _device: &str, index: ModeIndex) -> Option<RawMode> {
            let raw = RawMode {
                width: 1920,
                height: 1080,
                hz: 60,
                orientation: Orientation::Landscape,
            };
            match index {
                ModeIndex::Current | ModeIndex::Index(0) => Some(raw),
                ModeIndex::Index(_) => None,
            }
        }

        fn apply(&self, _device: &str, _mode: RawMode) -> bool {
            false
        }
    }

    const LIVE: u32 = MONITOR_ATTACHED | MONITOR_ACTIVE;

    fn node(adapter_arrival: u64, instance: &str) -> NodeInfo {
        NodeInfo {
            last_arrival: 1,
            adapter: "Parsec Virtual Display Adapter".into(),
            adapter_instance: instance.into(),
            adapter_arrival,
        }
    }

    #[test]
    fn two_active_monitors_on_one_output_form_a_clone_pair() {
        // Arrange
        let mut topo = FakeTopology::default();
        topo.monitor(r"\\.\DISPLAY1", "PSCCDD0", 256, LIVE, node(10, "ROOT\\DISPLAY\\0000"));
        topo.monitor(r"\\.\DISPLAY1", "PSCCDD0", 257, LIVE, node(10, "ROOT\\DISPLAY\\0000"));

        // Act
        let displays = resolve(&topo, &FixedSettings);

        // Assert
        assert_eq!(displays.len(), 2);
        let a = &displays[0];
        let b = &displays[1];
        assert_eq!(a.clone_of, b.identifier);
        assert_eq!(b.clone_of, a.identifier);
    }

    #[test]
    fn lone_active_monitor_is_not_a_clone() {
        let mut topo = FakeTopology::default();
        topo.monitor(r"\\.\DISPLAY1", "GSM5B08", 4660, LIVE, node(5, "PCI\\GPU"));
        topo.monitor(r"\\.\DISPLAY2", "PSCCDD0", 256, LIVE, node(10, "ROOT\\DISPLAY\\0000"));

        let displays = resolve(&topo, &FixedSettings);

        assert!(displays.iter().all(|d| d.clone_of == 0));
    }

    #[test]
    fn identifiers_are_dense_and_follow_adapter_arrival() {
        // Arrange
        let mut topo = FakeTopology::default();
        topo.monitor(r"\\.\DISPLAY3", "PSCCDD0", 257, LIVE, node(20, "ROOT\\DISPLAY\\0000"));
        topo.monitor(r"\\.\DISPLAY2", "PSCCDD0", 256, LIVE, node(20, "ROOT\\DISPLAY\\0000"));
        topo.monitor(r"\\.\DISPLAY1", "GSM5B08", 4660, LIVE, node(5, "PCI\\GPU"));

        // Act
        let displays = resolve(&topo, &FixedSettings);

        // Assert
        let ids: Vec<u32> = displays.iter().map(|d| d.identifier).collect();
        let names: Vec<&str> = displays.iter().map(|d| d.device_name.as_str()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(names, vec![r"\\.\DISPLAY1", r"\\.\DISPLAY2", r"\\.\DISPLAY3"]);
    }

    #[test]
    fn detached_and_unmatched_monitors_are_skipped() {
        let mut topo = FakeTopology::default();
        topo.monitor(r"\\.\DISPLAY1", "PSCCDD0", 256, MONITOR_ACTIVE, node(1, "A"));
        topo.monitor(r"\\.\DISPLAY2", "PSCCDD0", 257, LIVE, node(1, "A"));
        topo.paths.clear();

        assert!(resolve(&topo, &FixedSettings).is_empty());
    }

    #[test]
    fn inactive_monitor_keeps_default_mode() {
        let mut topo = FakeTopology::default();
        topo.monitor(r"\\.\DISPLAY1", "PSCCDD0", 256, MONITOR_ATTACHED, node(1, "A"));
        topo.monitor(r"\\.\DISPLAY2", "PSCCDD0", 257, LIVE, node(1, "A"));

        let displays = resolve(&topo, &FixedSettings);

        assert!(!displays[0].active);
        assert_eq!(displays[0].current_mode, Mode::default());
        assert_eq!(displays[0].adapter_instance, "A");
        assert_eq!(displays[1].current_mode, Mode::new(1920, 1080, 60));
        assert_eq!(displays[1].supported_resolutions.len(), 1);
    }

    #[test]
    fn snapshot_filters_foreign_monitors() {
        let mut topo = FakeTopology::default();
        topo.monitor(r"\\.\DISPLAY1", "GSM5B08", 4660, LIVE, node(5, "PCI\\GPU"));
        topo.monitor(r"\\.\DISPLAY2", "PSCCDD0", 256, LIVE, node(10, "ROOT"));

        let snapshot = driver_displays(&topo, &FixedSettings);

        assert_eq!(snapshot.count(), 1);
        assert_eq!(snapshot.displays[0].driver_index(), Some(0));
        assert!(!snapshot.no_monitors);
    }

    #[test]
    fn empty_topology_reports_no_monitors() {
        let snapshot = driver_displays(&FakeTopology::default(), &FixedSettings);

        assert!(snapshot.no_monitors);
        assert!(snapshot.displays.is_empty());
    }
}
