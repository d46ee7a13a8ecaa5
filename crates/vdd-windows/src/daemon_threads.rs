use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use vdd_core::DriverBackend;
use vdd_core::topology::DisplaySnapshot;

use crate::backend::WindowsBackend;

use super::daemon_ipc;
use super::daemon_types::DaemonMsg;

/// Spawns the IPC listener thread.
pub(super) fn spawn_ipc_listener(tx: mpsc::Sender<DaemonMsg>) -> thread::JoinHandle<()> {
    thread::spawn(move || daemon_ipc::ipc_loop(tx))
}

/// Spawns the topology watcher.
///
/// Resolves the driver displays every `period` and sends a fresh snapshot
/// whenever it differs from the previous one. The first resolution is
/// always sent.
pub(super) fn spawn_topology_watcher(
    tx: mpsc::Sender<DaemonMsg>,
    period: Duration,
) -> (Arc<AtomicBool>, thread::JoinHandle<()>) {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let handle = thread::spawn(move || {
        let mut last: Option<DisplaySnapshot> = None;
        while !stop_flag.load(Ordering::Relaxed) {
            let snapshot = WindowsBackend.displays();
            if last.as_ref() != Some(&snapshot) {
                last = Some(snapshot.clone());
                if tx.send(DaemonMsg::Topology(snapshot)).is_err() {
                    break;
                }
            }
            sleep_unless_stopped(&stop_flag, period);
        }
    });
    (stop, handle)
}

/// Sleeps in short slices so a stop request is noticed quickly.
fn sleep_unless_stopped(stop: &AtomicBool, period: Duration) {
    let slice = Duration::from_millis(50);
    let mut slept = Duration::ZERO;
    while slept < period && !stop.load(Ordering::Relaxed) {
        thread::sleep(slice);
        slept += slice;
    }
}
