use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

use vdd_core::ipc::Command;
use vdd_core::{Controller, VddResult, config, state};

use crate::backend::WindowsBackend;
use crate::power;

use super::daemon_handlers;
use super::daemon_threads;
use super::daemon_types::DaemonMsg;

/// How long a starting daemon waits for the driver before giving up on
/// restoring the saved displays.
const RESTORE_WAIT: Duration = Duration::from_secs(5);

/// The inner daemon loop, separated so cleanup always runs in `run()`.
pub(super) fn daemon_loop() -> VddResult<()> {
    let config = config::load();
    vdd_core::log::init(&config.logging);

    tracing::info!(pid = std::process::id(), "daemon started");
    tracing::info!(
        heartbeat_ms = config.controller.heartbeat_ms,
        status_poll_ms = config.controller.status_poll_ms,
        max_displays = config.controller.max_displays,
        restore_count = config.displays.restore_count,
        fallback_display = config.displays.fallback_display,
        "config loaded"
    );

    let controller = Controller::new(WindowsBackend, config.controller.clone());
    controller.start()?;

    if config.displays.keep_screen_on {
        power::keep_screen_on();
    }

    let (tx, rx) = mpsc::channel::<DaemonMsg>();

    // Start the IPC listener on its own thread.
    let ipc_thread = daemon_threads::spawn_ipc_listener(tx.clone());

    if config.displays.restore_count {
        restore_displays(&controller);
    }

    let (watcher_stop, watcher_thread) = daemon_threads::spawn_topology_watcher(
        tx.clone(),
        Duration::from_millis(config.displays.watch_ms),
    );

    // Main processing loop. Blocks until a message arrives.
    while let Ok(msg) = rx.recv() {
        match msg {
            DaemonMsg::Command(command, reply_tx) => {
                let response = daemon_handlers::handle_command(&command, &controller);
                let _ = reply_tx.send(response);
                if matches!(command, Command::Stop) {
                    break;
                }
            }
            DaemonMsg::Topology(snapshot) => {
                daemon_handlers::handle_topology(&snapshot, &controller, &config.displays);
            }
        }
    }

    watcher_stop.store(true, Ordering::Relaxed);
    drop(tx);
    let _ = watcher_thread.join();
    let _ = ipc_thread.join();

    controller.stop();
    if config.displays.keep_screen_on {
        power::allow_screen_off();
    }
    tracing::info!("daemon stopped");

    Ok(())
}

/// Re-adds the display count saved at the last shutdown.
fn restore_displays(controller: &Controller<WindowsBackend>) {
    let saved = match state::read_display_count() {
        Ok(0) => return,
        Ok(saved) => saved,
        Err(e) => {
            tracing::warn!(error = %e, "could not read saved display count");
            return;
        }
    };

    if !controller.wait_ready(RESTORE_WAIT) {
        tracing::warn!(saved, "driver not ready, displays not restored");
        return;
    }

    let present = controller.displays().count();
    for _ in present..saved {
        if let Err(e) = controller.add_display() {
            tracing::warn!(error = %e, "could not restore display");
            break;
        }
    }
    tracing::info!(saved, present, "displays restored");
}
