use vdd_core::{VddResult, state};

#[path = "daemon_handlers.rs"]
mod daemon_handlers;
#[path = "daemon_ipc.rs"]
mod daemon_ipc;
#[path = "daemon_loop.rs"]
mod daemon_loop;
#[path = "daemon_threads.rs"]
mod daemon_threads;
#[path = "daemon_types.rs"]
mod daemon_types;

/// Runs the vdd daemon.
///
/// The daemon owns the driver session: virtual displays only live while
/// something keeps pinging the driver. Background threads run the IPC
/// listener and the topology watcher; the main thread serves commands.
pub fn run() -> VddResult<()> {
    state::write_pid_file()?;
    eprintln!("vdd daemon started.");

    let result = daemon_loop::daemon_loop();

    let _ = state::remove_pid_file();

    result
}
