use std::os::windows::process::CommandExt;
use std::process::{Command, Stdio};

use vdd_core::{config, state};

/// Windows process creation flags for launching a fully detached daemon.
///
/// `CREATE_NEW_PROCESS_GROUP` (0x200): the daemon gets its own process
/// group, so Ctrl+C in the CLI terminal won't kill it.
///
/// `CREATE_NO_WINDOW` (0x08000000): the daemon doesn't get a console
/// window and does not inherit the parent's console handles.
const DETACH_FLAGS: u32 = 0x08000000 | 0x00000200;

pub fn execute() {
    if vdd_windows::ipc::is_daemon_running() {
        println!("vdd is already running.");
        return;
    }

    // Clean up stale PID file from a previous unclean shutdown
    if let Ok(Some(pid)) = state::read_pid_file() {
        if vdd_windows::process::is_process_alive(pid) {
            println!("vdd process exists (PID: {pid}) but is not responding.");
            return;
        }
        let _ = state::remove_pid_file();
    }

    let config = config::load();
    if !config.displays.skip_driver_check {
        let (status, _) = vdd_windows::backend::query_status();
        if !status.is_ok() {
            eprintln!("Driver status: {status}. {}", status.hint());
            std::process::exit(status.code());
        }
    }

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("Error: could not resolve exe path: {e}");
            std::process::exit(1);
        }
    };

    // Re-run ourselves with the hidden `daemon` subcommand, detached so
    // the daemon outlives this process.
    let spawned = Command::new(exe)
        .arg("daemon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(DETACH_FLAGS)
        .spawn();

    match spawned {
        Ok(mut child) => {
            let pid = child.id();
            let _ = child.try_wait();
            println!("vdd daemon started (PID: {pid}).");
        }
        Err(e) => {
            eprintln!("Error: failed to start daemon: {e}");
            std::process::exit(1);
        }
    }
}
