use vdd_core::ipc::{Command, ResponseData};
use vdd_core::state;

/// Reports daemon liveness, then the driver status.
pub fn execute() {
    if vdd_windows::ipc::is_daemon_running() {
        println!("vdd is running.");
        print_session();
        return;
    }

    // Pipe isn't responding, so check for a stale PID file.
    if let Ok(Some(pid)) = state::read_pid_file() {
        if vdd_windows::process::is_process_alive(pid) {
            println!("vdd process exists (PID: {pid}) but is not responding.");
        } else {
            let _ = state::remove_pid_file();
            println!("vdd is not running (cleaned up stale PID file).");
        }
    } else {
        println!("vdd is not running.");
    }

    let (status, version) = vdd_windows::backend::query_status();
    println!("Driver:  {status} ({version})");
}

fn print_session() {
    match vdd_windows::ipc::send_command(&Command::Status) {
        Ok(response) => {
            if let Some(ResponseData::Status {
                driver,
                version,
                handle_open,
            }) = response.data
            {
                println!("Driver:  {driver} ({version})");
                println!(
                    "Handle:  {}",
                    if handle_open { "open" } else { "closed" }
                );
            }
        }
        Err(e) => eprintln!("Could not query the daemon: {e}"),
    }
}
