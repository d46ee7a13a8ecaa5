use vdd_core::ipc::Command;
use vdd_core::state;

pub fn execute() {
    // Try graceful shutdown via IPC first.
    if vdd_windows::ipc::is_daemon_running() {
        match vdd_windows::ipc::send_command(&Command::Stop) {
            Ok(response) if response.is_ok() => {
                println!("vdd stopped. {}", response.message.unwrap_or_default());
                let _ = state::remove_pid_file();
                return;
            }
            Ok(response) => {
                eprintln!(
                    "Error: {}",
                    response.message.unwrap_or("unknown error".into())
                );
                return;
            }
            Err(e) => eprintln!("IPC failed: {e}"),
        }
    }

    // Fallback: the pipe is gone but the process may still be alive.
    match state::read_pid_file() {
        Ok(Some(pid)) if vdd_windows::process::is_process_alive(pid) => {
            if vdd_windows::process::kill_process(pid) {
                let _ = state::remove_pid_file();
                println!("vdd stopped (killed PID {pid}).");
            } else {
                eprintln!("Failed to kill process {pid}.");
                std::process::exit(1);
            }
        }
        _ => {
            println!("vdd is not running.");
        }
    }
}
