pub mod add;
pub mod autostart;
pub mod custom;
pub mod daemon;
pub mod driver;
pub mod init;
pub mod list;
pub mod remove;
pub mod rotate;
pub mod set;
pub mod start;
pub mod status;
pub mod stop;
pub mod version;

use vdd_core::ipc::{Command, Response};
use vdd_core::{Display, DriverBackend, VddError};
use vdd_windows::WindowsBackend;

/// Sends a command to the running daemon and returns its successful
/// response. Exits the process on any failure.
pub(crate) fn request(command: Command) -> Response {
    if !vdd_windows::ipc::is_daemon_running() {
        eprintln!("vdd is not running. Start it with 'vdd start'.");
        std::process::exit(1);
    }

    match vdd_windows::ipc::send_command(&command) {
        Ok(response) if response.is_ok() => response,
        Ok(response) => {
            eprintln!(
                "Error: {}",
                response.message.unwrap_or("unknown error".into())
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to reach the daemon: {e}");
            std::process::exit(1);
        }
    }
}

/// Finds a virtual display by driver index. Exits when there is none.
pub(crate) fn driver_display(index: u16) -> Display {
    let snapshot = WindowsBackend.displays();
    match snapshot
        .displays
        .into_iter()
        .find(|d| d.driver_index() == Some(index))
    {
        Some(display) => display,
        None => {
            eprintln!("Error: {}", VddError::DisplayNotFound(index));
            std::process::exit(1);
        }
    }
}
