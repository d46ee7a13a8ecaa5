use vdd_core::ipc::{Command, ResponseData};

/// Prints the version the driver itself reports.
pub fn execute() {
    let response = super::request(Command::Version);
    if let Some(ResponseData::Version { version }) = response.data {
        println!("Driver version {version}");
    }
}
