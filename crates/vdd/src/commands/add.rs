use vdd_core::ipc::{Command, ResponseData};

/// Asks the daemon to plug in a new virtual display.
pub fn execute() {
    let response = super::request(Command::Add);
    match response.data {
        Some(ResponseData::Index { index }) => println!("Added virtual display {index}."),
        _ => println!("Added a virtual display."),
    }
}
