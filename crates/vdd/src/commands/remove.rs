use vdd_core::ipc::{Command, ResponseData};

/// Removes one display, the most recently added when `index` is `None`.
pub fn execute(index: Option<u16>) {
    let response = super::request(Command::Remove { index });
    match (response.data, response.message) {
        (Some(ResponseData::Index { index }), _) => println!("Removed virtual display {index}."),
        (_, Some(message)) => println!("{message}"),
        _ => println!("Removed a virtual display."),
    }
}

pub fn execute_all() {
    let response = super::request(Command::RemoveAll);
    if let Some(message) = response.message {
        println!("{message}");
    }
}
