use vdd_core::mode_engine;
use vdd_core::{ModeRequest, Orientation};
use vdd_windows::settings::GdiDisplaySettings;

pub fn execute(index: u16, orientation: Orientation) {
    let display = super::driver_display(index);

    let rotated = mode_engine::change_mode(
        &GdiDisplaySettings,
        &display.device_name,
        ModeRequest::default(),
        Some(orientation),
    );
    if rotated {
        println!("Display {index} rotated to {orientation}.");
    } else {
        eprintln!("Error: the display could not be rotated.");
        std::process::exit(1);
    }
}
