use vdd_core::ModeRequest;
use vdd_core::mode_engine;
use vdd_windows::settings::GdiDisplaySettings;

/// Changes the resolution and/or refresh rate of a virtual display.
pub fn execute(index: u16, request: ModeRequest) {
    let display = super::driver_display(index);

    if mode_engine::change_mode(&GdiDisplaySettings, &display.device_name, request, None) {
        println!("Display {index} mode changed.");
    } else {
        eprintln!("Error: the display did not accept the mode.");
        std::process::exit(1);
    }
}
