use vdd_core::{Display, DriverBackend};
use vdd_windows::WindowsBackend;

/// Lists the virtual displays, or every attached display with `all`.
pub fn execute(all: bool) {
    let displays = if all {
        vdd_windows::backend::all_displays()
    } else {
        WindowsBackend.displays().displays
    };

    if displays.is_empty() {
        println!(
            "{}",
            if all {
                "No displays found."
            } else {
                "No virtual displays."
            }
        );
        return;
    }

    for display in &displays {
        println!("{}", describe(display));
    }
}

fn describe(display: &Display) -> String {
    let index = display
        .driver_index()
        .filter(|_| display.is_ours())
        .map_or_else(|| "-".to_string(), |i| i.to_string());

    if !display.active {
        return format!("{index:>3}  {display}  inactive");
    }
    format!(
        "{index:>3}  {display}  {}  {}",
        display.current_mode, display.current_orientation
    )
}
