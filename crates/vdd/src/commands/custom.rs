use vdd_core::driver::{MAX_CUSTOM_MODES, ParentGpu};
use vdd_core::mode::{dump_modes, parse_modes};
use vdd_core::{Mode, ModeRequest};
use vdd_windows::driver_settings;

pub fn show() {
    let modes = driver_settings::custom_modes();
    if modes.is_empty() {
        println!("No custom modes.");
    }
    for (slot, mode) in modes.iter().enumerate() {
        println!("{slot}: {mode}");
    }
    println!("Parent GPU: {}", driver_settings::parent_gpu());
}

/// Validates the modes here, then writes them from an elevated copy of
/// this executable since the settings live under HKLM.
pub fn set(modes: &[String], gpu: Option<ParentGpu>) {
    if modes.is_empty() && gpu.is_none() {
        eprintln!("Error: give at least one mode or --gpu.");
        std::process::exit(1);
    }
    if modes.len() > MAX_CUSTOM_MODES {
        eprintln!("Error: at most {MAX_CUSTOM_MODES} custom modes are supported.");
        std::process::exit(1);
    }

    let parsed = match modes
        .iter()
        .map(|m| parse_full_mode(m))
        .collect::<Result<Vec<Mode>, String>>()
    {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut args = String::from("apply-custom");
    if !parsed.is_empty() {
        args.push_str(&format!(" --modes {}", dump_modes(&parsed)));
    }
    if let Some(gpu) = gpu {
        args.push_str(&format!(" --gpu {gpu}"));
    }

    match vdd_windows::process::run_elevated(&args) {
        Ok(0) => println!("Driver settings saved. They take effect when the driver restarts."),
        Ok(code) => {
            eprintln!("Error: writing driver settings failed (exit code {code}).");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Writes the settings. Runs in the elevated process started by [`set`].
pub fn apply(modes: Option<&str>, gpu: Option<ParentGpu>) {
    let result = modes
        .map_or(Ok(()), |hex| driver_settings::set_custom_modes(&parse_modes(hex)))
        .and_then(|()| gpu.map_or(Ok(()), driver_settings::set_parent_gpu));

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn parse_full_mode(text: &str) -> Result<Mode, String> {
    let request: ModeRequest = text.parse()?;
    request
        .complete()
        .ok_or_else(|| format!("custom mode '{text}' needs WxH@R"))
}
