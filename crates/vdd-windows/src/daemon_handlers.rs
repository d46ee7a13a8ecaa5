use vdd_core::config::DisplayConfig;
use vdd_core::ipc::{Command, Response, ResponseData};
use vdd_core::topology::DisplaySnapshot;
use vdd_core::{Controller, VddError, state};

use crate::backend::WindowsBackend;

/// Handles a CLI command and returns the response for the client.
pub(super) fn handle_command(
    command: &Command,
    controller: &Controller<WindowsBackend>,
) -> Response {
    match command {
        Command::Stop => {
            let count = controller.displays().count();
            if let Err(e) = state::write_display_count(count) {
                tracing::warn!(error = %e, "could not save display count");
            }
            Response::ok_with_message(format!("{count} display(s) will be restored on start."))
        }
        Command::Status => {
            let (driver, version) = controller.query_status();
            Response::ok_with_data(ResponseData::Status {
                driver,
                version,
                handle_open: controller.handle_open(),
            })
        }
        Command::Add => respond(controller.add_display(), |index| {
            Response::ok_with_data(ResponseData::Index { index })
        }),
        Command::Remove { index: Some(index) } => respond(controller.remove_display(*index), |()| {
            Response::ok_with_data(ResponseData::Index {
                index: u32::from(*index),
            })
        }),
        Command::Remove { index: None } => {
            respond(controller.remove_last_display(), |removed| match removed {
                Some(index) => Response::ok_with_data(ResponseData::Index {
                    index: u32::from(index),
                }),
                None => Response::ok_with_message("No virtual display to remove."),
            })
        }
        Command::RemoveAll => respond(controller.remove_all_displays(), |count| {
            Response::ok_with_message(format!("Removed {count} display(s)."))
        }),
        Command::Version => respond(controller.query_version(), |version| {
            Response::ok_with_data(ResponseData::Version { version })
        }),
        Command::Displays => Response::ok_with_data(ResponseData::Displays {
            snapshot: controller.displays(),
        }),
    }
}

fn respond<T>(result: Result<T, VddError>, ok: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => ok(value),
        Err(e) => Response::error(e.to_string()),
    }
}

/// Reacts to a topology change reported by the watcher.
pub(super) fn handle_topology(
    snapshot: &DisplaySnapshot,
    controller: &Controller<WindowsBackend>,
    config: &DisplayConfig,
) {
    tracing::info!(
        displays = snapshot.count(),
        no_monitors = snapshot.no_monitors,
        "display topology changed"
    );

    if snapshot.no_monitors && config.fallback_display {
        match controller.add_display() {
            Ok(index) => tracing::info!(index, "added fallback display"),
            Err(e) => tracing::warn!(error = %e, "could not add fallback display"),
        }
    }
}
