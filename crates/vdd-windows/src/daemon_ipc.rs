use std::sync::mpsc;

use vdd_core::ipc::{Command, Response};

use crate::ipc::Listener;

use super::daemon_types::{DaemonMsg, ResponseSender};

/// Serves one pipe client at a time, relaying each command to the main
/// daemon thread. Returns after answering `Stop` or once the main thread
/// is gone.
pub(super) fn ipc_loop(tx: mpsc::Sender<DaemonMsg>) {
    loop {
        let listener = match Listener::bind() {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "failed to create pipe");
                return;
            }
        };

        let (command, responder) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "bad request on pipe");
                continue;
            }
        };
        tracing::debug!(?command, "command received");
        let stop_requested = matches!(command, Command::Stop);

        let Some(response) = relay(&tx, command) else {
            return;
        };
        if let Err(e) = responder.send(&response) {
            tracing::warn!(error = %e, "could not answer pipe client");
        }

        if stop_requested {
            return;
        }
    }
}

/// Hands `command` to the main loop and waits for its answer.
fn relay(tx: &mpsc::Sender<DaemonMsg>, command: Command) -> Option<Response> {
    let (reply_tx, reply_rx): (ResponseSender, _) = mpsc::channel();
    tx.send(DaemonMsg::Command(command, reply_tx)).ok()?;
    reply_rx.recv().ok()
}
