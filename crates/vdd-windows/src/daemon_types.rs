use std::sync::mpsc;

use vdd_core::ipc::{Command, Response};
use vdd_core::topology::DisplaySnapshot;

/// Internal message type for the main daemon thread.
pub(super) enum DaemonMsg {
    /// A CLI command with a callback to send the response.
    Command(Command, ResponseSender),
    /// The driver-owned displays changed.
    Topology(DisplaySnapshot),
}

/// Sends a response back to the IPC thread for the connected client.
pub(super) type ResponseSender = mpsc::Sender<Response>;
