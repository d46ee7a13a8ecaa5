use serde::{Deserialize, Serialize};

use crate::status::{DeviceStatus, DriverVersion};
use crate::topology::DisplaySnapshot;

/// The named pipe path used for IPC between CLI and daemon.
pub const PIPE_NAME: &str = r"\\.\pipe\vdd";

/// A command sent from the CLI to the daemon.
///
/// Serialized as one line of JSON over the named pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    /// Request the daemon to stop.
    Stop,
    /// Request the daemon's current status.
    Status,
    /// Plug in a new virtual display.
    Add,
    /// Unplug a display by driver index, or the last one when `None`.
    Remove { index: Option<u16> },
    /// Unplug every virtual display.
    RemoveAll,
    /// Query the driver version through the open handle.
    Version,
    /// List the driver-owned displays.
    Displays,
}

/// A response sent from the daemon back to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the command succeeded.
    pub status: ResponseStatus,
    /// Optional human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured result, for commands that return one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

/// Status of a daemon response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Structured payloads carried by a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseData {
    Status {
        driver: DeviceStatus,
        version: DriverVersion,
        handle_open: bool,
    },
    Index {
        index: u32,
    },
    Version {
        version: DriverVersion,
    },
    Displays {
        snapshot: DisplaySnapshot,
    },
}

impl Response {
    /// Creates a successful response with no message.
    pub fn ok() -> Self {
        Self {
            status: ResponseStatus::Ok,
            message: None,
            data: None,
        }
    }

    /// Creates a successful response with a message.
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// Creates a successful response carrying data.
    pub fn ok_with_data(data: ResponseData) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_tagged_json() {
        let json = serde_json::to_string(&Command::Remove { index: Some(2) }).unwrap();

        assert_eq!(json, r#"{"command":"Remove","index":2}"#);
        assert_eq!(serde_json::from_str::<Command>(&json).unwrap(), Command::Remove {
            index: Some(2)
        });
    }

    #[test]
    fn plain_ok_omits_optional_fields() {
        let json = serde_json::to_string(&Response::ok()).unwrap();

        assert_eq!(json, r#"{"status":"ok"}"#);
    }

    #[test]
    fn data_survives_the_pipe() {
        let response = Response::ok_with_data(ResponseData::Version {
            version: DriverVersion::new(0, 45),
        });

        let line = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&line).unwrap();

        assert!(back.is_ok());
        assert_eq!(
            back.data,
            Some(ResponseData::Version {
                version: DriverVersion::new(0, 45)
            })
        );
    }

    #[test]
    fn error_carries_message() {
        let response = Response::error("driver is not ready (status: Disabled)");

        assert!(!response.is_ok());
        assert_eq!(
            response.message.as_deref(),
            Some("driver is not ready (status: Disabled)")
        );
    }
}
