use std::fmt;

use thiserror::Error;

use crate::status::DeviceStatus;

/// Result alias used by every fallible operation in the workspace.
pub type VddResult<T> = Result<T, VddError>;

/// Driver operations that can fail after the exchange was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddDisplay,
    RemoveDisplay,
    QueryVersion,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddDisplay => f.write_str("add display"),
            Self::RemoveDisplay => f.write_str("remove display"),
            Self::QueryVersion => f.write_str("query driver version"),
        }
    }
}

/// Errors surfaced to callers of the controller and the CLI.
#[derive(Debug, Error)]
pub enum VddError {
    /// An operation needed the driver but its status is not `OK`.
    #[error("driver is not ready (status: {0})")]
    DriverStatus(DeviceStatus),

    /// The status was `OK` but no device handle could be opened.
    #[error("failed to obtain the driver device handle")]
    HandleAcquisition,

    /// Adding another display would exceed the driver limit.
    #[error("exceeded limit ({0}), could not add more displays")]
    ExceededDisplayLimit(u32),

    /// The IOCTL exchange completed with a failure or timed out.
    #[error("failed to {0}")]
    OperationFailed(Operation),

    /// No driver-owned display has the given index.
    #[error("display index {0} is not found")]
    DisplayNotFound(u16),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A Win32 call failed.
    #[error("{0}")]
    Os(String),
}

impl VddError {
    /// Wraps any displayable OS error.
    pub fn os(err: impl fmt::Display) -> Self {
        Self::Os(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_status_error_names_the_status() {
        let err = VddError::DriverStatus(DeviceStatus::Disabled);

        assert_eq!(err.to_string(), "driver is not ready (status: Disabled)");
    }

    #[test]
    fn limit_error_reports_the_limit() {
        let err = VddError::ExceededDisplayLimit(8);

        assert!(err.to_string().contains("(8)"));
    }
}
