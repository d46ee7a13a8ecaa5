//! Request/response protocol spoken with the driver.
//!
//! Every command sends a zero-padded 32-byte input buffer and reads at
//! most one little-endian `u32` back. The exchange itself (overlapped
//! `DeviceIoControl` with a bounded wait) lives behind [`DriverChannel`].

use std::time::Duration;

use thiserror::Error;

pub const IOCTL_ADD: u32 = 0x0022_E004;
pub const IOCTL_REMOVE: u32 = 0x0022_A008;
pub const IOCTL_UPDATE: u32 = 0x0022_A00C;
pub const IOCTL_VERSION: u32 = 0x0022_E010;

/// Size of the input buffer the driver expects for every command.
pub const INPUT_LEN: usize = 32;

const ADD_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// The four commands the driver understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    /// Plug in a new virtual display. Returns its index.
    Add,
    /// Unplug the display with this index.
    Remove(u16),
    /// Keep-alive ping. Displays expire without it.
    Update,
    /// Packed driver version.
    Version,
}

impl DriverCommand {
    pub fn code(self) -> u32 {
        match self {
            Self::Add => IOCTL_ADD,
            Self::Remove(_) => IOCTL_REMOVE,
            Self::Update => IOCTL_UPDATE,
            Self::Version => IOCTL_VERSION,
        }
    }

    /// How long to wait for the driver to complete the request.
    pub fn timeout(self) -> Duration {
        match self {
            Self::Add => ADD_TIMEOUT,
            _ => DEFAULT_TIMEOUT,
        }
    }

    /// The full input buffer. Only REMOVE carries a payload: its index,
    /// big-endian, in the first two bytes.
    pub fn input(self) -> [u8; INPUT_LEN] {
        let mut buf = [0u8; INPUT_LEN];
        if let Self::Remove(index) = self {
            buf[..2].copy_from_slice(&index.to_be_bytes());
        }
        buf
    }

    /// Number of output bytes the command produces.
    pub fn output_len(self) -> usize {
        match self {
            Self::Add | Self::Version => 4,
            Self::Remove(_) | Self::Update => 0,
        }
    }
}

/// Why a single exchange did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error("driver did not answer in time")]
    TimedOut,
    #[error("driver request failed: {0}")]
    Failed(String),
    #[error("driver handle is closed")]
    Closed,
}

/// An open communication handle to the driver.
pub trait DriverChannel: Send + Sync {
    /// Sends one command and waits at most [`DriverCommand::timeout`] for it.
    ///
    /// Returns the output value, or 0 when the command produces none.
    fn exchange(&self, command: DriverCommand) -> Result<u32, ExchangeError>;
}

/// Adds a display and pings the driver once. Returns the new index.
pub fn add(channel: &(impl DriverChannel + ?Sized)) -> Result<u32, ExchangeError> {
    let index = channel.exchange(DriverCommand::Add)?;
    ping_after(channel, "add");
    Ok(index)
}

/// Removes the display with `index` and pings the driver once.
pub fn remove(channel: &(impl DriverChannel + ?Sized), index: u16) -> Result<(), ExchangeError> {
    channel.exchange(DriverCommand::Remove(index))?;
    ping_after(channel, "remove");
    Ok(())
}

/// Sends the keep-alive ping.
pub fn update(channel: &(impl DriverChannel + ?Sized)) -> Result<(), ExchangeError> {
    channel.exchange(DriverCommand::Update).map(|_| ())
}

/// Reads the packed driver version.
pub fn version(channel: &(impl DriverChannel + ?Sized)) -> Result<u32, ExchangeError> {
    channel.exchange(DriverCommand::Version)
}

// The heartbeat retries on its next tick, so a failed follow-up ping is
// only worth a debug line.
fn ping_after(channel: &(impl DriverChannel + ?Sized), op: &str) {
    if let Err(e) = update(channel) {
        tracing::debug!(op, error = %e, "update after command failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        sent: Mutex<Vec<DriverCommand>>,
        fail: Option<u32>,
        reply: u32,
    }

    impl Recorder {
        fn new(reply: u32) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: None,
                reply,
            }
        }
    }

    impl DriverChannel for Recorder {
        fn exchange(&self, command: DriverCommand) -> Result<u32, ExchangeError> {
            self.sent.lock().unwrap().push(command);
            if self.fail == Some(command.code()) {
                return Err(ExchangeError::TimedOut);
            }
            Ok(if command.output_len() > 0 { self.reply } else { 0 })
        }
    }

    #[test]
    fn remove_payload_is_big_endian_and_padded() {
        let input = DriverCommand::Remove(0x0102).input();

        assert_eq!(input.len(), INPUT_LEN);
        assert_eq!(&input[..2], &[0x01, 0x02]);
        assert!(input[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn other_commands_send_an_empty_buffer() {
        for cmd in [DriverCommand::Add, DriverCommand::Update, DriverCommand::Version] {
            assert_eq!(cmd.input(), [0u8; INPUT_LEN]);
        }
    }

    #[test]
    fn add_gets_the_generous_timeout() {
        assert_eq!(DriverCommand::Add.timeout(), Duration::from_secs(5));
        assert_eq!(DriverCommand::Update.timeout(), Duration::from_secs(1));
        assert_eq!(DriverCommand::Remove(0).timeout(), Duration::from_secs(1));
    }

    #[test]
    fn add_returns_index_and_pings() {
        // Arrange
        let channel = Recorder::new(3);

        // Act
        let index = add(&channel);

        // Assert
        assert_eq!(index, Ok(3));
        assert_eq!(
            *channel.sent.lock().unwrap(),
            vec![DriverCommand::Add, DriverCommand::Update]
        );
    }

    #[test]
    fn failed_remove_skips_the_ping() {
        let mut channel = Recorder::new(0);
        channel.fail = Some(IOCTL_REMOVE);

        assert_eq!(remove(&channel, 1), Err(ExchangeError::TimedOut));
        assert_eq!(*channel.sent.lock().unwrap(), vec![DriverCommand::Remove(1)]);
    }

    #[test]
    fn failed_ping_does_not_fail_add() {
        let mut channel = Recorder::new(5);
        channel.fail = Some(IOCTL_UPDATE);

        assert_eq!(add(&channel), Ok(5));
    }
}
