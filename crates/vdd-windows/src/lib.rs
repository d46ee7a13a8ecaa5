#![cfg(windows)]

/// Autostart via the HKCU Run key.
pub mod autostart;

/// [`vdd_core::DriverBackend`] over the Windows APIs.
pub mod backend;

/// Daemon main loop.
pub mod daemon;

/// SetupAPI and configuration manager access.
pub mod device;

/// Custom modes and parent GPU in the driver's registry parameters.
pub mod driver_settings;

/// Overlapped driver handle.
pub mod handle;

/// IPC via Named Pipes.
pub mod ipc;

/// Keep-awake requests.
pub mod power;

/// Process utilities (alive check, kill, elevation).
pub mod process;

mod registry;

/// GDI display settings.
pub mod settings;

/// Display topology enumeration.
pub mod topology;

pub use backend::WindowsBackend;
