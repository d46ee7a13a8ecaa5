pub mod config;
pub mod controller;
pub mod display;
pub mod driver;
pub mod error;
pub mod ioctl;
pub mod ipc;
pub mod log;
pub mod mode;
pub mod mode_engine;
pub mod state;
pub mod status;
pub mod topology;

pub use config::Config;
pub use controller::{Controller, DriverBackend};
pub use display::Display;
pub use error::{Operation, VddError, VddResult};
pub use ipc::{Command, PIPE_NAME, Response, ResponseData};
pub use mode::{Mode, ModeRequest, ModeSet, Orientation};
pub use status::{DeviceStatus, DriverVersion};
pub use topology::DisplaySnapshot;
