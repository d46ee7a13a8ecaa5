use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::MAX_DISPLAYS;
use crate::log::LogConfig;

/// Monitors the adapter can host at most.
const ADAPTER_MONITORS: u32 = 16;

/// Top-level configuration for vdd.
///
/// Loaded from `~/.config/vdd/config.toml`. Missing sections
/// fall back to defaults thanks to `#[serde(default)]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Driver session timing and limits.
    pub controller: ControllerConfig,
    /// Daemon display policies.
    pub displays: DisplayConfig,
    /// File logging.
    pub logging: LogConfig,
}

/// Driver session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Period of the keep-alive ping in milliseconds.
    pub heartbeat_ms: u64,
    /// Period of the driver status poll in milliseconds.
    pub status_poll_ms: u64,
    /// Virtual displays allowed at once.
    pub max_displays: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: 100,
            status_poll_ms: 2000,
            max_displays: MAX_DISPLAYS,
        }
    }
}

impl ControllerConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }
}

/// What the daemon does with displays on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Re-add the display count saved at the last daemon shutdown.
    pub restore_count: bool,
    /// Add a virtual display when the OS reports no monitors at all.
    pub fallback_display: bool,
    /// Keep the screen from turning off while the daemon runs.
    pub keep_screen_on: bool,
    /// Start the daemon even when the driver is not ready.
    pub skip_driver_check: bool,
    /// Topology watcher period in milliseconds.
    pub watch_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            restore_count: true,
            fallback_display: false,
            keep_screen_on: false,
            skip_driver_check: false,
            watch_ms: 2000,
        }
    }
}

impl Config {
    /// Clamps values to ranges the driver session tolerates.
    ///
    /// The heartbeat must stay well under the driver's expiry window and
    /// the display limit cannot exceed what the adapter hosts.
    pub fn validate(&mut self) {
        let c = &mut self.controller;
        c.heartbeat_ms = c.heartbeat_ms.clamp(10, 1000);
        c.status_poll_ms = c.status_poll_ms.clamp(250, 60_000);
        c.max_displays = c.max_displays.clamp(1, ADAPTER_MONITORS);
        self.displays.watch_ms = self.displays.watch_ms.clamp(250, 60_000);
    }
}

/// Returns the config directory: `~/.config/vdd/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config").join("vdd"))
}

/// Returns the config file path: `~/.config/vdd/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Tries to load and parse `config.toml`.
///
/// Returns an error string describing what went wrong (IO error,
/// parse error, etc.).
pub fn try_load() -> Result<Config, String> {
    let path = config_path().ok_or("could not determine config path")?;
    let content = std::fs::read_to_string(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    parse(&content).map_err(|e| format!("{}: {e}", path.display()))
}

/// Parses config text and clamps it.
pub fn parse(content: &str) -> Result<Config, toml::de::Error> {
    let mut config: Config = toml::from_str(content)?;
    config.validate();
    Ok(config)
}

/// Loads the configuration from disk, falling back to defaults.
///
/// A missing file silently returns defaults; other errors are printed.
pub fn load() -> Config {
    let missing = config_path().is_none_or(|p| !p.exists());
    if missing {
        return Config::default();
    }
    match try_load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {e}");
            Config::default()
        }
    }
}

/// Generates the default `config.toml` contents with explanatory comments.
///
/// Used by `vdd init` to create a starter file.
pub fn generate_config() -> String {
    r##"# vdd configuration
# Location: ~/.config/vdd/config.toml

[controller]
# Keep-alive ping period in milliseconds. The driver removes its
# displays when it stops hearing from us.
heartbeat_ms = 100
# How often the driver status is polled, in milliseconds.
status_poll_ms = 2000
# Maximum number of virtual displays (1 to 16).
max_displays = 8

[displays]
# Re-add the number of displays that were present when the daemon stopped.
restore_count = true
# Add a virtual display when no monitor is connected at all.
fallback_display = false
# Prevent the screen from turning off while the daemon runs.
keep_screen_on = false
# Start the daemon even if the driver is not ready yet.
skip_driver_check = false
# How often the display topology is checked for changes, in milliseconds.
watch_ms = 2000

[logging]
# Enable file logging to ~/.config/vdd/logs/vdd.log.
enabled = false
# Minimum log level: "debug", "info", "warn", or "error".
# RUST_LOG overrides this when set.
level = "info"
# Maximum log file size in MB before rotation.
max_file_mb = 10
"##
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let config = parse(&generate_config()).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = parse("[displays]\nfallback_display = true\n").unwrap();

        assert!(config.displays.fallback_display);
        assert!(config.displays.restore_count);
        assert_eq!(config.controller, ControllerConfig::default());
        assert!(!config.logging.enabled);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        // Arrange
        let text = "[controller]\nheartbeat_ms = 0\nstatus_poll_ms = 1\nmax_displays = 99\n";

        // Act
        let config = parse(text).unwrap();

        // Assert
        assert_eq!(config.controller.heartbeat_ms, 10);
        assert_eq!(config.controller.status_poll_ms, 250);
        assert_eq!(config.controller.max_displays, 16);
    }

    #[test]
    fn durations_follow_milliseconds() {
        let c = ControllerConfig::default();

        assert_eq!(c.heartbeat(), Duration::from_millis(100));
        assert_eq!(c.status_poll(), Duration::from_secs(2));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(parse("[controller\n").is_err());
    }
}
