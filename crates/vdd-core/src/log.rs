//! File logging with size-based rotation.
//!
//! Events from `tracing` are written to `~/.config/vdd/logs/vdd.log`.
//! When the file exceeds the configured max size, it is rotated to
//! `vdd.log.1` (one backup kept).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "vdd.log";
const BACKUP_SUFFIX: &str = ".1";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Whether file logging is enabled. Defaults to `false`.
    pub enabled: bool,
    /// Minimum log level: "debug", "info", "warn", or "error".
    pub level: String,
    /// Maximum log file size in megabytes before rotation.
    pub max_file_mb: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".into(),
            max_file_mb: 10,
        }
    }
}

/// Maps the configured level onto a filter directive. Unknown values
/// read as `info`.
fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Append-only log file that rotates itself once it grows too large.
pub struct RotatingFile {
    file: Option<File>,
    path: PathBuf,
    max_bytes: u64,
    written: u64,
}

impl RotatingFile {
    /// Opens (or creates) `path` for appending. `max_bytes == 0` disables
    /// rotation.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            file: Some(file),
            path,
            max_bytes,
            written,
        })
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        // The handle must be closed before Windows lets us rename the file.
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        fs::rename(&self.path, self.backup_path())?;
        self.file = Some(open_append(&self.path)?);
        self.written = 0;
        Ok(())
    }

    fn file(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => open_append(&self.path)?,
        };
        Ok(self.file.insert(file))
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file()?.write(buf)?;
        self.written += n as u64;
        if self.max_bytes > 0 && self.written >= self.max_bytes {
            self.rotate()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global `tracing` subscriber. Call once at daemon startup.
///
/// Does nothing if `config.enabled` is `false`. `RUST_LOG` takes
/// precedence over the configured level.
pub fn init(config: &LogConfig) {
    if !config.enabled {
        return;
    }
    let Some(dir) = crate::config::config_dir() else {
        return;
    };
    let log_dir = dir.join("logs");
    let _ = fs::create_dir_all(&log_dir);

    let Ok(file) = RotatingFile::open(log_dir.join(LOG_FILE_NAME), config.max_file_mb * 1024 * 1024)
    else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&config.level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_into_single_backup() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        let mut file = RotatingFile::open(&path, 16).unwrap();

        // Act
        file.write_all(b"0123456789abcdef").unwrap();
        file.write_all(b"tail").unwrap();
        file.flush().unwrap();

        // Assert
        assert_eq!(fs::read(dir.path().join("vdd.log.1")).unwrap(), b"0123456789abcdef");
        assert_eq!(fs::read(&path).unwrap(), b"tail");
    }

    #[test]
    fn zero_limit_never_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        let mut file = RotatingFile::open(&path, 0).unwrap();

        file.write_all(&[b'x'; 4096]).unwrap();
        file.flush().unwrap();

        assert!(!dir.path().join("vdd.log.1").exists());
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("loud"), "info");
    }
}
