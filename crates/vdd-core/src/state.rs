//! Per-machine runtime state under `%LOCALAPPDATA%\vdd`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{VddError, VddResult};

const PID_FILE: &str = "vdd.pid";
const DISPLAYS_FILE: &str = "displays";

/// Returns the vdd data directory, creating it if needed.
///
/// On Windows: `%LOCALAPPDATA%\vdd`.
pub fn data_dir() -> VddResult<PathBuf> {
    let base = std::env::var("LOCALAPPDATA")
        .map_err(|_| VddError::os("LOCALAPPDATA environment variable not set"))?;

    let dir = PathBuf::from(base).join("vdd");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the path to the PID file.
pub fn pid_path() -> VddResult<PathBuf> {
    Ok(data_dir()?.join(PID_FILE))
}

/// Writes the current process's PID to the PID file.
///
/// Lets the CLI spot a running daemon even if the pipe check fails, and
/// forcibly kill a stuck one.
pub fn write_pid_file() -> VddResult<()> {
    fs::write(pid_path()?, std::process::id().to_string())?;
    Ok(())
}

/// Reads the PID from the PID file, if it exists.
pub fn read_pid_file() -> VddResult<Option<u32>> {
    read_number(&pid_path()?)
}

/// Removes the PID file.
pub fn remove_pid_file() -> VddResult<()> {
    remove_if_exists(&pid_path()?)
}

/// Saves how many virtual displays were plugged in when the daemon stopped.
pub fn write_display_count(count: usize) -> VddResult<()> {
    fs::write(data_dir()?.join(DISPLAYS_FILE), count.to_string())?;
    Ok(())
}

/// Reads the saved display count. A missing file reads as 0.
pub fn read_display_count() -> VddResult<usize> {
    let count: Option<u32> = read_number(&data_dir()?.join(DISPLAYS_FILE))?;
    Ok(count.unwrap_or(0) as usize)
}

fn read_number(path: &Path) -> VddResult<Option<u32>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let value = contents
        .trim()
        .parse()
        .map_err(|e| VddError::Os(format!("invalid contents in {}: {e}", path.display())))?;
    Ok(Some(value))
}

fn remove_if_exists(path: &Path) -> VddResult<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_a_written_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid");
        fs::write(&path, "42\n").unwrap();

        assert_eq!(read_number(&path).unwrap(), Some(42));
        remove_if_exists(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("displays");
        remove_if_exists(&path).unwrap();

        assert_eq!(read_number(&path).unwrap(), None);
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid");
        fs::write(&path, "not a pid").unwrap();

        assert!(read_number(&path).is_err());
    }
}
