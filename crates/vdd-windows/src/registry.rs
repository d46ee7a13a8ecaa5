//! Thin RAII wrapper over the Win32 registry API.

use vdd_core::{VddError, VddResult};
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, WIN32_ERROR};
use windows::Win32::System::Registry::{
    HKEY, KEY_READ, KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE, REG_SAM_FLAGS, REG_SZ,
    REG_VALUE_TYPE, RegCloseKey, RegCreateKeyExW, RegDeleteKeyW, RegDeleteValueW, RegOpenKeyExW,
    RegQueryValueExW, RegSetValueExW,
};
use windows::core::PCWSTR;

/// Null-terminated UTF-16 copy of `s`.
pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Turns a registry status code into a result, tagging failures with `what`.
fn check(status: WIN32_ERROR, what: &str) -> VddResult<()> {
    if status.is_err() {
        return Err(VddError::Os(format!("{what}: {status:?}")));
    }
    Ok(())
}

/// An open registry key, closed on drop.
pub(crate) struct RegKey(HKEY);

impl RegKey {
    /// Opens an existing key.
    pub fn open(root: HKEY, path: &str, access: REG_SAM_FLAGS) -> VddResult<Self> {
        let wide_path = wide(path);
        let mut key = HKEY::default();
        // SAFETY: RegOpenKeyExW is a standard Win32 registry API. The path
        // is null-terminated and the key is closed by Drop.
        let status =
            unsafe { RegOpenKeyExW(root, PCWSTR(wide_path.as_ptr()), None, access, &mut key) };
        check(status, &format!("could not open registry key {path}"))?;
        Ok(Self(key))
    }

    /// Opens a key for reading.
    pub fn open_read(root: HKEY, path: &str) -> VddResult<Self> {
        Self::open(root, path, KEY_READ)
    }

    /// Opens a key for writing, creating it (and its parents) if needed.
    pub fn create(root: HKEY, path: &str) -> VddResult<Self> {
        let wide_path = wide(path);
        let mut key = HKEY::default();
        // SAFETY: RegCreateKeyExW opens or creates the key. All optional
        // pointers are left null and the key is closed by Drop.
        let status = unsafe {
            RegCreateKeyExW(
                root,
                PCWSTR(wide_path.as_ptr()),
                None,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_READ | KEY_WRITE,
                None,
                &mut key,
                None,
            )
        };
        check(status, &format!("could not create registry key {path}"))?;
        Ok(Self(key))
    }

    /// Reads a value's raw bytes and type. `None` if it does not exist.
    fn raw(&self, name: &str) -> Option<(REG_VALUE_TYPE, Vec<u8>)> {
        let wide_name = wide(name);
        let mut kind = REG_VALUE_TYPE::default();
        let mut size = 0u32;
        // SAFETY: a null data buffer only asks for the type and size.
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR(wide_name.as_ptr()),
                None,
                Some(&mut kind),
                None,
                Some(&mut size),
            )
        };
        if status.is_err() {
            return None;
        }

        let mut data = vec![0u8; size as usize];
        // SAFETY: `data` is exactly `size` bytes, as reported above.
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                PCWSTR(wide_name.as_ptr()),
                None,
                Some(&mut kind),
                Some(data.as_mut_ptr()),
                Some(&mut size),
            )
        };
        if status.is_err() {
            return None;
        }
        data.truncate(size as usize);
        Some((kind, data))
    }

    /// Reads a `REG_DWORD` value.
    pub fn dword(&self, name: &str) -> Option<u32> {
        match self.raw(name)? {
            (REG_DWORD, data) if data.len() >= 4 => {
                Some(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            _ => None,
        }
    }

    /// Reads a `REG_SZ` value.
    pub fn string(&self, name: &str) -> Option<String> {
        let (kind, data) = self.raw(name)?;
        if kind != REG_SZ {
            return None;
        }
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        Some(String::from_utf16_lossy(&units))
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    fn set(&self, name: &str, kind: REG_VALUE_TYPE, bytes: &[u8]) -> VddResult<()> {
        let wide_name = wide(name);
        // SAFETY: RegSetValueExW copies `bytes`; the byte length is the
        // slice length.
        let status =
            unsafe { RegSetValueExW(self.0, PCWSTR(wide_name.as_ptr()), None, kind, Some(bytes)) };
        check(status, &format!("could not write registry value {name}"))
    }

    pub fn set_dword(&self, name: &str, value: u32) -> VddResult<()> {
        self.set(name, REG_DWORD, &value.to_le_bytes())
    }

    pub fn set_string(&self, name: &str, value: &str) -> VddResult<()> {
        let bytes: Vec<u8> = wide(value).iter().flat_map(|u| u.to_le_bytes()).collect();
        self.set(name, REG_SZ, &bytes)
    }

    /// Deletes a value. A value that does not exist is not an error.
    pub fn delete_value(&self, name: &str) -> VddResult<()> {
        let wide_name = wide(name);
        // SAFETY: RegDeleteValueW is a standard Win32 registry API.
        let status = unsafe { RegDeleteValueW(self.0, PCWSTR(wide_name.as_ptr())) };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        check(status, &format!("could not delete registry value {name}"))
    }

    /// Deletes a subkey without children. A missing key is not an error.
    pub fn delete_subkey(&self, name: &str) -> VddResult<()> {
        let wide_name = wide(name);
        // SAFETY: RegDeleteKeyW is a standard Win32 registry API.
        let status = unsafe { RegDeleteKeyW(self.0, PCWSTR(wide_name.as_ptr())) };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        check(status, &format!("could not delete registry key {name}"))
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        // SAFETY: the key was opened by this wrapper and is closed once.
        let _ = unsafe { RegCloseKey(self.0) };
    }
}
