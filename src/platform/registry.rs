//! `HKCU\Software\Microsoft\Windows\CurrentVersion\Run`

use crate::autostart::RunKeyStore;
use crate::error::RegistryError;
use windows::core::HSTRING;
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::System::Registry::{
    RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_READ, KEY_SET_VALUE, REG_SAM_FLAGS, REG_SZ, REG_VALUE_TYPE,
};

const RUN_KEY_PATH: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";

/// The current user's run-on-login key
#[derive(Debug, Default, Clone, Copy)]
pub struct RunKey;

/// Open key, closed on drop
struct OpenKey(HKEY);

impl OpenKey {
    fn open(access: REG_SAM_FLAGS) -> Result<Self, RegistryError> {
        let mut key = HKEY::default();
        let path = HSTRING::from(RUN_KEY_PATH);
        let status = unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, &path, 0, access, &mut key) };
        check(status).map_err(RegistryError::Open)?;
        Ok(Self(key))
    }
}

impl Drop for OpenKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

fn check(status: WIN32_ERROR) -> Result<(), u32> {
    if status == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(status.0)
    }
}

impl RunKeyStore for RunKey {
    fn read(&self, name: &str) -> Result<Option<String>, RegistryError> {
        let key = OpenKey::open(KEY_READ)?;
        let name = HSTRING::from(name);

        let mut kind = REG_VALUE_TYPE::default();
        let mut size = 0u32;
        let status = unsafe {
            RegQueryValueExW(
                key.0,
                &name,
                None,
                Some(&mut kind as *mut _),
                None,
                Some(&mut size as *mut u32),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        check(status).map_err(RegistryError::Read)?;

        let mut buffer = vec![0u16; (size as usize + 1) / 2 + 1];
        let mut size = (buffer.len() * 2) as u32;
        let status = unsafe {
            RegQueryValueExW(
                key.0,
                &name,
                None,
                Some(&mut kind as *mut _),
                Some(buffer.as_mut_ptr() as *mut u8),
                Some(&mut size as *mut u32),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        check(status).map_err(RegistryError::Read)?;

        let chars = (size as usize / 2).min(buffer.len());
        let text = String::from_utf16_lossy(&buffer[..chars]);
        Ok(Some(text.trim_end_matches('\0').to_string()))
    }

    fn write(&mut self, name: &str, value: &str) -> Result<(), RegistryError> {
        let key = OpenKey::open(KEY_SET_VALUE)?;
        let name = HSTRING::from(name);
        let data: Vec<u8> = super::wide(value)
            .into_iter()
            .flat_map(u16::to_le_bytes)
            .collect();

        let status = unsafe { RegSetValueExW(key.0, &name, 0, REG_SZ, Some(&data)) };
        check(status).map_err(RegistryError::Write)
    }

    fn delete(&mut self, name: &str) -> Result<(), RegistryError> {
        let key = OpenKey::open(KEY_SET_VALUE)?;
        let name = HSTRING::from(name);

        let status = unsafe { RegDeleteValueW(key.0, &name) };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(());
        }
        check(status).map_err(RegistryError::Delete)
    }
}
