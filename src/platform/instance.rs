//! Single-instance guard

use crate::shell::APP_NAME;
use anyhow::{Context, Result};
use windows::core::HSTRING;
use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, TRUE};
use windows::Win32::System::Threading::{CreateMutexW, ReleaseMutex};
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONINFORMATION, MB_OK};

pub const MUTEX_NAME: &str = "ClipboardImageLogger_SingleInstance_Mutex";

/// Holds the named mutex for the lifetime of the process
pub struct InstanceGuard {
    handle: HANDLE,
}

impl InstanceGuard {
    /// Take the mutex. `Ok(None)` when another instance already owns it.
    pub fn acquire() -> Result<Option<Self>> {
        let name = HSTRING::from(MUTEX_NAME);
        let handle = unsafe { CreateMutexW(None, TRUE, &name) }
            .context("Failed to create single-instance mutex")?;

        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Ok(None);
        }

        Ok(Some(Self { handle }))
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = ReleaseMutex(self.handle);
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Tell the user the application is already running
pub fn show_already_running() {
    let text = HSTRING::from(format!("{} is already running.", APP_NAME));
    let caption = HSTRING::from(APP_NAME);
    unsafe {
        MessageBoxW(None, &text, &caption, MB_OK | MB_ICONINFORMATION);
    }
}
