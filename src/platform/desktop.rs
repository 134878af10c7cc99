//! Live [`Desktop`] backed by Win32 and `arboard`

use crate::capture::Desktop;
use crate::error::ClipboardError;
use crate::process::ProcessLookup;
use crate::screenshot::ClipboardImage;
use crate::window_info::{WindowHandle, WindowInfo};
use windows::Win32::Foundation::HWND;
use windows::Win32::System::DataExchange::{GetClipboardOwner, GetClipboardSequenceNumber};
use windows::Win32::UI::WindowsAndMessaging::{
    GetClassNameW, GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId,
};

pub struct Win32Desktop {
    processes: ProcessLookup,
}

impl Win32Desktop {
    pub fn new() -> Self {
        Self {
            processes: ProcessLookup::new(),
        }
    }

    fn process_id(handle: WindowHandle) -> u32 {
        let mut pid = 0u32;
        unsafe {
            GetWindowThreadProcessId(HWND(handle.0), Some(&mut pid as *mut u32));
        }
        pid
    }
}

impl Default for Win32Desktop {
    fn default() -> Self {
        Self::new()
    }
}

impl Desktop for Win32Desktop {
    fn clipboard_sequence(&mut self) -> Option<u32> {
        Some(unsafe { GetClipboardSequenceNumber() })
    }

    fn clipboard_owner(&mut self) -> Option<WindowHandle> {
        WindowHandle::from_raw(unsafe { GetClipboardOwner() }.0)
    }

    fn foreground_window(&mut self) -> Option<WindowHandle> {
        WindowHandle::from_raw(unsafe { GetForegroundWindow() }.0)
    }

    fn window_info(&mut self, handle: WindowHandle) -> WindowInfo {
        let hwnd = HWND(handle.0);
        let mut info = WindowInfo::new(handle);

        let mut buffer = [0u16; 512];
        let len = unsafe { GetWindowTextW(hwnd, &mut buffer) };
        if len > 0 {
            info.title = String::from_utf16_lossy(&buffer[..len as usize]);
        }

        let mut buffer = [0u16; 256];
        let len = unsafe { GetClassNameW(hwnd, &mut buffer) };
        if len > 0 {
            info.class_name = String::from_utf16_lossy(&buffer[..len as usize]);
        }

        info.process_id = Self::process_id(handle);
        if let Some(identity) = self.processes.identify(info.process_id) {
            info.process_name = identity.name;
            info.executable_path = identity.executable;
        }

        info
    }

    fn process_name(&mut self, handle: WindowHandle) -> Option<String> {
        let pid = Self::process_id(handle);
        self.processes.identify(pid).map(|identity| identity.name)
    }

    fn read_clipboard_image(&mut self) -> Result<Option<ClipboardImage>, ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;

        match clipboard.get_image() {
            Ok(image) => Ok(Some(ClipboardImage {
                width: image.width as u32,
                height: image.height as u32,
                rgba: image.bytes.into_owned(),
            })),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(arboard::Error::ClipboardOccupied) => Err(ClipboardError::Occupied),
            Err(arboard::Error::ConversionFailure) => {
                Err(ClipboardError::Conversion("unsupported bitmap layout".to_string()))
            }
            Err(e) => Err(ClipboardError::Unavailable(e.to_string())),
        }
    }
}
