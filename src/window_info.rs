//! Window identity used to attribute clipboard changes

use std::fmt;
use std::path::PathBuf;

/// Raw top-level window handle. Zero never appears here; a missing window is
/// `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub fn from_raw(raw: isize) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Snapshot of one window, taken once per clipboard event.
/// Fields the OS would not give us are left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    pub class_name: String,
    /// 0 when unknown
    pub process_id: u32,
    /// Without the `.exe` extension
    pub process_name: String,
    pub executable_path: Option<PathBuf>,
}

impl WindowInfo {
    pub fn new(handle: WindowHandle) -> Self {
        Self {
            handle,
            title: String::new(),
            class_name: String::new(),
            process_id: 0,
            process_name: String::new(),
            executable_path: None,
        }
    }

    /// Process name, if the lookup produced one
    pub fn process(&self) -> Option<&str> {
        let name = self.process_name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// Log form:
/// `hwnd=0x1A2B pid=42 proc=chrome title="..." class="..." path=C:\...`
///
/// `path=` is dropped when the executable is unknown; `pid=` and `proc=` are
/// dropped when neither is known.
impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hwnd={}", self.handle)?;

        if self.process_id != 0 || self.process().is_some() {
            write!(f, " pid={} proc={}", self.process_id, self.process_name)?;
        }

        write!(f, " title=\"{}\" class=\"{}\"", self.title, self.class_name)?;

        if let Some(path) = &self.executable_path {
            write!(f, " path={}", path.display())?;
        }

        Ok(())
    }
}
