//! Win32 side of the application
//!
//! Everything here talks to the OS directly; the decisions it executes come
//! from the portable modules.

pub mod desktop;
pub mod instance;
pub mod main_window;
pub mod popup;
pub mod registry;
pub mod tray;

/// Null-terminated UTF-16 copy of `text`
pub(crate) fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(Some(0)).collect()
}
