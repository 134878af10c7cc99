//! Clipboard Image Logger Library
//!
//! Watches the clipboard for images, logs each one with the window and
//! process that put it there, optionally saves it as a PNG and optionally
//! pops up a small notification. The capture and notification logic is
//! portable; the Win32 shell lives in [`platform`].

pub mod autostart;
pub mod capture;
pub mod config;
pub mod error;
pub mod event_log;
pub mod notification;
pub mod process;
pub mod screenshot;
pub mod shell;
pub mod window_info;

#[cfg(windows)]
pub mod platform;
