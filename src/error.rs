//! Error types for the platform seams.
//!
//! Nothing here is ever shown to the user: callers either retry, default the
//! affected field, or report through `tracing` and carry on.

use thiserror::Error;

/// Failure to read an image from the clipboard.
///
/// "No image on the clipboard" is not an error; readers return `Ok(None)`.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Another process still holds the clipboard open
    #[error("clipboard is held by another process")]
    Occupied,
    /// Image data was present but could not be decoded
    #[error("clipboard image could not be converted: {0}")]
    Conversion(String),
    /// Clipboard could not be opened at all
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
}

/// Failure while touching the run-on-login registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to open run key (win32 error {0})")]
    Open(u32),
    #[error("failed to read run value (win32 error {0})")]
    Read(u32),
    #[error("failed to write run value (win32 error {0})")]
    Write(u32),
    #[error("failed to delete run value (win32 error {0})")]
    Delete(u32),
}
