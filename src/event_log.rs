//! Append-only capture log
//!
//! Every record goes to the log file and to an in-memory copy that backs the
//! main window's read-only view. Records are separated by a blank line.
//! File errors are reported through `tracing` and otherwise ignored; the
//! in-memory view is always updated.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Pending change to push into the on-screen view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// Append text after the current view contents
    Append(String),
    /// Replace the whole view
    Reset(String),
}

pub struct EventLog {
    path: PathBuf,
    view: String,
    pending: Option<ViewUpdate>,
    scroll_to_end: bool,
}

impl EventLog {
    /// Open the log at `path`: existing content is loaded into the view,
    /// otherwise the file is created and the banner written.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut log = Self {
            path: path.into(),
            view: String::new(),
            pending: None,
            scroll_to_end: false,
        };

        if !log.path.exists() {
            log.reset_with_banner();
            return log;
        }

        // Foreign-encoded bytes are shown replaced, the file is left alone
        match fs::read(&log.path) {
            Ok(bytes) => {
                log.view = String::from_utf8_lossy(&bytes).into_owned();
                log.pending = Some(ViewUpdate::Reset(log.view.clone()));
                log.scroll_to_end = true;
            }
            Err(e) => tracing::warn!("Could not read log {:?}: {}", log.path, e),
        }
        log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Everything currently shown in the view
    pub fn view(&self) -> &str {
        &self.view
    }

    /// Append a timestamped record
    pub fn record(&mut self, text: &str) {
        let stamped = format!("[{}] {}", Local::now().format(TIMESTAMP_FORMAT), text);
        self.append(&stamped);
    }

    /// Append a timestamped `ERROR:` record
    pub fn error(&mut self, message: &str) {
        self.record(&format!("ERROR: {}", message));
    }

    /// Empty the file and the view, then write the banner again
    pub fn clear(&mut self) {
        self.reset_with_banner();
    }

    /// Take the change accumulated since the last call
    pub fn take_view_update(&mut self) -> Option<ViewUpdate> {
        self.pending.take()
    }

    /// True once after the view was loaded from an existing file
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_end)
    }

    fn reset_with_banner(&mut self) {
        self.view.clear();
        if let Err(e) = fs::write(&self.path, "") {
            tracing::warn!("Could not truncate log {:?}: {}", self.path, e);
        }
        self.pending = Some(ViewUpdate::Reset(String::new()));

        let banner = format!(
            "Log file: {}{}Listening clipboard updates...",
            self.path.display(),
            LINE_ENDING
        );
        self.append(&banner);
    }

    fn append(&mut self, text: &str) {
        let chunk = format!("{}{}{}", text, LINE_ENDING, LINE_ENDING);

        self.view.push_str(&chunk);
        match self.pending.as_mut() {
            Some(ViewUpdate::Append(s)) | Some(ViewUpdate::Reset(s)) => s.push_str(&chunk),
            None => self.pending = Some(ViewUpdate::Append(chunk.clone())),
        }

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(chunk.as_bytes()));
        if let Err(e) = written {
            tracing::warn!("Could not append to log {:?}: {}", self.path, e);
        }
    }
}
