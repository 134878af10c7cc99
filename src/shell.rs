//! Tray/window lifecycle decisions
//!
//! The Win32 main window asks these functions what to do; they hold no
//! handles and can be tested anywhere.

use crate::config::{Settings, Toggle};
use std::time::{Duration, Instant};

/// Two tray clicks closer than this count as a double-click
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);

pub const APP_NAME: &str = "Clipboard Image Logger";

/// What closing the main window does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    HideToTray,
    Exit,
}

/// `exit_requested` is set when the close comes from File/Tray "Exit"
pub fn close_action(settings: &Settings, exit_requested: bool) -> CloseAction {
    if settings.minimize_to_tray && !exit_requested {
        CloseAction::HideToTray
    } else {
        CloseAction::Exit
    }
}

pub fn hides_on_minimize(settings: &Settings) -> bool {
    settings.minimize_to_tray
}

/// Launch straight into the tray
pub fn starts_hidden(settings: &Settings) -> bool {
    settings.minimize_to_tray && settings.start_minimized
}

/// "Start minimized" only means something with "Minimize to tray" on
pub fn start_minimized_available(settings: &Settings) -> bool {
    settings.minimize_to_tray
}

/// Whether a toggle change must bring a hidden window back
pub fn restores_window(toggle: Toggle, value: bool, window_hidden: bool) -> bool {
    toggle == Toggle::MinimizeToTray && !value && window_hidden
}

pub fn about_text() -> String {
    format!(
        "{} v{}\nLogs clipboard image events (screenshots) with process/window context.",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    )
}

/// Double-click detection for tray icon clicks (tray-icon reports single
/// clicks only)
#[derive(Debug, Default)]
pub struct TrayClickTracker {
    last_click: Option<Instant>,
}

impl TrayClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a click at `now`; true when it completes a double-click
    pub fn register(&mut self, now: Instant) -> bool {
        match self.last_click {
            Some(last) if now.saturating_duration_since(last) < DOUBLE_CLICK_WINDOW => {
                self.last_click = None;
                true
            }
            _ => {
                self.last_click = Some(now);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(minimize_to_tray: bool, start_minimized: bool) -> Settings {
        Settings {
            minimize_to_tray,
            start_minimized,
            ..Default::default()
        }
    }

    #[test]
    fn test_close_action() {
        assert_eq!(close_action(&settings(true, false), false), CloseAction::HideToTray);
        assert_eq!(close_action(&settings(true, false), true), CloseAction::Exit);
        assert_eq!(close_action(&settings(false, false), false), CloseAction::Exit);
    }

    #[test]
    fn test_startup_visibility() {
        assert!(starts_hidden(&settings(true, true)));
        assert!(!starts_hidden(&settings(false, true)));
        assert!(!starts_hidden(&settings(true, false)));
        assert!(!start_minimized_available(&settings(false, true)));
        assert!(hides_on_minimize(&settings(true, false)));
    }

    #[test]
    fn test_disabling_tray_restores_hidden_window() {
        assert!(restores_window(Toggle::MinimizeToTray, false, true));
        assert!(!restores_window(Toggle::MinimizeToTray, false, false));
        assert!(!restores_window(Toggle::MinimizeToTray, true, true));
        assert!(!restores_window(Toggle::Notifications, false, true));
    }

    #[test]
    fn test_double_click_window() {
        let start = Instant::now();
        let mut tracker = TrayClickTracker::new();

        assert!(!tracker.register(start));
        assert!(tracker.register(start + Duration::from_millis(300)));
        // A third click starts a new pair
        assert!(!tracker.register(start + Duration::from_millis(400)));
        assert!(!tracker.register(start + Duration::from_millis(1000)));
        assert!(tracker.register(start + Duration::from_millis(1499)));
    }

    #[test]
    fn test_about_text() {
        let text = about_text();
        assert!(text.starts_with("Clipboard Image Logger v"));
        assert!(text.contains(env!("CARGO_PKG_VERSION")));
    }
}
