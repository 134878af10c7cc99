/// Configuration module for the Clipboard Image Logger application.
///
/// This module provides functionality for managing application settings,
/// including:
/// - The five user toggles (run at startup, minimize to tray, start minimized,
///   notifications, save screenshots)
/// - The main window bounds restored on the next launch
/// - Persisting settings to disk as a flat `key=value` INI file
/// - Determining the directory the settings, log and screenshots live in
///
/// The settings file is `ClipboardImageLogger.ini` next to the executable.
/// It is rewritten in full on every change.
///
/// # Example
///
/// ```rust,no_run
/// use clipboard_image_logger::config::{SettingsStore, Toggle};
///
/// let mut store = SettingsStore::new("ClipboardImageLogger.ini");
/// let mut settings = store.load();
///
/// settings.set(Toggle::Notifications, true);
/// store.save(&settings).expect("Failed to save settings");
/// ```
use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "ClipboardImageLogger.ini";
pub const LOG_FILE_NAME: &str = "ClipboardImageLogger.log";

const SETTINGS_BANNER: &str = "; ClipboardImageLogger settings";

const KEY_WIN_LEFT: &str = "WinLeft";
const KEY_WIN_TOP: &str = "WinTop";
const KEY_WIN_WIDTH: &str = "WinWidth";
const KEY_WIN_HEIGHT: &str = "WinHeight";

/// Boolean settings exposed as menu toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    RunAtStartup,
    MinimizeToTray,
    StartMinimized,
    Notifications,
    SaveScreenshots,
}

impl Toggle {
    pub const ALL: [Toggle; 5] = [
        Toggle::RunAtStartup,
        Toggle::MinimizeToTray,
        Toggle::StartMinimized,
        Toggle::Notifications,
        Toggle::SaveScreenshots,
    ];

    /// Key used in the settings file
    pub fn key(self) -> &'static str {
        match self {
            Toggle::RunAtStartup => "RunAtStartup",
            Toggle::MinimizeToTray => "MinimizeToTray",
            Toggle::StartMinimized => "StartMinimized",
            Toggle::Notifications => "Notifications",
            Toggle::SaveScreenshots => "SaveScreenshots",
        }
    }

    /// Menu caption
    pub fn label(self) -> &'static str {
        match self {
            Toggle::RunAtStartup => "Run at startup",
            Toggle::MinimizeToTray => "Minimize to tray",
            Toggle::StartMinimized => "Start minimized",
            Toggle::Notifications => "Notifications",
            Toggle::SaveScreenshots => "Save screenshots",
        }
    }
}

/// Saved position and size of the main window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Application settings. Every boolean defaults to off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub run_at_startup: bool,
    pub minimize_to_tray: bool,
    pub start_minimized: bool,
    pub notifications: bool,
    pub save_screenshots: bool,
    /// None until the window has been closed once
    pub window_bounds: Option<WindowBounds>,
}

impl Settings {
    pub fn get(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::RunAtStartup => self.run_at_startup,
            Toggle::MinimizeToTray => self.minimize_to_tray,
            Toggle::StartMinimized => self.start_minimized,
            Toggle::Notifications => self.notifications,
            Toggle::SaveScreenshots => self.save_screenshots,
        }
    }

    pub fn set(&mut self, toggle: Toggle, value: bool) {
        let slot = match toggle {
            Toggle::RunAtStartup => &mut self.run_at_startup,
            Toggle::MinimizeToTray => &mut self.minimize_to_tray,
            Toggle::StartMinimized => &mut self.start_minimized,
            Toggle::Notifications => &mut self.notifications,
            Toggle::SaveScreenshots => &mut self.save_screenshots,
        };
        *slot = value;
    }
}

/// File-backed settings storage.
///
/// Keys the application does not understand are kept aside and written back
/// untouched so a newer or hand-edited file survives a round trip.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    unknown: Vec<(String, String)>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            unknown: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings from disk.
    /// Returns defaults if the file doesn't exist or can't be read.
    pub fn load(&mut self) -> Settings {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!("Settings not loaded from {:?}: {}", self.path, e);
                self.unknown.clear();
                return Settings::default();
            }
        };

        let (settings, unknown) = parse_settings(&contents);
        self.unknown = unknown;
        settings
    }

    /// Rewrite the whole settings file
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let text = render_settings(settings, &self.unknown);
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Parse INI text into settings plus any entries the application ignores
pub fn parse_settings(text: &str) -> (Settings, Vec<(String, String)>) {
    let mut entries: Vec<(String, String)> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let Some(eq) = line.find('=') else { continue };
        if eq == 0 {
            continue;
        }

        let key = line[..eq].trim();
        let value = line[eq + 1..].trim();
        if key.is_empty() {
            continue;
        }

        // Later duplicates win, keys compare case-insensitively
        let existing = entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key));
        match existing {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
    }

    let lookup = |key: &str| {
        entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    };

    let mut settings = Settings::default();
    for toggle in Toggle::ALL {
        let value = lookup(toggle.key()).and_then(parse_bool).unwrap_or(false);
        settings.set(toggle, value);
    }

    let int = |key: &str| lookup(key).and_then(|v| v.parse::<i32>().ok());
    settings.window_bounds = match (
        int(KEY_WIN_LEFT),
        int(KEY_WIN_TOP),
        int(KEY_WIN_WIDTH),
        int(KEY_WIN_HEIGHT),
    ) {
        (Some(left), Some(top), Some(width), Some(height)) if width > 0 && height > 0 => {
            Some(WindowBounds {
                left,
                top,
                width,
                height,
            })
        }
        _ => None,
    };

    // Rejected bounds stay as raw entries so a save writes them back
    let has_bounds = settings.window_bounds.is_some();
    let known = |key: &str| {
        Toggle::ALL
            .iter()
            .any(|t| t.key().eq_ignore_ascii_case(key))
            || (has_bounds && is_bounds_key(key))
    };
    let unknown = entries.into_iter().filter(|(k, _)| !known(k)).collect();

    (settings, unknown)
}

fn is_bounds_key(key: &str) -> bool {
    [KEY_WIN_LEFT, KEY_WIN_TOP, KEY_WIN_WIDTH, KEY_WIN_HEIGHT]
        .iter()
        .any(|k| k.eq_ignore_ascii_case(key))
}

/// Render settings as INI text with the fixed banner
pub fn render_settings(settings: &Settings, unknown: &[(String, String)]) -> String {
    let mut out = String::new();
    out.push_str(SETTINGS_BANNER);
    out.push('\n');

    for toggle in Toggle::ALL {
        let value = if settings.get(toggle) { "1" } else { "0" };
        out.push_str(&format!("{}={}\n", toggle.key(), value));
    }

    if let Some(bounds) = settings.window_bounds {
        out.push_str(&format!("{}={}\n", KEY_WIN_LEFT, bounds.left));
        out.push_str(&format!("{}={}\n", KEY_WIN_TOP, bounds.top));
        out.push_str(&format!("{}={}\n", KEY_WIN_WIDTH, bounds.width));
        out.push_str(&format!("{}={}\n", KEY_WIN_HEIGHT, bounds.height));
    }

    for (key, value) in unknown {
        if settings.window_bounds.is_some() && is_bounds_key(key) {
            continue;
        }
        out.push_str(&format!("{}={}\n", key, value));
    }

    out
}

/// Accepts `true`/`false` in any case, or an integer where non-zero is true
fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    value.parse::<i64>().ok().map(|n| n != 0)
}

/// Get the application's directory
/// Returns the directory containing the executable, or the per-user data
/// directory (%APPDATA%/ClipboardImageLogger/ on Windows) when that is unknown
pub fn app_directory() -> Result<PathBuf> {
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        return Ok(dir);
    }

    let project_dirs = ProjectDirs::from("", "", "ClipboardImageLogger")
        .ok_or_else(|| anyhow!("Failed to determine user data directory"))?;

    let data_dir = project_dirs.data_dir();
    fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory: {}", e))?;

    Ok(data_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        for toggle in Toggle::ALL {
            assert!(!settings.get(toggle));
        }
        assert_eq!(settings.window_bounds, None);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::new(dir.path().join(SETTINGS_FILE_NAME));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_toggle_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        let mut store = SettingsStore::new(&path);
        let mut settings = store.load();
        settings.set(Toggle::SaveScreenshots, true);
        settings.set(Toggle::MinimizeToTray, true);
        store.save(&settings).unwrap();

        let reloaded = SettingsStore::new(&path).load();
        assert!(reloaded.save_screenshots);
        assert!(reloaded.minimize_to_tray);
        assert!(!reloaded.notifications);
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn test_parse_comments_and_case() {
        let text = "; banner\n# other\n\nnotifications = 1\nSAVESCREENSHOTS=true\n\
                    RunAtStartup=0\n=3\nbroken line\n";
        let (settings, unknown) = parse_settings(text);
        assert!(settings.notifications);
        assert!(settings.save_screenshots);
        assert!(!settings.run_at_startup);
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let (settings, _) = parse_settings("Notifications=yes\nStartMinimized=7\n");
        assert!(!settings.notifications);
        assert!(settings.start_minimized);
    }

    #[test]
    fn test_window_bounds_require_positive_size() {
        let text = "WinLeft=10\nWinTop=20\nWinWidth=700\nWinHeight=400\n";
        let (settings, _) = parse_settings(text);
        assert_eq!(
            settings.window_bounds,
            Some(WindowBounds {
                left: 10,
                top: 20,
                width: 700,
                height: 400
            })
        );

        let text = "WinLeft=10\nWinTop=20\nWinWidth=0\nWinHeight=400\n";
        let (settings, _) = parse_settings(text);
        assert_eq!(settings.window_bounds, None);

        let (settings, _) = parse_settings("WinTop=20\nWinWidth=700\nWinHeight=400\n");
        assert_eq!(settings.window_bounds, None);
    }

    #[test]
    fn test_unknown_keys_survive_rewrite() {
        let (settings, unknown) = parse_settings("Theme=dark\nNotifications=1\n");
        assert_eq!(unknown, vec![("Theme".to_string(), "dark".to_string())]);

        let text = render_settings(&settings, &unknown);
        assert!(text.starts_with(SETTINGS_BANNER));
        assert!(text.contains("Notifications=1\n"));
        assert!(text.contains("SaveScreenshots=0\n"));
        assert!(text.contains("Theme=dark\n"));
        assert!(!text.contains("WinLeft"));
    }

    #[test]
    fn test_rejected_bounds_are_written_back() {
        let text = "WinLeft=10\nWinTop=20\nWinWidth=0\nWinHeight=400\n";
        let (mut settings, unknown) = parse_settings(text);
        assert_eq!(settings.window_bounds, None);
        assert_eq!(unknown.len(), 4);

        let rendered = render_settings(&settings, &unknown);
        assert!(rendered.contains("WinLeft=10\n"));
        assert!(rendered.contains("WinWidth=0\n"));

        // Fresh bounds replace the raw entries instead of duplicating them
        settings.window_bounds = Some(WindowBounds {
            left: 1,
            top: 2,
            width: 300,
            height: 200,
        });
        let rendered = render_settings(&settings, &unknown);
        assert_eq!(rendered.matches("WinLeft=").count(), 1);
        assert!(rendered.contains("WinWidth=300\n"));
        assert!(!rendered.contains("WinWidth=0\n"));
    }
}
