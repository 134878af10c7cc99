//! Clipboard capture monitor
//!
//! Turns one "clipboard changed" signal into at most one [`CaptureEvent`]:
//! snapshot the clipboard owner and foreground window, read the image with a
//! short bounded retry, then log, optionally save, optionally notify, in
//! that order. Clipboard changes that carry no image leave no trace.

use crate::config::Settings;
use crate::error::ClipboardError;
use crate::event_log::EventLog;
use crate::screenshot::{self, ClipboardImage};
use crate::window_info::{WindowHandle, WindowInfo};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Process whose clipboard traffic never raises a notification
/// (keyboard-layout switcher that touches the clipboard constantly)
pub const NOTIFICATION_EXCLUDED_PROCESS: &str = "punto";

/// Attribution used when no process name can be found
pub const UNKNOWN_PROCESS: &str = "unknown";

/// OS queries needed to handle a clipboard change
pub trait Desktop {
    /// Clipboard sequence number, None if the call failed
    fn clipboard_sequence(&mut self) -> Option<u32>;
    fn clipboard_owner(&mut self) -> Option<WindowHandle>;
    fn foreground_window(&mut self) -> Option<WindowHandle>;
    /// Describe a window; fields that cannot be read stay empty
    fn window_info(&mut self, handle: WindowHandle) -> WindowInfo;
    /// Direct process-name query for a window
    fn process_name(&mut self, handle: WindowHandle) -> Option<String>;
    /// `Ok(None)` when the clipboard holds no image
    fn read_clipboard_image(&mut self) -> Result<Option<ClipboardImage>, ClipboardError>;
}

/// Receiver of "an image was copied by <process>"
pub trait Notifier {
    fn show_or_update(&mut self, process_name: &str);
}

/// How hard to try when the producer still holds the clipboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(30),
        }
    }
}

/// One logged clipboard image
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    pub sequence: u32,
    pub owner: Option<WindowHandle>,
    pub foreground: Option<WindowHandle>,
    pub process_name: String,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Local>,
    /// 1-based attempt on which the image was read
    pub attempt: u32,
}

pub struct CaptureMonitor {
    retry: RetryPolicy,
    screenshot_dir: PathBuf,
}

/// Owner/foreground snapshot taken once at the start of handling
struct Context {
    sequence: u32,
    owner: Option<WindowHandle>,
    foreground: Option<WindowHandle>,
    owner_info: Option<WindowInfo>,
    foreground_info: Option<WindowInfo>,
}

impl CaptureMonitor {
    pub fn new(screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            retry: RetryPolicy::default(),
            screenshot_dir: screenshot_dir.into(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handle one clipboard-changed signal
    pub fn on_clipboard_update<D, N>(
        &self,
        desktop: &mut D,
        settings: &Settings,
        log: &mut EventLog,
        notifier: &mut N,
    ) -> Option<CaptureEvent>
    where
        D: Desktop,
        N: Notifier,
    {
        let context = Self::snapshot(desktop);
        let header = context.header();

        let (image, attempt) = self.read_image(desktop)?;

        log.record(&format!(
            "{} | IMAGE | attempt={} | size={}x{}",
            header, attempt, image.width, image.height
        ));

        let process_name = context.attribute(desktop);
        let event = CaptureEvent {
            sequence: context.sequence,
            owner: context.owner,
            foreground: context.foreground,
            process_name,
            width: image.width,
            height: image.height,
            timestamp: Local::now(),
            attempt,
        };
        info!(
            "Captured {}x{} image from {} (seq {})",
            event.width, event.height, event.process_name, event.sequence
        );

        if settings.save_screenshots {
            match screenshot::save_png(
                &self.screenshot_dir,
                &image,
                &event.process_name,
                event.timestamp,
            ) {
                Ok(path) => debug!("Screenshot saved to {:?}", path),
                Err(e) => warn!("Screenshot not saved: {:#}", e),
            }
        }

        if settings.notifications && event.process_name != NOTIFICATION_EXCLUDED_PROCESS {
            notifier.show_or_update(&event.process_name);
        }

        Some(event)
    }

    fn snapshot<D: Desktop>(desktop: &mut D) -> Context {
        let sequence = desktop.clipboard_sequence().unwrap_or(0);
        let owner = desktop.clipboard_owner();
        let foreground = desktop.foreground_window();

        let owner_info = owner.map(|h| desktop.window_info(h));
        let foreground_info = if foreground == owner {
            owner_info.clone()
        } else {
            foreground.map(|h| desktop.window_info(h))
        };

        Context {
            sequence,
            owner,
            foreground,
            owner_info,
            foreground_info,
        }
    }

    /// Read the clipboard image, retrying while the clipboard is busy.
    /// None when there is no image or every attempt failed.
    fn read_image<D: Desktop>(&self, desktop: &mut D) -> Option<(ClipboardImage, u32)> {
        for attempt in 1..=self.retry.attempts {
            match desktop.read_clipboard_image() {
                Ok(Some(image)) => return Some((image, attempt)),
                Ok(None) => return None,
                Err(e) => {
                    debug!("Clipboard read attempt {} failed: {}", attempt, e);
                    if attempt < self.retry.attempts {
                        std::thread::sleep(self.retry.delay);
                    }
                }
            }
        }

        debug!(
            "Clipboard image unreadable after {} attempts, dropping event",
            self.retry.attempts
        );
        None
    }
}

impl Context {
    fn header(&self) -> String {
        let owner = match &self.owner_info {
            Some(info) => format!("[{}]", info),
            None => UNKNOWN_PROCESS.to_string(),
        };

        if self.owner == self.foreground {
            format!("CLIPBOARD | seq={} | owner={}", self.sequence, owner)
        } else {
            let foreground = self
                .foreground_info
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            format!(
                "CLIPBOARD | seq={} | owner={} | foreground=[{}]",
                self.sequence, owner, foreground
            )
        }
    }

    /// Owner's process if there is an owner, otherwise the foreground's
    fn attribute<D: Desktop>(&self, desktop: &mut D) -> String {
        let (handle, info) = match self.owner {
            Some(owner) => (Some(owner), self.owner_info.as_ref()),
            None => (self.foreground, self.foreground_info.as_ref()),
        };

        info.and_then(|i| i.process().map(str::to_string))
            .or_else(|| handle.and_then(|h| desktop.process_name(h)))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_PROCESS.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    /// Scripted desktop: clipboard reads are served from a queue
    #[derive(Default)]
    struct FakeDesktop {
        sequence: Option<u32>,
        owner: Option<WindowHandle>,
        foreground: Option<WindowHandle>,
        windows: HashMap<isize, WindowInfo>,
        direct_names: HashMap<isize, String>,
        reads: VecDeque<Result<Option<ClipboardImage>, ClipboardError>>,
        read_calls: u32,
        info_calls: u32,
    }

    impl FakeDesktop {
        fn with_window(mut self, raw: isize, process: &str) -> Self {
            let mut info = WindowInfo::new(WindowHandle(raw));
            info.process_id = 100 + raw as u32;
            info.process_name = process.to_string();
            info.title = format!("{} window", process);
            info.class_name = "TestClass".to_string();
            self.windows.insert(raw, info);
            self
        }
    }

    impl Desktop for FakeDesktop {
        fn clipboard_sequence(&mut self) -> Option<u32> {
            self.sequence
        }

        fn clipboard_owner(&mut self) -> Option<WindowHandle> {
            self.owner
        }

        fn foreground_window(&mut self) -> Option<WindowHandle> {
            self.foreground
        }

        fn window_info(&mut self, handle: WindowHandle) -> WindowInfo {
            self.info_calls += 1;
            self.windows
                .get(&handle.0)
                .cloned()
                .unwrap_or_else(|| WindowInfo::new(handle))
        }

        fn process_name(&mut self, handle: WindowHandle) -> Option<String> {
            self.direct_names.get(&handle.0).cloned()
        }

        fn read_clipboard_image(&mut self) -> Result<Option<ClipboardImage>, ClipboardError> {
            self.read_calls += 1;
            self.reads.pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        shown: Vec<String>,
    }

    impl Notifier for RecordingNotifier {
        fn show_or_update(&mut self, process_name: &str) {
            self.shown.push(process_name.to_string());
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        dir: PathBuf,
        log: EventLog,
        monitor: CaptureMonitor,
        notifier: RecordingNotifier,
        settings: Settings,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().to_path_buf();
            let mut log = EventLog::open(path.join("test.log"));
            log.take_view_update();
            Self {
                monitor: CaptureMonitor::new(&path).with_retry(RetryPolicy {
                    attempts: 5,
                    delay: Duration::ZERO,
                }),
                log,
                dir: path,
                _dir: dir,
                notifier: RecordingNotifier::default(),
                settings: Settings::default(),
            }
        }

        fn run(&mut self, desktop: &mut FakeDesktop) -> Option<CaptureEvent> {
            self.monitor.on_clipboard_update(
                desktop,
                &self.settings,
                &mut self.log,
                &mut self.notifier,
            )
        }

        /// Records written after the banner
        fn records(&mut self) -> Vec<String> {
            let nl = crate::event_log::LINE_ENDING;
            match self.log.take_view_update() {
                Some(crate::event_log::ViewUpdate::Append(text)) => text
                    .split(&format!("{}{}", nl, nl))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                None => Vec::new(),
                Some(other) => panic!("unexpected view update {:?}", other),
            }
        }

        fn png_files(&self) -> Vec<String> {
            std::fs::read_dir(&self.dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|n| n.ends_with(".png"))
                .collect()
        }
    }

    fn image(width: u32, height: u32) -> ClipboardImage {
        ClipboardImage {
            width,
            height,
            rgba: vec![0x7F; (width * height * 4) as usize],
        }
    }

    #[test]
    fn test_non_image_changes_are_silent() {
        let mut h = Harness::new();
        h.settings.notifications = true;
        h.settings.save_screenshots = true;

        for seq in 1..=5 {
            let mut desktop = FakeDesktop {
                sequence: Some(seq),
                owner: Some(WindowHandle(0x10)),
                foreground: Some(WindowHandle(0x10)),
                ..Default::default()
            }
            .with_window(0x10, "notepad");
            desktop.reads.push_back(Ok(None));

            assert!(h.run(&mut desktop).is_none());
            assert_eq!(desktop.read_calls, 1, "no retry for a non-image clipboard");
        }

        assert!(h.records().is_empty());
        assert!(h.notifier.shown.is_empty());
        assert!(h.png_files().is_empty());
    }

    #[test]
    fn test_success_on_kth_attempt_is_recorded() {
        for k in 1..=5u32 {
            let mut h = Harness::new();
            let mut desktop = FakeDesktop {
                sequence: Some(9),
                owner: Some(WindowHandle(0x10)),
                foreground: Some(WindowHandle(0x10)),
                ..Default::default()
            }
            .with_window(0x10, "mspaint");
            for _ in 1..k {
                desktop.reads.push_back(Err(ClipboardError::Occupied));
            }
            desktop.reads.push_back(Ok(Some(image(3, 2))));
            // Anything after success must not be read
            desktop.reads.push_back(Err(ClipboardError::Occupied));

            let event = h.run(&mut desktop).expect("image captured");
            assert_eq!(event.attempt, k);
            assert_eq!(desktop.read_calls, k);

            let records = h.records();
            assert_eq!(records.len(), 1);
            assert!(records[0].ends_with(&format!("| IMAGE | attempt={} | size=3x2", k)));
        }
    }

    #[test]
    fn test_exhausted_retries_drop_the_event() {
        let mut h = Harness::new();
        h.settings.notifications = true;
        let mut desktop = FakeDesktop::default();
        for _ in 0..6 {
            desktop
                .reads
                .push_back(Err(ClipboardError::Unavailable("locked".to_string())));
        }

        assert!(h.run(&mut desktop).is_none());
        assert_eq!(desktop.read_calls, 5);
        assert!(h.records().is_empty());
        assert!(h.notifier.shown.is_empty());
    }

    #[test]
    fn test_chrome_end_to_end() {
        let mut h = Harness::new();
        h.settings.notifications = true;
        h.settings.save_screenshots = false;

        let mut desktop = FakeDesktop {
            sequence: Some(321),
            owner: Some(WindowHandle(0xABC)),
            foreground: Some(WindowHandle(0xABC)),
            ..Default::default()
        }
        .with_window(0xABC, "chrome");
        desktop.reads.push_back(Ok(Some(image(800, 600))));

        let event = h.run(&mut desktop).unwrap();
        assert_eq!(event.process_name, "chrome");
        assert_eq!((event.width, event.height), (800, 600));

        let records = h.records();
        assert_eq!(records.len(), 1);
        let line = &records[0];
        assert!(line.contains("] CLIPBOARD | seq=321 | owner=[hwnd=0xABC "));
        assert!(line.contains(" proc=chrome "));
        assert!(line.ends_with(" | IMAGE | attempt=1 | size=800x600"));
        assert!(!line.contains("foreground="));

        assert!(h.png_files().is_empty());
        assert_eq!(h.notifier.shown, vec!["chrome".to_string()]);
        assert_eq!(desktop.info_calls, 1, "same window is described once");
    }

    #[test]
    fn test_foreground_appended_when_different() {
        let mut h = Harness::new();
        let mut desktop = FakeDesktop {
            sequence: Some(1),
            owner: Some(WindowHandle(0x10)),
            foreground: Some(WindowHandle(0x20)),
            ..Default::default()
        }
        .with_window(0x10, "svchost")
        .with_window(0x20, "explorer");
        desktop.reads.push_back(Ok(Some(image(1, 1))));

        let event = h.run(&mut desktop).unwrap();
        assert_eq!(event.process_name, "svchost");

        let line = &h.records()[0];
        assert!(line.contains("owner=[hwnd=0x10 pid=116 proc=svchost"));
        assert!(line.contains("| foreground=[hwnd=0x20 pid=132 proc=explorer"));
    }

    #[test]
    fn test_missing_owner_falls_back_to_foreground() {
        let mut h = Harness::new();
        let mut desktop = FakeDesktop {
            sequence: Some(2),
            owner: None,
            foreground: Some(WindowHandle(0x20)),
            ..Default::default()
        };
        desktop.direct_names.insert(0x20, "SnippingTool".to_string());
        desktop.reads.push_back(Ok(Some(image(1, 1))));

        let event = h.run(&mut desktop).unwrap();
        assert_eq!(event.process_name, "SnippingTool");

        let line = &h.records()[0];
        assert!(line.contains(
            "| owner=unknown | foreground=[hwnd=0x20 title=\"\" class=\"\"]"
        ));
    }

    #[test]
    fn test_owner_without_process_uses_direct_query() {
        let mut h = Harness::new();
        let mut desktop = FakeDesktop {
            owner: Some(WindowHandle(0x30)),
            foreground: Some(WindowHandle(0x40)),
            ..Default::default()
        }
        .with_window(0x40, "explorer");
        desktop.direct_names.insert(0x30, "greenshot".to_string());
        desktop.reads.push_back(Ok(Some(image(1, 1))));

        assert_eq!(h.run(&mut desktop).unwrap().process_name, "greenshot");
    }

    #[test]
    fn test_unresolvable_process_is_unknown() {
        let mut h = Harness::new();
        h.settings.notifications = true;
        let mut desktop = FakeDesktop::default();
        desktop.reads.push_back(Ok(Some(image(1, 1))));

        let event = h.run(&mut desktop).unwrap();
        assert_eq!(event.sequence, 0);
        assert_eq!(event.process_name, UNKNOWN_PROCESS);
        assert_eq!(h.notifier.shown, vec![UNKNOWN_PROCESS.to_string()]);
        assert!(h.records()[0].contains("CLIPBOARD | seq=0 | owner=unknown |"));
    }

    #[test]
    fn test_punto_is_logged_and_saved_but_not_notified() {
        let mut h = Harness::new();
        h.settings.notifications = true;
        h.settings.save_screenshots = true;

        let mut desktop = FakeDesktop {
            owner: Some(WindowHandle(0x50)),
            foreground: Some(WindowHandle(0x50)),
            ..Default::default()
        }
        .with_window(0x50, "punto");
        desktop.reads.push_back(Ok(Some(image(4, 4))));

        let event = h.run(&mut desktop).unwrap();
        assert_eq!(event.process_name, "punto");
        assert_eq!(h.records().len(), 1);
        assert!(h.notifier.shown.is_empty());

        let files = h.png_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("image_"));
        assert!(files[0].ends_with("_punto.png"));
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let mut h = Harness::new();
        h.settings.save_screenshots = true;
        h.settings.notifications = true;
        h.monitor = CaptureMonitor::new(h.dir.join("missing").join("dir"));

        let mut desktop = FakeDesktop {
            owner: Some(WindowHandle(0x10)),
            foreground: Some(WindowHandle(0x10)),
            ..Default::default()
        }
        .with_window(0x10, "mspaint");
        desktop.reads.push_back(Ok(Some(image(2, 2))));

        assert!(h.run(&mut desktop).is_some());
        assert_eq!(h.records().len(), 1);
        assert_eq!(h.notifier.shown, vec!["mspaint".to_string()]);
    }

    #[test]
    fn test_notifications_disabled() {
        let mut h = Harness::new();
        let mut desktop = FakeDesktop {
            owner: Some(WindowHandle(0x10)),
            foreground: Some(WindowHandle(0x10)),
            ..Default::default()
        }
        .with_window(0x10, "chrome");
        desktop.reads.push_back(Ok(Some(image(2, 2))));

        assert!(h.run(&mut desktop).is_some());
        assert!(h.notifier.shown.is_empty());
    }

    /// Looks at the disk at the moment the notification fires
    struct DiskCheckingNotifier {
        dir: PathBuf,
        log_path: PathBuf,
        checked: bool,
    }

    impl Notifier for DiskCheckingNotifier {
        fn show_or_update(&mut self, process_name: &str) {
            let log = std::fs::read_to_string(&self.log_path).unwrap();
            assert!(log.contains("| IMAGE | attempt=1 | size=2x2"));

            let saved = std::fs::read_dir(&self.dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .any(|n| n.starts_with("image_") && n.ends_with(".png"));
            assert!(saved, "screenshot written before {} notification", process_name);
            self.checked = true;
        }
    }

    #[test]
    fn test_log_and_screenshot_precede_notification() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("test.log");
        let mut log = EventLog::open(&log_path);
        let monitor = CaptureMonitor::new(dir.path()).with_retry(RetryPolicy {
            attempts: 1,
            delay: Duration::ZERO,
        });
        let settings = Settings {
            notifications: true,
            save_screenshots: true,
            ..Default::default()
        };
        let mut notifier = DiskCheckingNotifier {
            dir: dir.path().to_path_buf(),
            log_path,
            checked: false,
        };

        let mut desktop = FakeDesktop {
            owner: Some(WindowHandle(0x10)),
            foreground: Some(WindowHandle(0x10)),
            ..Default::default()
        }
        .with_window(0x10, "mspaint");
        desktop.reads.push_back(Ok(Some(image(2, 2))));

        let event =
            monitor.on_clipboard_update(&mut desktop, &settings, &mut log, &mut notifier);
        assert!(event.is_some());
        assert!(notifier.checked);
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(30));
    }
}
