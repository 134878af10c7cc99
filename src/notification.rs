//! Notification popup state machine
//!
//! Pure lifecycle of the "Clipboard Image: <process>" popup. The machine never
//! touches a window or a timer; every transition returns the [`PopupEffect`]s
//! the window layer must carry out, in order. The Win32 popup in
//! `platform::popup` executes them with `SetTimer`/`KillTimer`.
//!
//! ```text
//! Hidden --show--> Shown(AwaitingMove) --cursor moved--> Shown(Hover | Armed)
//!                  Shown(Hover) <--cursor enters/leaves--> Shown(Armed)
//!                  Shown(Armed) --5s elapsed--> Hidden
//!                  Shown(*) --close/click--> Hidden
//! ```

use std::time::Duration;

pub const POPUP_WIDTH: i32 = 320;
pub const POPUP_HEIGHT: i32 = 80;
/// Gap between the popup and the work area's right and bottom edges
pub const POPUP_MARGIN: i32 = 12;

pub const CURSOR_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Screen rectangle, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }
}

/// Popup rectangle anchored to the bottom-right corner of `work_area`
pub fn bottom_right_placement(work_area: Rect) -> Rect {
    Rect::new(
        work_area.right - POPUP_WIDTH - POPUP_MARGIN,
        work_area.bottom - POPUP_HEIGHT - POPUP_MARGIN,
        POPUP_WIDTH,
        POPUP_HEIGHT,
    )
}

/// Text rendered in the popup body
pub fn popup_label(process_name: &str) -> String {
    format!("Clipboard Image:\n{}", process_name)
}

/// Sub-state while the popup is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupPhase {
    /// Cursor has not moved away from `origin` since the last show/update.
    /// Auto-hide cannot arm yet.
    AwaitingMove { origin: Point },
    /// Cursor is over the popup; dismissal paused
    Hover,
    /// Idle countdown running
    Armed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    Hidden,
    Shown(PopupPhase),
}

/// Side effect requested from the window layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupEffect {
    SetText(String),
    MoveTo(Rect),
    /// Show without activation and re-assert topmost
    ShowTopmost,
    Hide,
    StartCursorPoll,
    StopCursorPoll,
    /// One-shot countdown of [`IDLE_TIMEOUT`]
    StartCountdown,
    StopCountdown,
    OpenMainWindow,
}

#[derive(Debug, Clone)]
pub struct NotificationMachine {
    state: PopupState,
    process_name: String,
    bounds: Rect,
}

impl Default for NotificationMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationMachine {
    pub fn new() -> Self {
        Self {
            state: PopupState::Hidden,
            process_name: String::new(),
            bounds: Rect::default(),
        }
    }

    pub fn state(&self) -> PopupState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, PopupState::Shown(_))
    }

    /// Process name currently displayed
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Current popup rectangle
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Show the popup for `process_name`, or retarget it if already shown.
    /// Always repositions and restarts the auto-hide cycle from scratch.
    pub fn show_or_update(
        &mut self,
        process_name: &str,
        work_area: Rect,
        cursor: Point,
    ) -> Vec<PopupEffect> {
        self.process_name = process_name.to_string();
        self.bounds = bottom_right_placement(work_area);
        self.state = PopupState::Shown(PopupPhase::AwaitingMove { origin: cursor });

        vec![
            PopupEffect::SetText(popup_label(process_name)),
            PopupEffect::MoveTo(self.bounds),
            PopupEffect::ShowTopmost,
            PopupEffect::StopCountdown,
            PopupEffect::StartCursorPoll,
        ]
    }

    /// Cursor poll tick
    pub fn on_poll(&mut self, cursor: Point) -> Vec<PopupEffect> {
        let PopupState::Shown(phase) = self.state else {
            return Vec::new();
        };

        if let PopupPhase::AwaitingMove { origin } = phase {
            if cursor == origin {
                return Vec::new();
            }
        }

        let inside = self.bounds.contains(cursor);
        match (phase, inside) {
            (PopupPhase::Hover, true) => Vec::new(),
            (PopupPhase::Armed, false) => Vec::new(),
            (PopupPhase::Armed, true) => {
                self.state = PopupState::Shown(PopupPhase::Hover);
                vec![PopupEffect::StopCountdown]
            }
            (_, true) => {
                self.state = PopupState::Shown(PopupPhase::Hover);
                Vec::new()
            }
            (_, false) => {
                self.state = PopupState::Shown(PopupPhase::Armed);
                vec![PopupEffect::StartCountdown]
            }
        }
    }

    /// Idle countdown fired. Ignored unless the countdown is actually armed.
    pub fn on_countdown_elapsed(&mut self) -> Vec<PopupEffect> {
        match self.state {
            PopupState::Shown(PopupPhase::Armed) => self.hide(),
            _ => Vec::new(),
        }
    }

    /// Close button
    pub fn close(&mut self) -> Vec<PopupEffect> {
        if self.is_visible() {
            self.hide()
        } else {
            Vec::new()
        }
    }

    /// Click on the popup body or text
    pub fn click(&mut self) -> Vec<PopupEffect> {
        if !self.is_visible() {
            return Vec::new();
        }
        let mut effects = vec![PopupEffect::OpenMainWindow];
        effects.extend(self.hide());
        effects
    }

    fn hide(&mut self) -> Vec<PopupEffect> {
        self.state = PopupState::Hidden;
        vec![
            PopupEffect::StopCountdown,
            PopupEffect::StopCursorPoll,
            PopupEffect::Hide,
        ]
    }
}
