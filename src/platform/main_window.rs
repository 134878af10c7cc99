//! Main window: menu bar, read-only log view, clipboard listener
//!
//! Application state is owned by the main window (`GWLP_USERDATA`, inside a
//! `RefCell`). Anything that can re-enter the window procedure (modal
//! dialogs, `DestroyWindow`) runs after the state borrow is released.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::mem;
use std::time::{Duration, Instant};
use tray_icon::menu::MenuEvent;
use tray_icon::{MouseButton, MouseButtonState, TrayIconEvent};
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::{
    Foundation::*,
    Graphics::Gdi::{GetStockObject, UpdateWindow, COLOR_WINDOW, DEFAULT_GUI_FONT, HBRUSH},
    System::DataExchange::{AddClipboardFormatListener, RemoveClipboardFormatListener},
    System::LibraryLoader::GetModuleHandleW,
    UI::WindowsAndMessaging::*,
};

use super::desktop::Win32Desktop;
use super::popup::LazyPopup;
use super::registry::RunKey;
use super::tray::TrayIconManager;
use super::wide;
use crate::autostart::{Autostart, ReconcileDirection};
use crate::capture::CaptureMonitor;
use crate::config::{self, Settings, SettingsStore, Toggle, WindowBounds};
use crate::event_log::{EventLog, ViewUpdate};
use crate::shell::{self, CloseAction, TrayClickTracker, APP_NAME};

/// Posted to bring the main window back (tray, notification click)
pub(crate) const WM_APP_RESTORE: u32 = WM_APP + 1;
/// Posted to exit for real (tray Exit)
const WM_APP_EXIT: u32 = WM_APP + 2;

const WINDOW_CLASS: &str = "ClipboardImageLoggerMain";
const DEFAULT_WIDTH: i32 = 900;
const DEFAULT_HEIGHT: i32 = 600;

const ID_LOG_VIEW: i32 = 100;
const ID_FILE_CLEAR: u16 = 1001;
const ID_FILE_EXIT: u16 = 1002;
const ID_TOGGLE_FIRST: u16 = 1100;
const ID_HELP_ABOUT: u16 = 1201;

// Edit control messages and styles
const EM_SETSEL: u32 = 0x00B1;
const EM_SCROLLCARET: u32 = 0x00B7;
const EM_REPLACESEL: u32 = 0x00C2;
const EM_SETLIMITTEXT: u32 = 0x00C5;
const ES_MULTILINE: u32 = 0x0004;
const ES_AUTOVSCROLL: u32 = 0x0040;
const ES_READONLY: u32 = 0x0800;

fn toggle_id(toggle: Toggle) -> u16 {
    let index = Toggle::ALL.iter().position(|t| *t == toggle).unwrap_or(0);
    ID_TOGGLE_FIRST + index as u16
}

fn toggle_for_id(id: u16) -> Option<Toggle> {
    id.checked_sub(ID_TOGGLE_FIRST)
        .and_then(|index| Toggle::ALL.get(index as usize).copied())
}

struct AppState {
    hwnd: HWND,
    edit: HWND,
    settings_menu: HMENU,
    settings: Settings,
    store: SettingsStore,
    autostart: Autostart<RunKey>,
    log: EventLog,
    monitor: CaptureMonitor,
    desktop: Win32Desktop,
    popup: LazyPopup,
    tray: TrayIconManager,
    hidden: bool,
    exit_requested: bool,
    listening: bool,
}

/// Build the main window and run the message loop until exit
pub fn run() -> Result<()> {
    let app_dir = config::app_directory()?;
    tracing::info!("Application directory: {:?}", app_dir);

    let mut store = SettingsStore::new(app_dir.join(config::SETTINGS_FILE_NAME));
    let mut settings = store.load();

    let executable = std::env::current_exe().context("Failed to resolve executable path")?;
    let mut autostart = Autostart::new(RunKey, executable);
    let run_at_startup =
        autostart.reconcile(settings.run_at_startup, ReconcileDirection::AdoptSystem);
    if run_at_startup != settings.run_at_startup {
        settings.run_at_startup = run_at_startup;
        if let Err(e) = store.save(&settings) {
            tracing::warn!("Settings not saved: {:#}", e);
        }
    }

    let log = EventLog::open(app_dir.join(config::LOG_FILE_NAME));
    let monitor = CaptureMonitor::new(&app_dir);

    let tray = TrayIconManager::new().context("Failed to create tray icon")?;
    let menu_item_restore = tray.menu_item_restore.clone();
    let menu_item_exit = tray.menu_item_exit.clone();

    let hwnd = unsafe { create_window(settings.window_bounds)? };
    let settings_menu = unsafe { create_menu(hwnd)? };
    let edit = unsafe { create_log_view(hwnd)? };

    let state = AppState {
        hwnd,
        edit,
        settings_menu,
        settings,
        store,
        autostart,
        log,
        monitor,
        desktop: Win32Desktop::new(),
        popup: LazyPopup::new(hwnd),
        tray,
        hidden: false,
        exit_requested: false,
        listening: false,
    };

    let starts_hidden = shell::starts_hidden(&state.settings);
    unsafe {
        let state_ptr = Box::into_raw(Box::new(RefCell::new(state)));
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, state_ptr as isize);

        with_state(hwnd, |state| {
            state.sync_menu();
            state.flush_view();
            state.start_listening();

            if starts_hidden {
                state.hidden = true;
                state.tray.set_visible(true);
                tracing::info!("Starting hidden in tray");
            } else {
                ShowWindow(hwnd, SW_SHOW);
                UpdateWindow(hwnd);
            }
        });
    }

    let (event_tx, event_rx) = std::sync::mpsc::channel::<TrayIconEvent>();
    let (menu_tx, menu_rx) = std::sync::mpsc::channel::<MenuEvent>();

    TrayIconEvent::set_event_handler(Some(move |event| {
        let _ = event_tx.send(event);
    }));

    MenuEvent::set_event_handler(Some(move |event| {
        let _ = menu_tx.send(event);
    }));

    tracing::info!("Entering message loop");

    let mut clicks = TrayClickTracker::new();

    unsafe {
        let mut msg = MSG::default();
        loop {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    tracing::info!("WM_QUIT received, exiting");
                    return Ok(());
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }

            while let Ok(event) = event_rx.try_recv() {
                if let TrayIconEvent::Click {
                    button: MouseButton::Left,
                    button_state: MouseButtonState::Up,
                    ..
                } = event
                {
                    if clicks.register(Instant::now()) {
                        tracing::debug!("Tray double-click");
                        let _ = PostMessageW(hwnd, WM_APP_RESTORE, WPARAM(0), LPARAM(0));
                    }
                }
            }

            while let Ok(event) = menu_rx.try_recv() {
                if event.id == menu_item_restore {
                    let _ = PostMessageW(hwnd, WM_APP_RESTORE, WPARAM(0), LPARAM(0));
                } else if event.id == menu_item_exit {
                    let _ = PostMessageW(hwnd, WM_APP_EXIT, WPARAM(0), LPARAM(0));
                }
            }

            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

unsafe fn create_window(bounds: Option<WindowBounds>) -> Result<HWND> {
    let hinstance = GetModuleHandleW(None)?;
    let class_name = wide(WINDOW_CLASS);

    let wc = WNDCLASSEXW {
        cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(wndproc),
        cbClsExtra: 0,
        cbWndExtra: 0,
        hInstance: hinstance.into(),
        hIcon: LoadIconW(None, IDI_APPLICATION)?,
        hCursor: LoadCursorW(None, IDC_ARROW)?,
        hbrBackground: HBRUSH((COLOR_WINDOW.0 + 1) as isize),
        lpszMenuName: PCWSTR::null(),
        lpszClassName: PCWSTR(class_name.as_ptr()),
        hIconSm: HICON::default(),
    };

    if RegisterClassExW(&wc) == 0 {
        anyhow::bail!("Failed to register main window class");
    }

    let (x, y, width, height) = match bounds {
        Some(b) => (b.left, b.top, b.width, b.height),
        None => (CW_USEDEFAULT, CW_USEDEFAULT, DEFAULT_WIDTH, DEFAULT_HEIGHT),
    };

    let title = HSTRING::from(APP_NAME);
    let hwnd = CreateWindowExW(
        WINDOW_EX_STYLE::default(),
        PCWSTR(class_name.as_ptr()),
        &title,
        WS_OVERLAPPEDWINDOW,
        x,
        y,
        width,
        height,
        HWND::default(),
        HMENU::default(),
        hinstance,
        None,
    );

    if hwnd == HWND::default() {
        anyhow::bail!("Failed to create main window");
    }

    Ok(hwnd)
}

/// Attach the menu bar and return the Settings submenu
unsafe fn create_menu(hwnd: HWND) -> Result<HMENU> {
    let bar = CreateMenu()?;

    let file = CreatePopupMenu()?;
    append_item(file, ID_FILE_CLEAR, "Clear log")?;
    AppendMenuW(file, MF_SEPARATOR, 0, PCWSTR::null())?;
    append_item(file, ID_FILE_EXIT, "Exit")?;
    append_submenu(bar, file, "File")?;

    let settings = CreatePopupMenu()?;
    for toggle in Toggle::ALL {
        append_item(settings, toggle_id(toggle), toggle.label())?;
    }
    append_submenu(bar, settings, "Settings")?;

    let help = CreatePopupMenu()?;
    append_item(help, ID_HELP_ABOUT, "About")?;
    append_submenu(bar, help, "Help")?;

    SetMenu(hwnd, bar).context("Failed to attach menu bar")?;
    Ok(settings)
}

unsafe fn append_item(menu: HMENU, id: u16, label: &str) -> windows::core::Result<()> {
    AppendMenuW(menu, MF_STRING, id as usize, &HSTRING::from(label))
}

unsafe fn append_submenu(bar: HMENU, submenu: HMENU, label: &str) -> windows::core::Result<()> {
    AppendMenuW(bar, MF_POPUP, submenu.0 as usize, &HSTRING::from(label))
}

unsafe fn create_log_view(parent: HWND) -> Result<HWND> {
    let hinstance = GetModuleHandleW(None)?;
    let style = WS_CHILD
        | WS_VISIBLE
        | WS_VSCROLL
        | WINDOW_STYLE(ES_MULTILINE | ES_AUTOVSCROLL | ES_READONLY);

    let edit = CreateWindowExW(
        WS_EX_CLIENTEDGE,
        &HSTRING::from("EDIT"),
        PCWSTR::null(),
        style,
        0,
        0,
        0,
        0,
        parent,
        HMENU(ID_LOG_VIEW as isize),
        hinstance,
        None,
    );

    if edit == HWND::default() {
        anyhow::bail!("Failed to create log view");
    }

    let font = GetStockObject(DEFAULT_GUI_FONT);
    SendMessageW(edit, WM_SETFONT, WPARAM(font.0 as usize), LPARAM(1));
    // Lift the 32K default limit
    SendMessageW(edit, EM_SETLIMITTEXT, WPARAM(0), LPARAM(0));

    resize_log_view(parent);
    Ok(edit)
}

unsafe fn resize_log_view(hwnd: HWND) {
    let edit = GetDlgItem(hwnd, ID_LOG_VIEW);
    if edit == HWND::default() {
        return;
    }
    let mut rect = RECT::default();
    if GetClientRect(hwnd, &mut rect).is_ok() {
        let (width, height) = (rect.right - rect.left, rect.bottom - rect.top);
        let _ = MoveWindow(edit, 0, 0, width, height, TRUE);
    }
}

unsafe fn with_state<R>(hwnd: HWND, f: impl FnOnce(&mut AppState) -> R) -> Option<R> {
    let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const RefCell<AppState>;
    if ptr.is_null() {
        return None;
    }
    let mut state = (*ptr).try_borrow_mut().ok()?;
    Some(f(&mut state))
}

unsafe extern "system" fn wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let handled = match msg {
        WM_CLIPBOARDUPDATE => with_state(hwnd, |state| state.on_clipboard_update()),
        WM_COMMAND => {
            let id = (wparam.0 & 0xFFFF) as u16;
            if id == ID_HELP_ABOUT && lparam.0 == 0 {
                show_about(hwnd);
                Some(())
            } else {
                with_state(hwnd, |state| state.on_command(id)).flatten()
            }
        }
        WM_SIZE => {
            resize_log_view(hwnd);
            if wparam.0 as u32 == SIZE_MINIMIZED {
                with_state(hwnd, |state| {
                    if shell::hides_on_minimize(&state.settings) {
                        state.hide_to_tray();
                    }
                });
            }
            Some(())
        }
        WM_CLOSE => {
            let action = with_state(hwnd, |state| state.on_close());
            if action == Some(CloseAction::Exit) {
                let _ = DestroyWindow(hwnd);
            }
            Some(())
        }
        WM_APP_RESTORE => with_state(hwnd, |state| state.restore()),
        WM_APP_EXIT => {
            with_state(hwnd, |state| state.exit_requested = true);
            let _ = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
            Some(())
        }
        WM_DESTROY => {
            let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA);
            if ptr != 0 {
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                let boxed = Box::from_raw(ptr as *mut RefCell<AppState>);
                let state = (*boxed).into_inner();
                if state.listening {
                    let _ = RemoveClipboardFormatListener(hwnd);
                }
                // Tray icon and popup go away with the state
                drop(state);
            }
            PostQuitMessage(0);
            Some(())
        }
        _ => None,
    };

    match handled {
        Some(()) => LRESULT(0),
        None => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe fn show_about(hwnd: HWND) {
    let text = HSTRING::from(shell::about_text());
    let caption = HSTRING::from(format!("About {}", APP_NAME));
    MessageBoxW(hwnd, &text, &caption, MB_OK | MB_ICONINFORMATION);
}

impl AppState {
    unsafe fn start_listening(&mut self) {
        match AddClipboardFormatListener(self.hwnd) {
            Ok(()) => {
                self.listening = true;
                tracing::info!("Clipboard listener registered");
            }
            Err(e) => {
                let code = (e.code().0 & 0xFFFF) as u32;
                tracing::warn!("AddClipboardFormatListener failed: {}", e);
                let message = format!("AddClipboardFormatListener failed. Win32={}", code);
                self.log.error(&message);
                self.flush_view();
            }
        }
    }

    unsafe fn on_clipboard_update(&mut self) {
        self.monitor.on_clipboard_update(
            &mut self.desktop,
            &self.settings,
            &mut self.log,
            &mut self.popup,
        );
        self.flush_view();
    }

    /// Menu command; None for ids that are not ours
    unsafe fn on_command(&mut self, id: u16) -> Option<()> {
        match id {
            ID_FILE_CLEAR => {
                self.log.clear();
                self.flush_view();
            }
            ID_FILE_EXIT => {
                self.exit_requested = true;
                let _ = PostMessageW(self.hwnd, WM_CLOSE, WPARAM(0), LPARAM(0));
            }
            _ => self.on_toggle(toggle_for_id(id)?),
        }
        Some(())
    }

    unsafe fn on_toggle(&mut self, toggle: Toggle) {
        let requested = !self.settings.get(toggle);
        let value = match toggle {
            // Whatever the OS ended up with is what the checkbox shows
            Toggle::RunAtStartup => self.autostart.apply_toggle(requested),
            _ => requested,
        };

        tracing::info!("{} -> {}", toggle.key(), value);
        self.settings.set(toggle, value);
        self.save_settings();
        self.sync_menu();

        if shell::restores_window(toggle, value, self.hidden) {
            self.restore();
        }
    }

    unsafe fn on_close(&mut self) -> CloseAction {
        let action = shell::close_action(&self.settings, self.exit_requested);
        match action {
            CloseAction::HideToTray => self.hide_to_tray(),
            CloseAction::Exit => {
                tracing::info!("Exiting");
                self.settings.window_bounds = self.window_bounds();
                self.save_settings();
                self.tray.set_visible(false);
            }
        }
        action
    }

    unsafe fn hide_to_tray(&mut self) {
        ShowWindow(self.hwnd, SW_HIDE);
        self.tray.set_visible(true);
        self.hidden = true;
    }

    unsafe fn restore(&mut self) {
        ShowWindow(self.hwnd, SW_SHOW);
        if IsIconic(self.hwnd).as_bool() {
            ShowWindow(self.hwnd, SW_RESTORE);
        }
        SetForegroundWindow(self.hwnd);
        self.tray.set_visible(false);
        self.hidden = false;
    }

    /// Normal (restored) bounds, valid even while minimized or hidden
    unsafe fn window_bounds(&self) -> Option<WindowBounds> {
        let mut placement = WINDOWPLACEMENT {
            length: mem::size_of::<WINDOWPLACEMENT>() as u32,
            ..Default::default()
        };
        GetWindowPlacement(self.hwnd, &mut placement).ok()?;

        let rect = placement.rcNormalPosition;
        let bounds = WindowBounds {
            left: rect.left,
            top: rect.top,
            width: rect.right - rect.left,
            height: rect.bottom - rect.top,
        };
        (bounds.width > 0 && bounds.height > 0).then_some(bounds)
    }

    fn save_settings(&self) {
        if let Err(e) = self.store.save(&self.settings) {
            tracing::warn!("Settings not saved: {:#}", e);
        }
    }

    unsafe fn sync_menu(&self) {
        for toggle in Toggle::ALL {
            let check = if self.settings.get(toggle) {
                MF_CHECKED
            } else {
                MF_UNCHECKED
            };
            CheckMenuItem(
                self.settings_menu,
                toggle_id(toggle) as u32,
                (MF_BYCOMMAND | check).0,
            );
        }

        let enable = if shell::start_minimized_available(&self.settings) {
            MF_ENABLED
        } else {
            MF_GRAYED
        };
        EnableMenuItem(
            self.settings_menu,
            toggle_id(Toggle::StartMinimized) as u32,
            MF_BYCOMMAND | enable,
        );
        let _ = DrawMenuBar(self.hwnd);
    }

    /// Push pending log text into the edit control
    unsafe fn flush_view(&mut self) {
        match self.log.take_view_update() {
            Some(ViewUpdate::Reset(text)) => {
                let _ = SetWindowTextW(self.edit, &HSTRING::from(text));
            }
            Some(ViewUpdate::Append(text)) => {
                let end = GetWindowTextLengthW(self.edit) as usize;
                SendMessageW(self.edit, EM_SETSEL, WPARAM(end), LPARAM(end as isize));
                let text = wide(&text);
                let text_ptr = LPARAM(text.as_ptr() as isize);
                SendMessageW(self.edit, EM_REPLACESEL, WPARAM(0), text_ptr);
                SendMessageW(self.edit, EM_SCROLLCARET, WPARAM(0), LPARAM(0));
            }
            None => {}
        }

        if self.log.take_scroll_request() {
            let end = GetWindowTextLengthW(self.edit) as usize;
            SendMessageW(self.edit, EM_SETSEL, WPARAM(end), LPARAM(end as isize));
            SendMessageW(self.edit, EM_SCROLLCARET, WPARAM(0), LPARAM(0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_ids_round_trip() {
        for toggle in Toggle::ALL {
            assert_eq!(toggle_for_id(toggle_id(toggle)), Some(toggle));
        }
        assert_eq!(toggle_for_id(ID_FILE_CLEAR), None);
        assert_eq!(toggle_for_id(ID_HELP_ABOUT), None);
    }
}
