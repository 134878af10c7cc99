/// Notification popup window with GDI+ rendering
///
/// A layered, topmost, never-activating tool window in the bottom-right
/// corner of the work area. All lifecycle decisions come from
/// [`NotificationMachine`]; this module renders and runs the two timers
/// (cursor poll and idle countdown) with `SetTimer`/`KillTimer`.
use std::cell::RefCell;
use std::mem;
use std::ptr::null_mut;
use windows::core::PCWSTR;
use windows::Win32::{
    Foundation::*,
    Graphics::{Gdi::*, GdiPlus::*},
    System::LibraryLoader::GetModuleHandleW,
    UI::WindowsAndMessaging::*,
};

use super::main_window::WM_APP_RESTORE;
use super::wide;
use crate::capture::Notifier;
use crate::notification::{
    NotificationMachine, Point as ScreenPoint, PopupEffect, Rect as ScreenRect,
    CURSOR_POLL_INTERVAL, IDLE_TIMEOUT, POPUP_HEIGHT, POPUP_MARGIN, POPUP_WIDTH,
};

const WINDOW_CLASS: &str = "ClipboardImageLoggerPopup";

const TIMER_CURSOR_POLL: usize = 1;
const TIMER_IDLE: usize = 2;

const CLOSE_SIZE: i32 = 24;
const CLOSE_LEFT: i32 = POPUP_WIDTH - 32;
const CLOSE_TOP: i32 = 8;

const MA_NOACTIVATE: isize = 3;

/// Popup window handle (state lives in GWLP_USERDATA)
pub struct NotificationPopup {
    hwnd: HWND,
}

struct PopupState {
    hwnd: HWND,
    /// Window restored when the popup body is clicked
    owner: HWND,
    machine: NotificationMachine,
    label: String,
    close_hover: bool,
    gdiplus_token: usize,
}

impl NotificationPopup {
    /// Create the (hidden) popup window
    pub fn new(owner: HWND) -> anyhow::Result<Self> {
        unsafe {
            let startup_input = GdiplusStartupInput {
                GdiplusVersion: 1,
                DebugEventCallback: 0,
                SuppressBackgroundThread: FALSE,
                SuppressExternalCodecs: FALSE,
            };
            let mut gdiplus_token: usize = 0;
            let mut output = GdiplusStartupOutput::default();
            let status = GdiplusStartup(&mut gdiplus_token, &startup_input, &mut output);
            if status.0 != 0 {
                anyhow::bail!("Failed to initialize GDI+: {}", status.0);
            }

            let hinstance = GetModuleHandleW(None)?;
            let class_name = wide(WINDOW_CLASS);

            let wc = WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(Self::wndproc),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: hinstance.into(),
                hIcon: HICON::default(),
                hCursor: LoadCursorW(None, IDC_HAND)?,
                hbrBackground: HBRUSH::default(),
                lpszMenuName: PCWSTR::null(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                hIconSm: HICON::default(),
            };

            // Already registered on a second popup is fine
            RegisterClassExW(&wc);

            let hwnd = CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WS_POPUP,
                0,
                0,
                POPUP_WIDTH,
                POPUP_HEIGHT,
                HWND::default(),
                HMENU::default(),
                hinstance,
                None,
            );

            if hwnd == HWND::default() {
                GdiplusShutdown(gdiplus_token);
                anyhow::bail!("Failed to create notification popup window");
            }

            let state = RefCell::new(PopupState {
                hwnd,
                owner,
                machine: NotificationMachine::new(),
                label: String::new(),
                close_hover: false,
                gdiplus_token,
            });
            let state_ptr = Box::into_raw(Box::new(state));
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, state_ptr as isize);

            tracing::debug!("Notification popup created");
            anyhow::Ok(Self { hwnd })
        }
    }

    /// Show the popup for `process_name`, or retarget it while shown
    pub fn show_or_update(&self, process_name: &str) {
        let work_area = work_area();
        let cursor = cursor_position().unwrap_or_default();

        unsafe {
            Self::with_state(self.hwnd, |state| {
                let machine = &mut state.machine;
                let effects = machine.show_or_update(process_name, work_area, cursor);
                state.apply(effects);
            });
        }
    }

    unsafe fn with_state<R>(hwnd: HWND, f: impl FnOnce(&mut PopupState) -> R) -> Option<R> {
        let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const RefCell<PopupState>;
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
            WM_MOUSEACTIVATE => return LRESULT(MA_NOACTIVATE),
            WM_TIMER => Self::with_state(hwnd, |state| {
                let effects = match wparam.0 {
                    TIMER_CURSOR_POLL => match cursor_position() {
                        Some(cursor) => state.machine.on_poll(cursor),
                        None => Vec::new(),
                    },
                    TIMER_IDLE => {
                        // One-shot
                        let _ = KillTimer(hwnd, TIMER_IDLE);
                        state.machine.on_countdown_elapsed()
                    }
                    _ => Vec::new(),
                };
                state.apply(effects);
            }),
            WM_MOUSEMOVE => Self::with_state(hwnd, |state| {
                let hover = in_close_button(lparam);
                if hover != state.close_hover {
                    state.close_hover = hover;
                    state.redraw();
                }
            }),
            WM_LBUTTONUP => Self::with_state(hwnd, |state| {
                let effects = if in_close_button(lparam) {
                    state.machine.close()
                } else {
                    state.machine.click()
                };
                state.apply(effects);
            }),
            WM_DESTROY => {
                let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA);
                if ptr != 0 {
                    SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                    let boxed = Box::from_raw(ptr as *mut RefCell<PopupState>);
                    GdiplusShutdown((*boxed).into_inner().gdiplus_token);
                }
                Some(())
            }
            _ => None,
        };

        match handled {
            Some(()) => LRESULT(0),
            None => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}

impl Drop for NotificationPopup {
    fn drop(&mut self) {
        unsafe {
            if self.hwnd != HWND::default() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

/// Creates the popup on first use
pub struct LazyPopup {
    owner: HWND,
    popup: Option<NotificationPopup>,
}

impl LazyPopup {
    pub fn new(owner: HWND) -> Self {
        Self { owner, popup: None }
    }
}

impl Notifier for LazyPopup {
    fn show_or_update(&mut self, process_name: &str) {
        if self.popup.is_none() {
            match NotificationPopup::new(self.owner) {
                Ok(popup) => self.popup = Some(popup),
                Err(e) => {
                    tracing::warn!("Notification popup unavailable: {:#}", e);
                    return;
                }
            }
        }

        if let Some(popup) = &self.popup {
            popup.show_or_update(process_name);
        }
    }
}

impl PopupState {
    unsafe fn apply(&mut self, effects: Vec<PopupEffect>) {
        for effect in effects {
            match effect {
                PopupEffect::SetText(text) => self.label = text,
                PopupEffect::MoveTo(rect) => {
                    let _ = SetWindowPos(
                        self.hwnd,
                        HWND_TOPMOST,
                        rect.left,
                        rect.top,
                        rect.width(),
                        rect.height(),
                        SWP_NOACTIVATE,
                    );
                    self.redraw();
                }
                PopupEffect::ShowTopmost => {
                    ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
                    let _ = SetWindowPos(
                        self.hwnd,
                        HWND_TOPMOST,
                        0,
                        0,
                        0,
                        0,
                        SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
                    );
                }
                PopupEffect::Hide => {
                    ShowWindow(self.hwnd, SW_HIDE);
                }
                PopupEffect::StartCursorPoll => {
                    SetTimer(
                        self.hwnd,
                        TIMER_CURSOR_POLL,
                        CURSOR_POLL_INTERVAL.as_millis() as u32,
                        None,
                    );
                }
                PopupEffect::StopCursorPoll => {
                    let _ = KillTimer(self.hwnd, TIMER_CURSOR_POLL);
                }
                PopupEffect::StartCountdown => {
                    SetTimer(self.hwnd, TIMER_IDLE, IDLE_TIMEOUT.as_millis() as u32, None);
                }
                PopupEffect::StopCountdown => {
                    let _ = KillTimer(self.hwnd, TIMER_IDLE);
                }
                PopupEffect::OpenMainWindow => {
                    let _ = PostMessageW(self.owner, WM_APP_RESTORE, WPARAM(0), LPARAM(0));
                }
            }
        }
    }

    unsafe fn redraw(&self) {
        if let Err(e) = self.render() {
            tracing::warn!("Popup render failed: {}", e);
        }
    }

    /// Render the popup with GDI+ into the layered window
    unsafe fn render(&self) -> anyhow::Result<()> {
        let screen_dc = GetDC(None);
        let mem_dc = CreateCompatibleDC(screen_dc);

        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: POPUP_WIDTH,
                biHeight: -POPUP_HEIGHT, // Top-down
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0 as u32,
                biSizeImage: 0,
                biXPelsPerMeter: 0,
                biYPelsPerMeter: 0,
                biClrUsed: 0,
                biClrImportant: 0,
            },
            bmiColors: [RGBQUAD::default()],
        };

        let mut bits: *mut core::ffi::c_void = null_mut();
        let hbitmap = match CreateDIBSection(mem_dc, &bmi, DIB_RGB_COLORS, &mut bits, None, 0) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                DeleteDC(mem_dc);
                ReleaseDC(None, screen_dc);
                return Err(e.into());
            }
        };
        let previous = SelectObject(mem_dc, hbitmap);

        let mut graphics: *mut GpGraphics = null_mut();
        let status = GdipCreateFromHDC(mem_dc, &mut graphics);
        if status.0 == 0 {
            self.paint(graphics);
            GdipDeleteGraphics(graphics);
            premultiply_alpha(bits as *mut u8, POPUP_WIDTH, POPUP_HEIGHT);
        }

        let win_size = SIZE {
            cx: POPUP_WIDTH,
            cy: POPUP_HEIGHT,
        };
        let src_pos = POINT { x: 0, y: 0 };
        let blend = BLENDFUNCTION {
            BlendOp: AC_SRC_OVER as u8,
            BlendFlags: 0,
            SourceConstantAlpha: 255,
            AlphaFormat: AC_SRC_ALPHA as u8,
        };

        let updated = UpdateLayeredWindow(
            self.hwnd,
            screen_dc,
            None, // Keep the position set by SetWindowPos
            Some(&win_size),
            mem_dc,
            Some(&src_pos),
            COLORREF(0),
            Some(&blend),
            ULW_ALPHA,
        );

        SelectObject(mem_dc, previous);
        DeleteObject(hbitmap);
        DeleteDC(mem_dc);
        ReleaseDC(None, screen_dc);

        if status.0 != 0 {
            anyhow::bail!("Failed to create GDI+ graphics context: {}", status.0);
        }
        updated?;
        anyhow::Ok(())
    }

    unsafe fn paint(&self, graphics: *mut GpGraphics) {
        GdipSetSmoothingMode(graphics, SmoothingMode(4)); // SmoothingModeAntiAlias
        GdipSetTextRenderingHint(graphics, TextRenderingHint(5)); // ClearTypeGridFit

        // Rounded dark card
        let mut brush_bg: *mut GpSolidFill = null_mut();
        GdipCreateSolidFill(0xF0_20_20_20, &mut brush_bg);
        let mut path: *mut GpPath = null_mut();
        GdipCreatePath(FillModeWinding, &mut path);
        add_rounded_rectangle(path, 0, 0, POPUP_WIDTH - 1, POPUP_HEIGHT - 1, 8);
        GdipFillPath(graphics, brush_bg as *mut GpBrush, path);
        GdipDeletePath(path);
        GdipDeleteBrush(brush_bg as *mut GpBrush);

        let font_family_name = wide("Segoe UI");
        let mut font_family: *mut GpFontFamily = null_mut();
        GdipCreateFontFamilyFromName(
            PCWSTR(font_family_name.as_ptr()),
            null_mut(),
            &mut font_family,
        );

        let mut font: *mut GpFont = null_mut();
        GdipCreateFont(font_family, 14.0, FontStyle(0).0, Unit(2), &mut font);

        let mut string_format: *mut GpStringFormat = null_mut();
        GdipCreateStringFormat(0, 0, &mut string_format);
        GdipSetStringFormatAlign(string_format, StringAlignmentNear);
        GdipSetStringFormatLineAlign(string_format, StringAlignmentCenter);

        // Label
        let mut brush_text: *mut GpSolidFill = null_mut();
        GdipCreateSolidFill(0xFF_FF_FF_FF, &mut brush_text);
        let text: Vec<u16> = self.label.encode_utf16().collect();
        let text_rect = RectF {
            X: POPUP_MARGIN as f32,
            Y: POPUP_MARGIN as f32,
            Width: (CLOSE_LEFT - POPUP_MARGIN * 2) as f32,
            Height: (POPUP_HEIGHT - POPUP_MARGIN * 2) as f32,
        };
        GdipDrawString(
            graphics,
            PCWSTR(text.as_ptr()),
            text.len() as i32,
            font,
            &text_rect,
            string_format,
            brush_text as *mut GpBrush,
        );

        // Close button
        if self.close_hover {
            let mut brush_hover: *mut GpSolidFill = null_mut();
            GdipCreateSolidFill(0x40_FF_FF_FF, &mut brush_hover);
            GdipFillRectangleI(
                graphics,
                brush_hover as *mut GpBrush,
                CLOSE_LEFT,
                CLOSE_TOP,
                CLOSE_SIZE,
                CLOSE_SIZE,
            );
            GdipDeleteBrush(brush_hover as *mut GpBrush);
        }

        GdipSetStringFormatAlign(string_format, StringAlignmentCenter);
        let close: Vec<u16> = "\u{00D7}".encode_utf16().collect();
        let close_rect = RectF {
            X: CLOSE_LEFT as f32,
            Y: CLOSE_TOP as f32,
            Width: CLOSE_SIZE as f32,
            Height: CLOSE_SIZE as f32,
        };
        GdipDrawString(
            graphics,
            PCWSTR(close.as_ptr()),
            close.len() as i32,
            font,
            &close_rect,
            string_format,
            brush_text as *mut GpBrush,
        );

        GdipDeleteBrush(brush_text as *mut GpBrush);
        GdipDeleteStringFormat(string_format);
        GdipDeleteFont(font);
        GdipDeleteFontFamily(font_family);
    }
}

/// Primary display work area (excludes the taskbar)
fn work_area() -> ScreenRect {
    let mut rect = RECT::default();
    let ok = unsafe {
        SystemParametersInfoW(
            SPI_GETWORKAREA,
            0,
            Some(&mut rect as *mut RECT as *mut core::ffi::c_void),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        )
    };

    if ok.is_err() {
        let (width, height) =
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        return ScreenRect::new(0, 0, width, height);
    }

    ScreenRect {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    }
}

fn cursor_position() -> Option<ScreenPoint> {
    let mut point = POINT::default();
    unsafe { GetCursorPos(&mut point) }.ok()?;
    Some(ScreenPoint::new(point.x, point.y))
}

/// Client coordinates from a mouse message fall on the close button
fn in_close_button(lparam: LPARAM) -> bool {
    let x = (lparam.0 & 0xFFFF) as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
    let button = ScreenRect::new(CLOSE_LEFT, CLOSE_TOP, CLOSE_SIZE, CLOSE_SIZE);
    button.contains(ScreenPoint::new(x, y))
}

unsafe fn add_rounded_rectangle(
    path: *mut GpPath,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    radius: i32,
) {
    let d = radius * 2;
    GdipAddPathArcI(path, x, y, d, d, 180.0, 90.0);
    GdipAddPathArcI(path, x + width - d, y, d, d, 270.0, 90.0);
    GdipAddPathArcI(path, x + width - d, y + height - d, d, d, 0.0, 90.0);
    GdipAddPathArcI(path, x, y + height - d, d, d, 90.0, 90.0);
    GdipClosePathFigure(path);
}

/// Premultiply alpha for UpdateLayeredWindow
unsafe fn premultiply_alpha(bits: *mut u8, width: i32, height: i32) {
    let pixels = std::slice::from_raw_parts_mut(bits, (width * height * 4) as usize);
    for pixel in pixels.chunks_exact_mut(4) {
        let a = pixel[3] as u16;
        if a > 0 && a < 255 {
            pixel[0] = ((pixel[0] as u16 * a) / 255) as u8;
            pixel[1] = ((pixel[1] as u16 * a) / 255) as u8;
            pixel[2] = ((pixel[2] as u16 * a) / 255) as u8;
        }
    }
}
