/// System tray icon for the hidden main window
///
/// The icon only exists on screen while the main window is hidden to the
/// tray. Left double-click restores the window; the context menu offers
/// Restore and Exit. Events are delivered through `tray-icon`'s global
/// handlers and polled by the main loop.
use anyhow::{anyhow, Result};
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::shell::APP_NAME;

const ICON_SIZE: u32 = 16;

/// Load application icon from favicon.ico next to the executable
fn load_app_icon() -> Result<Icon> {
    let paths_to_try = [
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.join("favicon.ico"))),
        Some(std::path::PathBuf::from("favicon.ico")),
    ];

    for path in paths_to_try.into_iter().flatten() {
        if !path.exists() {
            continue;
        }

        let icon_data = std::fs::read(&path)
            .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

        let img = image::load_from_memory(&icon_data)
            .map_err(|e| anyhow!("Failed to decode icon: {}", e))?;

        let img = img.resize_exact(ICON_SIZE, ICON_SIZE, image::imageops::FilterType::Lanczos3);
        let rgba = img.to_rgba8();

        return Icon::from_rgba(rgba.into_raw(), ICON_SIZE, ICON_SIZE)
            .map_err(|e| anyhow!("Failed to create icon from image: {:?}", e));
    }

    // Fallback: blue square
    let icon_rgba: Vec<u8> = (0..ICON_SIZE * ICON_SIZE)
        .flat_map(|_| [0x1E, 0x88, 0xE5, 0xFF])
        .collect();
    Icon::from_rgba(icon_rgba, ICON_SIZE, ICON_SIZE)
        .map_err(|e| anyhow!("Failed to create fallback icon: {:?}", e))
}

pub struct TrayIconManager {
    tray_icon: TrayIcon,
    pub menu_item_restore: MenuId,
    pub menu_item_exit: MenuId,
}

impl TrayIconManager {
    /// Create the tray icon, initially hidden
    pub fn new() -> Result<Self> {
        tracing::info!("Creating tray icon");

        let icon = load_app_icon()?;

        let menu = Menu::new();
        let restore_item = MenuItem::new("Restore", true, None);
        let separator = PredefinedMenuItem::separator();
        let exit_item = MenuItem::new("Exit", true, None);

        menu.append(&restore_item)
            .map_err(|e| anyhow!("Failed to add restore item: {}", e))?;
        menu.append(&separator)
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
        menu.append(&exit_item)
            .map_err(|e| anyhow!("Failed to add exit item: {}", e))?;

        let menu_item_restore = restore_item.id().clone();
        let menu_item_exit = exit_item.id().clone();

        let tray_icon = TrayIconBuilder::new()
            .with_tooltip(APP_NAME)
            .with_icon(icon)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| anyhow!("Failed to create tray icon: {}", e))?;

        let manager = Self {
            tray_icon,
            menu_item_restore,
            menu_item_exit,
        };
        manager.set_visible(false);

        tracing::info!("Tray icon created");
        Ok(manager)
    }

    pub fn set_visible(&self, visible: bool) {
        if let Err(e) = self.tray_icon.set_visible(visible) {
            tracing::warn!("Failed to change tray icon visibility: {}", e);
        }
    }
}
