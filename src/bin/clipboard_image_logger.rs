//! ClipboardImageLogger - tray-resident clipboard image logger
//!
//! This process:
//! - Refuses to start twice (named mutex)
//! - Listens for clipboard changes and logs every image with its source window
//! - Hosts the main log window, tray icon and notification popup

#![cfg_attr(windows, windows_subsystem = "windows")]

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use clipboard_image_logger::platform::{instance, main_window};

    tracing_subscriber::fmt::init();

    tracing::info!("ClipboardImageLogger starting...");

    let Some(_guard) = instance::InstanceGuard::acquire()? else {
        tracing::info!("Another instance is running, exiting");
        instance::show_already_running();
        return Ok(());
    };

    main_window::run()
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    anyhow::bail!("ClipboardImageLogger only runs on Windows")
}
