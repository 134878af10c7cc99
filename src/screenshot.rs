//! Saving captured clipboard images as PNG files

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Decoded clipboard bitmap, tightly packed RGBA8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Replace every character Windows rejects in a file name with `_`
pub fn sanitize_file_component(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return "unknown".to_string();
    }

    name.chars()
        .map(|c| match c {
            '"' | '<' | '>' | '|' | ':' | '*' | '?' | '\\' | '/' => '_',
            c if (c as u32) < 32 => '_',
            c => c,
        })
        .collect()
}

/// `image_<yyyyMMdd_HHmmss>_<process>.png`
pub fn screenshot_file_name(process_name: &str, at: DateTime<Local>) -> String {
    format!(
        "image_{}_{}.png",
        at.format("%Y%m%d_%H%M%S"),
        sanitize_file_component(process_name)
    )
}

/// Write `image` as a PNG into `dir` and return the path written
pub fn save_png(
    dir: &Path,
    image: &ClipboardImage,
    process_name: &str,
    at: DateTime<Local>,
) -> Result<PathBuf> {
    let (width, height) = (image.width, image.height);
    let buffer = image::RgbaImage::from_raw(width, height, image.rgba.clone())
        .ok_or_else(|| anyhow!("Pixel buffer does not match {}x{}", width, height))?;

    let path = dir.join(screenshot_file_name(process_name, at));
    buffer
        .save_with_format(&path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
