//! Saving composited frames to disk

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;

/// Timestamped snapshot file name inside `dir`
pub fn snapshot_path(dir: &Path) -> PathBuf {
    let name = chrono::Local::now()
        .format("PartScan_%Y-%m-%d_%H-%M-%S.png")
        .to_string();
    dir.join(name)
}

/// Save the image as PNG into `dir`, creating it if needed
pub fn save_snapshot(img: &RgbaImage, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create snapshot dir: {}", dir.display()))?;
    let path = snapshot_path(dir);
    img.save_with_format(&path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to save snapshot: {}", path.display()))?;
    Ok(path)
}
