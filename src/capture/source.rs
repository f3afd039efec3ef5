//! Frame sources read by the capture worker

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::frame::Frame;

/// Anything that can produce frames for a source selector.
///
/// Capture failures never escape as errors: the source returns a placeholder
/// frame describing the failure and the next call tries again.
pub trait FrameSource {
    fn get_frame(&mut self, selector: &str) -> Frame;
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];

/// Reads frames from an image file, or cycles through the images of a directory.
///
/// The open handle is kept across calls and reopened when the selector changes.
/// A single file is re-read every call so an external grabber can keep
/// overwriting it.
#[derive(Debug, Default)]
pub struct ImageFileSource {
    opened: Option<OpenSource>,
}

#[derive(Debug)]
struct OpenSource {
    selector: String,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(selector: &str) -> Result<OpenSource> {
        if selector.trim().is_empty() {
            bail!("No video source selected");
        }
        let path = Path::new(selector);
        let files = if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to list source directory: {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_image(p))
                .collect();
            files.sort();
            if files.is_empty() {
                bail!("Source directory contains no images: {}", path.display());
            }
            files
        } else if path.exists() {
            vec![path.to_path_buf()]
        } else {
            bail!("Error starting video stream '{selector}'");
        };
        log::info!("Opened video source '{}' ({} image(s))", selector, files.len());
        Ok(OpenSource {
            selector: selector.to_string(),
            files,
            next: 0,
        })
    }

    fn read_next(&mut self, selector: &str) -> Result<Frame> {
        let reopen = self
            .opened
            .as_ref()
            .is_none_or(|open| open.selector != selector);
        if reopen {
            self.opened = None;
            self.opened = Some(Self::open(selector)?);
        }
        let Some(open) = self.opened.as_mut() else {
            bail!("Video source '{selector}' is not open");
        };

        let path = open.files[open.next % open.files.len()].clone();
        open.next = (open.next + 1) % open.files.len();

        let rgba = image::open(&path)
            .with_context(|| format!("Failed to read frame from {}", path.display()))?
            .to_rgba8();
        Ok(Frame::new(rgba))
    }
}

impl FrameSource for ImageFileSource {
    fn get_frame(&mut self, selector: &str) -> Frame {
        match self.read_next(selector) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("Capture failed: {:#}", err);
                // Drop the handle so the next cycle retries from scratch
                self.opened = None;
                Frame::placeholder(format!("{err:#}"))
            }
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, width: u32, shade: u8) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, 4, Rgba([shade, shade, shade, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_missing_source_gives_placeholder() {
        let mut source = ImageFileSource::new();
        let frame = source.get_frame("/definitely/not/here.png");
        assert!(frame.is_placeholder());
        assert!(frame.error.unwrap().contains("/definitely/not/here.png"));
    }

    #[test]
    fn test_empty_selector_gives_placeholder() {
        let mut source = ImageFileSource::new();
        assert!(source.get_frame("").is_placeholder());
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "frame.png", 8, 10);
        let mut source = ImageFileSource::new();
        let frame = source.get_frame(path.to_str().unwrap());
        assert!(!frame.is_placeholder());
        assert_eq!((frame.width(), frame.height()), (8, 4));
    }

    #[test]
    fn test_directory_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 6, 20);
        write_png(dir.path(), "a.png", 5, 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let selector = dir.path().to_str().unwrap().to_string();

        let mut source = ImageFileSource::new();
        let widths: Vec<u32> = (0..3).map(|_| source.get_frame(&selector).width()).collect();
        assert_eq!(widths, vec![5, 6, 5]);
    }

    #[test]
    fn test_recovers_once_source_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.png");
        let selector = path.to_str().unwrap().to_string();

        let mut source = ImageFileSource::new();
        assert!(source.get_frame(&selector).is_placeholder());
        write_png(dir.path(), "late.png", 3, 0);
        assert!(!source.get_frame(&selector).is_placeholder());
    }
}
