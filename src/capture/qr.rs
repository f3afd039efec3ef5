//! QR code decoding using rqrr

use image::RgbaImage;

use super::scanner::{SymbolDecoder, SymbolHit};
use crate::domain::Point;

/// Type tag reported for every hit from this decoder
pub const QR_TAG: &str = "QRCODE";

/// QR decoder backed by rqrr.
///
/// Frames larger than `max_dim` are downsampled before grid detection and the
/// outline is scaled back to full-resolution frame pixels.
#[derive(Clone, Debug)]
pub struct RqrrDecoder {
    /// Largest dimension fed to rqrr; 0 disables downsampling
    max_dim: u32,
}

impl Default for RqrrDecoder {
    fn default() -> Self {
        Self { max_dim: 1280 }
    }
}

impl SymbolDecoder for RqrrDecoder {
    fn decode(&self, img: &RgbaImage) -> anyhow::Result<Vec<SymbolHit>> {
        use rqrr::PreparedImage;

        let (orig_w, orig_h) = (img.width(), img.height());
        let downsample_factor = if self.max_dim > 0 && (orig_w > self.max_dim || orig_h > self.max_dim)
        {
            orig_w.max(orig_h) as f32 / self.max_dim as f32
        } else {
            1.0
        };

        let gray = if downsample_factor > 1.0 {
            let new_w = (orig_w as f32 / downsample_factor) as u32;
            let new_h = (orig_h as f32 / downsample_factor) as u32;
            let resized =
                image::imageops::resize(img, new_w, new_h, image::imageops::FilterType::Nearest);
            image::DynamicImage::ImageRgba8(resized).to_luma8()
        } else {
            image::DynamicImage::ImageRgba8(img.clone()).to_luma8()
        };

        let mut prepared = PreparedImage::prepare(gray);
        let grids = prepared.detect_grids();

        let mut results = Vec::new();
        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => {
                    let polygon = grid
                        .bounds
                        .iter()
                        .map(|p| {
                            Point::new(
                                (p.x as f32 * downsample_factor).round() as i32,
                                (p.y as f32 * downsample_factor).round() as i32,
                            )
                        })
                        .collect();
                    results.push(SymbolHit {
                        payload: content.into_bytes(),
                        tag: QR_TAG.to_string(),
                        polygon,
                    });
                }
                Err(err) => log::debug!("QR grid found but not decodable: {}", err),
            }
        }

        Ok(results)
    }
}
