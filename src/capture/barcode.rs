//! DataMatrix and Code128 decoding using rxing
//!
//! Each decoder runs rxing's multi-barcode reader over the grayscale frame and
//! keeps only its own format. rxing reports points in top-left-origin pixels;
//! the datamatrix decoder re-expresses them as libdmtx-style rectangles so the
//! dispatcher's single bottom-origin correction applies to every matrix backend.

use anyhow::Result;
use image::RgbaImage;
use rxing::{BarcodeFormat, RXingResult};

use super::scanner::{MatrixDecoder, MatrixHit, MatrixRect, SymbolDecoder, SymbolHit};
use crate::domain::Point;

/// Type tag reported for Code128 hits
pub const CODE128_TAG: &str = "CODE128";

fn detect(frame: &RgbaImage, format: BarcodeFormat) -> Vec<RXingResult> {
    let luma = image::imageops::grayscale(frame);
    let (width, height) = luma.dimensions();
    match rxing::helpers::detect_multiple_in_luma(luma.into_raw(), width, height) {
        Ok(results) => results
            .into_iter()
            .filter(|r| *r.getBarcodeFormat() == format)
            .collect(),
        Err(e) => {
            // Nothing found is reported as an error too
            log::trace!("rxing found no {:?}: {:?}", format, e);
            Vec::new()
        }
    }
}

fn result_points(result: &RXingResult) -> Vec<Point> {
    result
        .getPoints()
        .iter()
        .map(|p| Point::new(p.x.round() as i32, p.y.round() as i32))
        .collect()
}

/// Bounding box of top-left-origin points as a bottom-origin rectangle
fn to_matrix_rect(points: &[Point], frame_height: u32) -> Option<MatrixRect> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    if max_x <= min_x || max_y <= min_y {
        return None;
    }
    Some(MatrixRect {
        left: min_x,
        top: frame_height as i32 - max_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RxingMatrixDecoder;

impl MatrixDecoder for RxingMatrixDecoder {
    fn decode(&self, frame: &RgbaImage) -> Result<Vec<MatrixHit>> {
        let mut hits = Vec::new();
        for result in detect(frame, BarcodeFormat::DATA_MATRIX) {
            let points = result_points(&result);
            let Some(rect) = to_matrix_rect(&points, frame.height()) else {
                log::debug!("Datamatrix without usable corners: {:?}", points);
                continue;
            };
            hits.push(MatrixHit {
                payload: result.getText().as_bytes().to_vec(),
                rect,
            });
        }
        Ok(hits)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RxingCode128Decoder;

impl SymbolDecoder for RxingCode128Decoder {
    fn decode(&self, frame: &RgbaImage) -> Result<Vec<SymbolHit>> {
        Ok(detect(frame, BarcodeFormat::CODE_128)
            .into_iter()
            .map(|result| SymbolHit {
                payload: result.getText().as_bytes().to_vec(),
                tag: CODE128_TAG.to_string(),
                polygon: result_points(&result),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ScanDispatcher;
    use crate::domain::{Symbology, SymbologySet};
    use image::Rgba;
    use rxing::{MultiFormatWriter, Writer};

    const DM_PAYLOAD: &str = "[)>\x1e06\x1d1P595-LM358DR\x1e\x04";

    /// Draw an encoded symbol `scale` pixels per module at (x0, y0)
    fn render(
        contents: &str,
        format: BarcodeFormat,
        size: (i32, i32),
        scale: u32,
        canvas: (u32, u32),
        origin: (u32, u32),
    ) -> (RgbaImage, (u32, u32)) {
        let matrix = MultiFormatWriter::default()
            .encode(contents, &format, size.0, size.1)
            .unwrap();
        let (mw, mh) = (matrix.getWidth(), matrix.getHeight());
        let mut img = RgbaImage::from_pixel(canvas.0, canvas.1, Rgba([255, 255, 255, 255]));
        for y in 0..mh {
            for x in 0..mw {
                if !matrix.get(x, y) {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        img.put_pixel(
                            origin.0 + x * scale + dx,
                            origin.1 + y * scale + dy,
                            Rgba([0, 0, 0, 255]),
                        );
                    }
                }
            }
        }
        (img, (mw * scale, mh * scale))
    }

    #[test]
    fn test_to_matrix_rect_measures_from_bottom() {
        let points = [
            Point::new(10, 20),
            Point::new(40, 20),
            Point::new(40, 50),
            Point::new(10, 50),
        ];
        let rect = to_matrix_rect(&points, 100).unwrap();
        assert_eq!(
            rect,
            MatrixRect {
                left: 10,
                top: 50,
                width: 30,
                height: 30,
            }
        );
        assert!(to_matrix_rect(&points[..1], 100).is_none());
        assert!(to_matrix_rect(&[], 100).is_none());
    }

    #[test]
    fn test_datamatrix_decoded_and_flipped_once() {
        let origin = (40, 30);
        let (frame, (w, h)) = render(
            DM_PAYLOAD,
            BarcodeFormat::DATA_MATRIX,
            (1, 1),
            6,
            (360, 320),
            origin,
        );

        let hits = RxingMatrixDecoder.decode(&frame).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, DM_PAYLOAD.as_bytes());

        // After the dispatcher's correction the outline sits where the symbol was drawn
        let dispatcher = ScanDispatcher::new().with_matrix_decoder(RxingMatrixDecoder);
        let codes = dispatcher.scan(&frame, SymbologySet::default());
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].symbology, Symbology::Datamatrix2D);
        let slack = 12;
        for p in codes[0].polygon.points() {
            let (x0, y0) = (origin.0 as i32, origin.1 as i32);
            assert!(p.x >= x0 - slack && p.x <= x0 + w as i32 + slack, "{p:?}");
            assert!(p.y >= y0 - slack && p.y <= y0 + h as i32 + slack, "{p:?}");
        }
    }

    #[test]
    fn test_code128_decoded_with_tag() {
        let (frame, _) = render(
            "LOT-42",
            BarcodeFormat::CODE_128,
            (1, 40),
            3,
            (600, 200),
            (20, 40),
        );

        let hits = RxingCode128Decoder.decode(&frame).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, b"LOT-42");
        assert_eq!(hits[0].tag, CODE128_TAG);
        assert!(hits[0].polygon.len() >= 2);
    }

    #[test]
    fn test_code128_decoder_ignores_datamatrix() {
        let (frame, _) = render(
            DM_PAYLOAD,
            BarcodeFormat::DATA_MATRIX,
            (1, 1),
            6,
            (360, 320),
            (40, 30),
        );
        assert!(RxingCode128Decoder.decode(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let frame = RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255]));
        assert!(RxingMatrixDecoder.decode(&frame).unwrap().is_empty());
        assert!(RxingCode128Decoder.decode(&frame).unwrap().is_empty());
    }
}
