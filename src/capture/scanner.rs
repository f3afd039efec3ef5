//! Multi-decoder scan dispatch
//!
//! Runs the enabled decoders over one frame and normalizes their native
//! coordinate conventions into top-left-origin frame pixels.

use image::RgbaImage;

use crate::domain::{CodeGeometry, Point, Polygon, Rect, Symbology, SymbologySet};

/// Rectangle as reported by libdmtx-style datamatrix decoders.
///
/// `top` is measured upward from the bottom edge of the frame and marks the
/// lower edge of the code, so the rectangle spans `top..top + height` counted
/// from the bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl MatrixRect {
    /// Flip into top-left-origin coordinates for a frame `frame_height` tall
    pub fn to_frame_rect(self, frame_height: u32) -> Rect {
        let bottom = frame_height as i32 - self.top;
        Rect::new(self.left, bottom - self.height, self.left + self.width, bottom)
    }
}

/// One datamatrix hit
#[derive(Clone, Debug)]
pub struct MatrixHit {
    pub payload: Vec<u8>,
    pub rect: MatrixRect,
}

/// One linear/QR hit with the decoder's own type tag
#[derive(Clone, Debug)]
pub struct SymbolHit {
    pub payload: Vec<u8>,
    pub tag: String,
    pub polygon: Vec<Point>,
}

/// Datamatrix decoder seam
pub trait MatrixDecoder: Send {
    fn decode(&self, frame: &RgbaImage) -> anyhow::Result<Vec<MatrixHit>>;
}

/// Linear barcode / QR decoder seam; one call covers every symbology it knows
pub trait SymbolDecoder: Send {
    fn decode(&self, frame: &RgbaImage) -> anyhow::Result<Vec<SymbolHit>>;
}

/// Several linear/QR backends behind one `SymbolDecoder` call.
///
/// Hits come back in backend order. A backend that fails is logged and
/// skipped so the others still contribute.
#[derive(Default)]
pub struct DecoderChain {
    decoders: Vec<Box<dyn SymbolDecoder>>,
}

impl DecoderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, decoder: impl SymbolDecoder + 'static) -> Self {
        self.decoders.push(Box::new(decoder));
        self
    }
}

impl SymbolDecoder for DecoderChain {
    fn decode(&self, frame: &RgbaImage) -> anyhow::Result<Vec<SymbolHit>> {
        let mut hits = Vec::new();
        for decoder in &self.decoders {
            match decoder.decode(frame) {
                Ok(found) => hits.extend(found),
                Err(err) => log::debug!("Barcode backend failed: {:#}", err),
            }
        }
        Ok(hits)
    }
}

/// Holds the available decoders and runs the ones a command asks for
#[derive(Default)]
pub struct ScanDispatcher {
    matrix: Option<Box<dyn MatrixDecoder>>,
    symbols: Option<Box<dyn SymbolDecoder>>,
}

impl ScanDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matrix_decoder(mut self, decoder: impl MatrixDecoder + 'static) -> Self {
        self.matrix = Some(Box::new(decoder));
        self
    }

    pub fn with_symbol_decoder(mut self, decoder: impl SymbolDecoder + 'static) -> Self {
        self.symbols = Some(Box::new(decoder));
        self
    }

    /// Scan one frame for the enabled symbologies.
    ///
    /// Datamatrix results come first, then linear/QR results, each in decoder
    /// order. A decoder that fails contributes nothing this cycle.
    pub fn scan(&self, frame: &RgbaImage, enabled: SymbologySet) -> Vec<CodeGeometry> {
        let mut results = Vec::new();

        if enabled.datamatrix
            && let Some(decoder) = &self.matrix
        {
            match decoder.decode(frame) {
                Ok(hits) => {
                    for hit in hits {
                        let rect = hit.rect.to_frame_rect(frame.height());
                        results.push(CodeGeometry::new(
                            hit.payload,
                            Symbology::Datamatrix2D,
                            rect.into(),
                        ));
                    }
                }
                Err(err) => log::debug!("Datamatrix decode failed: {:#}", err),
            }
        }

        if enabled.wants_symbol_decoder()
            && let Some(decoder) = &self.symbols
        {
            match decoder.decode(frame) {
                Ok(hits) => {
                    for hit in hits {
                        let Some(symbology) = Symbology::from_tag(&hit.tag) else {
                            log::warn!("Unexpected barcode scheme: {}", hit.tag);
                            continue;
                        };
                        if !enabled.contains(symbology) {
                            continue;
                        }
                        results.push(CodeGeometry::new(
                            hit.payload,
                            symbology,
                            Polygon::new(hit.polygon),
                        ));
                    }
                }
                Err(err) => log::debug!("Barcode decode failed: {:#}", err),
            }
        }

        results
    }
}
