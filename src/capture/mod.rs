//! Frame capture and code detection
//!
//! This module contains:
//! - The frame type shipped across the worker channel (frame.rs)
//! - Frame sources read by the worker (source.rs)
//! - Decoder seams and the scan dispatcher (scanner.rs)
//! - The rxing-backed DataMatrix and Code128 decoders (barcode.rs)
//! - The rqrr-backed QR decoder (qr.rs)

pub mod barcode;
pub mod frame;
pub mod qr;
pub mod scanner;
pub mod source;

pub use frame::Frame;
pub use scanner::ScanDispatcher;
pub use source::{FrameSource, ImageFileSource};

/// Dispatcher with every decoder backend linked into this build
pub fn default_dispatcher() -> ScanDispatcher {
    ScanDispatcher::new()
        .with_matrix_decoder(barcode::RxingMatrixDecoder)
        .with_symbol_decoder(
            scanner::DecoderChain::new()
                .then(barcode::RxingCode128Decoder)
                .then(qr::RqrrDecoder::default()),
        )
}
