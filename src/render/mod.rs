//! Preview rendering module
//!
//! This module contains:
//! - Overlay layout constants and screen-space math
//! - Compositing with tiny-skia (letterbox, outlines, labels)
//! - Bitmap text
//! - Render sinks and snapshot saving

pub mod geometry;
pub mod image;
pub mod sink;
pub mod snapshot;
pub mod text;

pub use self::image::{OverlayStyle, compose};
pub use sink::{DisplayFields, HeadlessSink, RenderSink};
