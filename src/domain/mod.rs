//! Pure domain types with minimal dependencies
//!
//! Types here are shared by the capture worker and the interactive front end
//! and carry no I/O.

pub mod code;
pub mod geometry;

pub use code::*;
pub use geometry::*;
