//! Interactive scanning session
//!
//! This module contains:
//! - Screen/frame coordinate mapping (viewport.rs)
//! - The hover/selection/lookup state machine (arbiter.rs)
//! - Operator input events (messages.rs)

pub mod arbiter;
pub mod messages;
pub mod viewport;

pub use arbiter::{ArbiterState, DetectionMode, OverlayRole, SelectionArbiter};
pub use messages::InputEvent;
pub use viewport::ViewportMapper;
