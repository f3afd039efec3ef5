//! Core application module
//!
//! This module contains:
//! - The front-end session loop and worker pump (app.rs)
//! - The operator command input source (input.rs)

pub mod app;
pub mod input;
