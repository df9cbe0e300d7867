//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Tests

pub mod capture;
pub mod config;
pub mod render;

pub use capture::execute_capture;
pub use config::{execute_config, load_debugger_config, render_config};
pub use render::{execute_render, render_report};
