//! Pagescope CLI Library
//!
//! Command-line front end for pagescope: record a page in Chromium, then
//! inspect the exported report.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    CaptureArgs, Cli, ColorArg, Commands, ConfigArgs, RenderArgs, RenderFormat,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{format_view, ProgressReporter};
