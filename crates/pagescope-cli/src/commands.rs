//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pagescope: capture and inspect in-page debug reports
#[derive(Parser, Debug)]
#[command(name = "pagescope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a page in Chromium, record it, and write a report
    Capture(CaptureArgs),

    /// Print the tabs and rows of an exported report
    Render(RenderArgs),

    /// Show the effective debugger configuration
    Config(ConfigArgs),
}

/// Arguments for the capture command
#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// Page to open
    pub url: String,

    /// How long to record after the page loads, in milliseconds
    #[arg(short, long, default_value = "2000")]
    pub duration_ms: u64,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Debugger configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the Chromium binary
    #[arg(long)]
    pub chromium: Option<String>,
}

/// Arguments for the render command
#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Exported report (JSON)
    pub file: PathBuf,

    /// Only show one section (html, network, storage, console, sources)
    #[arg(short, long)]
    pub section: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: RenderFormat,
}

/// Render output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderFormat {
    /// Tabs, section headers and rows
    #[default]
    Text,
    /// Normalized pretty JSON
    Json,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration file to load (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ignore any file and print the defaults
    #[arg(long)]
    pub defaults: bool,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;

    #[test]
    fn test_capture_defaults() {
        let cli = Cli::try_parse_from(["pagescope", "capture", "https://example.com"]).unwrap();
        let Commands::Capture(args) = cli.command else {
            panic!("expected capture");
        };
        assert_eq!(args.url, "https://example.com");
        assert_eq!(args.duration_ms, 2000);
        assert!(args.output.is_none());
        assert!(!args.headed);
    }

    #[test]
    fn test_capture_options() {
        let cli = Cli::try_parse_from([
            "pagescope",
            "-vv",
            "capture",
            "https://example.com",
            "--duration-ms",
            "500",
            "--output",
            "report.json",
            "--no-sandbox",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Capture(args) = cli.command else {
            panic!("expected capture");
        };
        assert_eq!(args.duration_ms, 500);
        assert_eq!(args.output, Some(PathBuf::from("report.json")));
        assert!(args.no_sandbox);
    }

    #[test]
    fn test_render_args() {
        let cli = Cli::try_parse_from([
            "pagescope", "render", "r.json", "--section", "console", "--format", "json",
        ])
        .unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.file, PathBuf::from("r.json"));
        assert_eq!(args.section.as_deref(), Some("console"));
        assert_eq!(args.format, RenderFormat::Json);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pagescope", "config", "--quiet", "--color", "never"])
            .unwrap();
        assert!(cli.quiet);
        assert_eq!(ColorChoice::from(cli.color), ColorChoice::Never);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["pagescope"]).is_err());
    }
}
