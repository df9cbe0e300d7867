//! Pagescope CLI: capture and inspect in-page debug reports
//!
//! ## Usage
//!
//! ```bash
//! pagescope capture https://example.com -o report.json   # Record a page
//! pagescope render report.json --section console         # Inspect a report
//! pagescope config --defaults                            # Show settings
//! ```

use clap::Parser;
use pagescope_cli::{
    handlers::{execute_capture, execute_config, execute_render},
    Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match cli.command {
        Commands::Capture(args) => execute_capture(&config, &args),
        Commands::Render(args) => execute_render(&config, &args),
        Commands::Config(args) => execute_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

/// Logs go to stderr so reports written to stdout stay parseable
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_quiet_wins() {
        let cli = Cli::parse_from(["pagescope", "-q", "-vv", "config"]);
        let config = build_config(&cli);
        assert_eq!(config.verbosity, Verbosity::Quiet);
    }

    #[test]
    fn test_build_config_color() {
        let cli = Cli::parse_from(["pagescope", "--color", "never", "-v", "config"]);
        let config = build_config(&cli);
        assert_eq!(config.color, ColorChoice::Never);
        assert_eq!(config.verbosity, Verbosity::Verbose);
    }
}
