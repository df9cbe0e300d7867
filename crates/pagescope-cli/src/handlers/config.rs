//! Config command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::commands::ConfigArgs;
use pagescope::DebuggerConfig;
use std::path::Path;

/// Execute the config command
pub fn execute_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let debugger = if args.defaults {
        DebuggerConfig::default()
    } else {
        load_debugger_config(args.config.as_deref())?
    };
    print!("{}", render_config(config, &debugger)?);
    Ok(())
}

/// Load a debugger configuration, or the defaults when no file is given
pub fn load_debugger_config(path: Option<&Path>) -> CliResult<DebuggerConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading debugger config");
            Ok(DebuggerConfig::from_yaml_file(path)?)
        }
        None => Ok(DebuggerConfig::default()),
    }
}

/// Effective configuration as YAML
pub fn render_config(cli: &CliConfig, debugger: &DebuggerConfig) -> CliResult<String> {
    let mut out = format!(
        "# verbosity: {:?}, color: {:?}\n",
        cli.verbosity, cli.color
    );
    out.push_str(&debugger.to_yaml()?);
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Verbosity;

    #[test]
    fn test_no_path_gives_defaults() {
        assert_eq!(load_debugger_config(None).unwrap(), DebuggerConfig::default());
    }

    #[test]
    fn test_loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagescope.yaml");
        std::fs::write(&path, "fetch_timeout_ms: 1500\nmax_buffered_events: 10\n").unwrap();
        let config = load_debugger_config(Some(&path)).unwrap();
        assert_eq!(config.fetch_timeout_ms, 1500);
        assert_eq!(config.max_buffered_events, Some(10));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_debugger_config(Some(&dir.path().join("none.yaml"))).is_err());
    }

    #[test]
    fn test_render_config() {
        let cli = CliConfig::new().with_verbosity(Verbosity::Verbose);
        let text = render_config(&cli, &DebuggerConfig::default()).unwrap();
        assert!(text.starts_with("# verbosity: Verbose"));
        assert!(text.contains("fetch_timeout_ms: 10000"));
        assert!(text.contains("Subject for email"));
    }
}
