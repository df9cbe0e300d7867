//! CLI configuration

use serde::{Deserialize, Serialize};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - lifecycle logs
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Build from `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// `tracing` filter used when `RUST_LOG` is unset
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stderr().features().colors_supported(),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default_verbosity() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Debug);
        }

        #[test]
        fn test_is_quiet_and_verbose() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(!Verbosity::Normal.is_quiet());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Verbose.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
        }

        #[test]
        fn test_filter_directive() {
            assert_eq!(Verbosity::Quiet.filter_directive(), "error");
            assert_eq!(Verbosity::Normal.filter_directive(), "warn");
            assert_eq!(Verbosity::Debug.filter_directive(), "debug");
        }
    }

    mod color_tests {
        use super::*;

        #[test]
        fn test_explicit_choices() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_builder() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Debug)
                .with_color(ColorChoice::Never);
            assert_eq!(config.verbosity, Verbosity::Debug);
            assert_eq!(config.color, ColorChoice::Never);
        }
    }
}
