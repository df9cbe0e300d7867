//! Debugger configuration

use crate::export::MailDefaults;
use crate::result::{ScopeError, ScopeResult};
use crate::scripts::ScriptSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-fetch timeout in milliseconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Debugger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    /// Directory with `<resource>.js` script overrides
    pub scripts_dir: Option<PathBuf>,
    /// Per-fetch timeout in milliseconds (0 = wait forever)
    pub fetch_timeout_ms: u64,
    /// Cap on buffered events per kind (None = unbounded)
    pub max_buffered_events: Option<usize>,
    /// Also run interceptors in the already-loaded document on start
    pub inject_into_current: bool,
    /// Mail draft defaults
    pub mail: MailDefaults,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            scripts_dir: None,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            max_buffered_events: None,
            inject_into_current: true,
            mail: MailDefaults::default(),
        }
    }
}

impl DebuggerConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the script override directory
    #[must_use]
    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = Some(dir.into());
        self
    }

    /// Set the fetch timeout
    #[must_use]
    pub const fn with_fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.fetch_timeout_ms = ms;
        self
    }

    /// Set the buffered event cap
    #[must_use]
    pub const fn with_max_buffered_events(mut self, max: usize) -> Self {
        self.max_buffered_events = Some(max);
        self
    }

    /// Set whether interceptors also run in the current document
    #[must_use]
    pub const fn with_inject_into_current(mut self, inject: bool) -> Self {
        self.inject_into_current = inject;
        self
    }

    /// Set mail defaults
    #[must_use]
    pub fn with_mail(mut self, mail: MailDefaults) -> Self {
        self.mail = mail;
        self
    }

    /// Fetch timeout, if any
    #[must_use]
    pub const fn fetch_timeout(&self) -> Option<Duration> {
        if self.fetch_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.fetch_timeout_ms))
        }
    }

    /// Scripts to inject and evaluate
    #[must_use]
    pub fn script_set(&self) -> ScriptSet {
        self.scripts_dir
            .as_deref()
            .map_or_else(ScriptSet::bundled, ScriptSet::from_dir)
    }

    /// Parse YAML
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is invalid
    pub fn from_yaml(text: &str) -> ScopeResult<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_yaml_file(path: &Path) -> ScopeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ScopeError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_yaml(&text)
    }

    /// Render as YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> ScopeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}
