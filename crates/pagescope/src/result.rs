//! Result and error types for Pagescope.

use thiserror::Error;

/// Result type for Pagescope operations
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Errors that can occur in Pagescope
///
/// None of these ever reach the host as a crash: the tracker and the
/// collector turn every one of them into an inactive feature or an empty
/// report section.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Script evaluation in the document failed
    #[error("Script evaluation failed: {message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// Installing an instrumentation script failed
    #[error("Script injection failed for {script}: {message}")]
    Injection {
        /// Script name
        script: String,
        /// Error message
        message: String,
    },

    /// Native cookie store could not be read
    #[error("Cookie store read failed: {message}")]
    CookieStore {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// A serialized report could not be turned back into a snapshot
    #[error("Invalid report: {message}")]
    InvalidReport {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ScopeError {
    /// Create an evaluation error
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create an injection error
    #[must_use]
    pub fn injection(script: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Injection {
            script: script.into(),
            message: message.into(),
        }
    }

    /// Create a cookie store error
    #[must_use]
    pub fn cookie_store(message: impl Into<String>) -> Self {
        Self::CookieStore {
            message: message.into(),
        }
    }

    /// Create an invalid report error
    #[must_use]
    pub fn invalid_report(message: impl Into<String>) -> Self {
        Self::InvalidReport {
            message: message.into(),
        }
    }
}
