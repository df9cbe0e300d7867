//! Native cookie records and their report text.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for every timestamp in a report
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp as `yyyy-MM-dd HH:mm:ss` (UTC)
#[must_use]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Cookie `SameSite` policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SameSite {
    /// Strict
    Strict,
    /// Lax
    Lax,
    /// None
    None,
}

impl SameSite {
    /// Lowercase policy name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lax => "lax",
            Self::None => "none",
        }
    }
}

/// A cookie read from the native cookie store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain
    pub domain: String,
    /// Path
    pub path: String,
    /// Expiry; `None` for session cookies
    pub expires: Option<DateTime<Utc>>,
    /// Secure flag
    pub secure: bool,
    /// HttpOnly flag
    pub http_only: bool,
    /// SameSite policy, if the store reports one
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// Create a session cookie for `/`
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: String::from("/"),
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Set the path
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the expiry
    #[must_use]
    pub const fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the expiry from seconds since the Unix epoch
    ///
    /// Negative or out-of-range values mean a session cookie.
    #[must_use]
    pub fn with_expires_unix(mut self, seconds: f64) -> Self {
        self.expires = if seconds.is_finite() && seconds >= 0.0 {
            #[allow(clippy::cast_possible_truncation)]
            Utc.timestamp_opt(seconds as i64, 0).single()
        } else {
            None
        };
        self
    }

    /// Set the Secure flag
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the HttpOnly flag
    #[must_use]
    pub const fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the SameSite policy
    #[must_use]
    pub const fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expires = self
            .expires
            .as_ref()
            .map_or_else(|| String::from("nil"), format_timestamp);
        let same_site = self.same_site.map_or("none", |s| s.as_str());
        writeln!(f, "Name    : {}", self.name)?;
        writeln!(f, "Value   : {}", self.value)?;
        writeln!(f, "domain  : {}", self.domain)?;
        writeln!(f, "path    : {}", self.path)?;
        writeln!(f, "expires : {expires}")?;
        writeln!(f, "Secure  : {}", self.secure)?;
        writeln!(f, "HTTPOnly: {}", self.http_only)?;
        write!(f, "SameSite: {same_site}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_timestamp(&at), "2024-03-09 07:05:01");
    }

    #[test]
    fn test_session_cookie_description() {
        let cookie = Cookie::new("sid", "abc", "example.com");
        let text = cookie.to_string();
        assert_eq!(
            text,
            "Name    : sid\n\
             Value   : abc\n\
             domain  : example.com\n\
             path    : /\n\
             expires : nil\n\
             Secure  : false\n\
             HTTPOnly: false\n\
             SameSite: none"
        );
    }

    #[test]
    fn test_full_cookie_description() {
        let cookie = Cookie::new("pref", "dark", ".example.com")
            .with_path("/app")
            .with_expires_unix(0.0)
            .with_secure(true)
            .with_http_only(true)
            .with_same_site(SameSite::Lax);
        let text = cookie.to_string();
        assert!(text.contains("expires : 1970-01-01 00:00:00"));
        assert!(text.contains("Secure  : true"));
        assert!(text.contains("HTTPOnly: true"));
        assert!(text.ends_with("SameSite: lax"));
    }

    #[test]
    fn test_negative_expiry_is_session() {
        let cookie = Cookie::new("a", "b", "c").with_expires_unix(-1.0);
        assert!(cookie.expires.is_none());
        let cookie = Cookie::new("a", "b", "c").with_expires_unix(f64::NAN);
        assert!(cookie.expires.is_none());
    }
}
