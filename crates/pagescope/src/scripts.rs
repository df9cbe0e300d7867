//! Instrumentation Scripts
//!
//! Fixed snippets injected into the document. They are opaque payloads:
//! this module only declares what each one is expected to return (its
//! [`ReturnContract`]), never how it does it.
//!
//! | Script | File | Contract |
//! |--------|------|----------|
//! | Console interceptor | `consoleLog.js` | pushes to `logHandler` |
//! | Network interceptor | `networkTraffic.js` | pushes to `networkHandler` |
//! | Local storage reader | `localStorage.js` | flat string map |
//! | Session storage reader | `sessionStorage.js` | flat string map |
//! | Markup reader | (inline) | text |

use crate::bridge::UserScript;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Channel the console interceptor posts to
pub const CONSOLE_CHANNEL: &str = "logHandler";

/// Channel the network interceptor posts to
pub const NETWORK_CHANNEL: &str = "networkHandler";

const CONSOLE_LOG_JS: &str = include_str!("js/consoleLog.js");
const NETWORK_TRAFFIC_JS: &str = include_str!("js/networkTraffic.js");
const LOCAL_STORAGE_JS: &str = include_str!("js/localStorage.js");
const SESSION_STORAGE_JS: &str = include_str!("js/sessionStorage.js");
const MARKUP_JS: &str = "document.documentElement.outerHTML.toString()";

/// The fixed snippets the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScriptKind {
    /// Wraps `console.log`
    ConsoleInterceptor,
    /// Wraps `XMLHttpRequest.prototype.open`
    NetworkInterceptor,
    /// Reads `localStorage`
    LocalStorage,
    /// Reads `sessionStorage`
    SessionStorage,
    /// Serializes the document markup
    Markup,
}

impl ScriptKind {
    /// All script kinds
    pub const ALL: [Self; 5] = [
        Self::ConsoleInterceptor,
        Self::NetworkInterceptor,
        Self::LocalStorage,
        Self::SessionStorage,
        Self::Markup,
    ];

    /// Resource name (file stem)
    #[must_use]
    pub const fn resource_name(&self) -> &'static str {
        match self {
            Self::ConsoleInterceptor => "consoleLog",
            Self::NetworkInterceptor => "networkTraffic",
            Self::LocalStorage => "localStorage",
            Self::SessionStorage => "sessionStorage",
            Self::Markup => "outerHTML",
        }
    }

    /// What the document hands back for this script
    #[must_use]
    pub const fn contract(&self) -> ReturnContract {
        match self {
            Self::ConsoleInterceptor => ReturnContract::Channel(CONSOLE_CHANNEL),
            Self::NetworkInterceptor => ReturnContract::Channel(NETWORK_CHANNEL),
            Self::LocalStorage | Self::SessionStorage => ReturnContract::StringMap,
            Self::Markup => ReturnContract::Text,
        }
    }

    const fn bundled_source(self) -> &'static str {
        match self {
            Self::ConsoleInterceptor => CONSOLE_LOG_JS,
            Self::NetworkInterceptor => NETWORK_TRAFFIC_JS,
            Self::LocalStorage => LOCAL_STORAGE_JS,
            Self::SessionStorage => SESSION_STORAGE_JS,
            Self::Markup => MARKUP_JS,
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

/// Declared result of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnContract {
    /// Returns nothing useful; pushes events to the named channel
    Channel(&'static str),
    /// Returns a flat `{string: string}` object
    StringMap,
    /// Returns a string
    Text,
}

/// The script bodies used for one debugger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSet {
    console: String,
    network: String,
    local_storage: String,
    session_storage: String,
    markup: String,
}

impl Default for ScriptSet {
    fn default() -> Self {
        Self::bundled()
    }
}

impl ScriptSet {
    /// Scripts compiled into the crate
    #[must_use]
    pub fn bundled() -> Self {
        Self {
            console: CONSOLE_LOG_JS.to_string(),
            network: NETWORK_TRAFFIC_JS.to_string(),
            local_storage: LOCAL_STORAGE_JS.to_string(),
            session_storage: SESSION_STORAGE_JS.to_string(),
            markup: MARKUP_JS.to_string(),
        }
    }

    /// Load `<resource>.js` overrides from a directory
    ///
    /// Missing or unreadable files keep the bundled body.
    #[must_use]
    pub fn from_dir(dir: &Path) -> Self {
        let mut set = Self::bundled();
        for kind in ScriptKind::ALL {
            if kind == ScriptKind::Markup {
                continue;
            }
            let path = dir.join(format!("{}.js", kind.resource_name()));
            match std::fs::read_to_string(&path) {
                Ok(source) => *set.slot_mut(kind) = source,
                Err(e) => {
                    tracing::warn!(script = %kind, path = %path.display(), error = %e, "using bundled script");
                }
            }
        }
        set
    }

    /// Body of a script
    #[must_use]
    pub fn source(&self, kind: ScriptKind) -> &str {
        match kind {
            ScriptKind::ConsoleInterceptor => &self.console,
            ScriptKind::NetworkInterceptor => &self.network,
            ScriptKind::LocalStorage => &self.local_storage,
            ScriptKind::SessionStorage => &self.session_storage,
            ScriptKind::Markup => &self.markup,
        }
    }

    /// Whether a script still has its bundled body
    #[must_use]
    pub fn is_bundled(&self, kind: ScriptKind) -> bool {
        self.source(kind) == kind.bundled_source()
    }

    /// Wrap an interceptor as a document-start user script
    #[must_use]
    pub fn user_script(&self, kind: ScriptKind) -> UserScript {
        UserScript::new(kind.resource_name(), self.source(kind))
    }

    fn slot_mut(&mut self, kind: ScriptKind) -> &mut String {
        match kind {
            ScriptKind::ConsoleInterceptor => &mut self.console,
            ScriptKind::NetworkInterceptor => &mut self.network,
            ScriptKind::LocalStorage => &mut self.local_storage,
            ScriptKind::SessionStorage => &mut self.session_storage,
            ScriptKind::Markup => &mut self.markup,
        }
    }
}

/// Interpret a [`ReturnContract::StringMap`] result
///
/// Non-string values are kept in their compact JSON form. Anything that is
/// not an object yields `None`.
#[must_use]
pub fn parse_string_map(value: &Value) -> Option<BTreeMap<String, String>> {
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect(),
    )
}

/// Interpret a [`ReturnContract::Text`] result
#[must_use]
pub fn parse_text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundled_interceptors_post_to_their_channels() {
        let set = ScriptSet::bundled();
        assert!(set
            .source(ScriptKind::ConsoleInterceptor)
            .contains(CONSOLE_CHANNEL));
        assert!(set
            .source(ScriptKind::NetworkInterceptor)
            .contains(NETWORK_CHANNEL));
    }

    #[test]
    fn test_interceptors_guard_against_double_wrap() {
        let set = ScriptSet::bundled();
        assert!(set
            .source(ScriptKind::ConsoleInterceptor)
            .contains("window.__pagescopeConsole"));
        assert!(set
            .source(ScriptKind::NetworkInterceptor)
            .contains("window.__pagescopeNetwork"));
    }

    #[test]
    fn test_contracts() {
        assert_eq!(
            ScriptKind::ConsoleInterceptor.contract(),
            ReturnContract::Channel("logHandler")
        );
        assert_eq!(ScriptKind::LocalStorage.contract(), ReturnContract::StringMap);
        assert_eq!(ScriptKind::Markup.contract(), ReturnContract::Text);
    }

    #[test]
    fn test_from_dir_overrides_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("localStorage.js"), "({a: '1'})").unwrap();

        let set = ScriptSet::from_dir(dir.path());
        assert_eq!(set.source(ScriptKind::LocalStorage), "({a: '1'})");
        assert!(!set.is_bundled(ScriptKind::LocalStorage));
        assert!(set.is_bundled(ScriptKind::SessionStorage));
        assert!(set.is_bundled(ScriptKind::ConsoleInterceptor));
    }

    #[test]
    fn test_parse_string_map() {
        let map = parse_string_map(&json!({"token": "abc", "count": 3, "flag": true})).unwrap();
        assert_eq!(map["token"], "abc");
        assert_eq!(map["count"], "3");
        assert_eq!(map["flag"], "true");

        assert!(parse_string_map(&json!("nope")).is_none());
        assert!(parse_string_map(&Value::Null).is_none());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(parse_text(&json!("<html></html>")).as_deref(), Some("<html></html>"));
        assert!(parse_text(&json!(42)).is_none());
    }

    #[test]
    fn test_user_script_names() {
        let script = ScriptSet::bundled().user_script(ScriptKind::NetworkInterceptor);
        assert_eq!(script.name, "networkTraffic");
        assert!(script.source.contains("XMLHttpRequest"));
    }
}
