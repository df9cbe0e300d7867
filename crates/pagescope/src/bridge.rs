//! Bridge Channel - Document ↔ Host Messaging
//!
//! Named message channels between injected document-side code and the host
//! coordinator, plus request/response style script evaluation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │  Document                    │        │  Host                        │
//! │                              │  post  │                              │
//! │  window.__pagescope.post() ──┼───────►│  ChannelRegistry             │
//! │                              │        │    "logHandler"  → Weak ──┐  │
//! │                              │        │    "networkHandler" → Weak│  │
//! │                              │ result │                           ▼  │
//! │  evaluate(script) ◄──────────┼────────┤  DebuggerReceiver (owned by  │
//! │                              │        │  the coordinator)            │
//! └──────────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! The registry only ever holds [`WeakHandler`]s, so a document context that
//! outlives the coordinator never keeps it alive.

use crate::cookie::Cookie;
use crate::result::ScopeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Host-provided function the prelude sends envelopes through
pub const TRANSPORT_BINDING: &str = "__pagescopeTransport";

/// Global shim every pushing script posts through.
///
/// Backends define `window.__pagescopeTransport(text)` before this prelude
/// runs; the prelude wraps it into `window.__pagescope.post(channel, payload)`.
pub const BRIDGE_PRELUDE: &str = r"(function() {
    if (window.__pagescope) { return; }
    window.__pagescope = {
        post: function(channel, payload) {
            try {
                window.__pagescopeTransport(JSON.stringify({ channel: channel, payload: payload }));
            } catch (e) {}
        }
    };
})();";

/// A message pushed by injected code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    /// Channel name the message was posted to
    pub channel: String,
    /// Open-ended structured payload
    pub payload: Value,
}

impl BridgeMessage {
    /// Create a new message
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    /// Decode the envelope produced by [`BRIDGE_PRELUDE`]
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a `{channel, payload}` object
    pub fn from_envelope(text: &str) -> ScopeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Receives messages for one or more channels
pub trait MessageHandler: Send + Sync {
    /// Called once per inbound message
    fn on_message(&self, message: &BridgeMessage);
}

/// Non-owning adapter between a channel and its real handler
///
/// Messages arriving after the target is dropped are ignored.
pub struct WeakHandler<H: ?Sized> {
    target: Weak<H>,
}

impl<H: MessageHandler + 'static> WeakHandler<H> {
    /// Wrap a handler without taking ownership
    #[must_use]
    pub fn new(target: &Arc<H>) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }

    /// Whether the target is still alive
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl<H: ?Sized> fmt::Debug for WeakHandler<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandler")
            .field("alive", &(self.target.strong_count() > 0))
            .finish()
    }
}

impl<H: MessageHandler + 'static> MessageHandler for WeakHandler<H> {
    fn on_message(&self, message: &BridgeMessage) {
        if let Some(target) = self.target.upgrade() {
            target.on_message(message);
        }
    }
}

/// Name → handler table shared by document backends
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    handlers: Arc<Mutex<HashMap<String, Arc<dyn MessageHandler>>>>,
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channel_names())
            .finish()
    }
}

impl ChannelRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a channel
    pub fn register(&self, name: &str, handler: Arc<dyn MessageHandler>) {
        self.lock().insert(name.to_string(), handler);
    }

    /// Remove a channel. Unknown names are fine.
    pub fn unregister(&self, name: &str) {
        self.lock().remove(name);
    }

    /// Whether a channel currently has a handler
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Registered channel names, sorted
    #[must_use]
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver a message; returns whether any handler received it
    pub fn dispatch(&self, message: &BridgeMessage) -> bool {
        // Clone the handler out so it runs without the table lock held.
        let handler = self.lock().get(&message.channel).cloned();
        match handler {
            Some(handler) => {
                handler.on_message(message);
                true
            }
            None => {
                tracing::trace!(channel = %message.channel, "dropping message for unregistered channel");
                false
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn MessageHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A script installed to run at document start of every load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserScript {
    /// Name for logs and removal bookkeeping
    pub name: String,
    /// Script body
    pub source: String,
}

impl UserScript {
    /// Create a user script
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// A live, script-capable document the engine attaches to
#[async_trait]
pub trait DocumentContext: Send + Sync {
    /// Route messages posted to `name` to `handler`
    fn register_handler(&self, name: &str, handler: Arc<dyn MessageHandler>);

    /// Stop routing `name`. Idempotent.
    fn unregister_handler(&self, name: &str);

    /// Run a snippet in the document and return its JSON result
    async fn evaluate(&self, script: &str) -> ScopeResult<Value>;

    /// Install a script for every future document load
    async fn add_user_script(&self, script: UserScript) -> ScopeResult<()>;

    /// Remove every installed user script
    async fn remove_all_user_scripts(&self) -> ScopeResult<()>;

    /// Read the native cookie store
    async fn cookies(&self) -> ScopeResult<Vec<Cookie>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<BridgeMessage>>,
    }

    impl MessageHandler for Recorder {
        fn on_message(&self, message: &BridgeMessage) {
            self.seen.lock().unwrap().push(message.clone());
        }
    }

    #[test]
    fn test_dispatch_to_registered_channel() {
        let registry = ChannelRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register("logHandler", Arc::new(WeakHandler::new(&recorder)));

        let delivered = registry.dispatch(&BridgeMessage::new("logHandler", json!("hello")));
        assert!(delivered);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unregistered_channel_is_dropped() {
        let registry = ChannelRegistry::new();
        let delivered = registry.dispatch(&BridgeMessage::new("nobody", json!(1)));
        assert!(!delivered);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ChannelRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register("logHandler", Arc::new(WeakHandler::new(&recorder)));
        registry.unregister("logHandler");
        registry.unregister("logHandler");
        registry.unregister("never-registered");
        assert!(!registry.is_registered("logHandler"));
    }

    #[test]
    fn test_weak_handler_does_not_keep_target_alive() {
        let registry = ChannelRegistry::new();
        let recorder = Arc::new(Recorder::default());
        let weak = WeakHandler::new(&recorder);
        assert!(weak.is_alive());
        registry.register("logHandler", Arc::new(weak));

        let probe = Arc::downgrade(&recorder);
        drop(recorder);
        assert!(probe.upgrade().is_none());

        // Still registered, but delivery is a silent no-op.
        assert!(registry.dispatch(&BridgeMessage::new("logHandler", json!("late"))));
    }

    #[test]
    fn test_envelope_decoding() {
        let msg = BridgeMessage::from_envelope(r#"{"channel":"networkHandler","payload":{"status":200}}"#)
            .unwrap();
        assert_eq!(msg.channel, "networkHandler");
        assert_eq!(msg.payload["status"], 200);

        assert!(BridgeMessage::from_envelope("not json").is_err());
    }

    #[test]
    fn test_channel_names_sorted() {
        let registry = ChannelRegistry::new();
        let recorder = Arc::new(Recorder::default());
        registry.register("b", Arc::new(WeakHandler::new(&recorder)));
        registry.register("a", Arc::new(WeakHandler::new(&recorder)));
        assert_eq!(registry.channel_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_prelude_posts_through_transport() {
        assert!(BRIDGE_PRELUDE.contains(&format!("window.{TRANSPORT_BINDING}(")));
        assert!(BRIDGE_PRELUDE.contains("if (window.__pagescope) { return; }"));
    }
}
