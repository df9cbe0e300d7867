//! Scripted document backend.

use crate::bridge::{BridgeMessage, ChannelRegistry, DocumentContext, MessageHandler, UserScript};
use crate::collector::FetchKind;
use crate::cookie::Cookie;
use crate::result::{ScopeError, ScopeResult};
use crate::scripts::{ScriptKind, ScriptSet, CONSOLE_CHANNEL, NETWORK_CHANNEL};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    markup: String,
    local_storage: BTreeMap<String, String>,
    session_storage: BTreeMap<String, String>,
    cookies: Vec<Cookie>,
    failing: HashSet<FetchKind>,
    delays: HashMap<FetchKind, Duration>,
    responses: HashMap<String, Value>,
    reject_user_scripts: bool,
    user_scripts: Vec<UserScript>,
    evaluated: Vec<String>,
    console_live: bool,
    network_live: bool,
    loads: usize,
}

/// In-process document with scripted responses
///
/// Interceptors become live either by being evaluated directly or, once
/// installed as user scripts, on the next [`MockDocument::reload`].
/// [`MockDocument::console_log`] and [`MockDocument::xhr_load`] only reach
/// the host while the matching interceptor is live, as in a real page.
#[derive(Debug)]
pub struct MockDocument {
    registry: ChannelRegistry,
    known: ScriptSet,
    state: Mutex<MockState>,
    cookie_reads: AtomicUsize,
    cookie_in_flight: AtomicUsize,
    cookie_peak: AtomicUsize,
}

impl Default for MockDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocument {
    /// Empty document
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ChannelRegistry::new(),
            known: ScriptSet::bundled(),
            state: Mutex::new(MockState::default()),
            cookie_reads: AtomicUsize::new(0),
            cookie_in_flight: AtomicUsize::new(0),
            cookie_peak: AtomicUsize::new(0),
        }
    }

    /// Recognize scripts from `set` instead of the bundled bodies
    #[must_use]
    pub fn with_scripts(mut self, set: ScriptSet) -> Self {
        self.known = set;
        self
    }

    /// Document markup
    #[must_use]
    pub fn with_markup(self, markup: impl Into<String>) -> Self {
        self.lock().markup = markup.into();
        self
    }

    /// `localStorage` contents
    #[must_use]
    pub fn with_local_storage<K, V>(self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.lock()
            .local_storage
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// `sessionStorage` contents
    #[must_use]
    pub fn with_session_storage<K, V>(self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.lock()
            .session_storage
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a cookie to the native store
    #[must_use]
    pub fn with_cookie(self, cookie: Cookie) -> Self {
        self.lock().cookies.push(cookie);
        self
    }

    /// Make one fetch fail
    #[must_use]
    pub fn failing(self, kind: FetchKind) -> Self {
        self.lock().failing.insert(kind);
        self
    }

    /// Delay one fetch
    #[must_use]
    pub fn with_delay(self, kind: FetchKind, delay: Duration) -> Self {
        self.lock().delays.insert(kind, delay);
        self
    }

    /// Reject every user-script installation
    #[must_use]
    pub fn rejecting_user_scripts(self) -> Self {
        self.lock().reject_user_scripts = true;
        self
    }

    /// Return `value` whenever exactly `script` is evaluated
    pub fn respond_to(&self, script: &str, value: Value) {
        self.lock().responses.insert(script.to_string(), value);
    }

    /// Simulate a navigation: the old page's interceptors are gone and the
    /// installed user scripts run against the new one
    pub fn reload(&self) {
        let mut state = self.lock();
        state.loads += 1;
        state.console_live = false;
        state.network_live = false;
        let scripts: Vec<String> = state.user_scripts.iter().map(|s| s.source.clone()).collect();
        for source in &scripts {
            self.activate(&mut state, source);
        }
    }

    /// Page calls `console.log(text)`; returns whether the host received it
    pub fn console_log(&self, text: &str) -> bool {
        if !self.lock().console_live {
            return false;
        }
        self.registry.dispatch(&BridgeMessage::new(
            CONSOLE_CHANNEL,
            Value::String(text.to_string()),
        ))
    }

    /// A request in the page finished loading
    pub fn xhr_load(&self, status: Option<u16>, url: &str, response: Value) -> bool {
        if !self.lock().network_live {
            return false;
        }
        let mut payload = Map::new();
        if let Some(status) = status {
            payload.insert("status".into(), Value::from(status));
        }
        payload.insert("responseURL".into(), Value::String(url.to_string()));
        payload.insert("response".into(), response);
        self.registry
            .dispatch(&BridgeMessage::new(NETWORK_CHANNEL, Value::Object(payload)))
    }

    /// Post an arbitrary payload through the bridge shim
    pub fn post(&self, channel: &str, payload: Value) -> bool {
        self.registry.dispatch(&BridgeMessage::new(channel, payload))
    }

    /// Channels with a registered handler
    #[must_use]
    pub fn registered_channels(&self) -> Vec<String> {
        self.registry.channel_names()
    }

    /// Currently installed user scripts
    #[must_use]
    pub fn user_scripts(&self) -> Vec<UserScript> {
        self.lock().user_scripts.clone()
    }

    /// Every script evaluated so far, in order
    #[must_use]
    pub fn evaluated(&self) -> Vec<String> {
        self.lock().evaluated.clone()
    }

    /// How many times a script body was evaluated
    #[must_use]
    pub fn evaluation_count(&self, script: &str) -> usize {
        self.lock().evaluated.iter().filter(|s| *s == script).count()
    }

    /// Whether the console interceptor is active in the current page
    #[must_use]
    pub fn console_intercepted(&self) -> bool {
        self.lock().console_live
    }

    /// Whether the network interceptor is active in the current page
    #[must_use]
    pub fn network_intercepted(&self) -> bool {
        self.lock().network_live
    }

    /// Cookie store reads so far
    #[must_use]
    pub fn cookie_reads(&self) -> usize {
        self.cookie_reads.load(Ordering::SeqCst)
    }

    /// Most cookie reads ever in flight at once
    #[must_use]
    pub fn max_concurrent_cookie_reads(&self) -> usize {
        self.cookie_peak.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn activate(&self, state: &mut MockState, source: &str) {
        if source == self.known.source(ScriptKind::ConsoleInterceptor) {
            state.console_live = true;
        } else if source == self.known.source(ScriptKind::NetworkInterceptor) {
            state.network_live = true;
        }
    }

    fn fetch_kind(&self, script: &str) -> Option<FetchKind> {
        [
            (ScriptKind::Markup, FetchKind::Html),
            (ScriptKind::LocalStorage, FetchKind::LocalStorage),
            (ScriptKind::SessionStorage, FetchKind::SessionStorage),
        ]
        .into_iter()
        .find(|(kind, _)| self.known.source(*kind) == script)
        .map(|(_, fetch)| fetch)
    }

    async fn pause_for(&self, kind: FetchKind) -> ScopeResult<()> {
        let (delay, fails) = {
            let state = self.lock();
            (state.delays.get(&kind).copied(), state.failing.contains(&kind))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(match kind {
                FetchKind::Cookies => ScopeError::cookie_store("cookie store unavailable"),
                other => ScopeError::evaluation(format!("{other} script failed")),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentContext for MockDocument {
    fn register_handler(&self, name: &str, handler: Arc<dyn MessageHandler>) {
        self.registry.register(name, handler);
    }

    fn unregister_handler(&self, name: &str) {
        self.registry.unregister(name);
    }

    async fn evaluate(&self, script: &str) -> ScopeResult<Value> {
        {
            let mut state = self.lock();
            state.evaluated.push(script.to_string());
            self.activate(&mut state, script);
        }
        let kind = self.fetch_kind(script);
        if let Some(kind) = kind {
            self.pause_for(kind).await?;
        }

        let state = self.lock();
        if let Some(value) = state.responses.get(script) {
            return Ok(value.clone());
        }
        Ok(match kind {
            Some(FetchKind::Html) => Value::String(state.markup.clone()),
            Some(FetchKind::LocalStorage) => string_object(&state.local_storage),
            Some(FetchKind::SessionStorage) => string_object(&state.session_storage),
            _ => Value::Null,
        })
    }

    async fn add_user_script(&self, script: UserScript) -> ScopeResult<()> {
        let mut state = self.lock();
        if state.reject_user_scripts {
            return Err(ScopeError::injection(script.name, "user scripts disabled"));
        }
        state.user_scripts.push(script);
        Ok(())
    }

    async fn remove_all_user_scripts(&self) -> ScopeResult<()> {
        self.lock().user_scripts.clear();
        Ok(())
    }

    async fn cookies(&self) -> ScopeResult<Vec<Cookie>> {
        self.cookie_reads.fetch_add(1, Ordering::SeqCst);
        let now = self.cookie_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.cookie_peak.fetch_max(now, Ordering::SeqCst);
        let outcome = self.pause_for(FetchKind::Cookies).await;
        self.cookie_in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome?;
        Ok(self.lock().cookies.clone())
    }
}

fn string_object(entries: &BTreeMap<String, String>) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Sink(Mutex<Vec<BridgeMessage>>);

    impl MessageHandler for Sink {
        fn on_message(&self, message: &BridgeMessage) {
            self.0.lock().unwrap().push(message.clone());
        }
    }

    #[tokio::test]
    async fn test_console_needs_live_interceptor() {
        let doc = MockDocument::new();
        let sink = Arc::new(Sink(Mutex::new(Vec::new())));
        doc.register_handler(CONSOLE_CHANNEL, sink.clone());

        assert!(!doc.console_log("early"));
        let set = ScriptSet::bundled();
        doc.evaluate(set.source(ScriptKind::ConsoleInterceptor))
            .await
            .unwrap();
        assert!(doc.console_log("late"));

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].payload, json!("late"));
    }

    #[tokio::test]
    async fn test_user_scripts_apply_on_reload() {
        let doc = MockDocument::new();
        let set = ScriptSet::bundled();
        doc.add_user_script(set.user_script(ScriptKind::NetworkInterceptor))
            .await
            .unwrap();
        assert!(!doc.network_intercepted());
        doc.reload();
        assert!(doc.network_intercepted());
        assert!(!doc.console_intercepted());

        doc.remove_all_user_scripts().await.unwrap();
        doc.reload();
        assert!(!doc.network_intercepted());
    }

    #[tokio::test]
    async fn test_storage_scripts_return_objects() {
        let doc = MockDocument::new().with_local_storage([("k", "v")]);
        let set = ScriptSet::bundled();
        let value = doc.evaluate(set.source(ScriptKind::LocalStorage)).await.unwrap();
        assert_eq!(value, json!({"k": "v"}));
        let value = doc
            .evaluate(set.source(ScriptKind::SessionStorage))
            .await
            .unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_failing_cookie_store() {
        let doc = MockDocument::new().failing(FetchKind::Cookies);
        assert!(matches!(
            doc.cookies().await,
            Err(ScopeError::CookieStore { .. })
        ));
        assert_eq!(doc.cookie_reads(), 1);
    }

    #[tokio::test]
    async fn test_rejecting_user_scripts() {
        let doc = MockDocument::new().rejecting_user_scripts();
        let err = doc
            .add_user_script(UserScript::new("x", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScopeError::Injection { .. }));
        assert!(doc.user_scripts().is_empty());
    }
}
