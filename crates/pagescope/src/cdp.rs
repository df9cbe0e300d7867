//! Chromium document backend.
//!
//! Drives a real page over the Chrome `DevTools` Protocol via chromiumoxide.
//! The bridge transport is a `Runtime.addBinding` function; user scripts map
//! onto `Page.addScriptToEvaluateOnNewDocument`.

use crate::bridge::{
    BridgeMessage, ChannelRegistry, DocumentContext, MessageHandler, UserScript, BRIDGE_PRELUDE,
    TRANSPORT_BINDING,
};
use crate::cookie::{Cookie, SameSite};
use crate::result::{ScopeError, ScopeResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::network::{Cookie as CdpCookie, CookieSameSite};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, RemoveScriptToEvaluateOnNewDocumentParams,
    ScriptIdentifier,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set window dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// A launched Chromium
#[derive(Debug)]
pub struct Browser {
    inner: CdpBrowser,
    handler: tokio::task::JoinHandle<()>,
}

impl Browser {
    /// Launch a new browser instance
    ///
    /// # Errors
    ///
    /// Returns error if browser cannot be launched
    pub async fn launch(config: &BrowserConfig) -> ScopeResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|message| ScopeError::BrowserLaunch { message })?;

        let (inner, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ScopeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        tracing::info!(headless = config.headless, "browser launched");
        Ok(Self { inner, handler })
    }

    /// Open a blank page and attach a document to it
    ///
    /// # Errors
    ///
    /// Returns error if the page cannot be created or instrumented
    pub async fn open_document(&self) -> ScopeResult<CdpDocument> {
        let page = self
            .inner
            .new_page("about:blank")
            .await
            .map_err(|e| ScopeError::Navigation {
                url: String::from("about:blank"),
                message: e.to_string(),
            })?;
        CdpDocument::attach(page).await
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Returns error if the browser does not shut down cleanly
    pub async fn close(mut self) -> ScopeResult<()> {
        let closed = self.inner.close().await;
        self.handler.abort();
        closed.map_err(|e| ScopeError::BrowserLaunch {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

/// A Chromium page as a [`DocumentContext`]
#[derive(Debug)]
pub struct CdpDocument {
    page: Page,
    registry: ChannelRegistry,
    installed: Mutex<Vec<(String, ScriptIdentifier)>>,
    listener: tokio::task::JoinHandle<()>,
}

impl CdpDocument {
    /// Install the bridge on `page` and start routing its messages
    ///
    /// # Errors
    ///
    /// Returns error if the binding or prelude cannot be installed
    pub async fn attach(page: Page) -> ScopeResult<Self> {
        let mut events = page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| ScopeError::injection(TRANSPORT_BINDING, e.to_string()))?;
        page.execute(AddBindingParams::new(TRANSPORT_BINDING))
            .await
            .map_err(|e| ScopeError::injection(TRANSPORT_BINDING, e.to_string()))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(BRIDGE_PRELUDE))
            .await
            .map_err(|e| ScopeError::injection("bridge prelude", e.to_string()))?;
        page.evaluate(BRIDGE_PRELUDE)
            .await
            .map_err(|e| ScopeError::injection("bridge prelude", e.to_string()))?;

        let registry = ChannelRegistry::new();
        let routes = registry.clone();
        let listener = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.name != TRANSPORT_BINDING {
                    continue;
                }
                match BridgeMessage::from_envelope(&event.payload) {
                    Ok(message) => {
                        routes.dispatch(&message);
                    }
                    Err(e) => tracing::debug!(error = %e, "malformed bridge envelope"),
                }
            }
        });

        Ok(Self {
            page,
            registry,
            installed: Mutex::new(Vec::new()),
            listener,
        })
    }

    /// Navigate and wait for the load to finish
    ///
    /// # Errors
    ///
    /// Returns error if navigation fails
    pub async fn goto(&self, url: &str) -> ScopeResult<()> {
        let navigation_error = |e: chromiumoxide::error::CdpError| ScopeError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        self.page.goto(url).await.map_err(navigation_error)?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(navigation_error)?;
        tracing::debug!(url, "navigated");
        Ok(())
    }

    /// The underlying page
    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }
}

impl Drop for CdpDocument {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[async_trait]
impl DocumentContext for CdpDocument {
    fn register_handler(&self, name: &str, handler: Arc<dyn MessageHandler>) {
        self.registry.register(name, handler);
    }

    fn unregister_handler(&self, name: &str) {
        self.registry.unregister(name);
    }

    async fn evaluate(&self, script: &str) -> ScopeResult<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ScopeError::evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn add_user_script(&self, script: UserScript) -> ScopeResult<()> {
        let response = self
            .page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.source))
            .await
            .map_err(|e| ScopeError::injection(script.name.clone(), e.to_string()))?;
        self.installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((script.name, response.result.identifier.clone()));
        Ok(())
    }

    async fn remove_all_user_scripts(&self) -> ScopeResult<()> {
        let installed =
            std::mem::take(&mut *self.installed.lock().unwrap_or_else(PoisonError::into_inner));
        let page = &self.page;
        let (kept, result) = remove_each(installed, |identifier| {
            let params = RemoveScriptToEvaluateOnNewDocumentParams::new(identifier.clone());
            async move { page.execute(params).await.map(|_| ()).map_err(|e| e.to_string()) }
        })
        .await;
        self.installed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(kept);
        result
    }

    async fn cookies(&self) -> ScopeResult<Vec<Cookie>> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| ScopeError::cookie_store(e.to_string()))?;
        Ok(cookies.iter().map(convert_cookie).collect())
    }
}

/// Try to remove every script; failures stay installed and the first one is
/// returned
async fn remove_each<T, F, Fut>(
    installed: Vec<(String, T)>,
    mut remove: F,
) -> (Vec<(String, T)>, ScopeResult<()>)
where
    F: FnMut(&T) -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    let mut kept = Vec::new();
    let mut first_error = None;
    for (name, identifier) in installed {
        if let Err(message) = remove(&identifier).await {
            tracing::warn!(script = %name, error = %message, "user script not removed");
            if first_error.is_none() {
                first_error = Some(ScopeError::injection(name.clone(), message));
            }
            kept.push((name, identifier));
        }
    }
    (kept, first_error.map_or(Ok(()), Err))
}

fn convert_cookie(cookie: &CdpCookie) -> Cookie {
    let mut converted = Cookie::new(&cookie.name, &cookie.value, &cookie.domain)
        .with_path(&cookie.path)
        .with_secure(cookie.secure)
        .with_http_only(cookie.http_only);
    if !cookie.session {
        converted = converted.with_expires_unix(cookie.expires);
    }
    if let Some(same_site) = &cookie.same_site {
        converted = converted.with_same_site(match same_site {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::Lax => SameSite::Lax,
            CookieSameSite::None => SameSite::None,
        });
    }
    converted
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn scripts() -> Vec<(String, u32)> {
        vec![
            ("consoleLog".to_string(), 1),
            ("networkTraffic".to_string(), 2),
            ("extra".to_string(), 3),
        ]
    }

    #[tokio::test]
    async fn test_remove_each_tries_every_script() {
        let mut attempted = Vec::new();
        let (kept, result) = remove_each(scripts(), |id| {
            attempted.push(*id);
            let id = *id;
            async move {
                if id == 1 {
                    Err(String::from("target closed"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(attempted, vec![1, 2, 3]);
        assert_eq!(kept, vec![("consoleLog".to_string(), 1)]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("consoleLog"));
    }

    #[tokio::test]
    async fn test_remove_each_all_succeed() {
        let (kept, result) = remove_each(scripts(), |_| async { Ok(()) }).await;
        assert!(kept.is_empty());
        assert!(result.is_ok());
    }
}
