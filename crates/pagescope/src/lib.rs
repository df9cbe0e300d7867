//! Pagescope: In-Page Instrumentation and Reporting for Embedded Web Documents
//!
//! Pagescope attaches to a live, script-capable document, records its console
//! output and network traffic, and on demand captures a structured report of
//! the page (markup, cookies, web storage, buffered events) that can be shown
//! as tabs of rows or exported as pretty JSON.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   PAGESCOPE Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐  post   ┌────────────┐  copy   ┌────────────┐  │
//! │   │ Injected   │────────►│ Tracker    │────────►│ Snapshot   │  │
//! │   │ Scripts    │ bridge  │ (buffers)  │  join   │ Collector  │  │
//! │   └────────────┘         └────────────┘         └─────┬──────┘  │
//! │         ▲                                             │         │
//! │         │ inject / evaluate                           ▼         │
//! │   ┌────────────┐                               ┌────────────┐   │
//! │   │ Document   │◄──────── html, storage, ──────│ Snapshot   │   │
//! │   │ Context    │          cookies              │ → View/JSON│   │
//! │   └────────────┘                               └────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pagescope::prelude::*;
//!
//! let doc = Arc::new(MockDocument::new().with_markup("<html></html>"));
//! let debugger = WebDebugger::new(doc.clone(), &DebuggerConfig::default());
//! debugger.start_tracking().await;
//! doc.console_log("hello");
//!
//! let snapshot = debugger.capture_snapshot().await;
//! println!("{}", snapshot.to_serialized_text());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod bridge;
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::significant_drop_tightening)]
mod cdp;
mod collector;
mod config;
mod cookie;
mod debugger;
mod export;
mod network;
mod render;
mod report;
mod result;
mod scripts;
mod tracking;

/// In-process document backend for tests and demos
#[allow(clippy::must_use_candidate, clippy::missing_const_for_fn)]
pub mod mock;

pub use bridge::{
    BridgeMessage, ChannelRegistry, DocumentContext, MessageHandler, UserScript, WeakHandler,
    BRIDGE_PRELUDE, TRANSPORT_BINDING,
};
#[cfg(feature = "browser")]
pub use cdp::{Browser, BrowserConfig, CdpDocument};
pub use collector::{Capture, FetchBarrier, FetchKind, PendingFetch, SnapshotCollector};
pub use config::{DebuggerConfig, DEFAULT_FETCH_TIMEOUT_MS};
pub use cookie::{format_timestamp, Cookie, SameSite, TIMESTAMP_FORMAT};
pub use debugger::WebDebugger;
pub use export::{
    ComposeAction, ExportOutcome, Exporter, FileSink, MailComposer, MailDefaults, MailDraft,
    PresentedReport, ReportHost, WriterSink, DEFAULT_SUBJECT,
};
pub use network::NetworkCallRecord;
pub use render::{inline_text, render_value, row_text, RenderedSection, ReportTab, ReportView};
pub use report::{
    classify, JsonKind, JsonValue, ReportSection, SectionKey, Snapshot, STORAGE_STORES,
};
pub use result::{ScopeError, ScopeResult};
pub use scripts::{
    parse_string_map, parse_text, ReturnContract, ScriptKind, ScriptSet, CONSOLE_CHANNEL,
    NETWORK_CHANNEL,
};
pub use tracking::{
    BufferedEvents, DropReason, SharedTracker, StartOutcome, Tracker, TrackingActions,
    TrackingState,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::mock::MockDocument;
    pub use super::{
        Cookie, DebuggerConfig, DocumentContext, ExportOutcome, JsonValue, MailComposer,
        PresentedReport, ReportHost, ReportView, ScopeError, ScopeResult, SectionKey, Snapshot,
        StartOutcome, TrackingState, WebDebugger,
    };
    #[cfg(feature = "browser")]
    pub use super::{Browser, BrowserConfig, CdpDocument};
    pub use std::sync::Arc;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::prelude::*;

    #[tokio::test]
    async fn test_end_to_end_report() {
        let doc = Arc::new(
            MockDocument::new()
                .with_markup("<html><body>shop</body></html>")
                .with_local_storage([("cart", "3")])
                .with_cookie(Cookie::new("sid", "42", "shop.example")),
        );
        let debugger = WebDebugger::new(
            Arc::clone(&doc) as Arc<dyn DocumentContext>,
            &DebuggerConfig::default(),
        );
        debugger.start_tracking().await;
        doc.console_log("checkout clicked");
        doc.xhr_load(Some(200), "https://shop.example/api/cart", "{}".into());

        let snapshot = debugger.capture_snapshot().await;
        let text = snapshot.to_serialized_text();
        let parsed = Snapshot::from_serialized_text(&text).unwrap();
        assert_eq!(parsed, snapshot);

        let view = ReportView::from_snapshot(&snapshot);
        let plain = view.to_plain_text();
        assert!(plain.contains("checkout clicked"));
        assert!(plain.contains("-- LocalStorage --\ncart: 3"));
        assert!(plain.contains("Name    : sid"));
    }

    #[test]
    fn test_prelude_names_resolve() {
        assert_eq!(TrackingState::default(), TrackingState::Idle);
        assert_eq!(SectionKey::ALL.len(), 5);
    }
}
