//! Debugger Coordinator
//!
//! The public face of the engine: one [`WebDebugger`] per document.
//!
//! ```text
//! start_tracking ──► Tracker::start ──► inject interceptors (first time only)
//! pause_tracking ──► action ──► Tracker::pause
//! stop_tracking  ──► action ──► Tracker::stop ──► remove user scripts
//! action         ──► SnapshotCollector ──► ReportHost::present ──► completion
//! ```
//!
//! Channel handlers are registered through [`WeakHandler`], so the document
//! never keeps the debugger alive. Dropping the debugger unregisters them.

use crate::bridge::{BridgeMessage, DocumentContext, MessageHandler, WeakHandler};
use crate::collector::{Capture, SnapshotCollector};
use crate::config::DebuggerConfig;
use crate::export::{
    ComposeAction, ExportOutcome, Exporter, MailComposer, PresentedReport, ReportHost,
};
use crate::report::Snapshot;
use crate::scripts::{ScriptKind, ScriptSet, CONSOLE_CHANNEL, NETWORK_CHANNEL};
use crate::tracking::{SharedTracker, StartOutcome, Tracker, TrackingActions, TrackingState};
use std::fmt;
use std::sync::Arc;

const INTERCEPTORS: [ScriptKind; 2] = [
    ScriptKind::ConsoleInterceptor,
    ScriptKind::NetworkInterceptor,
];

/// Routes channel messages into the tracker
#[derive(Debug)]
struct DebuggerReceiver {
    tracker: SharedTracker,
}

impl MessageHandler for DebuggerReceiver {
    fn on_message(&self, message: &BridgeMessage) {
        if let Err(reason) = self.tracker.with(|t| t.handle_message(message)) {
            tracing::debug!(channel = %message.channel, ?reason, "event dropped");
        }
    }
}

/// In-page debugger attached to one document
pub struct WebDebugger {
    document: Arc<dyn DocumentContext>,
    scripts: Arc<ScriptSet>,
    tracker: SharedTracker,
    receiver: Arc<DebuggerReceiver>,
    collector: SnapshotCollector,
    exporter: Exporter,
    host: Option<Arc<dyn ReportHost>>,
    inject_into_current: bool,
}

impl fmt::Debug for WebDebugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDebugger")
            .field("state", &self.state())
            .field("exporter", &self.exporter)
            .field("host", &self.host.is_some())
            .finish_non_exhaustive()
    }
}

impl WebDebugger {
    /// Attach to a document and register both channels
    #[must_use]
    pub fn new(document: Arc<dyn DocumentContext>, config: &DebuggerConfig) -> Self {
        let mut tracker = Tracker::new();
        if let Some(max) = config.max_buffered_events {
            tracker = tracker.with_max_events(max);
        }
        let tracker = SharedTracker::new(tracker);
        let scripts = Arc::new(config.script_set());
        let receiver = Arc::new(DebuggerReceiver {
            tracker: tracker.clone(),
        });
        for channel in [CONSOLE_CHANNEL, NETWORK_CHANNEL] {
            document.register_handler(channel, Arc::new(WeakHandler::new(&receiver)));
        }
        let collector =
            SnapshotCollector::new(Arc::clone(&document), Arc::clone(&scripts), tracker.clone())
                .with_fetch_timeout(config.fetch_timeout());

        Self {
            document,
            scripts,
            tracker,
            receiver,
            collector,
            exporter: Exporter::new().with_mail_defaults(config.mail.clone()),
            host: None,
            inject_into_current: config.inject_into_current,
        }
    }

    /// Send exports to `action` instead of the mail composer
    #[must_use]
    pub fn with_compose_action(mut self, action: ComposeAction) -> Self {
        self.exporter = std::mem::take(&mut self.exporter).with_compose_action(action);
        self
    }

    /// Mail composer for the default export
    #[must_use]
    pub fn with_mail_composer(mut self, composer: Arc<dyn MailComposer>) -> Self {
        self.exporter = std::mem::take(&mut self.exporter).with_mail_composer(composer);
        self
    }

    /// Host that presents captured reports
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn ReportHost>) -> Self {
        self.exporter = std::mem::take(&mut self.exporter).with_host(&host);
        self.host = Some(host);
        self
    }

    /// Current tracking phase
    #[must_use]
    pub fn state(&self) -> TrackingState {
        self.tracker.state()
    }

    /// Which controls a toggle affordance should enable
    #[must_use]
    pub fn available_actions(&self) -> TrackingActions {
        self.state().available_actions()
    }

    /// Events discarded while paused or because the buffer cap was reached
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.tracker.with(|t| t.dropped_events())
    }

    /// Begin (or resume) recording console and network events
    ///
    /// Injection is claimed under the tracker lock, so overlapping starts
    /// inject once. A stop that lands mid-injection gets the scripts removed
    /// once injection finishes.
    pub async fn start_tracking(&self) -> StartOutcome {
        let (outcome, inject) = self.tracker.with(|t| (t.start(), t.claim_injection()));
        if inject {
            self.inject_interceptors().await;
            if self.state() == TrackingState::Stopped {
                self.remove_interceptors().await;
            }
        }
        outcome
    }

    /// Present a report, then stop accepting events
    pub async fn pause_tracking(&self) -> Snapshot {
        let snapshot = self.action(|| {}).await;
        self.tracker.with(Tracker::pause);
        snapshot
    }

    /// Present a report, then discard buffers and remove the interceptors
    pub async fn stop_tracking(&self) -> Snapshot {
        let snapshot = self.action(|| {}).await;
        if self.tracker.with(Tracker::stop) {
            self.remove_interceptors().await;
        }
        snapshot
    }

    /// Capture a report, present it, then call `completion` once
    pub async fn action<F: FnOnce()>(&self, completion: F) -> Snapshot {
        let snapshot = self.capture_snapshot().await;
        if let Some(host) = &self.host {
            host.present(PresentedReport::new(snapshot.clone(), self.exporter.clone()));
        }
        completion();
        snapshot
    }

    /// Capture a report without presenting it
    pub async fn capture_snapshot(&self) -> Snapshot {
        self.collector.capture_snapshot().await
    }

    /// Capture a report and list degraded fetches
    pub async fn capture(&self) -> Capture {
        self.collector.capture().await
    }

    /// Export an already-serialized report
    pub fn export(&self, text: &str) -> ExportOutcome {
        self.exporter.export(text)
    }

    async fn remove_interceptors(&self) {
        match self.document.remove_all_user_scripts().await {
            Ok(()) => self.tracker.with(Tracker::mark_removed),
            Err(e) => tracing::warn!(error = %e, "failed to remove user scripts"),
        }
    }

    async fn inject_interceptors(&self) {
        for kind in INTERCEPTORS {
            if let Err(e) = self.document.add_user_script(self.scripts.user_script(kind)).await {
                tracing::warn!(script = %kind, error = %e, "interceptor not installed");
            }
            if self.inject_into_current {
                if let Err(e) = self.document.evaluate(self.scripts.source(kind)).await {
                    tracing::warn!(script = %kind, error = %e, "interceptor not run in current document");
                }
            }
        }
    }
}

impl Drop for WebDebugger {
    fn drop(&mut self) {
        for channel in [CONSOLE_CHANNEL, NETWORK_CHANNEL] {
            self.document.unregister_handler(channel);
        }
        let installed = self.tracker.with(|t| !t.needs_injection());
        if installed {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let document = Arc::clone(&self.document);
                runtime.spawn(async move {
                    if let Err(e) = document.remove_all_user_scripts().await {
                        tracing::warn!(error = %e, "failed to remove user scripts on drop");
                    }
                });
            }
        }
        tracing::debug!(receivers = Arc::strong_count(&self.receiver), "debugger detached");
    }
}
