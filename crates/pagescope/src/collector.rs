//! Snapshot Collector
//!
//! Fires every fetch at once, joins them on a counting barrier, then reads the
//! event buffers and assembles the report in fixed order.
//!
//! ```text
//!   enter ─► html ────────────┐
//!   enter ─► cookies ─────────┤
//!   enter ─► localStorage ────┼──► barrier == 0 ──► read buffers ──► Snapshot
//!   enter ─► sessionStorage ──┤
//!   enter ─► sources (stub) ──┘
//! ```
//!
//! A fetch that fails or times out leaves its slot empty; the section is still
//! emitted with an empty value.

use crate::bridge::DocumentContext;
use crate::cookie::Cookie;
use crate::report::{JsonValue, ReportSection, SectionKey, Snapshot, STORAGE_STORES};
use crate::result::{ScopeError, ScopeResult};
use crate::scripts::{parse_string_map, parse_text, ScriptKind, ScriptSet};
use crate::tracking::{BufferedEvents, SharedTracker};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// The independent reads behind one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FetchKind {
    /// Document markup
    Html,
    /// Native cookie store
    Cookies,
    /// `localStorage`
    LocalStorage,
    /// `sessionStorage`
    SessionStorage,
    /// Page sources
    Sources,
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::Cookies => write!(f, "cookies"),
            Self::LocalStorage => write!(f, "localStorage"),
            Self::SessionStorage => write!(f, "sessionStorage"),
            Self::Sources => write!(f, "sources"),
        }
    }
}

// ============================================================================
// Barrier
// ============================================================================

#[derive(Debug)]
struct BarrierState {
    pending: AtomicUsize,
    released: AtomicBool,
    notify: Notify,
}

impl BarrierState {
    fn leave(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1
            && !self.released.swap(true, Ordering::AcqRel)
        {
            self.notify.notify_one();
        }
    }
}

/// Counting join over an open-ended number of async operations
///
/// The count starts at one for the dispatcher itself, so the barrier cannot
/// release while fetches are still being dispatched. [`FetchBarrier::wait`]
/// drops that hold and resolves once every [`PendingFetch`] is gone, exactly
/// once, including when nothing was ever entered.
#[derive(Debug)]
pub struct FetchBarrier {
    state: Arc<BarrierState>,
}

impl Default for FetchBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchBarrier {
    /// Create an open barrier
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(BarrierState {
                pending: AtomicUsize::new(1),
                released: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Register one in-flight operation
    #[must_use]
    pub fn enter(&self, kind: FetchKind) -> PendingFetch {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        PendingFetch {
            kind,
            state: Arc::clone(&self.state),
        }
    }

    /// Operations entered but not yet complete
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.pending.load(Ordering::Acquire).saturating_sub(1)
    }

    /// Wait until every operation has completed
    pub async fn wait(self) {
        self.state.leave();
        while !self.state.released.load(Ordering::Acquire) {
            self.state.notify.notified().await;
        }
    }
}

/// Token for one in-flight fetch; completes on drop
#[derive(Debug)]
pub struct PendingFetch {
    kind: FetchKind,
    state: Arc<BarrierState>,
}

impl PendingFetch {
    /// Which fetch this token tracks
    #[must_use]
    pub const fn kind(&self) -> FetchKind {
        self.kind
    }

    /// Mark the fetch complete
    pub fn complete(self) {
        drop(self);
    }
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        self.state.leave();
    }
}

// ============================================================================
// Collector
// ============================================================================

enum FetchOutput {
    Html(String),
    Cookies(Vec<Cookie>),
    LocalStorage(BTreeMap<String, String>),
    SessionStorage(BTreeMap<String, String>),
    Sources(BTreeMap<String, JsonValue>),
}

#[derive(Default)]
struct SnapshotParts {
    html: Option<String>,
    cookies: Option<Vec<Cookie>>,
    local_storage: Option<BTreeMap<String, String>>,
    session_storage: Option<BTreeMap<String, String>>,
    sources: Option<BTreeMap<String, JsonValue>>,
    degraded: Vec<FetchKind>,
}

impl SnapshotParts {
    fn store(&mut self, kind: FetchKind, outcome: ScopeResult<FetchOutput>) {
        match outcome {
            Ok(FetchOutput::Html(html)) => self.html = Some(html),
            Ok(FetchOutput::Cookies(cookies)) => self.cookies = Some(cookies),
            Ok(FetchOutput::LocalStorage(map)) => self.local_storage = Some(map),
            Ok(FetchOutput::SessionStorage(map)) => self.session_storage = Some(map),
            Ok(FetchOutput::Sources(map)) => self.sources = Some(map),
            Err(e) => {
                tracing::debug!(fetch = %kind, error = %e, "fetch degraded to empty");
                self.degraded.push(kind);
            }
        }
    }

    fn into_capture(mut self, events: BufferedEvents) -> Capture {
        let cookies = self
            .cookies
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let [cookies_name, local_name, session_name] = STORAGE_STORES;
        let storage = JsonValue::NamedList(vec![
            (cookies_name.to_string(), JsonValue::text_list(cookies)),
            (
                local_name.to_string(),
                JsonValue::text_map(self.local_storage.unwrap_or_default()),
            ),
            (
                session_name.to_string(),
                JsonValue::text_map(self.session_storage.unwrap_or_default()),
            ),
        ]);
        let network = events.network.iter().map(ToString::to_string);

        let snapshot = Snapshot::from_sections([
            ReportSection::new(
                SectionKey::Html,
                JsonValue::Text(self.html.unwrap_or_default()),
            ),
            ReportSection::new(SectionKey::Network, JsonValue::text_list(network)),
            ReportSection::new(SectionKey::Storage, storage),
            ReportSection::new(SectionKey::Console, JsonValue::text_list(events.console)),
            ReportSection::new(
                SectionKey::Sources,
                JsonValue::Map(self.sources.unwrap_or_default()),
            ),
        ]);
        self.degraded.sort_unstable();
        Capture {
            snapshot,
            degraded: self.degraded,
        }
    }
}

/// A snapshot plus which fetches fell back to empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// The assembled report
    pub snapshot: Snapshot,
    /// Fetches that failed or timed out
    pub degraded: Vec<FetchKind>,
}

/// Builds snapshots of one document
pub struct SnapshotCollector {
    document: Arc<dyn DocumentContext>,
    scripts: Arc<ScriptSet>,
    tracker: SharedTracker,
    fetch_timeout: Option<Duration>,
    flight: tokio::sync::Mutex<()>,
}

impl fmt::Debug for SnapshotCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCollector")
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl SnapshotCollector {
    /// Create a collector
    #[must_use]
    pub fn new(
        document: Arc<dyn DocumentContext>,
        scripts: Arc<ScriptSet>,
        tracker: SharedTracker,
    ) -> Self {
        Self {
            document,
            scripts,
            tracker,
            fetch_timeout: None,
            flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Give up on any single fetch after `timeout`
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Capture one snapshot
    ///
    /// Never fails: unavailable data shows up as empty sections.
    pub async fn capture_snapshot(&self) -> Snapshot {
        self.capture().await.snapshot
    }

    /// Capture one snapshot and report degraded fetches
    ///
    /// Overlapping calls run one after another.
    #[tracing::instrument(skip(self))]
    pub async fn capture(&self) -> Capture {
        let _flight = self.flight.lock().await;
        let parts = Arc::new(Mutex::new(SnapshotParts::default()));
        let barrier = FetchBarrier::new();

        let html_script = self.scripts.source(ScriptKind::Markup).to_string();
        let doc = Arc::clone(&self.document);
        self.dispatch(&barrier, &parts, FetchKind::Html, async move {
            let value = doc.evaluate(&html_script).await?;
            let html = parse_text(&value)
                .ok_or_else(|| ScopeError::evaluation("markup script did not return text"))?;
            Ok(FetchOutput::Html(html))
        });

        let doc = Arc::clone(&self.document);
        self.dispatch(&barrier, &parts, FetchKind::Cookies, async move {
            Ok(FetchOutput::Cookies(doc.cookies().await?))
        });

        let local_script = self.scripts.source(ScriptKind::LocalStorage).to_string();
        let doc = Arc::clone(&self.document);
        self.dispatch(&barrier, &parts, FetchKind::LocalStorage, async move {
            read_storage(doc.as_ref(), &local_script)
                .await
                .map(FetchOutput::LocalStorage)
        });

        let session_script = self.scripts.source(ScriptKind::SessionStorage).to_string();
        let doc = Arc::clone(&self.document);
        self.dispatch(&barrier, &parts, FetchKind::SessionStorage, async move {
            read_storage(doc.as_ref(), &session_script)
                .await
                .map(FetchOutput::SessionStorage)
        });

        // Sources are not collected yet; the section is always empty.
        self.dispatch(&barrier, &parts, FetchKind::Sources, async {
            Ok(FetchOutput::Sources(BTreeMap::new()))
        });

        barrier.wait().await;

        // Join point: events pushed after this belong to the next snapshot.
        let events = self.tracker.buffered();
        let parts = std::mem::take(&mut *parts.lock().unwrap_or_else(PoisonError::into_inner));
        let capture = parts.into_capture(events);
        tracing::debug!(degraded = ?capture.degraded, "snapshot assembled");
        capture
    }

    fn dispatch<F>(
        &self,
        barrier: &FetchBarrier,
        parts: &Arc<Mutex<SnapshotParts>>,
        kind: FetchKind,
        fetch: F,
    ) where
        F: Future<Output = ScopeResult<FetchOutput>> + Send + 'static,
    {
        let token = barrier.enter(kind);
        let parts = Arc::clone(parts);
        let timeout = self.fetch_timeout;
        tokio::spawn(async move {
            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, fetch)
                    .await
                    .unwrap_or_else(|_| {
                        Err(ScopeError::evaluation(format!(
                            "{kind} timed out after {}ms",
                            limit.as_millis()
                        )))
                    }),
                None => fetch.await,
            };
            parts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .store(kind, outcome);
            token.complete();
        });
    }
}

async fn read_storage(
    document: &dyn DocumentContext,
    script: &str,
) -> ScopeResult<BTreeMap<String, String>> {
    let value = document.evaluate(script).await?;
    parse_string_map(&value)
        .ok_or_else(|| ScopeError::evaluation("storage script did not return an object"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::MockDocument;
    use crate::tracking::Tracker;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    fn collector(doc: &Arc<MockDocument>, tracker: &SharedTracker) -> SnapshotCollector {
        SnapshotCollector::new(
            Arc::clone(doc) as Arc<dyn DocumentContext>,
            Arc::new(ScriptSet::bundled()),
            tracker.clone(),
        )
    }

    #[tokio::test]
    async fn test_barrier_with_nothing_entered_releases() {
        let barrier = FetchBarrier::new();
        assert_eq!(barrier.outstanding(), 0);
        barrier.wait().await;
    }

    #[tokio::test]
    async fn test_barrier_waits_for_every_token() {
        let barrier = FetchBarrier::new();
        let a = barrier.enter(FetchKind::Html);
        let b = barrier.enter(FetchKind::Cookies);
        assert_eq!(barrier.outstanding(), 2);
        assert_eq!(a.kind(), FetchKind::Html);

        let done = Arc::new(AtomicU32::new(0));
        let done_in_task = Arc::clone(&done);
        let waiter = tokio::spawn(async move {
            barrier.wait().await;
            done_in_task.fetch_add(1, Ordering::SeqCst);
        });

        a.complete();
        tokio::task::yield_now().await;
        assert_eq!(done.load(Ordering::SeqCst), 0);

        drop(b);
        waiter.await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_snapshot() {
        let doc = Arc::new(
            MockDocument::new()
                .with_markup("<html><body>hi</body></html>")
                .with_local_storage([("theme", "dark")])
                .with_session_storage([("step", "2")])
                .with_cookie(Cookie::new("sid", "abc", "example.com")),
        );
        let tracker = SharedTracker::new(Tracker::new());
        let capture = collector(&doc, &tracker).capture().await;

        assert!(capture.degraded.is_empty());
        let snapshot = capture.snapshot;
        assert_eq!(
            snapshot.section(SectionKey::Html),
            &JsonValue::Text("<html><body>hi</body></html>".into())
        );
        let JsonValue::NamedList(stores) = snapshot.section(SectionKey::Storage) else {
            panic!("storage must be a named list");
        };
        let names: Vec<&str> = stores.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, STORAGE_STORES.to_vec());
        assert_eq!(stores[1].1, JsonValue::text_map([("theme", "dark")]));
        assert_eq!(stores[2].1, JsonValue::text_map([("step", "2")]));
        let JsonValue::List(cookies) = &stores[0].1 else {
            panic!("cookies must be a list");
        };
        assert_eq!(cookies.len(), 1);
        assert_eq!(
            snapshot.section(SectionKey::Sources),
            &JsonValue::Map(BTreeMap::new())
        );
    }

    #[tokio::test]
    async fn test_every_failure_still_yields_all_sections() {
        let doc = Arc::new(
            MockDocument::new()
                .failing(FetchKind::Html)
                .failing(FetchKind::Cookies)
                .failing(FetchKind::LocalStorage)
                .failing(FetchKind::SessionStorage),
        );
        let tracker = SharedTracker::new(Tracker::new());
        let capture = collector(&doc, &tracker).capture().await;

        assert_eq!(
            capture.degraded,
            vec![
                FetchKind::Html,
                FetchKind::Cookies,
                FetchKind::LocalStorage,
                FetchKind::SessionStorage
            ]
        );
        assert_eq!(capture.snapshot.sections().len(), SectionKey::ALL.len());
        assert_eq!(
            capture.snapshot.section(SectionKey::Html),
            &JsonValue::empty_text()
        );
    }

    #[tokio::test]
    async fn test_partial_failure_degrades_only_that_section() {
        let doc = Arc::new(
            MockDocument::new()
                .with_markup("<p/>")
                .with_local_storage([("a", "1")])
                .failing(FetchKind::SessionStorage),
        );
        let tracker = SharedTracker::new(Tracker::new());
        let capture = collector(&doc, &tracker).capture().await;
        assert_eq!(capture.degraded, vec![FetchKind::SessionStorage]);
        assert_eq!(
            capture.snapshot.section(SectionKey::Html),
            &JsonValue::Text("<p/>".into())
        );
    }

    #[tokio::test]
    async fn test_wrong_result_shape_degrades() {
        let doc = Arc::new(MockDocument::new());
        doc.respond_to(ScriptSet::bundled().source(ScriptKind::LocalStorage), json!("oops"));
        doc.respond_to(ScriptSet::bundled().source(ScriptKind::Markup), json!(12));
        let tracker = SharedTracker::new(Tracker::new());
        let capture = collector(&doc, &tracker).capture().await;
        assert!(capture.degraded.contains(&FetchKind::LocalStorage));
        assert!(capture.degraded.contains(&FetchKind::Html));
    }

    #[tokio::test]
    async fn test_order_is_fixed_regardless_of_completion_order() {
        let slow = Arc::new(
            MockDocument::new()
                .with_markup("<html/>")
                .with_delay(FetchKind::Html, Duration::from_millis(30))
                .with_delay(FetchKind::Cookies, Duration::from_millis(10)),
        );
        let fast = Arc::new(MockDocument::new().with_markup("<html/>"));
        let tracker = SharedTracker::new(Tracker::new());

        let a = collector(&slow, &tracker).capture_snapshot().await;
        let b = collector(&fast, &tracker).capture_snapshot().await;
        assert_eq!(a, b);
        assert_eq!(a.to_serialized_text(), b.to_serialized_text());
    }

    #[tokio::test]
    async fn test_timeout_degrades() {
        let doc = Arc::new(
            MockDocument::new()
                .with_markup("<html/>")
                .with_delay(FetchKind::Html, Duration::from_millis(500)),
        );
        let tracker = SharedTracker::new(Tracker::new());
        let capture = collector(&doc, &tracker)
            .with_fetch_timeout(Some(Duration::from_millis(20)))
            .capture()
            .await;
        assert_eq!(capture.degraded, vec![FetchKind::Html]);
    }

    #[tokio::test]
    async fn test_buffers_copied_not_drained() {
        let doc = Arc::new(MockDocument::new());
        let tracker = SharedTracker::new(Tracker::new());
        tracker.with(|t| {
            t.start();
            t.record_console("one").unwrap();
        });
        let collector = collector(&doc, &tracker);

        let first = collector.capture_snapshot().await;
        tracker.with(|t| t.record_console("two").unwrap());
        let second = collector.capture_snapshot().await;

        assert_eq!(
            first.section(SectionKey::Console),
            &JsonValue::text_list(["one"])
        );
        assert_eq!(
            second.section(SectionKey::Console),
            &JsonValue::text_list(["one", "two"])
        );
    }

    #[tokio::test]
    async fn test_event_during_pending_fetch_is_included() {
        let doc = Arc::new(
            MockDocument::new().with_delay(FetchKind::Html, Duration::from_millis(100)),
        );
        let tracker = SharedTracker::new(Tracker::new());
        tracker.with(|t| {
            t.start();
            t.record_console("before").unwrap();
        });
        let collector = collector(&doc, &tracker);

        let pusher = tracker.clone();
        let (snapshot, ()) = tokio::join!(collector.capture_snapshot(), async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            pusher.with(|t| t.record_console("mid-join")).unwrap();
        });
        assert_eq!(
            snapshot.section(SectionKey::Console),
            &JsonValue::text_list(["before", "mid-join"])
        );

        tracker.with(|t| t.record_console("after")).unwrap();
        let next = collector.capture_snapshot().await;
        assert_eq!(
            next.section(SectionKey::Console),
            &JsonValue::text_list(["before", "mid-join", "after"])
        );
    }

    #[tokio::test]
    async fn test_overlapping_captures_are_serialized() {
        let doc = Arc::new(
            MockDocument::new().with_delay(FetchKind::Cookies, Duration::from_millis(20)),
        );
        let tracker = SharedTracker::new(Tracker::new());
        let collector = collector(&doc, &tracker);
        let (a, b) = tokio::join!(collector.capture(), collector.capture());
        assert_eq!(a, b);
        assert_eq!(doc.cookie_reads(), 2);
        assert!(doc.max_concurrent_cookie_reads() <= 1);
    }
}
