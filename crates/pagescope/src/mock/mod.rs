//! Mock Document for Debugger Testing
//!
//! An in-process [`DocumentContext`](crate::bridge::DocumentContext) with
//! scripted responses, so the tracker, collector and coordinator can be driven
//! deterministically without a browser.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pagescope::mock::MockDocument;
//!
//! let doc = Arc::new(MockDocument::new().with_markup("<html></html>"));
//! let debugger = WebDebugger::new(doc.clone(), DebuggerConfig::default());
//! debugger.start_tracking().await;
//!
//! doc.console_log("hello");           // delivered to logHandler
//! let snapshot = debugger.capture_snapshot().await;
//! ```

mod document;

pub use document::MockDocument;
