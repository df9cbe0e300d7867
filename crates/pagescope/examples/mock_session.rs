//! Mock Session Demo - Record, Pause, Stop and Export
//!
//! Drives a debugger against an in-process document so the whole
//! start → pause → resume → stop cycle can be watched without a browser.
//!
//! # Running
//!
//! ```bash
//! cargo run --example mock_session -p pagescope
//! ```

#![allow(clippy::uninlined_format_args, clippy::unwrap_used)]

use pagescope::prelude::*;
use pagescope::{ExportOutcome, WriterSink};
use serde_json::json;

struct PrintingHost;

impl ReportHost for PrintingHost {
    fn present(&self, report: PresentedReport) {
        let view = ReportView::from_snapshot(report.snapshot());
        println!("{}", view.to_plain_text());
        if report.export() == ExportOutcome::Custom {
            println!("(exported {} bytes)", report.serialized_text().len());
        }
    }

    fn dismiss(&self) {}
}

#[tokio::main]
async fn main() {
    println!("=== Pagescope Mock Session ===\n");

    let doc = Arc::new(
        MockDocument::new()
            .with_markup("<html><body><h1>Checkout</h1></body></html>")
            .with_local_storage([("cart", "3 items"), ("theme", "dark")])
            .with_session_storage([("step", "payment")])
            .with_cookie(Cookie::new("sid", "c0ffee", "shop.example").with_secure(true)),
    );

    let debugger = WebDebugger::new(
        Arc::clone(&doc) as Arc<dyn DocumentContext>,
        &DebuggerConfig::default(),
    )
    .with_host(Arc::new(PrintingHost))
    .with_compose_action(WriterSink::new(std::io::sink()).into_action());

    println!("--- Recording ---");
    debugger.start_tracking().await;
    doc.console_log("page ready");
    doc.xhr_load(Some(200), "https://shop.example/api/cart", json!({"items": 3}));

    println!("--- Pause (presents a report) ---\n");
    debugger.pause_tracking().await;
    doc.console_log("this line is dropped while paused");

    println!("--- Resume and stop (presents a final report) ---\n");
    debugger.start_tracking().await;
    doc.console_log("payment submitted");
    debugger.stop_tracking().await;

    println!("State after stop: {}", debugger.state());
    println!("\n=== Mock Session Complete ===");
}
