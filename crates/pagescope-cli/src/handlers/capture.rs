//! Capture command handler

use crate::commands::CaptureArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Execute the capture command
#[cfg(feature = "browser")]
pub fn execute_capture(config: &CliConfig, args: &CaptureArgs) -> CliResult<()> {
    validate_url(&args.url)?;
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::capture(format!("failed to start async runtime: {e}")))?;
    rt.block_on(browser::capture(config, args))
}

/// Execute the capture command
#[cfg(not(feature = "browser"))]
pub fn execute_capture(_config: &CliConfig, _args: &CaptureArgs) -> CliResult<()> {
    Err(CliError::capture(
        "browser support not enabled. Rebuild with --features browser",
    ))
}

/// Validate the URL before launching anything
pub fn validate_url(url: &str) -> CliResult<()> {
    let has_scheme = ["http://", "https://", "file://", "about:", "data:"]
        .iter()
        .any(|scheme| url.starts_with(scheme));
    if has_scheme {
        Ok(())
    } else {
        Err(CliError::invalid_argument(format!(
            "'{url}' is not a URL (expected http://, https://, file://, about: or data:)"
        )))
    }
}

#[cfg(feature = "browser")]
mod browser {
    use crate::commands::CaptureArgs;
    use crate::config::CliConfig;
    use crate::error::CliResult;
    use crate::handlers::config::load_debugger_config;
    use crate::output::ProgressReporter;
    use pagescope::{
        Browser, BrowserConfig, DocumentContext, FileSink, WebDebugger, WriterSink,
    };
    use std::sync::Arc;
    use std::time::Duration;

    pub(super) async fn capture(config: &CliConfig, args: &CaptureArgs) -> CliResult<()> {
        let debugger_config = load_debugger_config(args.config.as_deref())?;
        let mut reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());

        let mut browser_config = BrowserConfig::default().with_headless(!args.headed);
        if args.no_sandbox {
            browser_config = browser_config.with_no_sandbox();
        }
        if let Some(ref path) = args.chromium {
            browser_config = browser_config.with_chromium_path(path.clone());
        }

        reporter.info("Launching browser");
        let browser = Browser::launch(&browser_config).await?;
        let document = Arc::new(browser.open_document().await?);

        let sink = match &args.output {
            Some(path) => FileSink::new(path).into_action(),
            None => WriterSink::new(std::io::stdout()).into_action(),
        };
        let debugger = WebDebugger::new(
            Arc::clone(&document) as Arc<dyn DocumentContext>,
            &debugger_config,
        )
        .with_compose_action(sink);

        let outcome = debugger.start_tracking().await;
        tracing::debug!(?outcome, "tracking started");
        reporter.start_spinner(&format!("Loading {}", args.url));
        document.goto(&args.url).await?;
        reporter.set_message(&format!("Recording for {}ms", args.duration_ms));
        tokio::time::sleep(Duration::from_millis(args.duration_ms)).await;
        reporter.set_message("Capturing report");
        let capture = debugger.capture().await;
        reporter.finish();

        for kind in &capture.degraded {
            reporter.warning(&format!("{kind} unavailable; section left empty"));
        }
        debugger.export(&capture.snapshot.to_serialized_text());
        if let Some(path) = &args.output {
            reporter.success(&format!("Report written to {}", path.display()));
        }

        drop(debugger);
        drop(document);
        browser.close().await?;
        Ok(())
    }
}
