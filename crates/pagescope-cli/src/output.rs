//! Output formatting and progress reporting

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use pagescope::ReportView;
use std::time::Duration;

/// Progress reporter for capture runs
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Start a spinner for an open-ended wait
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    /// Update spinner message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.spinner {
            pb.set_message(message.to_string());
        }
    }

    /// Stop and clear the spinner
    pub fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

/// Text layout of a report view, optionally styled
#[must_use]
pub fn format_view(view: &ReportView, use_color: bool) -> String {
    if !use_color {
        return view.to_plain_text();
    }
    let mut out = String::new();
    for tab in &view.tabs {
        out.push_str(&style(format!("== {} ==", tab.title)).bold().underlined().to_string());
        out.push('\n');
        for section in &tab.sections {
            if let Some(header) = &section.header {
                out.push_str(&style(format!("-- {header} --")).cyan().to_string());
                out.push('\n');
            }
            for row in &section.rows {
                out.push_str(row);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}
