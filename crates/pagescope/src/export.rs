//! Export Sink
//!
//! Hands the serialized report to whoever should receive it. A compose action
//! set by the host wins; otherwise the report goes to the mail composer if the
//! device can send mail, and is dropped quietly if it cannot.

use crate::report::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Subject used when none is configured
pub const DEFAULT_SUBJECT: &str = "Subject for email";

/// Caller-supplied export handler; receives the serialized report
pub type ComposeAction = Arc<dyn Fn(&str) + Send + Sync>;

/// Message handed to the mail composer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailDraft {
    /// Recipient addresses
    pub recipients: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Message body (the serialized report)
    pub body: String,
    /// Whether `body` is HTML
    pub is_html: bool,
}

impl MailDraft {
    /// Plain-text draft with the default subject and no recipients
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            recipients: Vec::new(),
            subject: DEFAULT_SUBJECT.to_string(),
            body: body.into(),
            is_html: false,
        }
    }

    /// Set the subject
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the recipients
    #[must_use]
    pub fn with_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients = recipients.into_iter().map(Into::into).collect();
        self
    }
}

/// Recipients and subject applied to every draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailDefaults {
    /// Recipient addresses
    pub recipients: Vec<String>,
    /// Subject line
    pub subject: String,
}

impl Default for MailDefaults {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }
}

impl MailDefaults {
    /// Draft for a report body
    #[must_use]
    pub fn draft(&self, body: &str) -> MailDraft {
        MailDraft::new(body)
            .with_subject(self.subject.clone())
            .with_recipients(self.recipients.iter().cloned())
    }
}

/// Platform mail composer
pub trait MailComposer: Send + Sync {
    /// Whether mail can be sent at all
    fn can_send_mail(&self) -> bool;

    /// Show the composer; call `on_finish` once the user is done with it
    fn compose(&self, draft: MailDraft, on_finish: Box<dyn FnOnce() + Send>);
}

/// Host UI that shows reports
pub trait ReportHost: Send + Sync {
    /// Show a captured report
    fn present(&self, report: PresentedReport);

    /// Remove whatever is currently presented
    fn dismiss(&self);
}

/// What an export did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The compose action received the report
    Custom,
    /// The mail composer was shown
    Composed,
    /// No way to send mail; nothing happened
    Unavailable,
}

/// Routes a serialized report to its destination
#[derive(Clone, Default)]
pub struct Exporter {
    compose_action: Option<ComposeAction>,
    composer: Option<Arc<dyn MailComposer>>,
    host: Option<Weak<dyn ReportHost>>,
    mail: MailDefaults,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("compose_action", &self.compose_action.is_some())
            .field("composer", &self.composer.is_some())
            .field("host", &self.host.is_some())
            .field("mail", &self.mail)
            .finish()
    }
}

impl Exporter {
    /// Exporter with no destinations
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every export to `action` instead of the mail composer
    #[must_use]
    pub fn with_compose_action(mut self, action: ComposeAction) -> Self {
        self.compose_action = Some(action);
        self
    }

    /// Mail composer used when no compose action is set
    #[must_use]
    pub fn with_mail_composer(mut self, composer: Arc<dyn MailComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    /// Host dismissed once the composer finishes; held weakly
    #[must_use]
    pub fn with_host(mut self, host: &Arc<dyn ReportHost>) -> Self {
        self.host = Some(Arc::downgrade(host));
        self
    }

    /// Draft defaults
    #[must_use]
    pub fn with_mail_defaults(mut self, mail: MailDefaults) -> Self {
        self.mail = mail;
        self
    }

    /// Deliver `text`
    pub fn export(&self, text: &str) -> ExportOutcome {
        if let Some(action) = &self.compose_action {
            tracing::debug!(bytes = text.len(), "exporting to compose action");
            action(text);
            return ExportOutcome::Custom;
        }
        let Some(composer) = self.composer.as_ref().filter(|c| c.can_send_mail()) else {
            tracing::debug!("mail unavailable, export skipped");
            return ExportOutcome::Unavailable;
        };
        let host = self.host.clone();
        composer.compose(
            self.mail.draft(text),
            Box::new(move || {
                if let Some(host) = host.and_then(|h| h.upgrade()) {
                    host.dismiss();
                }
            }),
        );
        ExportOutcome::Composed
    }
}

/// A presented report and the means to export it
#[derive(Debug, Clone)]
pub struct PresentedReport {
    snapshot: Snapshot,
    text: String,
    exporter: Exporter,
}

impl PresentedReport {
    /// Bundle a snapshot with its exporter
    #[must_use]
    pub fn new(snapshot: Snapshot, exporter: Exporter) -> Self {
        let text = snapshot.to_serialized_text();
        Self {
            snapshot,
            text,
            exporter,
        }
    }

    /// The captured report
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Serialized form that export delivers
    #[must_use]
    pub fn serialized_text(&self) -> &str {
        &self.text
    }

    /// Export this report
    pub fn export(&self) -> ExportOutcome {
        self.exporter.export(&self.text)
    }
}

/// Writes exported reports to a file
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Sink writing to `path`, replacing earlier contents
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Target path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `text`; failures are logged
    pub fn write(&self, text: &str) {
        match std::fs::write(&self.path, text) {
            Ok(()) => tracing::info!(path = %self.path.display(), "report written"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to write report");
            }
        }
    }

    /// Use as a compose action
    #[must_use]
    pub fn into_action(self) -> ComposeAction {
        Arc::new(move |text: &str| self.write(text))
    }
}

/// Writes exported reports to any writer
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

impl<W: Write + Send + 'static> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Write `text` and a trailing newline; failures are logged
    pub fn write(&self, text: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{text}").and_then(|()| writer.flush()) {
            tracing::warn!(error = %e, "failed to write report");
        }
    }

    /// Take the writer back
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Use as a compose action
    #[must_use]
    pub fn into_action(self) -> ComposeAction {
        Arc::new(move |text: &str| self.write(text))
    }
}
