use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::EvaluationId,
    protocol::{Evaluation, SubmissionAck, SubmissionRequest},
};
use tracing::{error, info, warn};

pub mod controller;
pub mod error;
pub mod http;
pub mod timer;

pub use controller::{
    SessionConfig, SessionController, SessionDependencies, SessionEvent, SessionSnapshot,
    SubmitOutcome,
};
pub use error::{LoadFailure, SessionError};
pub use http::{HttpBackend, HttpEvaluationSource, HttpSubmissionSink};

/// Supplies the fixed question list and duration for one evaluation.
#[async_trait]
pub trait EvaluationSource: Send + Sync {
    async fn fetch_evaluation(
        &self,
        evaluation_id: EvaluationId,
    ) -> std::result::Result<Evaluation, LoadFailure>;
}

/// Accepts a finished answer set. The controller calls this at most once per
/// attempt; retries reuse the same `attempt_id`.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionAck>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub body: Option<String>,
    /// Stays on screen until dismissed rather than fading out.
    pub persistent: bool,
}

impl Notification {
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(Severity::Info, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(Severity::Error, title)
    }

    fn new(severity: Severity, title: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            body: None,
            persistent: false,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

/// Fire-and-forget respondent messages. Implementations must not block.
pub trait NotificationSurface: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub struct TracingNotifier;

impl NotificationSurface for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let body = notification.body.as_deref().unwrap_or("");
        match notification.severity {
            Severity::Info => info!("notify: {} {body}", notification.title),
            Severity::Warning => warn!("notify: {} {body}", notification.title),
            Severity::Error => error!(
                persistent = notification.persistent,
                "notify: {} {body}", notification.title
            ),
        }
    }
}
