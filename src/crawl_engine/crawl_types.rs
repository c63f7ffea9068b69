//! Core types for crawl operations.
//!
//! Error taxonomy, retry classification and the typed per-branch outcomes the
//! worker uses instead of catch-and-continue.

use crate::automation::AutomationError;
use crate::models::ExtractedDocument;

/// Error type for crawl operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrawlError {
    /// Invalid configuration or arguments
    #[error("Configuration error: {0}")]
    Config(String),
    /// Browser launch or automation failure outside a crawl branch
    #[error("Browser error: {0}")]
    Browser(String),
    /// A worker or session failed to reach its crawling state
    #[error("Initialization failed at {stage}: {message}")]
    Init { stage: String, message: String },
    /// Login did not complete
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// Persisted state could not be read or written
    #[error("Sink error: {0}")]
    Sink(String),
    /// Operation cancelled
    #[error("Crawl operation was cancelled")]
    Cancelled,
    /// A crawl is already running
    #[error("A crawl is already running")]
    AlreadyRunning,
    /// No crawl is running
    #[error("No crawl is running")]
    NotRunning,
    /// Other errors
    #[error("Crawl error: {0}")]
    Other(String),
}

impl CrawlError {
    pub(crate) fn init(stage: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Init {
            stage: stage.into(),
            message: message.to_string(),
        }
    }
}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::Other(format!("{err:#}"))
    }
}

impl From<AutomationError> for CrawlError {
    fn from(err: AutomationError) -> Self {
        Self::Browser(err.to_string())
    }
}

/// Convenience alias for Result with `CrawlError`
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Categorizes automation failures for retry decisions
///
/// - Soft failures (element missing, wait expired) are the normal outcome of
///   a UI that is still rendering and are worth retrying
/// - Browser failures may recover once the page settles
/// - Script failures are deterministic and retrying does not help
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Element not rendered yet
    NotFound,
    /// Wait or CDP round-trip ran out of time
    Timeout,
    /// CDP or browser process failure
    Browser,
    /// Script threw or returned an unusable value
    Script,
    /// Session or context already closed
    Closed,
}

impl FailureKind {
    #[must_use]
    pub fn classify(error: &AutomationError) -> Self {
        match error {
            AutomationError::NotFound(_) => Self::NotFound,
            AutomationError::Timeout { .. } => Self::Timeout,
            AutomationError::Browser(msg) => {
                // Frames detached mid-navigation surface as CDP errors
                let msg = msg.to_lowercase();
                if msg.contains("no frame") || msg.contains("context") || msg.contains("detached") {
                    Self::NotFound
                } else {
                    Self::Browser
                }
            }
            AutomationError::Script(_) => Self::Script,
            AutomationError::Closed => Self::Closed,
        }
    }

    /// Whether this failure kind should be retried by default
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound | Self::Timeout | Self::Browser => true,
            Self::Script | Self::Closed => false,
        }
    }

    /// Base delay multiplier for this failure kind
    #[must_use]
    pub const fn delay_multiplier(&self) -> f64 {
        match self {
            Self::Browser => 1.5,
            Self::NotFound | Self::Timeout | Self::Script | Self::Closed => 1.0,
        }
    }
}

/// Lifecycle of a worker session
///
/// Strictly forward; `Crawling` is re-entered per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Uninitialized,
    SearchingVehicle,
    VinSubmitted,
    ManualSection,
    FramesDetected,
    Crawling,
    Done,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::SearchingVehicle => "searching_vehicle",
            Self::VinSubmitted => "vin_submitted",
            Self::ManualSection => "manual_section",
            Self::FramesDetected => "frames_detected",
            Self::Crawling => "crawling",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Result of one category branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOutcome {
    /// Category was processed; documents emitted from its own listing
    Crawled { documents: usize },
    /// Already visited by this worker
    AlreadyVisited,
    /// Branch aborted; counted against the worker's errors
    Failed(String),
}

impl CategoryOutcome {
    #[must_use]
    pub fn documents(&self) -> usize {
        match self {
            Self::Crawled { documents } => *documents,
            Self::AlreadyVisited | Self::Failed(_) => 0,
        }
    }
}

/// Result of one document row
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Extracted(Box<ExtractedDocument>),
    /// No frame held valid content; not an error
    Unavailable,
    /// Key already visited in this category
    Duplicate,
    /// Document link could not be activated
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn classifies_soft_failures_as_retryable() {
        let kind = FailureKind::classify(&AutomationError::NotFound("#x".into()));
        assert_eq!(kind, FailureKind::NotFound);
        assert!(kind.is_retryable());

        let kind = FailureKind::classify(&AutomationError::timeout("wait", Duration::from_secs(1)));
        assert!(kind.is_retryable());
    }

    #[test]
    fn script_and_closed_are_permanent() {
        assert!(!FailureKind::classify(&AutomationError::Script("boom".into())).is_retryable());
        assert!(!FailureKind::classify(&AutomationError::Closed).is_retryable());
    }

    #[test]
    fn detached_frame_counts_as_not_found() {
        let err = AutomationError::Browser("No frame with given id found".into());
        assert_eq!(FailureKind::classify(&err), FailureKind::NotFound);
    }

    #[test]
    fn anyhow_context_chain_is_preserved() {
        let err = anyhow::anyhow!("root cause").context("outer");
        let crawl: CrawlError = err.into();
        assert_eq!(crawl, CrawlError::Other("outer: root cause".into()));
    }

    #[test]
    fn worker_states_are_ordered() {
        assert!(WorkerState::Uninitialized < WorkerState::VinSubmitted);
        assert!(WorkerState::Crawling < WorkerState::Done);
        assert_eq!(WorkerState::ManualSection.to_string(), "manual_section");
    }
}
