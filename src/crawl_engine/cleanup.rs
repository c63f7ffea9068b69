//! Browser and session cleanup
//!
//! Teardown never stops at the first failure: every resource gets its close
//! attempt and the failures are collected into a [`CleanupResult`].

use chromiumoxide::Browser;
use log::{debug, info, warn};
use std::path::Path;

use crate::automation::PageSession;

/// Result of cleanup operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResult {
    /// All cleanup operations succeeded
    Success,
    /// Some cleanup operations failed, with error details
    PartialFailure(Vec<String>),
}

impl CleanupResult {
    pub(crate) fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Success
        } else {
            Self::PartialFailure(errors)
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Success => &[],
            Self::PartialFailure(errors) => errors,
        }
    }

    /// Fold another step's result into this one
    #[must_use]
    pub fn merge(self, other: CleanupResult) -> Self {
        let mut errors = self.errors().to_vec();
        errors.extend_from_slice(other.errors());
        Self::from_errors(errors)
    }
}

/// Close the browser, wait for its process, and remove its profile directory
pub async fn close_browser_and_data(browser: &mut Browser, chrome_data_dir: &Path) -> CleanupResult {
    let mut errors = Vec::new();

    debug!(target: "elsa_crawl::cleanup", "Closing browser");
    if let Err(e) = browser.close().await {
        warn!(target: "elsa_crawl::cleanup", "Failed to close browser: {e}");
        errors.push(format!("Browser close failed: {e}"));
    }

    // Without the wait Chrome may still hold the profile lock below.
    if let Err(e) = browser.wait().await {
        warn!(target: "elsa_crawl::cleanup", "Failed to wait for browser exit: {e}");
        errors.push(format!("Browser wait failed: {e}"));
    }

    if chrome_data_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(chrome_data_dir) {
            warn!(target: "elsa_crawl::cleanup", "Failed to remove Chrome data directory: {e}");
            errors.push(format!("Directory cleanup failed: {e}"));
        } else {
            debug!(target: "elsa_crawl::cleanup", "Removed {}", chrome_data_dir.display());
        }
    }

    CleanupResult::from_errors(errors)
}

/// Close `sessions` in reverse acquisition order
///
/// `sessions` is expected in acquisition order; each close is attempted even
/// when an earlier one failed.
pub async fn close_sessions_reversed<'a, S, I>(sessions: I) -> CleanupResult
where
    S: PageSession + 'a,
    I: IntoIterator<Item = (String, &'a S)>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut errors = Vec::new();
    for (label, session) in sessions.into_iter().rev() {
        debug!(target: "elsa_crawl::cleanup", "Closing {label}");
        if let Err(e) = session.close().await {
            warn!(target: "elsa_crawl::cleanup", "Failed to close {label}: {e}");
            errors.push(format!("{label}: {e}"));
        }
    }
    if errors.is_empty() {
        info!(target: "elsa_crawl::cleanup", "All sessions closed");
    }
    CleanupResult::from_errors(errors)
}
