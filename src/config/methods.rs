//! Builder methods available for all states
//!
//! Optional settings can be applied before or after the VIN; ranges are
//! checked in `build()`.

use std::path::PathBuf;

use super::builder::CrawlConfigBuilder;

impl<State> CrawlConfigBuilder<State> {
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Number of parallel workers, each with its own browser context
    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    #[must_use]
    pub fn max_documents_per_category(mut self, max: usize) -> Self {
        self.max_documents_per_category = max;
        self
    }

    /// Set browser headless mode
    ///
    /// Headed mode is useful when the portal asks for something the login
    /// flow does not handle, e.g. a changed consent screen.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Frame classification retry policy: attempts and backoff base
    #[must_use]
    pub fn frame_retry(mut self, attempts: u32, base_ms: u64) -> Self {
        self.frame_retry_attempts = attempts;
        self.frame_retry_base_ms = base_ms;
        self
    }

    #[must_use]
    pub fn settle_delay_ms(mut self, delay_ms: u64) -> Self {
        self.settle_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn clear_before_crawl(mut self, clear: bool) -> Self {
        self.clear_before_crawl = clear;
        self
    }

    #[must_use]
    pub fn capture_fieldsets(mut self, capture: bool) -> Self {
        self.capture_fieldsets = capture;
        self
    }

    #[must_use]
    pub fn capture_history(mut self, capture: bool) -> Self {
        self.capture_history = capture;
        self
    }

    #[must_use]
    pub fn chrome_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chrome_data_dir = Some(dir.into());
        self
    }
}
