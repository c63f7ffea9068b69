pub mod auth;
pub mod automation;
pub mod browser_profile;
pub mod browser_setup;
pub mod config;
pub mod control;
pub mod crawl_engine;
pub mod extractors;
pub mod models;
pub mod sink;
pub mod utils;

use std::sync::Arc;
use tokio::sync::watch;

pub use auth::{Authenticator, Credentials, OtpSource, PortalLogin, PromptOtp, StaticOtp};
pub use automation::{
    AutomationError, AutomationResult, BrowserBackend, ChromiumBackend, FrameHandle, PageSession,
    SessionState,
};
pub use browser_setup::{LaunchOptions, LaunchedBrowser, launch_browser};
pub use config::CrawlConfig;
pub use control::{BackendLauncher, ChromiumLauncher, CrawlController, CrawlStatus};
pub use crawl_engine::{
    CrawlError, CrawlResult, LogProgress, NoOpProgress, Orchestrator, ProgressReporter, Worker,
};
pub use models::{
    Category, CrawlSummary, CrawlerStats, ExtractedDocument, FieldsetSnapshot, VehicleHistory, Vin,
};
pub use sink::{DocumentFilter, DocumentSink, JsonlStore, MemorySink, SinkRecord};

/// Run one crawl on a local Chromium to completion
///
/// Convenience wrapper around [`Orchestrator::run`] without cancellation.
pub async fn crawl<A: Authenticator>(
    config: CrawlConfig,
    authenticator: &A,
    sink: Arc<dyn DocumentSink>,
) -> CrawlResult<CrawlSummary> {
    let backend = ChromiumBackend::launch(&config)
        .await
        .map_err(|e| CrawlError::Browser(format!("{e:#}")))?;
    let (_cancel, cancel_rx) = watch::channel(false);
    let mut orchestrator =
        Orchestrator::new(backend, Arc::new(config), sink, Arc::new(LogProgress));
    orchestrator.run(authenticator, cancel_rx).await
}
