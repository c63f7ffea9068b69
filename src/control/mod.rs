//! Command surface: start, stop and observe one crawl at a time
//!
//! The controller owns the store the crawl writes to, so document reads go
//! through the same handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::auth::Authenticator;
use crate::automation::{BrowserBackend, ChromiumBackend};
use crate::config::CrawlConfig;
use crate::crawl_engine::{
    CrawlError, CrawlResult, LogProgress, Orchestrator, ProgressReporter, StatsBoard,
};
use crate::models::{CrawlSummary, CrawlerStats, Vin};
use crate::sink::{DocumentFilter, DocumentSink, JsonlStore, SinkRecord};

/// How often [`CrawlController::wait`] checks for completion
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Creates the browser backend for a crawl
#[async_trait]
pub trait BackendLauncher: Send + Sync + 'static {
    type Backend: BrowserBackend;

    async fn launch(&self, config: &CrawlConfig) -> CrawlResult<Self::Backend>;
}

/// Launches a local Chromium per crawl
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl BackendLauncher for ChromiumLauncher {
    type Backend = ChromiumBackend;

    async fn launch(&self, config: &CrawlConfig) -> CrawlResult<ChromiumBackend> {
        ChromiumBackend::launch(config)
            .await
            .map_err(|e| CrawlError::Browser(format!("{e:#}")))
    }
}

/// Snapshot returned by [`CrawlController::status`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlStatus {
    pub is_running: bool,
    pub crawl_id: Option<String>,
    pub vin: Option<String>,
    pub workers: usize,
    pub started_at: Option<DateTime<Utc>>,
    /// Live aggregate of every worker's published counters
    pub stats: CrawlerStats,
    pub last_summary: Option<CrawlSummary>,
}

struct ActiveCrawl {
    crawl_id: String,
    vin: Vin,
    workers: usize,
    started_at: DateTime<Utc>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<CrawlResult<CrawlSummary>>,
}

async fn join(task: JoinHandle<CrawlResult<CrawlSummary>>) -> CrawlResult<CrawlSummary> {
    task.await
        .map_err(|e| CrawlError::Other(format!("crawl task failed: {e}")))?
}

/// Holds at most one running crawl
pub struct CrawlController<L: BackendLauncher, A: Authenticator + 'static> {
    launcher: Arc<L>,
    authenticator: Arc<A>,
    store: Arc<JsonlStore>,
    progress: Arc<dyn ProgressReporter>,
    board: StatsBoard,
    active: Mutex<Option<ActiveCrawl>>,
    last_summary: parking_lot::Mutex<Option<CrawlSummary>>,
}

impl<L: BackendLauncher, A: Authenticator + 'static> CrawlController<L, A> {
    pub fn new(launcher: L, authenticator: A, store: Arc<JsonlStore>) -> Self {
        Self {
            launcher: Arc::new(launcher),
            authenticator: Arc::new(authenticator),
            store,
            progress: Arc::new(LogProgress),
            board: StatsBoard::new(),
            active: Mutex::new(None),
            last_summary: parking_lot::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<JsonlStore> {
        &self.store
    }

    /// Start a crawl for `vin` with `workers` workers, other settings from the environment
    ///
    /// Returns the crawl id.
    pub async fn start(&self, vin: &str, workers: usize) -> CrawlResult<String> {
        let vin = Vin::parse(vin).map_err(|e| CrawlError::Config(e.to_string()))?;
        let config = CrawlConfig::from_env(vin)?.max_workers(workers).build()?;
        self.start_with(config).await
    }

    /// Start a crawl with a fully built configuration
    pub async fn start_with(&self, config: CrawlConfig) -> CrawlResult<String> {
        let mut active = self.active.lock().await;
        if let Some(running) = active.take_if(|a| a.task.is_finished()) {
            let _ = self.remember(join(running.task).await);
        }
        if active.is_some() {
            return Err(CrawlError::AlreadyRunning);
        }

        if config.clear_before_crawl() {
            self.store.clear_vin(config.vin().as_str()).await?;
        }

        let crawl_id = uuid::Uuid::new_v4().to_string();
        let (cancel, cancel_rx) = watch::channel(false);
        self.board.clear();

        let vin = config.vin().clone();
        let workers = config.max_workers();
        let config = Arc::new(config);
        let launcher = Arc::clone(&self.launcher);
        let authenticator = Arc::clone(&self.authenticator);
        let sink: Arc<dyn DocumentSink> = self.store.clone();
        let progress = Arc::clone(&self.progress);
        let board = self.board.clone();

        let task = tokio::spawn(async move {
            let backend = launcher.launch(&config).await?;
            let mut orchestrator =
                Orchestrator::new(backend, config, sink, progress).with_stats_board(board);
            orchestrator.run(authenticator.as_ref(), cancel_rx).await
        });

        info!("Started crawl {crawl_id} for {vin} with {workers} workers");
        *active = Some(ActiveCrawl {
            crawl_id: crawl_id.clone(),
            vin,
            workers,
            started_at: Utc::now(),
            cancel,
            task,
        });
        Ok(crawl_id)
    }

    fn remember(&self, result: CrawlResult<CrawlSummary>) -> CrawlResult<CrawlSummary> {
        match &result {
            Ok(summary) => *self.last_summary.lock() = Some(summary.clone()),
            Err(e) => warn!("Crawl ended with error: {e}"),
        }
        result
    }

    /// Cancel the running crawl and wait for its cleanup
    pub async fn stop(&self) -> CrawlResult<CrawlSummary> {
        let running = {
            let mut active = self.active.lock().await;
            match active.take() {
                Some(running) if !running.task.is_finished() => running,
                Some(finished) => {
                    let _ = self.remember(join(finished.task).await);
                    return Err(CrawlError::NotRunning);
                }
                None => return Err(CrawlError::NotRunning),
            }
        };
        info!("Stopping crawl {}", running.crawl_id);
        // Send only fails when the task already dropped its receiver.
        let _ = running.cancel.send(true);
        self.remember(join(running.task).await)
    }

    /// Wait for the running crawl to finish on its own
    ///
    /// Cancel-safe: dropping this future leaves the crawl registered, so a
    /// concurrent [`stop`](Self::stop) still finds it.
    pub async fn wait(&self) -> CrawlResult<CrawlSummary> {
        loop {
            {
                let mut active = self.active.lock().await;
                if let Some(done) = active.take_if(|a| a.task.is_finished()) {
                    return self.remember(join(done.task).await);
                }
                if active.is_none() {
                    return Err(CrawlError::NotRunning);
                }
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    pub async fn status(&self) -> CrawlStatus {
        let active = self.active.lock().await;
        let last_summary = self.last_summary.lock().clone();
        match active.as_ref() {
            Some(a) if !a.task.is_finished() => CrawlStatus {
                is_running: true,
                crawl_id: Some(a.crawl_id.clone()),
                vin: Some(a.vin.to_string()),
                workers: a.workers,
                started_at: Some(a.started_at),
                stats: self.board.aggregate(),
                last_summary,
            },
            _ => CrawlStatus {
                is_running: false,
                crawl_id: None,
                vin: None,
                workers: 0,
                started_at: None,
                stats: self.board.aggregate(),
                last_summary,
            },
        }
    }

    pub async fn get_documents(&self, vin: &str) -> CrawlResult<Vec<SinkRecord>> {
        let vin = Vin::parse(vin).map_err(|e| CrawlError::Config(e.to_string()))?;
        Ok(self.store.get_documents(vin.as_str()).await?)
    }

    pub async fn search_documents(&self, filter: &DocumentFilter) -> CrawlResult<Vec<SinkRecord>> {
        Ok(self.store.search_documents(filter).await?)
    }
}
