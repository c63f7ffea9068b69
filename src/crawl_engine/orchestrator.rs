//! Crawl orchestration
//!
//! Coordinates one crawl:
//! - Single login and one-time metadata capture
//! - Session export and worker spawn
//! - Round-robin partitioning of the top-level categories
//! - Concurrent worker runs, raced against cancellation
//! - Reverse-order teardown

use futures::future::join_all;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::cleanup::{CleanupResult, close_sessions_reversed};
use super::crawl_types::{CrawlError, CrawlResult};
use super::progress::ProgressReporter;
use super::worker::{Worker, detect_vin_frame, open_manual_section, open_vehicle_search, submit_vin};
use crate::auth::Authenticator;
use crate::automation::{BrowserBackend, PageSession, SessionState};
use crate::config::CrawlConfig;
use crate::extractors::{capture_fieldsets, extract_vehicle_history, top_level};
use crate::models::{CrawlSummary, CrawlerStats, FieldsetSnapshot, VehicleHistory, WorkerFailure};
use crate::sink::DocumentSink;
use crate::utils::JOB_DETAIL_SELECTORS;

/// Upper bound for closing the browser process
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Live per-worker stats, indexed by worker id
///
/// Workers publish after every category; readers get copies.
#[derive(Debug, Clone, Default)]
pub struct StatsBoard {
    slots: Arc<RwLock<Vec<CrawlerStats>>>,
}

impl StatsBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, worker_id: usize, stats: &CrawlerStats) {
        let mut slots = self.slots.write();
        if slots.len() <= worker_id {
            slots.resize_with(worker_id + 1, CrawlerStats::default);
        }
        slots[worker_id] = stats.clone();
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<CrawlerStats> {
        self.slots.read().clone()
    }

    #[must_use]
    pub fn aggregate(&self) -> CrawlerStats {
        CrawlerStats::aggregate(self.slots.read().iter())
    }

    pub fn clear(&self) {
        self.slots.write().clear();
    }
}

/// Split `items` round-robin over `workers` partitions
///
/// Item `i` goes to partition `i % workers`, so sizes differ by at most one.
#[must_use]
pub fn partition<T: Clone>(items: &[T], workers: usize) -> Vec<Vec<T>> {
    let mut parts: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    if workers == 0 {
        return parts;
    }
    for (i, item) in items.iter().enumerate() {
        parts[i % workers].push(item.clone());
    }
    parts
}

/// Resolves once `cancel` reads `true`; never if the sender is gone
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Owns the login session and every worker of one crawl
pub struct Orchestrator<B: BrowserBackend> {
    backend: B,
    config: Arc<CrawlConfig>,
    sink: Arc<dyn DocumentSink>,
    progress: Arc<dyn ProgressReporter>,
    board: StatsBoard,
    login: Option<B::Session>,
    workers: Vec<Worker<B::Session>>,
    failed: Vec<WorkerFailure>,
    fieldsets: Option<FieldsetSnapshot>,
    history: Option<VehicleHistory>,
}

impl<B: BrowserBackend> Orchestrator<B> {
    pub fn new(
        backend: B,
        config: Arc<CrawlConfig>,
        sink: Arc<dyn DocumentSink>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            backend,
            config,
            sink,
            progress,
            board: StatsBoard::new(),
            login: None,
            workers: Vec::new(),
            failed: Vec::new(),
            fieldsets: None,
            history: None,
        }
    }

    /// Publish worker stats into an externally owned board
    #[must_use]
    pub fn with_stats_board(mut self, board: StatsBoard) -> Self {
        self.board = board;
        self
    }

    #[must_use]
    pub fn stats_board(&self) -> &StatsBoard {
        &self.board
    }

    #[must_use]
    pub fn workers(&self) -> &[Worker<B::Session>] {
        &self.workers
    }

    #[must_use]
    pub fn failed_workers(&self) -> &[WorkerFailure] {
        &self.failed
    }

    #[must_use]
    pub fn fieldsets(&self) -> Option<&FieldsetSnapshot> {
        self.fieldsets.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> Option<&VehicleHistory> {
        self.history.as_ref()
    }

    /// Log in once, capture metadata, export the session, spawn workers
    ///
    /// Fails when the login session cannot be established, when no worker
    /// reached its crawling state, or when `cancel` fires first. Every
    /// session opened up to that point is owned by `self` for cleanup.
    pub async fn initialize<A: Authenticator>(
        &mut self,
        authenticator: &A,
        cancel: watch::Receiver<bool>,
    ) -> CrawlResult<()> {
        self.progress.report_initializing();

        let mut login_cancel = cancel.clone();
        let state = tokio::select! {
            result = self.prepare_login(authenticator) => result?,
            () = cancelled(&mut login_cancel) => return Err(CrawlError::Cancelled),
        };
        self.progress.report_session_ready();

        self.spawn_workers(&state, &cancel).await;
        if *cancel.borrow() {
            return Err(CrawlError::Cancelled);
        }
        if self.workers.is_empty() {
            return Err(CrawlError::init("workers", "no worker could be initialized"));
        }
        info!(
            "{} of {} workers ready",
            self.workers.len(),
            self.config.max_workers()
        );
        Ok(())
    }

    /// Login session up to the manual section; returns its exported state
    async fn prepare_login<A: Authenticator>(&mut self, authenticator: &A) -> CrawlResult<SessionState> {
        let timeout = self.config.timeout();
        let settle = self.config.settle_delay();
        let vin = self.config.vin().as_str().to_string();

        let login = self
            .backend
            .new_session(None)
            .await
            .map_err(|e| CrawlError::init("login session", e))?;
        let login: &B::Session = self.login.insert(login);

        authenticator.login(login, self.config.base_url()).await?;

        open_vehicle_search(login, timeout, settle)
            .await
            .map_err(|e| CrawlError::init("vehicle search", e))?;
        let vin_frame = detect_vin_frame(login)
            .await
            .map_err(|e| CrawlError::init("vin frame", e))?;
        submit_vin(&vin_frame, &vin, settle)
            .await
            .map_err(|e| CrawlError::init("vin submit", e))?;

        if self.config.capture_fieldsets() {
            let per_selector =
                timeout / u32::try_from(JOB_DETAIL_SELECTORS.len()).unwrap_or(1).max(1);
            let snapshot = capture_fieldsets(&vin_frame, &vin, per_selector).await;
            if let Err(e) = self.sink.emit_fieldsets(&snapshot).await {
                warn!("Failed to persist fieldsets: {e}");
            }
            self.fieldsets = Some(snapshot);
        }

        if self.config.capture_history() {
            match extract_vehicle_history(login, &vin, settle, timeout).await {
                Ok(history) => {
                    if let Err(e) = self.sink.emit_history(&history).await {
                        warn!("Failed to persist vehicle history: {e}");
                    }
                    self.history = Some(history);
                }
                Err(e) => warn!("Vehicle history extraction failed: {e}"),
            }
        }

        open_manual_section(login, settle)
            .await
            .map_err(|e| CrawlError::init("manual section", e))?;
        let state = login
            .export_state()
            .await
            .map_err(|e| CrawlError::init("export state", e))?;
        debug!("Exported session with {} cookies", state.cookies.len());
        Ok(state)
    }

    /// Open and initialize every worker concurrently
    ///
    /// A worker whose initialization loses the race against `cancel` closes
    /// its session before its future resolves.
    async fn spawn_workers(&mut self, state: &SessionState, cancel: &watch::Receiver<bool>) {
        let backend = &self.backend;
        let attempts = (0..self.config.max_workers()).map(|id| {
            let config = Arc::clone(&self.config);
            let sink = Arc::clone(&self.sink);
            let progress = Arc::clone(&self.progress);
            let board = self.board.clone();
            let mut cancel = cancel.clone();
            async move {
                let session = backend
                    .new_session(Some(state))
                    .await
                    .map_err(|e| CrawlError::init("worker session", e))?;
                let mut worker = Worker::new(id, session, config, sink, progress, board);
                let initialized = tokio::select! {
                    result = worker.initialize() => result,
                    () = cancelled(&mut cancel) => Err(CrawlError::Cancelled),
                };
                match initialized {
                    Ok(()) => Ok(worker),
                    Err(e) => {
                        if let Err(close) = worker.session().close().await {
                            debug!("[worker {id}] Close after failed init: {close}");
                        }
                        Err(e)
                    }
                }
            }
        });

        for (id, result) in join_all(attempts).await.into_iter().enumerate() {
            match result {
                Ok(worker) => self.workers.push(worker),
                Err(CrawlError::Cancelled) => {
                    debug!("[worker {id}] Initialization cancelled");
                }
                Err(e) => {
                    error!("[worker {id}] Initialization failed: {e}");
                    self.progress.report_error(&format!("worker {id}: {e}"));
                    self.failed.push(WorkerFailure {
                        worker_id: id,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Discover the roots once, partition them, and run every worker
    ///
    /// On cancellation the in-flight worker futures are dropped and the
    /// summary reports the counts reached so far.
    pub async fn crawl_all(&mut self, mut cancel: watch::Receiver<bool>) -> CrawlResult<CrawlSummary> {
        let first = self
            .workers
            .first()
            .ok_or_else(|| CrawlError::Other("no initialized workers".into()))?;
        let categories = first.discover_categories().await?;
        let roots = top_level(&categories);
        self.progress.report_categories_discovered(roots.len());
        info!(
            "{} top-level categories of {} discovered over {} workers",
            roots.len(),
            categories.len(),
            self.workers.len()
        );

        let parts = partition(&roots, self.workers.len());
        let run = join_all(
            self.workers
                .iter_mut()
                .zip(parts)
                .map(|(worker, part)| worker.crawl_partition(part)),
        );

        let was_cancelled = tokio::select! {
            _ = run => false,
            () = cancelled(&mut cancel) => {
                warn!("Crawl cancelled, abandoning in-flight categories");
                true
            }
        };

        let stats: Vec<CrawlerStats> = self.workers.iter().map(|w| w.stats().clone()).collect();
        let summary = CrawlSummary::from_workers(
            self.config.vin().as_str(),
            stats,
            self.failed.clone(),
            was_cancelled,
        );
        self.progress.report_completed(&summary);
        Ok(summary)
    }

    /// Initialize, crawl, and always clean up
    pub async fn run<A: Authenticator>(
        &mut self,
        authenticator: &A,
        cancel: watch::Receiver<bool>,
    ) -> CrawlResult<CrawlSummary> {
        let result = match self.initialize(authenticator, cancel.clone()).await {
            Ok(()) => self.crawl_all(cancel).await,
            Err(e) => Err(e),
        };

        let cleanup = self.cleanup().await;
        if !cleanup.is_success() {
            warn!(target: "elsa_crawl::cleanup", "Cleanup finished with {} errors", cleanup.errors().len());
        }
        result
    }

    /// Close every owned context in reverse acquisition order, then the backend
    ///
    /// Individual failures are collected, never propagated.
    pub async fn cleanup(&mut self) -> CleanupResult {
        self.progress.report_cleanup_started();

        let workers = std::mem::take(&mut self.workers);
        let login = self.login.take();
        let sessions: Vec<(String, &B::Session)> = login
            .iter()
            .map(|s| ("login session".to_string(), s))
            .chain(workers.iter().map(|w| (format!("worker {}", w.id()), w.session())))
            .collect();
        let closed = close_sessions_reversed(sessions).await;

        let shutdown = match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.backend.shutdown()).await {
            Ok(Ok(())) => CleanupResult::Success,
            Ok(Err(e)) => CleanupResult::PartialFailure(vec![format!("backend shutdown: {e}")]),
            Err(_) => CleanupResult::PartialFailure(vec!["backend shutdown timed out".into()]),
        };
        closed.merge(shutdown)
    }
}
