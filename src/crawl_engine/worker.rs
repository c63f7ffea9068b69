//! Worker: one browsing context, one crawl loop
//!
//! A worker drives its own session from the portal start page to the manual
//! section, then walks the categories it was assigned. All dedup state is
//! local; the only shared things are the sink and the stats board.

use log::{debug, info, trace, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::crawl_types::{CategoryOutcome, CrawlError, CrawlResult, DocumentOutcome, WorkerState};
use super::orchestrator::StatsBoard;
use super::page_timeout::with_page_timeout;
use super::progress::ProgressReporter;
use super::retry::{poll_with_backoff, retry_with_backoff};
use crate::automation::{AutomationError, AutomationResult, FrameHandle, PageSession};
use crate::config::CrawlConfig;
use crate::extractors::js_scripts::CLICK_CATEGORY_SCRIPT;
use crate::extractors::{
    ChildDiscovery, classify_session, click_document, discover_children, discover_root,
    extract_document, list_documents,
};
use crate::models::{Category, CrawlerStats, ExtractedDocument};
use crate::sink::{DocumentSink, SinkRecord};
use crate::utils::{
    MANUAL_SECTION_BUTTON_SELECTOR, NEW_JOB_BUTTON_SELECTOR, TOOLBAR_FRAME_SELECTOR,
    VIN_INPUT_SELECTOR, VIN_INPUT_TIMEOUT_MS,
};

/// Open the vehicle search dialog from the toolbar
pub(crate) async fn open_vehicle_search<S: PageSession>(
    session: &S,
    timeout: Duration,
    settle: Duration,
) -> AutomationResult<()> {
    session.wait_for_selector(TOOLBAR_FRAME_SELECTOR, timeout).await?;
    session.click(NEW_JOB_BUTTON_SELECTOR).await?;
    tokio::time::sleep(settle).await;
    Ok(())
}

/// Frame hosting the VIN input
///
/// First frame whose URL hints at a search or vehicle page, else the first
/// non-main frame without nested frames.
pub(crate) async fn detect_vin_frame<S: PageSession>(session: &S) -> AutomationResult<S::Frame> {
    let frames = session.list_frames().await?;
    let by_url = frames.iter().find(|f| {
        let url = f.url().to_lowercase();
        url.contains("search") || url.contains("veh")
    });
    by_url
        .or_else(|| frames.iter().find(|f| !f.is_main() && !f.has_children()))
        .cloned()
        .ok_or_else(|| AutomationError::NotFound("VIN frame".to_string()))
}

/// Fill the VIN into `frame` and submit it
pub(crate) async fn submit_vin<F: FrameHandle>(
    frame: &F,
    vin: &str,
    settle: Duration,
) -> AutomationResult<()> {
    frame
        .wait_for_selector(VIN_INPUT_SELECTOR, Duration::from_millis(VIN_INPUT_TIMEOUT_MS))
        .await?;
    frame.fill(VIN_INPUT_SELECTOR, vin).await?;
    frame.press_enter(VIN_INPUT_SELECTOR).await?;
    tokio::time::sleep(settle).await;
    Ok(())
}

/// Switch to the service manual ("Handbuch Service Technik")
pub(crate) async fn open_manual_section<S: PageSession>(
    session: &S,
    settle: Duration,
) -> AutomationResult<()> {
    session.click(MANUAL_SECTION_BUTTON_SELECTOR).await?;
    tokio::time::sleep(settle).await;
    Ok(())
}

/// Crawl worker over one [`PageSession`]
pub struct Worker<S: PageSession> {
    id: usize,
    session: S,
    config: Arc<CrawlConfig>,
    sink: Arc<dyn DocumentSink>,
    progress: Arc<dyn ProgressReporter>,
    board: StatsBoard,
    state: WorkerState,
    visited_categories: HashSet<String>,
    /// `(category_id, document_key)`; keys are only unique within a category
    visited_documents: HashSet<(String, String)>,
    stats: CrawlerStats,
}

impl<S: PageSession> Worker<S> {
    pub fn new(
        id: usize,
        session: S,
        config: Arc<CrawlConfig>,
        sink: Arc<dyn DocumentSink>,
        progress: Arc<dyn ProgressReporter>,
        board: StatsBoard,
    ) -> Self {
        Self {
            id,
            session,
            config,
            sink,
            progress,
            board,
            state: WorkerState::Uninitialized,
            visited_categories: HashSet::new(),
            visited_documents: HashSet::new(),
            stats: CrawlerStats::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> &CrawlerStats {
        &self.stats
    }

    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    fn advance(&mut self, next: WorkerState) {
        debug_assert!(next >= self.state, "worker state moved backwards");
        trace!("[worker {}] {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    fn publish(&self) {
        self.board.publish(self.id, &self.stats);
    }

    /// Bring the session from the start page to detected frames
    ///
    /// Any failure is fatal for this worker.
    pub async fn initialize(&mut self) -> CrawlResult<()> {
        info!("[worker {}] Initializing", self.id);
        let timeout = self.config.timeout();
        let settle = self.config.settle_delay();

        self.advance(WorkerState::SearchingVehicle);
        with_page_timeout(self.session.navigate(self.config.base_url()), timeout, "navigate")
            .await
            .map_err(|e| CrawlError::init("navigate", e))?;
        open_vehicle_search(&self.session, timeout, settle)
            .await
            .map_err(|e| CrawlError::init("vehicle search", e))?;

        let frame = detect_vin_frame(&self.session)
            .await
            .map_err(|e| CrawlError::init("vin frame", e))?;
        submit_vin(&frame, self.config.vin().as_str(), settle)
            .await
            .map_err(|e| CrawlError::init("vin submit", e))?;
        self.advance(WorkerState::VinSubmitted);

        open_manual_section(&self.session, settle)
            .await
            .map_err(|e| CrawlError::init("manual section", e))?;
        self.advance(WorkerState::ManualSection);

        if self.navigation_frame().await.is_none() {
            return Err(CrawlError::init("frames", "navigation frame not found"));
        }
        self.advance(WorkerState::FramesDetected);

        self.progress.report_worker_ready(self.id);
        info!("[worker {}] Initialized", self.id);
        Ok(())
    }

    /// Re-classify frames until the navigation tree shows up
    async fn navigation_frame(&self) -> Option<S::Frame> {
        let session = &self.session;
        poll_with_backoff(
            self.config.frame_retry_attempts(),
            self.config.frame_retry_base(),
            "navigation frame",
            |_| async move { classify_session(session).await.ok()?.navigation },
        )
        .await
    }

    /// Re-classify frames until the document listing shows up
    ///
    /// `None` after the last attempt means the category has no listing.
    async fn content_frame(&self) -> Option<S::Frame> {
        let session = &self.session;
        let id = self.id;
        poll_with_backoff(
            self.config.frame_retry_attempts(),
            self.config.frame_retry_base(),
            "document listing",
            |_| async move {
                match classify_session(session).await {
                    Ok(roles) => roles.content,
                    Err(e) => {
                        trace!("[worker {id}] Classification failed: {e}");
                        None
                    }
                }
            },
        )
        .await
    }

    /// Retries left after the first attempt of a soft-failing UI call
    fn ui_retries(&self) -> u32 {
        self.config.frame_retry_attempts().saturating_sub(1)
    }

    /// Every category currently rendered in the tree
    pub async fn discover_categories(&self) -> CrawlResult<Vec<Category>> {
        let navigation = self
            .navigation_frame()
            .await
            .ok_or_else(|| CrawlError::Browser("navigation frame not found".into()))?;
        let categories = discover_root(&navigation).await?;
        info!("[worker {}] Collected {} categories", self.id, categories.len());
        Ok(categories)
    }

    /// Click the category's tree link
    async fn activate(&self, category: &Category) -> Result<(), String> {
        let navigation = self
            .navigation_frame()
            .await
            .ok_or_else(|| "navigation frame not found".to_string())?;
        let navigation = &navigation;
        let target = category.activation_target();
        let timeout = self.config.timeout();
        retry_with_backoff(
            self.ui_retries(),
            self.config.frame_retry_base(),
            "category click",
            move || async move {
                let clicked = with_page_timeout(
                    navigation.evaluate(CLICK_CATEGORY_SCRIPT, vec![Value::from(target)]),
                    timeout,
                    "category click",
                )
                .await?;
                if clicked.as_bool() == Some(true) {
                    Ok(())
                } else {
                    Err(AutomationError::NotFound(format!("no link matches {target:?}")))
                }
            },
        )
        .await
        .map_err(|e| format!("click failed: {e}"))?;
        tokio::time::sleep(self.config.settle_delay()).await;
        Ok(())
    }

    /// Activate the row's document and extract it
    async fn process_document(&mut self, category: &Category, key: &str) -> DocumentOutcome {
        let visit = (category.id.clone(), key.to_string());
        if !self.visited_documents.insert(visit) {
            return DocumentOutcome::Duplicate;
        }

        match click_document(&self.session, key).await {
            Ok(true) => {}
            Ok(false) => return DocumentOutcome::Failed(format!("no link for document {key}")),
            Err(e) => return DocumentOutcome::Failed(format!("document {key}: {e}")),
        }
        tokio::time::sleep(self.config.settle_delay()).await;

        let hint = match classify_session(&self.session).await {
            Ok(roles) => roles.document,
            Err(_) => None,
        };
        match extract_document(&self.session, hint.as_ref(), key, category).await {
            Ok(Some(document)) => DocumentOutcome::Extracted(Box::new(document)),
            Ok(None) => DocumentOutcome::Unavailable,
            Err(e) => {
                debug!("[worker {}] Extraction of {key} failed: {e}", self.id);
                DocumentOutcome::Unavailable
            }
        }
    }

    /// Hand a document to the sink; failures are logged only
    async fn emit(&self, document: ExtractedDocument) {
        let record = SinkRecord::new(self.config.vin().as_str(), document);
        if let Err(e) = self.sink.emit(&record).await {
            warn!("[worker {}] Sink rejected {}: {e}", self.id, record.document_id());
        }
    }

    /// Extract the documents listed for the active category
    ///
    /// Returns the number emitted. Branch errors are recorded on the stats.
    async fn crawl_listing(&mut self, category: &Category) -> usize {
        let Some(content) = self.content_frame().await else {
            debug!("[worker {}] {}: no document listing", self.id, category.name);
            return 0;
        };
        trace!("[worker {}] Listing frame {}", self.id, content.url());
        let listing = &content;
        let cap = self.config.max_documents_per_category();
        let rows = match retry_with_backoff(
            self.ui_retries(),
            self.config.frame_retry_base(),
            "document rows",
            move || list_documents(listing, cap),
        )
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                self.record_error(&format!("{}: listing unreadable: {e}", category.name));
                return 0;
            }
        };

        let mut emitted = 0;
        let last = rows.len().saturating_sub(1);
        for (i, row) in rows.iter().enumerate() {
            match self.process_document(category, &row.key).await {
                DocumentOutcome::Extracted(document) => {
                    self.emit(*document).await;
                    self.stats.record_document();
                    emitted += 1;
                }
                DocumentOutcome::Unavailable => {
                    debug!("[worker {}] Document {} unavailable", self.id, row.key);
                }
                DocumentOutcome::Duplicate => {
                    trace!("[worker {}] Document {} already visited", self.id, row.key);
                    continue;
                }
                DocumentOutcome::Failed(reason) => {
                    self.record_error(&reason);
                    continue;
                }
            }

            // The listing is replaced by the document view; bring it back.
            if i < last {
                if let Err(reason) = self.activate(category).await {
                    self.record_error(&format!("{}: listing not restored: {reason}", category.name));
                    break;
                }
                if self.content_frame().await.is_none() {
                    self.record_error(&format!("{}: listing lost", category.name));
                    break;
                }
            }
        }
        emitted
    }

    /// Direct children of an activated category
    async fn children_of(&self, category: &Category) -> Vec<Category> {
        for attempt in 0..2 {
            let Some(navigation) = self.navigation_frame().await else {
                return Vec::new();
            };
            match discover_children(&navigation, category).await {
                Ok(ChildDiscovery::Children(children)) => return children,
                Ok(ChildDiscovery::NoChildren) => return Vec::new(),
                Ok(ChildDiscovery::NotFound) if attempt == 0 => {
                    tokio::time::sleep(self.config.settle_delay()).await;
                }
                Ok(ChildDiscovery::NotFound) => {
                    debug!("[worker {}] {} not found in tree, treating as leaf", self.id, category.name);
                }
                Err(e) => {
                    debug!("[worker {}] Child discovery for {} failed: {e}", self.id, category.name);
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }

    fn record_error(&mut self, reason: &str) {
        warn!("[worker {}] {reason}", self.id);
        self.stats.record_error();
        self.progress.report_error(reason);
    }

    /// Process one category node; returns its outcome and the children to visit
    async fn visit(&mut self, category: &Category) -> (CategoryOutcome, Vec<Category>) {
        if !self.visited_categories.insert(category.id.clone()) {
            return (CategoryOutcome::AlreadyVisited, Vec::new());
        }
        info!("[worker {}] Crawling {} (depth {})", self.id, category.name, category.depth);

        if let Err(reason) = self.activate(category).await {
            return (
                CategoryOutcome::Failed(format!("{}: {reason}", category.name)),
                Vec::new(),
            );
        }

        let documents = self.crawl_listing(category).await;
        let children = self.children_of(category).await;
        if documents == 0 && children.is_empty() {
            debug!("[worker {}] {} has no documents and no children", self.id, category.name);
        }

        self.stats.record_category();
        self.publish();
        self.progress.report_category_crawled(self.id, &category.name, documents);
        (CategoryOutcome::Crawled { documents }, children)
    }

    /// Crawl `root` and everything below it, depth-first
    ///
    /// Returns the documents emitted. A second call for the same category is
    /// a no-op returning 0.
    pub async fn crawl_category(&mut self, root: Category) -> usize {
        if self.state < WorkerState::Crawling {
            self.advance(WorkerState::Crawling);
        }
        let mut stack = vec![root];
        let mut total = 0;
        while let Some(category) = stack.pop() {
            let (outcome, children) = self.visit(&category).await;
            match outcome {
                CategoryOutcome::Crawled { documents } => total += documents,
                CategoryOutcome::AlreadyVisited => {
                    trace!("[worker {}] {} already visited", self.id, category.id);
                }
                CategoryOutcome::Failed(reason) => {
                    self.record_error(&reason);
                    self.publish();
                }
            }
            // Reversed so the first child is crawled first.
            stack.extend(children.into_iter().rev());
        }
        total
    }

    /// Crawl an assigned partition to completion and return the final stats
    pub async fn crawl_partition(&mut self, categories: Vec<Category>) -> CrawlerStats {
        self.stats.mark_started();
        self.publish();
        info!("[worker {}] Crawling {} categories", self.id, categories.len());

        for category in categories {
            self.crawl_category(category).await;
        }

        self.stats.mark_finished();
        self.advance(WorkerState::Done);
        self.publish();
        info!(
            "[worker {}] Done: {} categories, {} documents, {} errors",
            self.id,
            self.stats.categories_crawled(),
            self.stats.documents_extracted(),
            self.stats.errors()
        );
        self.stats.clone()
    }
}
