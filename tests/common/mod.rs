//! Test utilities for the elsa_crawl test suite
//!
//! [`MockBrowser`] simulates the portal well enough for the crawl engine: a
//! main frame, a navigation frame holding the category tree, and a content
//! frame that shows either the active category's listing or an opened
//! document. Frames answer the crate's own scripts by matching on the
//! script text.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use elsa_crawl::automation::dom_scripts::{
    ELEMENT_CLICK_SCRIPT, ELEMENT_EXISTS_SCRIPT, ELEMENT_FILL_SCRIPT, ELEMENT_PRESS_ENTER_SCRIPT,
};
use elsa_crawl::automation::{
    AutomationError, AutomationResult, BrowserBackend, FrameHandle, PageSession, SessionCookie,
    SessionState,
};
use elsa_crawl::extractors::js_scripts::{
    CHILD_CATEGORIES_SCRIPT, CLASSIFY_FRAME_SCRIPT, CLICK_CATEGORY_SCRIPT, CLICK_DOCUMENT_SCRIPT,
    COLLECT_CATEGORIES_SCRIPT, DOCUMENT_BODY_SCRIPT, FIELDSET_SCRIPT, LINK_HREF_SCRIPT,
    LIST_DOCUMENTS_SCRIPT,
};
use elsa_crawl::config::{CrawlConfigBuilder, WithVin};
use elsa_crawl::models::{FieldsetSnapshot, VehicleHistory};
use elsa_crawl::sink::{SinkError, SinkResult};
use elsa_crawl::{
    Authenticator, BackendLauncher, CrawlConfig, CrawlResult, DocumentSink, SinkRecord, Vin,
};

pub const TEST_VIN: &str = "WVWZZZ1KZAW000001";
pub const PORTAL_URL: &str = "https://portal.test/elsapro/elsaweb/ctr/elsaFs";

/// Route engine logs to the test harness; `RUST_LOG=elsa_crawl=debug` to see them
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn vin() -> Vin {
    Vin::parse(TEST_VIN).expect("test VIN is valid")
}

/// Builder with no settle delay, a single frame probe and no metadata capture
pub fn fast_builder(workers: usize) -> CrawlConfigBuilder<WithVin> {
    CrawlConfig::builder()
        .vin(vin())
        .base_url(PORTAL_URL)
        .max_workers(workers)
        .settle_delay_ms(0)
        .frame_retry(1, 0)
        .capture_fieldsets(false)
        .capture_history(false)
        .clear_before_crawl(false)
}

pub fn fast_config(workers: usize) -> CrawlConfig {
    fast_builder(workers).build().expect("test config is valid")
}

/// Level-coded tree link for `code`
pub fn href(code: &str) -> String {
    format!("tree?levelCode={code}")
}

/// Document body that passes the validity gate and the detail classifier
pub fn document_text(key: &str) -> String {
    format!(
        "Vorgangs-Nr {key}\nKundenaussage: Motor ruckelt im Leerlauf.\nLösung: Zündspule ersetzt. {}",
        "Prüfprotokoll ".repeat(12)
    )
}

/// Listing row text carrying `key` as its case number
pub fn row_text(key: &str) -> String {
    format!("12.03.2024  {key}  Beanstandung")
}

/// Static content of the simulated portal, shared by every session
#[derive(Debug, Default)]
pub struct Portal {
    /// Nodes returned by the root walk, in document order
    pub tree: Vec<Value>,
    /// Children per parent label; labels absent here report no children
    pub children: HashMap<String, Vec<Value>>,
    /// Labels that are not rendered in the tree at all
    pub hidden: HashSet<String>,
    /// Listing row texts per activation target
    pub listings: HashMap<String, Vec<String>>,
    /// Body text per document key
    pub documents: HashMap<String, String>,
    /// Activation targets whose link click fails
    pub broken_links: HashSet<String>,
    /// Listed keys whose row has no clickable link
    pub dead_rows: HashSet<String>,
    /// Content classifications after a category click that still show no rows
    pub listing_delay: u32,
    /// Clicks per activation target that miss before the link responds
    pub flaky_links: Mutex<HashMap<String, u32>>,
}

impl Portal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root-level tree node
    pub fn root(mut self, name: &str, code: &str) -> Self {
        self.tree.push(json!({
            "name": name,
            "href": href(code),
            "depth": 1,
            "hasChildren": self.children.contains_key(name),
            "parent": null
        }));
        self
    }

    /// Add a raw tree node as returned by the root walk
    pub fn node(mut self, node: Value) -> Self {
        self.tree.push(node);
        self
    }

    /// Register the direct children revealed when `parent` is expanded
    pub fn with_children(mut self, parent: &str, children: &[(&str, &str)]) -> Self {
        let children = children
            .iter()
            .map(|(name, code)| json!({ "name": name, "href": href(code), "hasChildren": false }))
            .collect();
        self.children.insert(parent.to_string(), children);
        self
    }

    /// Give the category with level code `code` a listing of these keys
    pub fn with_listing(mut self, code: &str, keys: &[&str]) -> Self {
        let rows = keys.iter().map(|k| row_text(k)).collect();
        self.listings.insert(href(code), rows);
        for key in keys {
            self.documents
                .entry((*key).to_string())
                .or_insert_with(|| document_text(key));
        }
        self
    }

    pub fn with_document(mut self, key: &str, text: impl Into<String>) -> Self {
        self.documents.insert(key.to_string(), text.into());
        self
    }

    pub fn with_broken_link(mut self, code: &str) -> Self {
        self.broken_links.insert(href(code));
        self
    }

    pub fn with_hidden(mut self, label: &str) -> Self {
        self.hidden.insert(label.to_string());
        self
    }

    /// Let the first `misses` clicks on category `code` find no link
    pub fn with_flaky_link(self, code: &str, misses: u32) -> Self {
        self.flaky_links.lock().insert(href(code), misses);
        self
    }

    pub fn with_dead_row(mut self, key: &str) -> Self {
        self.dead_rows.insert(key.to_string());
        self
    }

    /// Render every listing only after `polls` classifications
    pub fn with_listing_delay(mut self, polls: u32) -> Self {
        self.listing_delay = polls;
        self
    }
}

/// What the content frame currently shows
#[derive(Debug, Default)]
struct View {
    active: Option<String>,
    document: Option<String>,
    /// Classifications left before the listing renders
    rendering: u32,
}

/// Counters shared across every session of one browser
#[derive(Debug, Default)]
pub struct Journal {
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub category_clicks: AtomicUsize,
    pub document_clicks: AtomicUsize,
    pub shutdown: AtomicBool,
    /// Worker sessions still to be opened broken
    pub broken_sessions: AtomicUsize,
    /// Milliseconds every worker session spends on its first navigation
    pub worker_navigation_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Main,
    Navigation,
    Content,
}

#[derive(Clone)]
pub struct MockFrame {
    kind: FrameKind,
    url: String,
    portal: Arc<Portal>,
    journal: Arc<Journal>,
    view: Arc<Mutex<View>>,
}

impl MockFrame {
    fn listing(&self) -> Vec<String> {
        let view = self.view.lock();
        view.active
            .as_ref()
            .and_then(|target| self.portal.listings.get(target))
            .cloned()
            .unwrap_or_default()
    }

    fn still_rendering(&self) -> bool {
        let mut view = self.view.lock();
        if view.rendering == 0 {
            return false;
        }
        view.rendering -= 1;
        true
    }

    fn shown_document(&self) -> Option<String> {
        let key = self.view.lock().document.clone()?;
        self.portal.documents.get(&key).cloned()
    }

    fn classify(&self, markers: &Value) -> Value {
        let markers: Vec<String> = markers
            .as_array()
            .map(|m| m.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        match self.kind {
            FrameKind::Main => json!({ "hasNavigation": false, "hasCaseRows": false, "textLength": 0, "markers": [] }),
            FrameKind::Navigation => json!({ "hasNavigation": true, "hasCaseRows": false, "textLength": 80, "markers": [] }),
            FrameKind::Content => match self.shown_document() {
                Some(text) => {
                    let present: Vec<&String> = markers.iter().filter(|m| text.contains(m.as_str())).collect();
                    json!({
                        "hasNavigation": false,
                        "hasCaseRows": false,
                        "textLength": text.chars().count(),
                        "markers": present
                    })
                }
                None if self.still_rendering() => {
                    json!({ "hasNavigation": false, "hasCaseRows": false, "textLength": 0, "markers": [] })
                }
                None => {
                    let rows = self.listing();
                    json!({
                        "hasNavigation": false,
                        "hasCaseRows": !rows.is_empty(),
                        "textLength": rows.iter().map(String::len).sum::<usize>(),
                        "markers": []
                    })
                }
            },
        }
    }

    fn body(&self) -> Value {
        let text = match self.kind {
            FrameKind::Main => String::new(),
            FrameKind::Navigation => "Handbuch Service Technik Neuheiten Feldmaßnahmen Hinweise".to_string(),
            FrameKind::Content => self
                .shown_document()
                .unwrap_or_else(|| self.listing().join("\n")),
        };
        json!({ "text": text, "html": format!("<body>{text}</body>") })
    }

    fn click_category(&self, target: &str) -> bool {
        self.journal.category_clicks.fetch_add(1, Ordering::SeqCst);
        if self.portal.broken_links.contains(target) {
            return false;
        }
        if let Some(misses) = self.portal.flaky_links.lock().get_mut(target)
            && *misses > 0
        {
            *misses -= 1;
            return false;
        }
        let mut view = self.view.lock();
        view.active = Some(target.to_string());
        view.document = None;
        view.rendering = self.portal.listing_delay;
        true
    }

    fn click_document(&self, key: &str) -> bool {
        if self.kind != FrameKind::Content || self.view.lock().document.is_some() {
            return false;
        }
        if self.portal.dead_rows.contains(key) || !self.listing().iter().any(|row| row.contains(key)) {
            return false;
        }
        self.journal.document_clicks.fetch_add(1, Ordering::SeqCst);
        self.view.lock().document = Some(key.to_string());
        true
    }

    fn children(&self, label: &str) -> Value {
        if self.portal.hidden.contains(label) {
            return json!({ "found": false, "children": [] });
        }
        let children = self.portal.children.get(label).cloned().unwrap_or_default();
        json!({ "found": true, "children": children })
    }
}

fn arg_str(args: &[Value], i: usize) -> String {
    args.get(i).and_then(Value::as_str).unwrap_or_default().to_string()
}

#[async_trait]
impl FrameHandle for MockFrame {
    fn url(&self) -> &str {
        &self.url
    }

    fn name(&self) -> Option<&str> {
        match self.kind {
            FrameKind::Main => None,
            FrameKind::Navigation => Some("navFs"),
            FrameKind::Content => Some("mainFs"),
        }
    }

    fn is_main(&self) -> bool {
        self.kind == FrameKind::Main
    }

    fn has_children(&self) -> bool {
        self.kind == FrameKind::Main
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> AutomationResult<Value> {
        let value = if script == ELEMENT_EXISTS_SCRIPT
            || script == ELEMENT_CLICK_SCRIPT
            || script == ELEMENT_FILL_SCRIPT
            || script == ELEMENT_PRESS_ENTER_SCRIPT
        {
            Value::Bool(true)
        } else if script == CLASSIFY_FRAME_SCRIPT {
            self.classify(args.first().unwrap_or(&Value::Null))
        } else if script == COLLECT_CATEGORIES_SCRIPT {
            match self.kind {
                FrameKind::Navigation => Value::Array(self.portal.tree.clone()),
                _ => json!([]),
            }
        } else if script == CHILD_CATEGORIES_SCRIPT {
            match self.kind {
                FrameKind::Navigation => self.children(&arg_str(&args, 0)),
                _ => json!({ "found": false, "children": [] }),
            }
        } else if script == CLICK_CATEGORY_SCRIPT {
            Value::Bool(self.kind == FrameKind::Navigation && self.click_category(&arg_str(&args, 0)))
        } else if script == LIST_DOCUMENTS_SCRIPT {
            let rows: Vec<Value> = match self.kind {
                FrameKind::Content => self
                    .listing()
                    .into_iter()
                    .enumerate()
                    .map(|(index, text)| json!({ "index": index, "text": text, "href": "#" }))
                    .collect(),
                _ => Vec::new(),
            };
            Value::Array(rows)
        } else if script == CLICK_DOCUMENT_SCRIPT {
            Value::Bool(self.click_document(&arg_str(&args, 0)))
        } else if script == DOCUMENT_BODY_SCRIPT {
            self.body()
        } else if script == FIELDSET_SCRIPT || script == LINK_HREF_SCRIPT {
            Value::Null
        } else {
            return Err(AutomationError::Script("unexpected script".into()));
        };
        Ok(value)
    }
}

pub struct MockPage {
    portal: Arc<Portal>,
    journal: Arc<Journal>,
    view: Arc<Mutex<View>>,
    url: Mutex<String>,
    broken: bool,
    navigation_delay: Duration,
    closed: AtomicBool,
}

impl MockPage {
    fn new(portal: Arc<Portal>, journal: Arc<Journal>, broken: bool) -> Self {
        journal.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Self {
            portal,
            journal,
            view: Arc::new(Mutex::new(View::default())),
            url: Mutex::new("about:blank".to_string()),
            broken,
            navigation_delay: Duration::ZERO,
            closed: AtomicBool::new(false),
        }
    }

    fn frame(&self, kind: FrameKind, url: &str) -> MockFrame {
        MockFrame {
            kind,
            url: url.to_string(),
            portal: Arc::clone(&self.portal),
            journal: Arc::clone(&self.journal),
            view: Arc::clone(&self.view),
        }
    }

    fn check_open(&self) -> AutomationResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(AutomationError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSession for MockPage {
    type Frame = MockFrame;

    async fn navigate(&self, url: &str) -> AutomationResult<()> {
        self.check_open()?;
        if self.broken {
            return Err(AutomationError::Browser("net::ERR_CONNECTION_RESET".into()));
        }
        tokio::time::sleep(self.navigation_delay).await;
        *self.url.lock() = url.to_string();
        Ok(())
    }

    async fn main_frame(&self) -> AutomationResult<MockFrame> {
        self.check_open()?;
        Ok(self.frame(FrameKind::Main, &self.url.lock()))
    }

    async fn list_frames(&self) -> AutomationResult<Vec<MockFrame>> {
        self.check_open()?;
        Ok(vec![
            self.frame(FrameKind::Main, &self.url.lock()),
            self.frame(FrameKind::Navigation, "https://portal.test/elsapro/tree"),
            self.frame(FrameKind::Content, "https://portal.test/elsapro/content"),
        ])
    }

    async fn current_url(&self) -> AutomationResult<String> {
        self.check_open()?;
        Ok(self.url.lock().clone())
    }

    async fn export_state(&self) -> AutomationResult<SessionState> {
        self.check_open()?;
        Ok(SessionState {
            cookies: vec![SessionCookie {
                name: "JSESSIONID".into(),
                value: "mock".into(),
                domain: "portal.test".into(),
                path: "/".into(),
                secure: true,
                http_only: true,
                expires: None,
            }],
        })
    }

    async fn open_tab(&self, url: &str) -> AutomationResult<Self> {
        self.check_open()?;
        let tab = MockPage::new(Arc::clone(&self.portal), Arc::clone(&self.journal), false);
        *tab.url.lock() = url.to_string();
        Ok(tab)
    }

    async fn close(&self) -> AutomationResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.journal.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Backend handing out [`MockPage`]s over one [`Portal`]
#[derive(Clone)]
pub struct MockBrowser {
    pub portal: Arc<Portal>,
    pub journal: Arc<Journal>,
}

impl MockBrowser {
    pub fn new(portal: Portal) -> Self {
        Self {
            portal: Arc::new(portal),
            journal: Arc::new(Journal::default()),
        }
    }

    /// Open the next `count` worker sessions with a failing navigation
    pub fn with_broken_sessions(self, count: usize) -> Self {
        self.journal.broken_sessions.store(count, Ordering::SeqCst);
        self
    }

    /// Make every worker session's navigation take `delay`
    pub fn with_worker_navigation_delay(self, delay: Duration) -> Self {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.journal.worker_navigation_ms.store(millis, Ordering::SeqCst);
        self
    }

    pub fn session(&self) -> MockPage {
        MockPage::new(Arc::clone(&self.portal), Arc::clone(&self.journal), false)
    }

    pub fn opened(&self) -> usize {
        self.journal.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.journal.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.journal.shutdown.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserBackend for MockBrowser {
    type Session = MockPage;

    async fn new_session(&self, state: Option<&SessionState>) -> AutomationResult<MockPage> {
        let broken = state.is_some()
            && self
                .journal
                .broken_sessions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        let mut page = MockPage::new(Arc::clone(&self.portal), Arc::clone(&self.journal), broken);
        if state.is_some() {
            page.navigation_delay =
                Duration::from_millis(self.journal.worker_navigation_ms.load(Ordering::SeqCst));
        }
        Ok(page)
    }

    async fn shutdown(&self) -> AutomationResult<()> {
        self.journal.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Authenticator that lands on the portal without any form interaction
#[derive(Debug, Clone, Copy, Default)]
pub struct MockAuth;

#[async_trait]
impl Authenticator for MockAuth {
    async fn login<S: PageSession>(&self, session: &S, base_url: &str) -> CrawlResult<()> {
        session.navigate(base_url).await?;
        Ok(())
    }
}

/// Launcher that waits for `release` before handing out the browser
pub struct MockLauncher {
    pub browser: MockBrowser,
    pub release: Arc<tokio::sync::Semaphore>,
}

impl MockLauncher {
    /// Launches immediately
    pub fn open(browser: MockBrowser) -> Self {
        Self {
            browser,
            release: Arc::new(tokio::sync::Semaphore::new(tokio::sync::Semaphore::MAX_PERMITS)),
        }
    }

    /// Launches once a permit is added to `release`
    pub fn gated(browser: MockBrowser) -> Self {
        Self {
            browser,
            release: Arc::new(tokio::sync::Semaphore::new(0)),
        }
    }
}

#[async_trait]
impl BackendLauncher for MockLauncher {
    type Backend = MockBrowser;

    async fn launch(&self, _config: &CrawlConfig) -> CrawlResult<MockBrowser> {
        let _permit = self
            .release
            .acquire()
            .await
            .map_err(|e| elsa_crawl::CrawlError::Browser(e.to_string()))?;
        Ok(self.browser.clone())
    }
}

/// Sink that rejects every write
#[derive(Debug, Default)]
pub struct FailingSink {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl DocumentSink for FailingSink {
    async fn emit(&self, _record: &SinkRecord) -> SinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Io(std::io::Error::other("disk full")))
    }

    async fn emit_history(&self, _history: &VehicleHistory) -> SinkResult<()> {
        Err(SinkError::Io(std::io::Error::other("disk full")))
    }

    async fn emit_fieldsets(&self, _snapshot: &FieldsetSnapshot) -> SinkResult<()> {
        Err(SinkError::Io(std::io::Error::other("disk full")))
    }
}

/// Five independent top-level categories, each with one document
pub fn flat_portal() -> Portal {
    let mut portal = Portal::new();
    for (i, name) in ["Motor", "Getriebe", "Fahrwerk", "Elektrik", "Karosserie"]
        .iter()
        .enumerate()
    {
        let code = format!("0{}", i + 1);
        let key = format!("{}00/{}", i + 1, i + 1);
        portal = portal.root(name, &code).with_listing(&code, &[&key]);
    }
    portal
}
