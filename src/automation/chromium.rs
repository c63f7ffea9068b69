//! chromiumoxide implementation of the automation surface
//!
//! One [`ChromiumBackend`] owns the launched browser. Every session is a
//! separate CDP browser context, so cookies imported into one worker never
//! leak into another. Frames are addressed by CDP frame id and scripts run in
//! the frame's current execution context, looked up on every call because
//! contexts are replaced on navigation.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::{
    AutomationError, AutomationResult, BrowserBackend, FrameHandle, PageSession, SessionCookie,
    SessionState, script_call,
};
use crate::browser_setup::{LaunchOptions, LaunchedBrowser, launch_browser};
use crate::config::CrawlConfig;
use crate::crawl_engine::cleanup::{CleanupResult, close_browser_and_data};
use crate::crawl_engine::page_timeout::with_page_timeout;

fn browser_err(e: impl std::fmt::Display) -> AutomationError {
    AutomationError::Browser(e.to_string())
}

/// Launched Chromium plus its CDP handler task
pub struct ChromiumBackend {
    browser: Arc<Mutex<Browser>>,
    handler: parking_lot::Mutex<Option<JoinHandle<()>>>,
    profile_dir: PathBuf,
    timeout: Duration,
}

impl ChromiumBackend {
    /// Find or download Chromium and launch it per `config`
    pub async fn launch(config: &CrawlConfig) -> anyhow::Result<Self> {
        let LaunchedBrowser {
            browser,
            handler,
            profile_dir,
        } = launch_browser(&LaunchOptions::from_config(config)).await?;
        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler: parking_lot::Mutex::new(Some(handler)),
            profile_dir,
            timeout: config.timeout(),
        })
    }
}

async fn open_page(
    browser: &Mutex<Browser>,
    url: &str,
    context_id: Option<BrowserContextId>,
) -> AutomationResult<Page> {
    let mut builder = CreateTargetParams::builder().url(url);
    if let Some(id) = context_id {
        builder = builder.browser_context_id(id);
    }
    let params = builder.build().map_err(AutomationError::Browser)?;
    let browser = browser.lock().await;
    browser.new_page(params).await.map_err(browser_err)
}

#[async_trait]
impl BrowserBackend for ChromiumBackend {
    type Session = ChromiumSession;

    async fn new_session(&self, state: Option<&SessionState>) -> AutomationResult<ChromiumSession> {
        let context_id = {
            let browser = self.browser.lock().await;
            browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
                .map_err(browser_err)?
        };
        debug!("Created browser context {:?}", context_id);

        let page = open_page(&self.browser, "about:blank", Some(context_id.clone())).await?;

        if let Some(state) = state.filter(|s| !s.is_empty()) {
            let cookies = state
                .cookies
                .iter()
                .map(cookie_param)
                .collect::<AutomationResult<Vec<_>>>()?;
            let count = cookies.len();
            page.set_cookies(cookies).await.map_err(browser_err)?;
            debug!("Imported {} cookies into context {:?}", count, context_id);
        }

        Ok(ChromiumSession {
            page,
            browser: Arc::clone(&self.browser),
            context_id,
            owns_context: true,
            timeout: self.timeout,
        })
    }

    async fn shutdown(&self) -> AutomationResult<()> {
        let handler = self.handler.lock().take();
        let mut browser = self.browser.lock().await;
        let result = close_browser_and_data(&mut browser, &self.profile_dir).await;
        if let Some(handler) = handler {
            handler.abort();
        }
        match result {
            CleanupResult::Success => Ok(()),
            CleanupResult::PartialFailure(errors) => Err(AutomationError::Browser(errors.join("; "))),
        }
    }
}

fn cookie_param(cookie: &SessionCookie) -> AutomationResult<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    builder.build().map_err(AutomationError::Browser)
}

/// A tab inside one browser context
pub struct ChromiumSession {
    page: Page,
    browser: Arc<Mutex<Browser>>,
    context_id: BrowserContextId,
    /// Sessions from `new_session` dispose their context on close; tabs do not
    owns_context: bool,
    timeout: Duration,
}

impl ChromiumSession {
    async fn frame(&self, id: FrameId, is_main: bool, child_parents: &[FrameId]) -> AutomationResult<ChromiumFrame> {
        let url = self
            .page
            .frame_url(id.clone())
            .await
            .map_err(browser_err)?
            .unwrap_or_default();
        let name = self.page.frame_name(id.clone()).await.map_err(browser_err)?;
        Ok(ChromiumFrame {
            page: self.page.clone(),
            has_children: child_parents.contains(&id),
            id,
            url,
            name,
            is_main,
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    type Frame = ChromiumFrame;

    async fn navigate(&self, url: &str) -> AutomationResult<()> {
        with_page_timeout(
            async {
                self.page.goto(url).await.map_err(browser_err)?;
                Ok(())
            },
            self.timeout,
            "navigate",
        )
        .await
    }

    async fn main_frame(&self) -> AutomationResult<ChromiumFrame> {
        let id = self
            .page
            .mainframe()
            .await
            .map_err(browser_err)?
            .ok_or_else(|| AutomationError::NotFound("main frame".into()))?;
        self.frame(id, true, &[]).await
    }

    async fn list_frames(&self) -> AutomationResult<Vec<ChromiumFrame>> {
        let main = self.page.mainframe().await.map_err(browser_err)?;
        let ids = self.page.frames().await.map_err(browser_err)?;

        let mut parents = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(parent) = self.page.frame_parent(id.clone()).await.map_err(browser_err)? {
                parents.push(parent);
            }
        }

        let mut frames = Vec::with_capacity(ids.len());
        for id in ids {
            let is_main = main.as_ref() == Some(&id);
            frames.push(self.frame(id, is_main, &parents).await?);
        }
        // Main frame first, the rest in CDP enumeration order.
        frames.sort_by_key(|f| !f.is_main);
        trace!("Listed {} frames", frames.len());
        Ok(frames)
    }

    async fn current_url(&self) -> AutomationResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(browser_err)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn export_state(&self) -> AutomationResult<SessionState> {
        let cookies = self.page.get_cookies().await.map_err(browser_err)?;
        Ok(SessionState {
            cookies: cookies
                .into_iter()
                .map(|c| SessionCookie {
                    name: c.name,
                    value: c.value,
                    domain: c.domain,
                    path: c.path,
                    secure: c.secure,
                    http_only: c.http_only,
                    // CDP reports -1 for session cookies
                    expires: (c.expires > 0.0).then_some(c.expires),
                })
                .collect(),
        })
    }

    async fn open_tab(&self, url: &str) -> AutomationResult<ChromiumSession> {
        let page = with_page_timeout(
            open_page(&self.browser, url, Some(self.context_id.clone())),
            self.timeout,
            "open tab",
        )
        .await?;
        Ok(ChromiumSession {
            page,
            browser: Arc::clone(&self.browser),
            context_id: self.context_id.clone(),
            owns_context: false,
            timeout: self.timeout,
        })
    }

    async fn close(&self) -> AutomationResult<()> {
        let mut errors = Vec::new();
        if let Err(e) = self.page.clone().close().await {
            errors.push(format!("page close failed: {e}"));
        }
        if self.owns_context {
            let browser = self.browser.lock().await;
            if let Err(e) = browser.dispose_browser_context(self.context_id.clone()).await {
                errors.push(format!("context dispose failed: {e}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            warn!("Session close incomplete: {}", errors.join("; "));
            Err(AutomationError::Browser(errors.join("; ")))
        }
    }
}

/// A frame of a [`ChromiumSession`] page
#[derive(Clone)]
pub struct ChromiumFrame {
    page: Page,
    id: FrameId,
    url: String,
    name: Option<String>,
    is_main: bool,
    has_children: bool,
    timeout: Duration,
}

impl std::fmt::Debug for ChromiumFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumFrame")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("name", &self.name)
            .field("is_main", &self.is_main)
            .finish()
    }
}

#[async_trait]
impl FrameHandle for ChromiumFrame {
    fn url(&self) -> &str {
        &self.url
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn is_main(&self) -> bool {
        self.is_main
    }

    fn has_children(&self) -> bool {
        self.has_children
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> AutomationResult<Value> {
        let expression = script_call(script, &args);
        with_page_timeout(
            async {
                let context = self
                    .page
                    .frame_execution_context(self.id.clone())
                    .await
                    .map_err(browser_err)?
                    .ok_or_else(|| {
                        AutomationError::NotFound(format!("execution context for {}", self.url))
                    })?;
                let params = EvaluateParams::builder()
                    .expression(expression)
                    .context_id(context)
                    .await_promise(true)
                    .return_by_value(true)
                    .build()
                    .map_err(AutomationError::Script)?;
                let result = self
                    .page
                    .evaluate_expression(params)
                    .await
                    .map_err(|e| AutomationError::Script(e.to_string()))?;
                Ok(result.value().cloned().unwrap_or(Value::Null))
            },
            self.timeout,
            "evaluate",
        )
        .await
    }
}
