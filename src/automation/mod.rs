//! Automation surface consumed by the crawler
//!
//! The crawl engine never talks to a browser directly. It drives a
//! [`BrowserBackend`] that hands out isolated [`PageSession`]s, each exposing
//! its current frames as [`FrameHandle`]s. Every call is fallible; element
//! lookups and waits fail with [`AutomationError::NotFound`] or
//! [`AutomationError::Timeout`], which callers treat as ordinary, retryable
//! outcomes.
//!
//! Element operations (`click`, `fill`, `press_enter`, `wait_for_selector`)
//! have default implementations built on `evaluate`, so a backend only needs
//! script evaluation scoped to a frame.

pub mod chromium;
pub mod dom_scripts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

pub use chromium::{ChromiumBackend, ChromiumFrame, ChromiumSession};

/// Poll interval for selector waits
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },
    #[error("script failed: {0}")]
    Script(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error("session closed")]
    Closed,
}

impl AutomationError {
    /// Not-found and timeout outcomes are expected while the UI renders
    #[must_use]
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Timeout { .. })
    }

    pub(crate) fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

pub type AutomationResult<T> = Result<T, AutomationError>;

/// Cookie as carried in a session-state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Seconds since the epoch; `None` for session cookies
    #[serde(default)]
    pub expires: Option<f64>,
}

/// Exported authenticated-session data
///
/// Produced once by the orchestrator after login; workers import it into
/// their own browsing context and never re-export it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<SessionCookie>,
}

impl SessionState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Render a function-expression script applied to JSON arguments
#[must_use]
pub fn script_call(script: &str, args: &[Value]) -> String {
    let rendered: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("({})({})", script.trim(), rendered.join(", "))
}

/// A rendered document frame
#[async_trait]
pub trait FrameHandle: Send + Sync {
    fn url(&self) -> &str;

    fn name(&self) -> Option<&str>;

    fn is_main(&self) -> bool;

    /// Whether any other frame is nested inside this one
    fn has_children(&self) -> bool;

    /// Evaluate a function-expression script with JSON arguments in this frame
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> AutomationResult<Value>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> AutomationResult<()> {
        let started = Instant::now();
        loop {
            let found = self
                .evaluate(dom_scripts::ELEMENT_EXISTS_SCRIPT, vec![Value::from(selector)])
                .await
                .map(|v| v.as_bool().unwrap_or(false))
                // A frame mid-navigation has no context yet; keep polling.
                .or_else(|e| if e.is_soft() { Ok(false) } else { Err(e) })?;
            if found {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(AutomationError::timeout(
                    format!("wait for {selector}"),
                    timeout,
                ));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn click(&self, selector: &str) -> AutomationResult<()> {
        self.element_action(dom_scripts::ELEMENT_CLICK_SCRIPT, selector, Vec::new())
            .await
    }

    async fn fill(&self, selector: &str, value: &str) -> AutomationResult<()> {
        self.element_action(
            dom_scripts::ELEMENT_FILL_SCRIPT,
            selector,
            vec![Value::from(value)],
        )
        .await
    }

    async fn press_enter(&self, selector: &str) -> AutomationResult<()> {
        self.element_action(dom_scripts::ELEMENT_PRESS_ENTER_SCRIPT, selector, Vec::new())
            .await
    }

    #[doc(hidden)]
    async fn element_action(
        &self,
        script: &str,
        selector: &str,
        extra: Vec<Value>,
    ) -> AutomationResult<()> {
        let mut args = vec![Value::from(selector)];
        args.extend(extra);
        match self.evaluate(script, args).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(AutomationError::NotFound(selector.to_string())),
        }
    }
}

/// One tab of an isolated browsing context
#[async_trait]
pub trait PageSession: Send + Sync + Sized + 'static {
    type Frame: FrameHandle + Clone + 'static;

    async fn navigate(&self, url: &str) -> AutomationResult<()>;

    async fn main_frame(&self) -> AutomationResult<Self::Frame>;

    /// Snapshot of the frames currently attached, main frame first
    async fn list_frames(&self) -> AutomationResult<Vec<Self::Frame>>;

    async fn current_url(&self) -> AutomationResult<String>;

    async fn export_state(&self) -> AutomationResult<SessionState>;

    /// Open `url` in a new tab of the same browsing context
    async fn open_tab(&self, url: &str) -> AutomationResult<Self>;

    async fn close(&self) -> AutomationResult<()>;

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> AutomationResult<Value> {
        self.main_frame().await?.evaluate(script, args).await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> AutomationResult<()> {
        self.main_frame()
            .await?
            .wait_for_selector(selector, timeout)
            .await
    }

    async fn click(&self, selector: &str) -> AutomationResult<()> {
        self.main_frame().await?.click(selector).await
    }

    async fn fill(&self, selector: &str, value: &str) -> AutomationResult<()> {
        self.main_frame().await?.fill(selector, value).await
    }

    async fn press_enter(&self, selector: &str) -> AutomationResult<()> {
        self.main_frame().await?.press_enter(selector).await
    }
}

/// Source of isolated browsing sessions
#[async_trait]
pub trait BrowserBackend: Send + Sync + 'static {
    type Session: PageSession;

    /// Open a fresh browsing context, importing `state` when given
    async fn new_session(&self, state: Option<&SessionState>) -> AutomationResult<Self::Session>;

    async fn shutdown(&self) -> AutomationResult<()>;
}
