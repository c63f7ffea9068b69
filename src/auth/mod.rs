//! Portal login
//!
//! The login is a two-step form: username/password, then a TOTP challenge.
//! The OTP itself comes from an [`OtpSource`]; generating codes from a TOTP
//! secret is left to whatever feeds that source.

use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::automation::{AutomationResult, PageSession};
use crate::crawl_engine::{CrawlError, CrawlResult};
use crate::utils::{
    LOGIN_DEADLINE_SECS, OTP_SELECTORS, PASSWORD_SELECTOR, TOTP_LOGIN_SELECTOR, USERNAME_SELECTOR,
};

pub const ENV_USERNAME: &str = "ELSA_USERNAME";
pub const ENV_PASSWORD: &str = "ELSA_PASSWORD";
pub const ENV_OTP: &str = "ELSA_OTP";

/// How long each login element may take to show up per poll
const ELEMENT_PROBE: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const FORM_SETTLE: Duration = Duration::from_millis(1200);
const OTP_SETTLE: Duration = Duration::from_millis(2500);

/// Portal account
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read `ELSA_USERNAME` and `ELSA_PASSWORD`
    pub fn from_env() -> CrawlResult<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CrawlError::Config(format!("{name} is not set")))
        };
        Ok(Self::new(var(ENV_USERNAME)?, var(ENV_PASSWORD)?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies the one-time password for the TOTP challenge
#[async_trait]
pub trait OtpSource: Send + Sync {
    async fn otp(&self) -> anyhow::Result<String>;
}

/// A fixed code, e.g. from `--otp` or `ELSA_OTP`
#[derive(Clone)]
pub struct StaticOtp(String);

impl StaticOtp {
    pub fn new(code: &str) -> CrawlResult<Self> {
        let code = code.trim();
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(CrawlError::Config("OTP must be exactly 6 digits".into()));
        }
        Ok(Self(code.to_string()))
    }

    /// `Ok(None)` when `ELSA_OTP` is unset
    pub fn from_env() -> CrawlResult<Option<Self>> {
        std::env::var(ENV_OTP)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(&v))
            .transpose()
    }
}

impl fmt::Debug for StaticOtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticOtp(<redacted>)")
    }
}

#[async_trait]
impl OtpSource for StaticOtp {
    async fn otp(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

/// Asks for the code on the terminal when the challenge appears
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptOtp;

#[async_trait]
impl OtpSource for PromptOtp {
    async fn otp(&self) -> anyhow::Result<String> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(b"Enter OTP code: ").await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        let code = line.trim().to_string();
        anyhow::ensure!(!code.is_empty(), "no OTP code entered");
        Ok(code)
    }
}

/// Establishes an authenticated session on a fresh page
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login<S: PageSession>(&self, session: &S, base_url: &str) -> CrawlResult<()>;
}

/// Username/password plus OTP login against the portal's IdP
pub struct PortalLogin {
    credentials: Credentials,
    otp: Box<dyn OtpSource>,
    deadline: Duration,
}

impl PortalLogin {
    pub fn new(credentials: Credentials, otp: Box<dyn OtpSource>) -> Self {
        Self {
            credentials,
            otp,
            deadline: Duration::from_secs(LOGIN_DEADLINE_SECS),
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn submit_credentials<S: PageSession>(&self, session: &S) -> AutomationResult<bool> {
        if !probe(session, USERNAME_SELECTOR).await? {
            return Ok(false);
        }
        session.fill(USERNAME_SELECTOR, &self.credentials.username).await?;
        session.fill(PASSWORD_SELECTOR, &self.credentials.password).await?;
        session.press_enter(PASSWORD_SELECTOR).await?;
        info!("Credentials submitted");
        Ok(true)
    }

    async fn start_totp<S: PageSession>(&self, session: &S) -> AutomationResult<bool> {
        if !probe(session, TOTP_LOGIN_SELECTOR).await? {
            return Ok(false);
        }
        session.click(TOTP_LOGIN_SELECTOR).await?;
        tokio::time::sleep(FORM_SETTLE).await;
        debug!("TOTP flow started");
        Ok(true)
    }

    async fn submit_otp<S: PageSession>(&self, session: &S) -> CrawlResult<bool> {
        for selector in OTP_SELECTORS {
            if !probe(session, selector).await? {
                continue;
            }
            let code = self
                .otp
                .otp()
                .await
                .map_err(|e| CrawlError::Auth(format!("no OTP available: {e:#}")))?;
            session.fill(selector, &code).await?;
            session.press_enter(selector).await?;
            tokio::time::sleep(OTP_SETTLE).await;
            info!("OTP submitted");
            return Ok(true);
        }
        Ok(false)
    }
}

impl fmt::Debug for PortalLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalLogin")
            .field("credentials", &self.credentials)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Whether `selector` shows up within one probe window
async fn probe<S: PageSession>(session: &S, selector: &str) -> AutomationResult<bool> {
    match session.wait_for_selector(selector, ELEMENT_PROBE).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_soft() => Ok(false),
        Err(e) => Err(e),
    }
}

/// The IdP redirects back to the portal once both steps passed
#[must_use]
pub fn is_logged_in_url(url: &str) -> bool {
    url.contains("elsaweb") && !url.contains("/isam/")
}

#[async_trait]
impl Authenticator for PortalLogin {
    async fn login<S: PageSession>(&self, session: &S, base_url: &str) -> CrawlResult<()> {
        info!("Logging in as {}", self.credentials.username);
        session.navigate(base_url).await?;

        let started = Instant::now();
        let mut credentials_sent = false;
        let mut totp_started = false;
        let mut otp_sent = false;

        while started.elapsed() < self.deadline {
            if !credentials_sent {
                credentials_sent = self.submit_credentials(session).await?;
                if credentials_sent {
                    tokio::time::sleep(FORM_SETTLE).await;
                }
            }
            if credentials_sent && !totp_started {
                totp_started = self.start_totp(session).await?;
            }
            if credentials_sent && !otp_sent {
                otp_sent = self.submit_otp(session).await?;
            }
            if otp_sent {
                let url = session.current_url().await.unwrap_or_default();
                if is_logged_in_url(&url) {
                    info!("Login successful");
                    return Ok(());
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Err(CrawlError::Auth(format!(
            "login did not complete within {}s",
            self.deadline.as_secs()
        )))
    }
}
