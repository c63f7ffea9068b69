//! Chromium discovery and launch
//!
//! The portal renders as a frameset whose frames come from different
//! origins, so the launch flags keep every frame in the page's renderer
//! where one CDP session can reach it.

use anyhow::{Context, Result, bail};
use chromiumoxide::browser::{Browser, BrowserConfig, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::browser_profile::{create_profile_in, create_unique_profile};
use crate::config::CrawlConfig;
use crate::utils::constants::CHROME_USER_AGENT;

/// Explicit executable override, checked before any install location
pub const ENV_CHROMIUM_PATH: &str = "CHROMIUM_PATH";

#[cfg(target_os = "linux")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/snap/bin/chromium",
    "/opt/google/chrome/chrome",
];

#[cfg(target_os = "macos")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];

#[cfg(target_os = "windows")]
const INSTALL_LOCATIONS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INSTALL_LOCATIONS: &[&str] = &[];

/// Binary names looked up on `PATH` after the fixed locations
const PATH_NAMES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

/// Flags every crawl browser is started with
const LAUNCH_FLAGS: &[&str] = &[
    "--lang=de-DE",
    "--disable-features=IsolateOrigins,site-per-process,TranslateUI",
    "--disable-site-isolation-trials",
    "--disable-blink-features=AutomationControlled",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-popup-blocking",
    "--disable-notifications",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--password-store=basic",
    "--mute-audio",
];

/// What the crawl needs from a browser launch
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Parent directory for the throwaway profile; system temp when unset
    pub profile_parent: Option<PathBuf>,
    /// CDP request timeout
    pub request_timeout: Duration,
    /// Executable to use instead of searching the machine
    pub executable: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            headless: config.headless(),
            profile_parent: config.chrome_data_dir().cloned(),
            request_timeout: config.timeout(),
            executable: std::env::var_os(ENV_CHROMIUM_PATH).map(PathBuf::from),
        }
    }
}

/// A running browser, the task pumping its CDP events, and its profile dir
pub struct LaunchedBrowser {
    pub browser: Browser,
    pub handler: JoinHandle<()>,
    pub profile_dir: PathBuf,
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Find an installed Chrome/Chromium
///
/// `explicit` wins when it exists, then the platform's install locations,
/// then `PATH`.
pub fn find_browser_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            debug!("Using explicit browser {}", path.display());
            return Ok(path.to_path_buf());
        }
        warn!("{ENV_CHROMIUM_PATH} points to a missing file: {}", path.display());
    }

    let installed = INSTALL_LOCATIONS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file());
    if let Some(path) = installed.or_else(|| PATH_NAMES.iter().find_map(|n| search_path(n))) {
        info!("Found browser at {}", path.display());
        return Ok(path);
    }

    bail!("no Chrome/Chromium installation found")
}

/// Fetch a managed Chromium into the user cache and return its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("elsa_crawl")
        .join("chromium");
    tokio::fs::create_dir_all(&cache_dir)
        .await
        .with_context(|| format!("creating {}", cache_dir.display()))?;

    info!("No local browser, downloading Chromium into {}", cache_dir.display());
    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .context("fetcher options")?;
    let installation = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("downloading Chromium")?;
    Ok(installation.executable_path)
}

fn browser_config(options: &LaunchOptions, executable: PathBuf, profile: &Path) -> Result<BrowserConfig> {
    let mut builder = BrowserConfigBuilder::default()
        .chrome_executable(executable)
        .user_data_dir(profile)
        .request_timeout(options.request_timeout)
        .window_size(1600, 1000)
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .args(LAUNCH_FLAGS.iter().copied());

    builder = if options.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    builder.build().map_err(|e| anyhow::anyhow!("browser config: {e}"))
}

/// Start Chromium in a fresh profile
///
/// The profile directory is handed to the caller, which removes it after
/// the browser has exited.
pub async fn launch_browser(options: &LaunchOptions) -> Result<LaunchedBrowser> {
    let executable = match find_browser_executable(options.executable.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            debug!("{e}");
            download_managed_browser().await?
        }
    };

    let profile = match &options.profile_parent {
        Some(parent) => {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
            create_profile_in(parent)?
        }
        None => create_unique_profile()?,
    };

    let config = browser_config(options, executable, profile.path())?;
    info!(headless = options.headless, "Launching Chromium");
    let (browser, mut events) = Browser::launch(config)
        .await
        .context("launching Chromium")?;

    let handler = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let Err(e) = event else { continue };
            let message = e.to_string();
            // Newer CDP events chromiumoxide cannot decode.
            if message.contains("did not match any variant of untagged enum")
                || message.contains("Failed to deserialize WS response")
            {
                trace!("Ignored CDP decode error: {message}");
            } else {
                error!("CDP handler error: {e:?}");
            }
        }
        debug!("CDP handler finished");
    });

    Ok(LaunchedBrowser {
        browser,
        handler,
        profile_dir: profile.into_path(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_executable_wins_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = dir.path().join("chromium");
        std::fs::write(&exe, b"").expect("write");
        assert_eq!(find_browser_executable(Some(&exe)).expect("found"), exe);
    }

    #[test]
    fn options_follow_the_config() {
        let config = CrawlConfig::builder()
            .vin("WVWZZZ1KZAW000001".parse().expect("vin"))
            .headless(false)
            .build()
            .expect("config");
        let options = LaunchOptions::from_config(&config);
        assert!(!options.headless);
        assert_eq!(options.request_timeout, config.timeout());
    }
}
