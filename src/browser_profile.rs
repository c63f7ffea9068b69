//! Chrome profile directories for crawl runs
//!
//! Each launched browser gets its own UUID-named profile under the temp
//! directory so parallel crawls never fight over Chrome's SingletonLock.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix shared by all profile directories this crate creates
pub const PROFILE_PREFIX: &str = "elsa_chrome_";

/// RAII wrapper for a Chrome profile directory
///
/// Removes the directory on drop unless ownership is moved out with
/// [`BrowserProfile::into_path`].
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the directory over to another owner (the browser backend)
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            debug!("Removing profile directory {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to remove profile directory {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Create a fresh profile directory in the system temp dir
pub fn create_unique_profile() -> Result<BrowserProfile> {
    create_profile_in(&std::env::temp_dir())
}

/// Create a fresh profile directory under `parent`
pub fn create_profile_in(parent: &Path) -> Result<BrowserProfile> {
    let path = parent.join(format!("{PROFILE_PREFIX}{}", Uuid::new_v4()));
    // create_dir, not create_dir_all: an existing directory is an error.
    std::fs::create_dir(&path)
        .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;
    debug!("Created Chrome profile {}", path.display());
    Ok(BrowserProfile {
        path,
        cleanup_on_drop: true,
    })
}

/// Remove profile directories under `parent` untouched for longer than `max_age`
///
/// Left behind when a previous run was killed before cleanup. Returns the
/// number of directories removed.
pub fn sweep_stale_profiles(parent: &Path, max_age: Duration) -> Result<usize> {
    let now = SystemTime::now();
    let mut removed = 0;

    let entries = std::fs::read_dir(parent)
        .with_context(|| format!("Failed to read {}", parent.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PROFILE_PREFIX));
        if !is_ours || !path.is_dir() {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > max_age) {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale profile {}: {}", path.display(), e),
            }
        }
    }

    if removed > 0 {
        info!("Removed {} stale Chrome profile directories", removed);
    }
    Ok(removed)
}
