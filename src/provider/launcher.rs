//! App switching seam.
//!
//! The OS decides whether a URL scheme can be opened and performs the switch. On device this
//! is backed by the platform; headless builds and tests use [`RecordingLauncher`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use url::Url;

#[async_trait]
pub trait AppLauncher: Send + Sync {
    /// Whether some installed app handles this URL.
    fn can_open(&self, url: &Url) -> bool;

    /// Switches to the app handling `url`. Returns false if the OS refused.
    async fn open(&self, url: &Url) -> bool;
}

/// Normalizes `tronlinkoutside://` and `tronlinkoutside` to the bare scheme.
pub fn bare_scheme(scheme: &str) -> String {
    scheme.trim_end_matches("://").trim_end_matches(':').to_ascii_lowercase()
}

/// Launcher that records every opened URL instead of switching apps.
#[derive(Debug)]
pub struct RecordingLauncher {
    installed: RwLock<HashSet<String>>,
    opened: RwLock<Vec<String>>,
    open_succeeds: AtomicBool,
}

impl Default for RecordingLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingLauncher {
    /// No wallet apps installed.
    pub fn new() -> Self {
        Self {
            installed: RwLock::new(HashSet::new()),
            opened: RwLock::new(Vec::new()),
            open_succeeds: AtomicBool::new(true),
        }
    }

    pub fn with_installed(schemes: &[&str]) -> Self {
        let launcher = Self::new();
        for scheme in schemes {
            launcher.install(scheme);
        }
        launcher
    }

    pub fn install(&self, scheme: &str) {
        self.installed.write().insert(bare_scheme(scheme));
    }

    pub fn uninstall(&self, scheme: &str) {
        self.installed.write().remove(&bare_scheme(scheme));
    }

    /// Makes the next `open` calls fail even for installed schemes.
    pub fn set_open_succeeds(&self, succeeds: bool) {
        self.open_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.read().clone()
    }

    pub fn last_opened(&self) -> Option<String> {
        self.opened.read().last().cloned()
    }
}

#[async_trait]
impl AppLauncher for RecordingLauncher {
    fn can_open(&self, url: &Url) -> bool {
        // universal links always resolve, to the browser if not to the app
        matches!(url.scheme(), "http" | "https") || self.installed.read().contains(url.scheme())
    }

    async fn open(&self, url: &Url) -> bool {
        if !self.open_succeeds.load(Ordering::SeqCst) || !self.can_open(url) {
            debug!(scheme = url.scheme(), "open refused");
            return false;
        }
        info!(scheme = url.scheme(), "switching to external app");
        self.opened.write().push(url.to_string());
        true
    }
}
