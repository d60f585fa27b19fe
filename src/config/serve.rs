//! `[serve]` section configuration.
//!
//! Contains development server and watcher settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[serve]` section in site.toml - development server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "0.0.0.0"  # Listen on all interfaces
/// port = 3000
/// watch = true           # Rebuild on source changes
/// interval_ms = 1000     # Poll interval of the watcher
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 3000).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Poll source directories and rebuild on changes.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,

    /// Milliseconds between two polls of the watcher.
    #[serde(default = "defaults::serve::interval_ms")]
    #[educe(Default = defaults::serve::interval_ms())]
    pub interval_ms: u64,
}

impl ServeConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
