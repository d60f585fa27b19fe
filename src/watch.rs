//! Polling file watcher for serve mode.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  loop every `interval`                               │
//! │                                                      │
//! │  ┌──────────┐    ┌────────────┐    ┌──────────────┐  │
//! │  │ walk     │───▶│ MtimeIndex │───▶│ one rebuild  │  │
//! │  │ sources  │    │ (new/newer)│    │ per tick     │  │
//! │  └──────────┘    └────────────┘    └──────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Only new files and advanced modification times count as changes;
//! deletions are not detected.

use crate::{build::build_site, config::SiteConfig, log};
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};
use walkdir::WalkDir;

// =============================================================================
// Timestamp Index
// =============================================================================

/// Last observed modification time of every watched file.
#[derive(Debug, Default)]
pub struct MtimeIndex {
    seen: FxHashMap<PathBuf, SystemTime>,
}

impl MtimeIndex {
    /// Record `mtime` for `path`. Returns true if the path is new or its
    /// mtime advanced.
    pub fn observe(&mut self, path: &Path, mtime: SystemTime) -> bool {
        match self.seen.get_mut(path) {
            Some(prev) if *prev >= mtime => false,
            Some(prev) => {
                *prev = mtime;
                true
            }
            None => {
                self.seen.insert(path.to_path_buf(), mtime);
                true
            }
        }
    }

    /// Walk every file below `dirs` and return the ones that changed.
    /// Missing directories are skipped.
    pub fn scan(&mut self, dirs: &[PathBuf]) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        for dir in dirs.iter().filter(|d| d.exists()) {
            for (path, mtime) in file_mtimes(dir) {
                if self.observe(&path, mtime) {
                    changed.push(path);
                }
            }
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// `(path, mtime)` for every regular file below `dir`.
fn file_mtimes(dir: &Path) -> impl Iterator<Item = (PathBuf, SystemTime)> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let mtime = e.metadata().ok()?.modified().ok()?;
            Some((e.into_path(), mtime))
        })
}

// =============================================================================
// Watcher
// =============================================================================

/// Polls a set of directories and calls `rebuild` once per tick that saw
/// any change.
pub struct Watcher<F> {
    dirs: Vec<PathBuf>,
    interval: Duration,
    index: MtimeIndex,
    rebuild: F,
}

impl<F> Watcher<F>
where
    F: FnMut() -> Result<()>,
{
    /// Create a watcher and seed its index with the current mtimes, so the
    /// first tick does not rebuild an unchanged tree.
    pub fn new(dirs: Vec<PathBuf>, interval: Duration, rebuild: F) -> Self {
        let mut index = MtimeIndex::default();
        index.scan(&dirs);
        Self {
            dirs,
            interval,
            index,
            rebuild,
        }
    }

    /// Scan once. Returns true if a rebuild was attempted.
    ///
    /// A failed rebuild is logged and not retried until a further change.
    pub fn tick(&mut self) -> bool {
        let changed = self.index.scan(&self.dirs);
        let Some(first) = changed.first() else {
            return false;
        };

        match changed.len() {
            1 => log!("watch"; "{} changed, rebuilding...", first.display()),
            n => log!("watch"; "{} files changed, rebuilding...", n),
        }

        if let Err(e) = (self.rebuild)() {
            log!("error"; "build failed: {e:#}");
        }
        true
    }

    /// Poll forever.
    pub fn run(&mut self) -> ! {
        loop {
            thread::sleep(self.interval);
            self.tick();
        }
    }

    pub fn tracked_files(&self) -> usize {
        self.index.len()
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the configured source directories and rebuild the site on change.
pub fn watch_for_changes_blocking(config: &'static SiteConfig) {
    let root = config.get_root();
    let dirs = config.build.watched_dirs();

    let watched: Vec<_> = dirs
        .iter()
        .filter(|d| d.exists())
        .map(|d| format!("{}/", d.strip_prefix(root).unwrap_or(d).display()))
        .collect();

    let mut watcher = Watcher::new(dirs, config.serve.interval(), || {
        build_site(config).map(|_| ())
    });

    log!("watch"; "watching {} ({} files)", watched.join(", "), watcher.tracked_files());
    watcher.run()
}
