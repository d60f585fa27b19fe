//! `[build]` section configuration.
//!
//! Source directories, the output directory and the page manifest.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One entry of the page manifest: a template and where its HTML lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageEntry {
    /// Template name, relative to the templates directory.
    pub template: String,
    /// Output path, relative to the output directory.
    pub output: PathBuf,
}

/// `[build]` section in site.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// templates = "templates"
/// locales = "locales"
/// output = "docs"
///
/// [[build.pages]]
/// template = "index.html"
/// output = "index.html"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Template source directory.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Static assets (JS, CSS), copied under `static_prefix` in the output.
    #[serde(rename = "static", default = "defaults::build::static_dir")]
    #[educe(Default = defaults::build::static_dir())]
    pub static_dir: PathBuf,

    /// Public assets (images, favicon, 404.html), copied into the output root.
    #[serde(default = "defaults::build::public")]
    #[educe(Default = defaults::build::public())]
    pub public: PathBuf,

    /// Locale dictionaries, one `<lang>.json` per locale.
    #[serde(default = "defaults::build::locales")]
    #[educe(Default = defaults::build::locales())]
    pub locales: PathBuf,

    /// Data directory.
    #[serde(default = "defaults::build::data")]
    #[educe(Default = defaults::build::data())]
    pub data: PathBuf,

    /// Contacts document, relative to `data`.
    #[serde(default = "defaults::build::contacts")]
    #[educe(Default = defaults::build::contacts())]
    pub contacts: PathBuf,

    /// Build output directory. Deleted and recreated on every build.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Output subdirectory receiving the static tree.
    #[serde(default = "defaults::build::static_prefix")]
    #[educe(Default = defaults::build::static_prefix())]
    pub static_prefix: PathBuf,

    /// Page manifest, rendered in order.
    #[serde(default = "defaults::build::pages")]
    #[educe(Default = defaults::build::pages())]
    pub pages: Vec<PageEntry>,
}

impl BuildConfig {
    /// Full path of the contacts document.
    pub fn contacts_path(&self) -> PathBuf {
        self.data.join(&self.contacts)
    }

    /// Source directories whose changes trigger a rebuild in serve mode.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        [
            &self.templates,
            &self.static_dir,
            &self.locales,
            &self.data,
            &self.public,
        ]
        .into_iter()
        .cloned()
        .collect()
    }

    /// Resolve every source path and the output path against `root`.
    pub(super) fn resolve_paths(&mut self, root: &Path, normalize: impl Fn(&Path) -> PathBuf) {
        for dir in [
            &mut self.templates,
            &mut self.static_dir,
            &mut self.public,
            &mut self.locales,
            &mut self.data,
            &mut self.output,
        ] {
            *dir = normalize(&root.join(&*dir));
        }
    }
}
