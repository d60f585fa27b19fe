//! Site configuration management for `site.toml`.
//!
//! The config file is optional: a project laid out with the default
//! directory names builds without one.
//!
//! # Sections
//!
//! | Section     | Purpose                                         |
//! |-------------|-------------------------------------------------|
//! | `[build]`   | Source/output directories and the page manifest |
//! | `[serve]`   | Development server (port, interface, watcher)   |
//!
//! # Example
//!
//! ```toml
//! [build]
//! output = "docs"
//!
//! [[build.pages]]
//! template = "index.html"
//! output = "index.html"
//!
//! [serve]
//! port = 3000
//! ```

mod build;
pub mod defaults;
mod error;
mod serve;

pub use build::PageEntry;

use build::BuildConfig;
use error::ConfigError;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing site.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf());
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .as_ref()
            .cloned()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.output, cli.output.as_ref());
        self.update_path_with_root(&root, &cli.config);

        if let Commands::Serve {
            port,
            interface,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path, config_name: &Path) {
        let root = Self::normalize_path(&Self::expand_tilde(root));
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(config_name));
        self.build.resolve_paths(&root, Self::normalize_path);
    }

    /// Expand a leading `~` to the home directory.
    pub fn expand_tilde(path: &Path) -> PathBuf {
        match path.to_str() {
            Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
            None => path.to_path_buf(),
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before any build runs.
    pub fn validate(&self) -> Result<()> {
        let build = &self.build;

        if build.pages.is_empty() {
            bail!(ConfigError::Validation(
                "[build.pages] must contain at least one page".into()
            ));
        }

        for page in &build.pages {
            if page.template.trim().is_empty() {
                bail!(ConfigError::Validation(
                    "[build.pages] template must not be empty".into()
                ));
            }
            if !is_plain_relative(&page.output) {
                bail!(ConfigError::Validation(format!(
                    "[build.pages] output `{}` must be a relative path without `..`",
                    page.output.display()
                )));
            }
        }

        if !is_plain_relative(&build.static_prefix) {
            bail!(ConfigError::Validation(
                "[build.static_prefix] must be a relative path without `..`".into()
            ));
        }

        // The output directory is deleted on every build.
        let root = self.get_root();
        if root.starts_with(&build.output) {
            bail!(ConfigError::Validation(
                "[build.output] must not be the project root or one of its parents".into()
            ));
        }
        for source in build.watched_dirs() {
            if source.starts_with(&build.output) {
                bail!(ConfigError::Validation(format!(
                    "[build.output] must not contain the source directory `{}`",
                    source.display()
                )));
            }
            // Would be copied into itself and retrigger the watcher.
            if build.output.starts_with(&source) {
                bail!(ConfigError::Validation(format!(
                    "[build.output] must not be inside the source directory `{}`",
                    source.display()
                )));
            }
        }

        if self.serve.interval_ms == 0 {
            bail!(ConfigError::Validation(
                "[serve.interval_ms] must be greater than 0".into()
            ));
        }

        Ok(())
    }
}

/// True for a non-empty relative path made only of normal components.
fn is_plain_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse_cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("gate-site").chain(args.iter().copied()))
    }

    #[test]
    fn test_from_str() {
        let config = SiteConfig::from_str(
            r#"
            [build]
            output = "dist"
        "#,
        )
        .unwrap();

        assert_eq!(config.build.output, PathBuf::from("dist"));
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result = SiteConfig::from_str("[build\noutput = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        let result = SiteConfig::from_str(
            r#"
            [deploy]
            provider = "github"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_get_root_default() {
        let config = SiteConfig::default();
        assert_eq!(config.get_root(), Path::new("./"));
    }

    #[test]
    fn test_update_with_cli_resolves_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let cli = parse_cli(&["--root", root.to_str().unwrap(), "build"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.get_root(), root);
        assert_eq!(config.config_path, root.join("site.toml"));
        assert_eq!(config.build.templates, root.join("templates"));
        assert_eq!(config.build.output, root.join("docs"));
        assert_eq!(config.build.contacts_path(), root.join("data/contacts.json"));
    }

    #[test]
    fn test_update_with_cli_serve_overrides() {
        let cli = parse_cli(&["serve", "8080", "--interface", "0.0.0.0", "--watch", "false"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.serve.interface, "0.0.0.0");
        assert!(!config.serve.watch);
    }

    #[test]
    fn test_update_with_cli_output_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let cli = parse_cli(&["--root", root.to_str().unwrap(), "--output", "site", "build"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert_eq!(config.build.output, root.join("site"));
    }

    #[test]
    fn test_validate_default_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = parse_cli(&["--root", dir.path().to_str().unwrap(), "build"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_escaping_page_output() {
        let mut config = SiteConfig::from_str(
            r#"
            [[build.pages]]
            template = "index.html"
            output = "../index.html"
        "#,
        )
        .unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        config.update_with_cli(&parse_cli(&["--root", dir.path().to_str().unwrap(), "build"]));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_manifest() {
        let mut config = SiteConfig::default();
        config.build.pages.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_output_at_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let cli = parse_cli(&["--root", dir.path().to_str().unwrap(), "--output", ".", "build"]);

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_output_inside_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_str().unwrap();

        for output in ["public/site", "static/out", "templates/out", "locales/build"] {
            let cli = parse_cli(&["--root", root, "--output", output, "build"]);
            let mut config = SiteConfig::default();
            config.update_with_cli(&cli);

            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains("must not be inside the source directory"),
                "{output}: {err}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = SiteConfig::from_str("[serve]\ninterval_ms = 0").unwrap();
        config.update_with_cli(&parse_cli(&["--root", dir.path().to_str().unwrap(), "build"]));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_plain_relative() {
        assert!(is_plain_relative(Path::new("index.html")));
        assert!(is_plain_relative(Path::new("guests/index.html")));
        assert!(!is_plain_relative(Path::new("")));
        assert!(!is_plain_relative(Path::new("/index.html")));
        assert!(!is_plain_relative(Path::new("a/../../b.html")));
    }
}
