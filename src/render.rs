//! Page template rendering.
//!
//! Wraps a [`Tera`] instance loaded from the templates directory. Every file
//! under the directory is registered under its `/`-separated relative path,
//! so `templates/partials/nav.html` is available as `partials/nav.html` to
//! `{% include %}` and `{% extends %}`.
//!
//! Templates are loaded one by one. A file that cannot be read or parsed is
//! set aside and only reported when a page actually renders it, so a stray
//! draft or binary file in the directory does not break the build.
//!
//! Auto-escaping is off: the context carries pre-serialized JSON and the
//! templates are hand-authored HTML.

use crate::log;
use rustc_hash::FxHashMap;
use std::{
    error::Error as _,
    fs,
    path::{Path, PathBuf},
};
use tera::{Context, Tera};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template directory `{path}` not found\n  {hint}")]
    DependencyMissing { path: PathBuf, hint: &'static str },

    #[error("template `{0}` failed to load: {1}")]
    Syntax(String, String),

    #[error("template `{0}` not found")]
    TemplateNotFound(String),

    #[error("failed to render `{0}`")]
    Render(String, #[source] tera::Error),
}

const TEMPLATES_HINT: &str =
    "Create it (or point `[build] templates` in site.toml at it) and add the page templates.";

pub struct Renderer {
    tera: Tera,
    /// Templates that failed to load, with the reason.
    broken: FxHashMap<String, String>,
}

impl Renderer {
    /// Load every template below `dir`.
    ///
    /// Only a missing directory is an error here. Unreadable or invalid
    /// templates are logged and surface as [`RenderError::Syntax`] once
    /// rendered.
    pub fn new(dir: &Path) -> Result<Self, RenderError> {
        if !dir.is_dir() {
            return Err(RenderError::DependencyMissing {
                path: dir.to_path_buf(),
                hint: TEMPLATES_HINT,
            });
        }

        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());

        let mut broken = FxHashMap::default();
        let mut pending = Vec::new();
        for (path, name) in collect_templates(dir) {
            match fs::read_to_string(&path) {
                Ok(source) => pending.push((name, source)),
                Err(err) => {
                    broken.insert(name, err.to_string());
                }
            }
        }

        // A child template is rejected until its parent is registered, so
        // retry until a whole pass accepts nothing.
        let mut rejected = FxHashMap::default();
        loop {
            let before = pending.len();
            rejected.clear();
            pending.retain(|(name, source)| {
                let mut next = tera.clone();
                match next.add_raw_template(name, source) {
                    Ok(()) => {
                        tera = next;
                        false
                    }
                    Err(err) => {
                        rejected.insert(name.clone(), describe(&err));
                        true
                    }
                }
            });
            if pending.len() == before {
                break;
            }
        }
        broken.extend(rejected);

        let mut names: Vec<_> = broken.iter().collect();
        names.sort();
        for (name, reason) in names {
            log!("warn"; "skipping template {name}: {reason}");
        }

        Ok(Self { tera, broken })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Fail if `name` is unknown or did not load.
    pub fn check(&self, name: &str) -> Result<(), RenderError> {
        if let Some(reason) = self.broken.get(name) {
            return Err(RenderError::Syntax(name.to_owned(), reason.clone()));
        }
        if !self.has_template(name) {
            return Err(RenderError::TemplateNotFound(name.to_owned()));
        }
        Ok(())
    }

    /// Render `name` with `context`.
    pub fn render(&self, name: &str, context: &Context) -> Result<String, RenderError> {
        self.check(name)?;
        self.tera
            .render(name, context)
            .map_err(|err| RenderError::Render(name.to_owned(), err))
    }
}

/// `(path, name)` pairs for every template file below `dir`, sorted by path.
fn collect_templates(dir: &Path) -> Vec<(PathBuf, String)> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && !is_temp_file(e.path()))
        .filter_map(|e| {
            let name = template_name(e.path().strip_prefix(dir).ok()?)?;
            Some((e.into_path(), name))
        })
        .collect()
}

/// Dotfiles and editor backup/swap files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    name.starts_with('.')
        || name.ends_with('~')
        || matches!(ext, "swp" | "swo" | "tmp" | "bak")
}

/// Relative path → template name with `/` separators.
fn template_name(rel: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = rel.iter().map(|c| c.to_str()).collect();
    Some(parts?.join("/"))
}

/// Flatten a tera error and its causes into one line.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}
