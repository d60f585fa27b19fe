//! Site building orchestration.
//!
//! ```text
//! build_site()
//!     │
//!     ├── Renderer::new()        templates parsed before anything is deleted
//!     ├── Renderer::check()      every manifest template must have loaded
//!     ├── load_locales()         ┐
//!     ├── load_contacts()        ┘ → render_context()
//!     ├── prepare_output()       output removed and recreated
//!     ├── render_pages()         one HTML file per manifest entry
//!     └── copy_tree() / copy_public()
//! ```
//!
//! Every build starts from an empty output directory, so the result only
//! depends on the current sources.

use crate::{
    assets,
    config::{PageEntry, SiteConfig},
    data::{self, LocaleTable},
    log,
    render::Renderer,
};
use anyhow::{Context as _, Result};
use serde_json::Value;
use std::{fs, path::Path};
use tera::Context;

/// Context key holding all locales as a JSON string.
pub const LOCALES_KEY: &str = "locales_json";
/// Context key holding the contacts document as a JSON string.
pub const CONTACTS_KEY: &str = "contacts_json";

/// Counters of a finished build, for log output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub locales: usize,
    pub contact_groups: usize,
    pub pages: usize,
    pub assets: usize,
}

/// Build the whole site into `config.build.output`.
pub fn build_site(config: &SiteConfig) -> Result<BuildReport> {
    let build = &config.build;
    log!("build"; "building site...");

    let renderer = Renderer::new(&build.templates)?;
    for page in &build.pages {
        renderer.check(&page.template)?;
    }

    let locales = data::load_locales(&build.locales)?;
    for lang in locales.keys() {
        log!("data"; "loaded locale: {lang}");
    }
    let contacts = data::load_contacts(&build.contacts_path())?;
    let contact_groups = data::group_count(&contacts);
    log!("data"; "loaded contacts ({contact_groups} groups)");

    let context = render_context(&locales, &contacts)?;

    prepare_output(&build.output)?;
    let pages = render_pages(&renderer, &build.pages, &context, &build.output)?;

    let mut copied = 0;
    if build.static_dir.is_dir() {
        copied += assets::copy_tree(&build.static_dir, &build.output.join(&build.static_prefix))?;
        log!("assets"; "copied {}/", build.static_prefix.display());
    }
    if build.public.is_dir() {
        copied += assets::copy_public(&build.public, &build.output)?;
        log!("assets"; "copied public/ contents");
    }

    let report = BuildReport {
        locales: locales.len(),
        contact_groups,
        pages,
        assets: copied,
    };
    log!(
        "build";
        "done: {} pages, {} assets, {} locales, output in {}",
        report.pages, report.assets, report.locales, build.output.display()
    );

    Ok(report)
}

/// Serialize locales and contacts into the template context.
///
/// `serde_json` writes compact JSON and leaves non-ASCII characters as-is.
pub fn render_context(locales: &LocaleTable, contacts: &Value) -> Result<Context> {
    let mut context = Context::new();
    context.insert(LOCALES_KEY, &serde_json::to_string(locales)?);
    context.insert(CONTACTS_KEY, &serde_json::to_string(contacts)?);
    Ok(context)
}

/// Remove the output directory if it exists, then recreate it empty.
fn prepare_output(output: &Path) -> Result<()> {
    if output.exists() {
        fs::remove_dir_all(output).with_context(|| {
            format!("Failed to clear output directory: {}", output.display())
        })?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

/// Render each manifest entry to its output path. Returns the page count.
fn render_pages(
    renderer: &Renderer,
    pages: &[PageEntry],
    context: &Context,
    output: &Path,
) -> Result<usize> {
    for page in pages {
        let html = renderer.render(&page.template, context)?;
        let out_file = output.join(&page.output);
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_file, html)
            .with_context(|| format!("Failed to write {}", out_file.display()))?;
        log!("render"; "{}", page.output.display());
    }
    Ok(pages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use serde_json::json;
    use std::{collections::BTreeMap, path::PathBuf};
    use tempfile::TempDir;
    use walkdir::WalkDir;

    const PAGE: &str = r#"<script>
window.LOCALES = {{ locales_json }};
window.CONTACTS = {{ contacts_json }};
</script>"#;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A project with the default layout and all four manifest templates.
    fn site() -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for name in ["index.html", "playground.html", "guests.html", "pin_generator.html"] {
            write(&root.join("templates").join(name), PAGE);
        }
        write(&root.join("locales/en.json"), r#"{"open": "Open the gate"}"#);
        write(&root.join("locales/ru.json"), r#"{"open": "Открыть ворота"}"#);
        write(
            &root.join("data/contacts.json"),
            r#"[{"group": "Guard", "phones": ["+7 900 000-00-00"]}]"#,
        );
        write(&root.join("static/js/i18n.js"), "export const t = 1;");
        write(&root.join("public/favicon.ico"), "ico");
        write(&root.join("public/images/logo.svg"), "<svg/>");

        let mut config = SiteConfig::default();
        let build = &mut config.build;
        build.templates = root.join("templates");
        build.static_dir = root.join("static");
        build.public = root.join("public");
        build.locales = root.join("locales");
        build.data = root.join("data");
        build.output = root.join("docs");
        (dir, config)
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(dir).unwrap().to_path_buf();
                (rel, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    /// Extract the JSON literal assigned to `window.<name>`.
    fn embedded_json(html: &str, name: &str) -> Value {
        let marker = format!("window.{name} = ");
        let start = html.find(&marker).unwrap() + marker.len();
        let end = start + html[start..].find(";\n").unwrap();
        serde_json::from_str(&html[start..end]).unwrap()
    }

    #[test]
    fn test_build_produces_manifest_and_assets() {
        let (_dir, config) = site();
        let report = build_site(&config).unwrap();
        let out = &config.build.output;

        assert_eq!(
            report,
            BuildReport {
                locales: 2,
                contact_groups: 1,
                pages: 4,
                assets: 3,
            }
        );
        for page in ["index.html", "playground/index.html", "guests/index.html", "pin-generator/index.html"] {
            assert!(out.join(page).is_file(), "{page} missing");
        }
        assert!(out.join("static/js/i18n.js").is_file());
        assert!(out.join("favicon.ico").is_file());
        assert!(out.join("images/logo.svg").is_file());
    }

    #[test]
    fn test_embedded_json_matches_sources() {
        let (_dir, config) = site();
        build_site(&config).unwrap();

        let html = fs::read_to_string(config.build.output.join("guests/index.html")).unwrap();
        assert_eq!(
            embedded_json(&html, "LOCALES"),
            json!({"en": {"open": "Open the gate"}, "ru": {"open": "Открыть ворота"}})
        );
        assert_eq!(
            embedded_json(&html, "CONTACTS"),
            json!([{"group": "Guard", "phones": ["+7 900 000-00-00"]}])
        );
        // non-ASCII stays unescaped
        assert!(html.contains("Открыть ворота"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let (_dir, config) = site();
        build_site(&config).unwrap();
        let first = snapshot(&config.build.output);
        build_site(&config).unwrap();
        let second = snapshot(&config.build.output);

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_removes_stale_files() {
        let (_dir, config) = site();
        let stale = config.build.output.join("old-page.html");
        write(&stale, "stale");

        build_site(&config).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_missing_locales_dir_embeds_empty_table() {
        let (_dir, config) = site();
        fs::remove_dir_all(&config.build.locales).unwrap();

        let report = build_site(&config).unwrap();
        assert_eq!(report.locales, 0);

        let html = fs::read_to_string(config.build.output.join("index.html")).unwrap();
        assert!(html.contains("window.LOCALES = {};"));
    }

    #[test]
    fn test_missing_static_and_public_are_skipped() {
        let (_dir, config) = site();
        fs::remove_dir_all(&config.build.static_dir).unwrap();
        fs::remove_dir_all(&config.build.public).unwrap();

        let report = build_site(&config).unwrap();
        assert_eq!(report.assets, 0);
        assert!(!config.build.output.join("static").exists());
    }

    #[test]
    fn test_malformed_locale_aborts_build() {
        let (_dir, config) = site();
        write(&config.build.locales.join("de.json"), "{ not json");

        let err = build_site(&config).unwrap_err();
        assert!(err.downcast_ref::<data::DataError>().is_some());
    }

    #[test]
    fn test_missing_contacts_aborts_build() {
        let (_dir, config) = site();
        fs::remove_file(config.build.contacts_path()).unwrap();

        assert!(build_site(&config).is_err());
    }

    #[test]
    fn test_missing_template_aborts_build() {
        let (_dir, config) = site();
        build_site(&config).unwrap();
        fs::remove_file(config.build.templates.join("guests.html")).unwrap();

        let err = build_site(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::TemplateNotFound(_))
        ));
        assert!(config.build.output.join("index.html").is_file());
    }

    #[test]
    fn test_broken_manifest_template_keeps_previous_output() {
        let (_dir, config) = site();
        build_site(&config).unwrap();
        write(&config.build.templates.join("guests.html"), "{% if %}");

        let err = build_site(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::Syntax(name, _)) if name == "guests.html"
        ));
        assert!(config.build.output.join("guests/index.html").is_file());
    }

    #[test]
    fn test_stray_template_files_are_ignored() {
        let (_dir, config) = site();
        let templates = &config.build.templates;
        fs::write(templates.join(".index.html.swp"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        write(&templates.join("drafts/wip.html"), "{% if %}");

        let report = build_site(&config).unwrap();
        assert_eq!(report.pages, 4);
        assert!(!config.build.output.join("drafts").exists());
    }

    #[test]
    fn test_missing_templates_dir_keeps_previous_output() {
        let (_dir, config) = site();
        build_site(&config).unwrap();
        fs::remove_dir_all(&config.build.templates).unwrap();

        let err = build_site(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::DependencyMissing { .. })
        ));
        assert!(config.build.output.join("index.html").is_file());
    }

    #[test]
    fn test_render_context_keys() {
        let mut locales = LocaleTable::new();
        locales.insert("en".into(), json!({"hi": "hello"}));
        let context = render_context(&locales, &json!([])).unwrap();

        assert_eq!(
            context.get(LOCALES_KEY),
            Some(&json!(r#"{"en":{"hi":"hello"}}"#))
        );
        assert_eq!(context.get(CONTACTS_KEY), Some(&json!("[]")));
    }
}
