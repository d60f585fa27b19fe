//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use super::super::PageEntry;
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn static_dir() -> PathBuf {
        "static".into()
    }

    pub fn public() -> PathBuf {
        "public".into()
    }

    pub fn locales() -> PathBuf {
        "locales".into()
    }

    pub fn data() -> PathBuf {
        "data".into()
    }

    pub fn contacts() -> PathBuf {
        "contacts.json".into()
    }

    pub fn output() -> PathBuf {
        "docs".into()
    }

    pub fn static_prefix() -> PathBuf {
        "static".into()
    }

    /// Home page at the root, feature pages as `<name>/index.html`.
    pub fn pages() -> Vec<PageEntry> {
        [
            ("index.html", "index.html"),
            ("playground.html", "playground/index.html"),
            ("guests.html", "guests/index.html"),
            ("pin_generator.html", "pin-generator/index.html"),
        ]
        .into_iter()
        .map(|(template, output)| PageEntry {
            template: template.into(),
            output: output.into(),
        })
        .collect()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3000
    }

    pub fn interval_ms() -> u64 {
        1000
    }
}
