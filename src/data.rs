//! JSON data loading: locale dictionaries and the contacts document.
//!
//! Everything is re-read from disk on every build; nothing is cached.

use serde_json::Value;
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Language code (file stem) → translation tree.
pub type LocaleTable = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid JSON in `{0}`")]
    Parse(PathBuf, #[source] serde_json::Error),
}

/// Read and parse a single JSON document.
pub fn load_json(path: &Path) -> Result<Value, DataError> {
    let content =
        fs::read_to_string(path).map_err(|err| DataError::Io(path.to_path_buf(), err))?;
    serde_json::from_str(&content).map_err(|err| DataError::Parse(path.to_path_buf(), err))
}

/// Load every `*.json` file directly inside `dir`, keyed by file stem.
///
/// Files are read in filename order. A missing directory yields an empty
/// table.
pub fn load_locales(dir: &Path) -> Result<LocaleTable, DataError> {
    let mut locales = LocaleTable::new();
    if !dir.is_dir() {
        return Ok(locales);
    }

    let entries = fs::read_dir(dir)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|err| DataError::Io(dir.to_path_buf(), err))?;
    let mut files: Vec<PathBuf> = entries
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension() == Some(OsStr::new("json")))
        .collect();
    files.sort();

    for path in files {
        let Some(lang) = path.file_stem().and_then(OsStr::to_str) else {
            continue;
        };
        let value = load_json(&path)?;
        locales.insert(lang.to_owned(), value);
    }

    Ok(locales)
}

/// Load the contacts document. Its structure is passed through untouched.
pub fn load_contacts(path: &Path) -> Result<Value, DataError> {
    load_json(path)
}

/// Number of top-level groups in a contacts document, for log output.
pub fn group_count(contacts: &Value) -> usize {
    match contacts {
        Value::Array(groups) => groups.len(),
        Value::Object(groups) => groups.len(),
        Value::Null => 0,
        _ => 1,
    }
}
