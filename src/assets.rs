//! Static and public asset copying.
//!
//! Files are copied verbatim, overwriting existing output, and keep the
//! modification time of their source.

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    path::Path,
};
use walkdir::WalkDir;

/// Copy the tree rooted at `src` into `dst`. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Copy every top-level entry of `src` into `dst`: directories as trees,
/// files one by one. Returns the number of files copied.
pub fn copy_public(src: &Path, dst: &Path) -> Result<usize> {
    let mut entries: Vec<_> = fs::read_dir(src)
        .with_context(|| format!("Failed to read {}", src.display()))?
        .collect::<Result<_, _>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);

    let mut copied = 0;
    for entry in entries {
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if path.is_dir() {
            copied += copy_tree(&path, &target)?;
        } else {
            copy_file(&path, &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Copy one file, creating parent directories and keeping its mtime.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;

    let modified = fs::metadata(src)?.modified()?;
    // Read-only copies can still take a timestamp through a read handle on unix.
    let file = File::options()
        .write(true)
        .open(dst)
        .or_else(|_| File::open(dst))?;
    file.set_modified(modified)
        .with_context(|| format!("Failed to set mtime of {}", dst.display()))?;

    Ok(())
}
