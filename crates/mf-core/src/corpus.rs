use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::CoreError;

/// Collects files under `root` whose extension is in `extensions`
/// (lowercase, without the dot), recursively and sorted.
///
/// A `root` that is itself a file is returned as is, whatever its extension.
///
/// # Errors
/// Returns an error if a directory cannot be read, or
/// [`CoreError::EmptyInput`] if nothing matches.
pub fn scan_files(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        anyhow::bail!("{} does not exist", root.display());
    }
    let mut files = Vec::new();
    scan_dir(root, extensions, &mut files)?;
    files.sort();
    if files.is_empty() {
        return Err(CoreError::EmptyInput(format!(
            "no .{} file under {}",
            extensions.join("/."),
            root.display()
        ))
        .into());
    }
    log::info!("Found {} file(s) under {}", files.len(), root.display());
    Ok(files)
}

fn scan_dir(dir: &Path, extensions: &[&str], files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            scan_dir(&path, extensions, files)?;
        } else if let Some(ext) = path.extension().and_then(|s| s.to_str())
            && extensions.contains(&ext.to_lowercase().as_str())
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Identifier of a scanned file: its path relative to `root` without the
/// extension, `/`-separated. For a file root, the file stem.
///
/// # Example
/// ```
/// use mf_core::corpus::item_id;
/// use std::path::Path;
/// assert_eq!(item_id(Path::new("songs"), Path::new("songs/blues/one.txt")), "blues/one");
/// ```
#[must_use]
pub fn item_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = if relative.as_os_str().is_empty() {
        Path::new(path.file_name().unwrap_or_default())
    } else {
        relative
    };
    relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
