//! Source scanning.

use std::path::{Component, Path, PathBuf};

use jwalk::WalkDir;

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Collect source files under `source`, sorted.
///
/// Skips `output` (when nested inside `source`), ignored OS files, and any
/// path with a component listed in `exclude`.
pub fn scan_sources(source: &Path, output: &Path, exclude: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(source)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(|e| e.path())
        .filter(|path| !path.starts_with(output))
        .filter(|path| !is_excluded(path.strip_prefix(source).unwrap_or(path), exclude))
        .collect();
    files.sort();
    files
}

fn is_excluded(relative: &Path, exclude: &[String]) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => exclude.iter().any(|x| name.to_str() == Some(x.as_str())),
        _ => false,
    })
}
