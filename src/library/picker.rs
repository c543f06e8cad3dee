use super::FilePicker;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File picker for the console: expands the paths typed after `add`.
///
/// Directories are walked (recursively unless disabled) and only files with
/// an allowed extension are kept. No paths at all means the user cancelled.
#[derive(Debug, Clone)]
pub struct PathPicker {
    paths: Vec<PathBuf>,
    recursive: bool,
}

impl PathPicker {
    pub fn new(paths: Vec<PathBuf>, recursive: bool) -> Self {
        Self { paths, recursive }
    }
}

#[async_trait::async_trait]
impl FilePicker for PathPicker {
    async fn select_files(&self, extensions: &[String]) -> anyhow::Result<Option<Vec<PathBuf>>> {
        if self.paths.is_empty() {
            return Ok(None);
        }
        let paths = self.paths.clone();
        let recursive = self.recursive;
        let exts = normalize_extensions(extensions);
        let found = tokio::task::spawn_blocking(move || expand(&paths, recursive, &exts)).await?;
        Ok(Some(found))
    }
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn has_extension(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn expand(paths: &[PathBuf], recursive: bool, exts: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for root in paths {
        if root.is_file() {
            if has_extension(root, exts) {
                out.push(absolute(root));
            }
            continue;
        }
        if !root.is_dir() {
            tracing::warn!(path = %root.display(), "skipping missing path");
            continue;
        }

        let mut walker = WalkDir::new(root).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }
        for entry in walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if entry.file_type().is_file() && has_extension(path, exts) {
                out.push(absolute(path));
            }
        }
    }
    out
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
