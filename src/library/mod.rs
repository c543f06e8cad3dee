//! Songs, their tags, and bringing new files into the playlist.

pub mod models;
pub mod picker;
pub mod tags;

pub use models::{Metadata, Song, format_time};

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait::async_trait]
pub trait FilePicker: Send + Sync {
    /// Chosen files, or `None` when the user cancelled.
    async fn select_files(&self, extensions: &[String]) -> anyhow::Result<Option<Vec<PathBuf>>>;
}

#[async_trait::async_trait]
pub trait MetadataReader: Send + Sync {
    async fn read_metadata(&self, path: &Path) -> anyhow::Result<Metadata>;
}

/// One selected file with whatever metadata could be read for it.
#[derive(Debug, Clone)]
pub struct ImportedFile {
    pub path: PathBuf,
    pub metadata: Option<Metadata>,
    /// Why metadata is missing, if reading failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Cancelled,
    Files(Vec<ImportedFile>),
}

/// Ask the picker for files, then read metadata for all of them concurrently.
///
/// A failed read only degrades that file; the batch always completes and keeps
/// the picker's order. Duplicate paths within the selection are dropped.
pub async fn import_files(
    picker: &dyn FilePicker,
    reader: Arc<dyn MetadataReader>,
    extensions: &[String],
) -> anyhow::Result<ImportOutcome> {
    let Some(mut paths) = picker.select_files(extensions).await? else {
        return Ok(ImportOutcome::Cancelled);
    };

    let mut seen = std::collections::HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));

    let handles: Vec<_> = paths
        .iter()
        .cloned()
        .map(|path| {
            let reader = Arc::clone(&reader);
            tokio::spawn(async move { reader.read_metadata(&path).await })
        })
        .collect();

    let mut files = Vec::with_capacity(paths.len());
    for (path, handle) in paths.into_iter().zip(handles) {
        let (metadata, error) = match handle.await {
            Ok(Ok(m)) => (Some(m), None),
            Ok(Err(e)) => (None, Some(format!("{e:#}"))),
            Err(e) => (None, Some(format!("metadata task failed: {e}"))),
        };
        if let Some(err) = &error {
            tracing::warn!(path = %path.display(), error = %err, "metadata unavailable");
        }
        files.push(ImportedFile {
            path,
            metadata,
            error,
        });
    }

    Ok(ImportOutcome::Files(files))
}
