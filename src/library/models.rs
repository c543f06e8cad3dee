use crate::lyrics::LyricTimeline;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tag fields read from an audio file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    /// First embedded picture, base64 encoded.
    pub cover_base64: Option<String>,
    /// Stream duration in seconds, when the container reports one.
    pub duration_secs: Option<f64>,
}

impl Metadata {
    /// Title and artist, both non-blank, or `None`.
    pub fn lookup_key(&self) -> Option<(&str, &str)> {
        let title = self.title.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let artist = self.artist.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((title, artist))
    }
}

/// A playlist entry. Identity is `path`; positions shift under reordering.
#[derive(Debug, Clone)]
pub struct Song {
    pub path: PathBuf,
    /// What the audio engine is asked to open.
    pub source: String,
    /// File name, used when tags are missing.
    pub name: String,
    pub metadata: Option<Metadata>,
    /// Insertion stamp, restores original order when leaving shuffle.
    pub added_at: u64,
    /// Cached lyric timeline. `Some(empty)` means "looked up, nothing found".
    pub lyrics: Option<LyricTimeline>,
}

impl Song {
    pub fn new(path: PathBuf, metadata: Option<Metadata>, added_at: u64) -> Self {
        let name = file_name(&path);
        let source = path.to_string_lossy().into_owned();
        Self {
            path,
            source,
            name,
            metadata,
            added_at,
            lyrics: None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref()?.title.as_deref()
    }

    pub fn artist(&self) -> Option<&str> {
        self.metadata.as_ref()?.artist.as_deref()
    }

    pub fn display_name(&self) -> String {
        match (self.title(), self.artist()) {
            (Some(t), Some(a)) if !t.trim().is_empty() && !a.trim().is_empty() => {
                format!("{t} — {a}")
            }
            (Some(t), _) if !t.trim().is_empty() => t.to_string(),
            _ => self.name.clone(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// `MM:SS` for status lines; zero and non-finite values render as `00:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
