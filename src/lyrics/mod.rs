//! Lyrics module for fetching and synchronising timed lyrics
//!
//! This module provides:
//! - LRC format parser producing contiguous timed segments
//! - Lyric timeline and active-line lookup
//! - LRCLIB API client for fetching lyrics
//! - The coordinator that attaches timelines to songs as they play

pub mod coordinator;
pub mod lrclib;
pub mod parser;
pub mod timeline;

pub use coordinator::LyricsCoordinator;
pub use lrclib::LrclibClient;
pub use timeline::LyricTimeline;

/// Remote source of synced lyrics.
#[async_trait::async_trait]
pub trait LyricsLookup: Send + Sync {
    /// Raw LRC text, or `None` when the service has no synced lyrics.
    async fn fetch_synced_lyrics(&self, title: &str, artist: &str) -> anyhow::Result<Option<String>>;
}

/// Drop trailing parenthetical remarks: `Song (feat. X) (Live)` -> `Song`.
pub fn strip_parenthetical(title: &str) -> &str {
    let mut t = title.trim_end();
    while t.ends_with(')') {
        let Some(open) = matching_open(t) else {
            break;
        };
        let head = t[..open].trim_end();
        if head.is_empty() {
            break;
        }
        t = head;
    }
    t
}

/// Byte offset of the `(` balancing the trailing `)`.
fn matching_open(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
