use super::{Metadata, MetadataReader};
use anyhow::Context;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::{Accessor, ItemKey, Tag};
use std::path::{Path, PathBuf};

/// Reads tags with lofty on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LoftyReader;

#[async_trait::async_trait]
impl MetadataReader for LoftyReader {
    async fn read_metadata(&self, path: &Path) -> anyhow::Result<Metadata> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_tags(&path))
            .await
            .context("tag reader task")?
    }
}

pub fn read_tags(path: &Path) -> anyhow::Result<Metadata> {
    let tagged =
        lofty::read_from_path(path).with_context(|| format!("read tags {}", path.display()))?;

    let duration = tagged.properties().duration().as_secs_f64();
    let mut metadata = Metadata {
        duration_secs: (duration > 0.0).then_some(duration),
        ..Metadata::default()
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        metadata.title = non_blank(tag.title().as_deref());
        metadata.artist = non_blank(tag.artist().as_deref());
        metadata.album = non_blank(tag.album().as_deref());
        metadata.year = year_of(tag);
        metadata.cover_base64 = tag
            .pictures()
            .first()
            .map(|picture| BASE64_STANDARD.encode(picture.data()));
    }

    Ok(metadata)
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn year_of(tag: &Tag) -> Option<i32> {
    tag.items()
        .filter(|item| matches!(item.key(), ItemKey::Year | ItemKey::RecordingDate))
        .find_map(|item| parse_year(item.value().text()?))
}

/// Leading four digits of `2011`, `2011-03-04` or `2011/03`.
fn parse_year(raw: &str) -> Option<i32> {
    let digits: String = raw.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}
