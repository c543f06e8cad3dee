//! Client for the LRCLIB lyrics service (https://lrclib.net/docs).
//!
//! Only the two read endpoints are used: `/get` for an exact title and artist
//! match, then `/search` when that has no synced text.

use super::LyricsLookup;
use anyhow::Context;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// One track record as returned by `/get` and `/search`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LrclibResponse {
    pub track_name: String,
    pub artist_name: String,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://lrclib.net/api";
    const USER_AGENT: &'static str = concat!("lyricplay/", env!("CARGO_PKG_VERSION"));

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build lrclib http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exact match first, then search.
    pub async fn get_lyrics(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        if let Some(lyrics) = self.get_exact(track_name, artist_name).await?
            && lyrics.synced_lyrics.is_some()
        {
            return Ok(Some(lyrics));
        }

        self.search(track_name, artist_name).await
    }

    async fn get_exact(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        self.get_json("get", track_name, artist_name).await
    }

    async fn search(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        let results: Option<Vec<LrclibResponse>> =
            self.get_json("search", track_name, artist_name).await?;
        Ok(results.and_then(pick_best))
    }

    /// GET `{base}/{endpoint}` for one track. 404 means no match.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<T>> {
        let url = format!(
            "{}/{endpoint}?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(track_name),
            urlencoding::encode(artist_name)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("lrclib {endpoint} request"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .json::<T>()
                    .await
                    .with_context(|| format!("decode lrclib {endpoint} response"))?;
                Ok(Some(body))
            }
            status => anyhow::bail!("lrclib {endpoint} returned {status}"),
        }
    }
}

/// First result carrying synced lyrics, else the first result.
fn pick_best(mut results: Vec<LrclibResponse>) -> Option<LrclibResponse> {
    let synced = results
        .iter()
        .position(|r| r.synced_lyrics.as_deref().is_some_and(|s| !s.trim().is_empty()));
    match synced {
        Some(i) => Some(results.swap_remove(i)),
        None => results.into_iter().next(),
    }
}

#[async_trait::async_trait]
impl LyricsLookup for LrclibClient {
    async fn fetch_synced_lyrics(&self, title: &str, artist: &str) -> anyhow::Result<Option<String>> {
        let found = self.get_lyrics(title, artist).await?;
        Ok(found
            .and_then(|r| r.synced_lyrics)
            .filter(|s| !s.trim().is_empty()))
    }
}
