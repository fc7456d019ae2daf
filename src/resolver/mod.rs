use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::{Result, ScribeError};

// Known YouTube URL shapes. An id is exactly 11 characters; the trailing
// group keeps a longer id-like run from matching.
static ID_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/.*[?&]v=([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"youtu\.be/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"youtube\.com/embed/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"youtube\.com/shorts/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"youtube\.com/v/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"youtube\.com/u/\w/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static pattern"))
    .collect()
});

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static pattern"));

/// Extract the canonical 11-character video id from a URL or a bare id.
/// Single authority for id extraction; every other component goes through
/// this function.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    ID_SHAPES
        .iter()
        .find_map(|re| re.captures(input).map(|caps| caps[1].to_string()))
}

/// Canonical watch URL for a video id
pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

fn fallback_thumbnail(id: &str) -> String {
    format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg")
}

/// Display metadata for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail: String,
    pub author: Option<String>,
}

impl VideoMetadata {
    /// Synthetic metadata used when the embed endpoint cannot be reached
    pub fn synthetic(id: &str) -> Self {
        Self {
            title: format!("YouTube Video ({id})"),
            thumbnail: fallback_thumbnail(id),
            author: None,
        }
    }
}

/// Source of display metadata for queued YouTube jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch title and thumbnail for a video URL. Degrades to synthetic
    /// metadata on any transport or parse failure; only an unextractable id
    /// is an error.
    async fn metadata(&self, url: &str) -> Result<VideoMetadata>;
}

#[derive(Deserialize)]
struct OEmbedResponse {
    title: String,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

/// Resolver backed by the public embed-metadata endpoint
pub struct OEmbedResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl OEmbedResolver {
    pub const ENDPOINT: &'static str = "https://www.youtube.com/oembed";

    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: Self::ENDPOINT.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    async fn fetch(&self, id: &str) -> Result<OEmbedResponse> {
        let url = format!(
            "{}?url={}&format=json",
            self.endpoint,
            urlencoding::encode(&watch_url(id))
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("embed metadata request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("embed metadata request returned HTTP {}", response.status());
        }

        response
            .json()
            .await
            .context("embed metadata response parse failed")
    }
}

#[async_trait]
impl MetadataSource for OEmbedResolver {
    async fn metadata(&self, url: &str) -> Result<VideoMetadata> {
        let id = extract_video_id(url).ok_or_else(|| ScribeError::InvalidUrl(url.to_string()))?;

        match self.fetch(&id).await {
            Ok(embed) => Ok(VideoMetadata {
                title: embed.title,
                thumbnail: embed
                    .thumbnail_url
                    .unwrap_or_else(|| fallback_thumbnail(&id)),
                author: embed.author_name,
            }),
            Err(err) => {
                tracing::debug!("embed metadata unavailable for {id}: {err:#}");
                Ok(VideoMetadata::synthetic(&id))
            }
        }
    }
}
