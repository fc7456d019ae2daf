use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::track::CaptionTrack;
use super::{collapse_whitespace, select_best_track, CaptionStrategy};
use crate::{Result, ScribeError};

/// Public front-end instances, tried in order
const INSTANCES: &[&str] = &[
    "https://inv.nadeko.net",
    "https://invidious.nerdvpn.de",
    "https://invidious.f5.si",
    "https://yewtu.be",
];

/// Cleaned payloads shorter than this are treated as unusable
const MIN_TRANSCRIPT_LEN: usize = 5;

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static pattern"));

/// Alternate public front-ends expose video metadata with a caption-track
/// list; the tracks themselves come back as WebVTT.
pub struct CommunityStrategy {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct VideoResponse {
    #[serde(default)]
    captions: Vec<InstanceCaption>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceCaption {
    #[serde(default)]
    label: String,
    #[serde(default)]
    language_code: String,
    url: String,
}

impl From<InstanceCaption> for CaptionTrack {
    fn from(caption: InstanceCaption) -> Self {
        // No explicit kind marker here; the label carries the auto hint
        CaptionTrack {
            url: caption.url,
            label: caption.label,
            language_code: caption.language_code,
            kind: None,
        }
    }
}

impl CommunityStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn try_instance(&self, base: &str, video_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{base}/api/v1/videos/{video_id}"))
            .send()
            .await
            .context("instance metadata request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("instance returned HTTP {}", response.status());
        }

        let video: VideoResponse = response
            .json()
            .await
            .context("instance metadata parse failed")?;
        if video.captions.is_empty() {
            return Err(ScribeError::NoCaptions.into());
        }

        let tracks: Vec<CaptionTrack> = video.captions.into_iter().map(Into::into).collect();
        let track = select_best_track(&tracks).ok_or(ScribeError::NoCaptions)?;
        let caption_url = if track.url.starts_with("http") {
            track.url.clone()
        } else {
            format!("{base}{}", track.url)
        };

        let vtt = self
            .client
            .get(&caption_url)
            .send()
            .await
            .context("caption download failed")?
            .text()
            .await
            .context("caption body read failed")?;

        let cleaned = clean_vtt(&vtt);
        if cleaned.len() < MIN_TRANSCRIPT_LEN {
            anyhow::bail!("caption payload too short after cleanup");
        }
        Ok(cleaned)
    }
}

#[async_trait]
impl CaptionStrategy for CommunityStrategy {
    fn name(&self) -> &'static str {
        "community"
    }

    async fn acquire(&self, video_id: &str) -> Result<String> {
        let mut last_error = anyhow::anyhow!("no instance configured");

        for base in INSTANCES {
            match self.try_instance(base, video_id).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    tracing::debug!(instance = %base, "instance failed: {err:#}");
                    last_error = err;
                }
            }
        }

        Err(last_error.context("all community instances failed"))
    }
}

/// Strip a WebVTT payload down to its cue text: drop the header and metadata
/// lines, timestamp ranges, markup tags, cue counters and blank lines, then
/// join what remains with single spaces.
pub(crate) fn clean_vtt(vtt: &str) -> String {
    let mut lines = Vec::new();

    for raw in vtt.lines() {
        let stripped = MARKUP_TAG.replace_all(raw.trim(), "");
        let line = stripped.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
        {
            continue;
        }
        if line.contains("-->") {
            continue;
        }
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        lines.push(line.to_string());
    }

    collapse_whitespace(&lines.join(" "))
}
