use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::track::CaptionTrack;
use super::{collapse_whitespace, select_best_track, CaptionStrategy};
use crate::resolver;
use crate::{Result, ScribeError};

/// CORS relays, tried in order; each takes the URL-encoded target appended
/// to its query string and returns the target body verbatim
const PROXIES: &[&str] = &[
    "https://api.allorigins.win/raw?url=",
    "https://corsproxy.io/?url=",
    "https://api.codetabs.com/v1/proxy?quest=",
];

/// Marker served instead of the watch page when YouTube wants a human
const CAPTCHA_MARKER: &str = "g-recaptcha";

static CAPTION_TRACKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""captionTracks":(\[.*?\])"#).expect("static pattern"));
static XML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static pattern"));

/// Last-resort acquisition: pull the watch page itself through a relay and
/// dig the caption track list out of the embedded player data.
pub struct ScrapeStrategy {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ScrapedTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(default)]
    name: Option<TrackName>,
    #[serde(default, rename = "languageCode")]
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct TrackName {
    #[serde(default, rename = "simpleText")]
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<NameRun>,
}

#[derive(Deserialize)]
struct NameRun {
    #[serde(default)]
    text: String,
}

impl From<ScrapedTrack> for CaptionTrack {
    fn from(track: ScrapedTrack) -> Self {
        let label = track
            .name
            .map(|name| {
                name.simple_text.unwrap_or_else(|| {
                    name.runs
                        .into_iter()
                        .map(|run| run.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
            })
            .unwrap_or_default();
        CaptionTrack {
            url: track.base_url,
            label,
            language_code: track.language_code,
            kind: track.kind,
        }
    }
}

#[derive(Deserialize)]
struct PlayerResponse {
    captions: Option<PlayerCaptions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerCaptions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<ScrapedTrack>,
}

impl ScrapeStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_via(&self, proxy: &str, target: &str) -> Result<String> {
        let url = format!("{proxy}{}", urlencoding::encode(target));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("relay request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("relay returned HTTP {}", response.status());
        }
        response.text().await.context("relay body read failed")
    }

    async fn try_proxy(&self, proxy: &str, video_id: &str) -> Result<String> {
        let html = self.fetch_via(proxy, &resolver::watch_url(video_id)).await?;
        if html.contains(CAPTCHA_MARKER) {
            anyhow::bail!("watch page served a CAPTCHA wall");
        }

        let tracks = extract_tracks(&html)?;
        let track = select_best_track(&tracks).ok_or(ScribeError::NoCaptions)?;

        let xml = self.fetch_via(proxy, &track.url).await?;
        let text = caption_xml_to_text(&xml);
        if text.is_empty() {
            anyhow::bail!("caption track produced no text");
        }
        Ok(text)
    }
}

#[async_trait]
impl CaptionStrategy for ScrapeStrategy {
    fn name(&self) -> &'static str {
        "scrape"
    }

    async fn acquire(&self, video_id: &str) -> Result<String> {
        let mut last_error = anyhow::anyhow!("no relay proxy configured");

        for proxy in PROXIES {
            match self.try_proxy(proxy, video_id).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    tracing::debug!(proxy = %proxy, "relay attempt failed: {err:#}");
                    last_error = err;
                }
            }
        }

        Err(last_error.context("all relay proxies failed"))
    }
}

/// Caption track list from the watch page HTML: the inline JSON field when
/// it parses, otherwise the full embedded player-response object.
fn extract_tracks(html: &str) -> Result<Vec<CaptionTrack>> {
    if let Some(caps) = CAPTION_TRACKS.captures(html) {
        if let Ok(tracks) = serde_json::from_str::<Vec<ScrapedTrack>>(&caps[1]) {
            if !tracks.is_empty() {
                return Ok(tracks.into_iter().map(Into::into).collect());
            }
        }
    }

    if let Some(json) = extract_json_object(html, "ytInitialPlayerResponse") {
        if let Ok(player) = serde_json::from_str::<PlayerResponse>(&json) {
            let tracks = player
                .captions
                .and_then(|c| c.player_captions_tracklist_renderer)
                .map(|r| r.caption_tracks)
                .unwrap_or_default();
            if !tracks.is_empty() {
                return Ok(tracks.into_iter().map(Into::into).collect());
            }
        }
    }

    Err(ScribeError::NoCaptions.into())
}

/// Slice the JSON object assigned to `marker` out of a script body by
/// walking brace depth, string-aware.
fn extract_json_object(html: &str, marker: &str) -> Option<String> {
    let at = html.find(marker)?;
    let rest = &html[at + marker.len()..];
    let body = &rest[rest.find('{')?..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(body[..i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a caption-track XML payload into plain text: drop tags, decode the
/// basic HTML entities the format carries, collapse whitespace.
fn caption_xml_to_text(xml: &str) -> String {
    let without_tags = XML_TAG.replace_all(xml, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}
