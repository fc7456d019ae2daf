use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;

use crate::{Result, ScribeError};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-2.0-flash";

/// Instruction sent alongside raw media
const TRANSCRIBE_INSTRUCTION: &str = "Transcribe this recording verbatim. Output only the spoken text, with no commentary or timestamps. If the recording contains no speech, output exactly: [No Speech Detected]";

/// Instruction sent alongside raw caption text
const REFINE_INSTRUCTION: &str = "Add punctuation, capitalization and paragraph breaks to the following transcript. Do not summarize, translate or otherwise alter the content.";

/// Refinement submits at most this many characters of raw caption text
const REFINE_INPUT_LIMIT: usize = 30_000;

/// The two operations the pipeline needs from the generative-AI backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a raw media payload. Fails without a key, on transport
    /// errors, or when the backend returns no text.
    async fn transcribe_media(&self, bytes: &[u8], mime_type: &str, key: &str) -> Result<String>;

    /// Polish raw caption text into punctuated prose. Best-effort: any
    /// failure degrades to returning the input unchanged, which is why this
    /// does not return a `Result`.
    async fn refine_text(&self, raw: &str, key: &str) -> String;
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for the generative-AI backend
pub struct GeminiClient {
    client: reqwest::Client,
    api_base: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_base(client: reqwest::Client, api_base: String) -> Self {
        Self { client, api_base }
    }

    async fn generate(&self, parts: serde_json::Value, temperature: f32, key: &str) -> Result<String> {
        if key.is_empty() {
            return Err(ScribeError::MissingApiKey.into());
        }

        let url = format!("{}/{MODEL}:generateContent?key={key}", self.api_base);
        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "temperature": temperature },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("transcription backend request failed")?;

        let status = response.status();
        // A 4xx on an inline-media request is almost always an oversized
        // payload; the status is the only hint the backend gives us.
        if status.is_client_error() {
            return Err(ScribeError::PayloadRejected(format!("HTTP {status}")).into());
        }
        if !status.is_success() {
            anyhow::bail!("transcription backend returned HTTP {status}");
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("transcription backend response parse failed")?;
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(ScribeError::EmptyTranscript.into());
        }
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for GeminiClient {
    async fn transcribe_media(&self, bytes: &[u8], mime_type: &str, key: &str) -> Result<String> {
        let encoded = general_purpose::STANDARD.encode(bytes);
        let parts = json!([
            { "inline_data": { "mime_type": mime_type, "data": encoded } },
            { "text": TRANSCRIBE_INSTRUCTION },
        ]);
        self.generate(parts, 0.1, key).await
    }

    async fn refine_text(&self, raw: &str, key: &str) -> String {
        let clipped = clip_chars(raw, REFINE_INPUT_LIMIT);
        let parts = json!([{ "text": format!("{REFINE_INSTRUCTION}\n\n{clipped}") }]);

        match self.generate(parts, 0.3, key).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("refinement unavailable, keeping raw captions: {err:#}");
                raw.to_string()
            }
        }
    }
}

/// First `limit` characters of `text`, respecting char boundaries
fn clip_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
