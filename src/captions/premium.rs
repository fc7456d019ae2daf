use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{collapse_whitespace, CaptionStrategy};
use crate::{Result, ScribeError};

const SEARCH_ENDPOINT: &str = "https://www.searchapi.io/api/v1/search";

/// Commercial transcript-search backend. Only part of the chain when the
/// user has configured a caption API key.
pub struct PremiumStrategy {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    transcripts: Vec<TranscriptFragment>,
}

#[derive(Deserialize)]
struct TranscriptFragment {
    #[serde(default)]
    text: String,
}

impl PremiumStrategy {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            endpoint: SEARCH_ENDPOINT.to_string(),
        }
    }
}

#[async_trait]
impl CaptionStrategy for PremiumStrategy {
    fn name(&self) -> &'static str {
        "premium"
    }

    async fn acquire(&self, video_id: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "youtube_transcripts"),
                ("video_id", video_id),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("transcript search request failed")?;

        let status = response.status();
        // An invalid or exhausted key will not get better by retrying; the
        // chain moves straight on to the free strategies.
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ScribeError::CaptionKeyRejected(status.as_u16()).into());
        }
        if !status.is_success() {
            anyhow::bail!("transcript search returned HTTP {status}");
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("transcript search response parse failed")?;
        if body.transcripts.is_empty() {
            return Err(ScribeError::NoCaptions.into());
        }

        let joined = body
            .transcripts
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(collapse_whitespace(&joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_join_with_single_spaces() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"transcripts":[{"text":"hello  there"},{"text":" general\nkenobi "}]}"#,
        )
        .unwrap();
        let joined = body
            .transcripts
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(collapse_whitespace(&joined), "hello there general kenobi");
    }

    #[test]
    fn missing_transcripts_field_means_no_captions() {
        let body: SearchResponse = serde_json::from_str(r#"{"search_metadata":{}}"#).unwrap();
        assert!(body.transcripts.is_empty());
    }
}
