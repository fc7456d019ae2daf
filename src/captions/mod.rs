use async_trait::async_trait;

use crate::resolver;
use crate::{Result, ScribeError};

pub mod community;
pub mod premium;
pub mod scrape;
pub mod track;

pub use track::{select_best_track, CaptionTrack};

/// One independent method of acquiring a video's raw transcript text.
/// Strategies are composed into an ordered fallback chain.
#[async_trait]
pub trait CaptionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw transcript text for a known video id
    async fn acquire(&self, video_id: &str) -> Result<String>;
}

/// Entry point the scheduler uses to acquire a YouTube transcript
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Transcript text for a video URL, trying every configured strategy in
    /// order. Fails fast on an unextractable id, otherwise only after the
    /// whole chain is exhausted.
    async fn fetch_transcript<'a>(&self, url: &str, premium_key: Option<&'a str>) -> Result<String>;
}

/// Orchestrates the strategy chain: first success wins; individual failures
/// are logged at the strategy boundary and swallowed until every strategy is
/// exhausted.
pub struct CaptionFetcher {
    client: reqwest::Client,
}

impl CaptionFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    // The chain is rebuilt per call: the premium credential may change
    // between jobs.
    fn chain(&self, premium_key: Option<&str>) -> Vec<Box<dyn CaptionStrategy>> {
        let mut chain: Vec<Box<dyn CaptionStrategy>> = Vec::new();
        if let Some(key) = premium_key.filter(|k| !k.is_empty()) {
            chain.push(Box::new(premium::PremiumStrategy::new(
                self.client.clone(),
                key.to_string(),
            )));
        }
        chain.push(Box::new(community::CommunityStrategy::new(self.client.clone())));
        chain.push(Box::new(scrape::ScrapeStrategy::new(self.client.clone())));
        chain
    }

    async fn run_chain(video_id: &str, chain: &[Box<dyn CaptionStrategy>]) -> Result<String> {
        let mut last_error = String::from("no caption source available");

        for strategy in chain {
            match strategy.acquire(video_id).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::info!(strategy = strategy.name(), "caption acquisition succeeded");
                    return Ok(text);
                }
                Ok(_) => {
                    last_error = format!("{}: empty transcript", strategy.name());
                    tracing::warn!(strategy = strategy.name(), "strategy produced no text, trying next");
                }
                Err(err) => {
                    last_error = format!("{err:#}");
                    tracing::warn!(
                        strategy = strategy.name(),
                        "strategy failed ({last_error}), trying next"
                    );
                }
            }
        }

        Err(ScribeError::AllSourcesFailed { last: last_error }.into())
    }
}

#[async_trait]
impl CaptionSource for CaptionFetcher {
    async fn fetch_transcript<'a>(&self, url: &str, premium_key: Option<&'a str>) -> Result<String> {
        let id = resolver::extract_video_id(url)
            .ok_or_else(|| ScribeError::InvalidUrl(url.to_string()))?;
        Self::run_chain(&id, &self.chain(premium_key)).await
    }
}

/// Collapse runs of whitespace into single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
