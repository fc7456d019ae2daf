//! scribeq - queue video files and YouTube links for AI transcription
//!
//! This library queues transcription jobs, runs each through one of two
//! acquisition paths (direct AI transcription of uploaded media, or YouTube
//! caption scraping with layered fallbacks followed by AI refinement), and
//! stores completed transcripts in a local library.

pub mod captions;
pub mod cli;
pub mod config;
pub mod keys;
pub mod library;
pub mod media;
pub mod queue;
pub mod resolver;
pub mod store;
pub mod transcribe;
pub mod utils;

pub use config::{Concurrency, Settings, SettingsStore};
pub use library::{Library, LibraryItem};
pub use queue::{Job, JobQueue, JobSource, JobStatus};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error kinds the pipeline branches on
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("could not extract a video id from: {0}")]
    InvalidUrl(String),

    #[error("no transcription API key configured")]
    MissingApiKey,

    #[error("caption API key rejected (HTTP {0})")]
    CaptionKeyRejected(u16),

    #[error("no caption tracks available for this video")]
    NoCaptions,

    #[error("all caption sources failed; last error: {last}")]
    AllSourcesFailed { last: String },

    #[error("transcription backend returned no text")]
    EmptyTranscript,

    #[error("transcription backend rejected the media payload: {0}")]
    PayloadRejected(String),
}
