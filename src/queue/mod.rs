use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::media::MediaPayload;

pub mod scheduler;

pub use scheduler::JobQueue;

/// Lifecycle state of a queued transcription job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Currently holding a concurrency slot
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Uploading | JobStatus::Processing)
    }

    /// Done until explicit user action
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobStatus::Idle => "idle",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Where a job's media comes from
#[derive(Debug, Clone)]
pub enum JobSource {
    File { payload: MediaPayload },
    Youtube { url: String },
}

impl JobSource {
    pub fn kind(&self) -> &'static str {
        match self {
            JobSource::File { .. } => "file",
            JobSource::Youtube { .. } => "youtube",
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        match self {
            JobSource::File { .. } => None,
            JobSource::Youtube { url } => Some(url),
        }
    }
}

/// One user-requested transcription task and its lifecycle state
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub source: JobSource,
    /// Filename for file jobs; the raw URL for YouTube jobs until the real
    /// title arrives
    pub display_name: String,
    pub thumbnail: Option<String>,
    pub status: JobStatus,
    /// Set only on `Completed`
    pub transcript: Option<String>,
    /// Set only on `Error`
    pub error: Option<String>,
    /// Informational completion indicator, 0-100
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn from_file(payload: MediaPayload) -> Self {
        let display_name = payload.file_name.clone();
        Self {
            id: Uuid::new_v4(),
            source: JobSource::File { payload },
            display_name,
            thumbnail: None,
            status: JobStatus::Idle,
            transcript: None,
            error: None,
            progress: 0,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn from_url(url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: JobSource::Youtube { url: url.clone() },
            display_name: url,
            thumbnail: None,
            status: JobStatus::Idle,
            transcript: None,
            error: None,
            progress: 0,
            created_at: Utc::now(),
        }
    }

    /// Payload size in bytes; 0 when unknown
    pub fn file_size(&self) -> u64 {
        match &self.source {
            JobSource::File { payload } => payload.len(),
            JobSource::Youtube { .. } => 0,
        }
    }
}
