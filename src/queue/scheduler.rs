use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Job, JobSource, JobStatus};
use crate::captions::CaptionSource;
use crate::config::Concurrency;
use crate::keys::KeyProvider;
use crate::library::{Library, LibraryItem};
use crate::media::MediaPayload;
use crate::resolver::MetadataSource;
use crate::transcribe::Transcriber;
use crate::ScribeError;

/// Message an in-flight task sends back to the queue. All job-list mutation
/// happens on the queue side as these are drained; tasks never touch the
/// list directly.
#[derive(Debug)]
enum JobEvent {
    Phase { id: Uuid, status: JobStatus },
    Progress { id: Uuid, pct: u8 },
    Metadata { id: Uuid, title: String, thumbnail: Option<String> },
    Finished { id: Uuid, outcome: std::result::Result<String, String> },
}

/// Bounded-concurrency queue owning the job list and advancing each job
/// through `Idle → Uploading → Processing → Completed | Error`.
///
/// The limit caps how many jobs are in flight awaiting I/O, not CPU
/// parallelism; slots are recomputed from live counts on every pass rather
/// than pre-assigned.
pub struct JobQueue {
    jobs: Vec<Job>,
    paused: bool,
    concurrency: Concurrency,
    captions: Arc<dyn CaptionSource>,
    transcriber: Arc<dyn Transcriber>,
    metadata: Arc<dyn MetadataSource>,
    keys: Arc<dyn KeyProvider>,
    library: Library,
    events_tx: mpsc::UnboundedSender<JobEvent>,
    events_rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobQueue {
    pub fn new(
        captions: Arc<dyn CaptionSource>,
        transcriber: Arc<dyn Transcriber>,
        metadata: Arc<dyn MetadataSource>,
        keys: Arc<dyn KeyProvider>,
        library: Library,
        concurrency: Concurrency,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            jobs: Vec::new(),
            paused: false,
            concurrency,
            captions,
            transcriber,
            metadata,
            keys,
            library,
            events_tx,
            events_rx,
        }
    }

    /// Queue a local media file; the payload stays in memory until the job
    /// runs.
    pub fn enqueue_file(&mut self, payload: MediaPayload) -> Uuid {
        let job = Job::from_file(payload);
        let id = job.id;
        tracing::info!(job = %id, name = %job.display_name, "queued file job");
        self.jobs.push(job);
        id
    }

    /// Queue a YouTube link. The display name starts as the raw URL; the
    /// real title arrives best-effort from the metadata resolver and never
    /// blocks the job.
    pub fn enqueue_url(&mut self, url: String) -> Uuid {
        let job = Job::from_url(url.clone());
        let id = job.id;
        tracing::info!(job = %id, %url, "queued YouTube job");
        self.jobs.push(job);
        self.spawn_metadata_fetch(id, url);
        id
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, id: Uuid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn set_concurrency(&mut self, concurrency: Concurrency) {
        self.concurrency = concurrency;
    }

    /// Drop a job. An in-flight task is not aborted; its eventual result no
    /// longer has a matching record and is discarded.
    pub fn remove(&mut self, id: Uuid) {
        self.jobs.retain(|j| j.id != id);
    }

    /// Re-admit a failed job: back to `Idle` with error, transcript and
    /// progress cleared; resumes the queue if it was paused.
    pub fn retry(&mut self, id: Uuid) {
        let mut retried = false;
        if let Some(job) = self
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.status == JobStatus::Error)
        {
            reset_for_retry(job);
            retried = true;
        }
        if retried {
            self.paused = false;
        }
    }

    /// Re-admit every failed job
    pub fn retry_all_failed(&mut self) {
        let mut retried = false;
        for job in self.jobs.iter_mut().filter(|j| j.status == JobStatus::Error) {
            reset_for_retry(job);
            retried = true;
        }
        if retried {
            self.paused = false;
        }
    }

    pub fn active_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_active()).count()
    }

    fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    /// One admission pass: fill free slots with `Idle` jobs in insertion
    /// order. Synchronous; every admitted job is flipped out of `Idle`
    /// before its task is spawned, so no later pass can pick it again.
    ///
    /// Without a transcription key nothing can run: the first idle job is
    /// failed with that message and the queue auto-pauses instead of burning
    /// through every remaining idle job.
    pub fn schedule(&mut self) {
        if self.paused {
            return;
        }
        let mut slots = self.concurrency.limit().saturating_sub(self.active_count());
        if slots == 0 {
            return;
        }

        // Read fresh on every pass; the active key may have changed
        let key = self.keys.transcription_key();
        let caption_key = self.keys.caption_key();

        let idle_ids: Vec<Uuid> = self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Idle)
            .map(|j| j.id)
            .collect();

        for id in idle_ids {
            if slots == 0 {
                break;
            }
            let Some(job) = self.job_mut(id) else { continue };

            if key.is_empty() {
                job.status = JobStatus::Error;
                job.error = Some(ScribeError::MissingApiKey.to_string());
                self.paused = true;
                tracing::warn!("queue paused: no transcription API key configured");
                return;
            }

            job.status = JobStatus::Uploading;
            let source = job.source.clone();
            slots -= 1;
            tracing::debug!(job = %id, "admitted");
            self.spawn_job(id, source, key.clone(), caption_key.clone());
        }
    }

    /// Drive the queue until nothing is active and nothing further can be
    /// admitted. The observer sees the job list after every applied event.
    pub async fn run_until_drained(&mut self, mut observer: impl FnMut(&[Job])) {
        self.schedule();
        observer(&self.jobs);

        loop {
            if self.active_count() == 0 {
                let admissible =
                    !self.paused && self.jobs.iter().any(|j| j.status == JobStatus::Idle);
                if !admissible {
                    break;
                }
            }
            // Safe to wait: schedule() ran after the last change, so an idle
            // queue here implies in-flight tasks that will send events
            match self.events_rx.recv().await {
                Some(event) => {
                    self.apply_event(event);
                    self.schedule();
                    observer(&self.jobs);
                }
                None => break,
            }
        }
    }

    fn spawn_metadata_fetch(&self, id: Uuid, url: String) {
        let resolver = Arc::clone(&self.metadata);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            if let Ok(meta) = resolver.metadata(&url).await {
                let _ = tx.send(JobEvent::Metadata {
                    id,
                    title: meta.title,
                    thumbnail: Some(meta.thumbnail),
                });
            }
        });
    }

    fn spawn_job(&self, id: Uuid, source: JobSource, key: String, caption_key: Option<String>) {
        let captions = Arc::clone(&self.captions);
        let transcriber = Arc::clone(&self.transcriber);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = run_job(id, source, &key, caption_key.as_deref(), captions, transcriber, &tx)
                .await
                .map_err(|err| format!("{err:#}"));
            let _ = tx.send(JobEvent::Finished { id, outcome });
        });
    }

    fn apply_event(&mut self, event: JobEvent) {
        match event {
            JobEvent::Phase { id, status } => {
                if let Some(job) = self.job_mut(id) {
                    if !job.status.is_terminal() {
                        job.status = status;
                    }
                }
            }
            JobEvent::Progress { id, pct } => {
                if let Some(job) = self.job_mut(id) {
                    job.progress = pct.min(100);
                }
            }
            JobEvent::Metadata { id, title, thumbnail } => {
                if let Some(job) = self.job_mut(id) {
                    job.display_name = title;
                    job.thumbnail = thumbnail;
                }
            }
            JobEvent::Finished { id, outcome } => {
                // A missing record means the job was removed while in
                // flight; the result is discarded
                let Some(job) = self.job_mut(id) else { return };
                match outcome {
                    Ok(text) => {
                        job.status = JobStatus::Completed;
                        job.progress = 100;
                        job.transcript = Some(text);
                        job.error = None;
                        tracing::info!(job = %id, name = %job.display_name, "job completed");
                        let item = LibraryItem::from_job(job);
                        if let Err(err) = self.library.add(item) {
                            tracing::warn!("failed to persist library: {err:#}");
                        }
                    }
                    Err(message) => {
                        job.status = JobStatus::Error;
                        job.progress = 0;
                        job.transcript = None;
                        tracing::warn!(job = %id, "job failed: {message}");
                        job.error = Some(message);
                    }
                }
            }
        }
    }
}

fn reset_for_retry(job: &mut Job) {
    job.status = JobStatus::Idle;
    job.error = None;
    job.transcript = None;
    job.progress = 0;
}

async fn run_job(
    id: Uuid,
    source: JobSource,
    key: &str,
    caption_key: Option<&str>,
    captions: Arc<dyn CaptionSource>,
    transcriber: Arc<dyn Transcriber>,
    tx: &mpsc::UnboundedSender<JobEvent>,
) -> crate::Result<String> {
    match source {
        JobSource::File { payload } => {
            let _ = tx.send(JobEvent::Progress { id, pct: 25 });
            let _ = tx.send(JobEvent::Phase { id, status: JobStatus::Processing });
            transcriber
                .transcribe_media(&payload.bytes, payload.format.mime_type(), key)
                .await
        }
        JobSource::Youtube { url } => {
            let raw = captions.fetch_transcript(&url, caption_key).await?;
            let _ = tx.send(JobEvent::Progress { id, pct: 60 });
            let _ = tx.send(JobEvent::Phase { id, status: JobStatus::Processing });
            // Refinement is best-effort polish and cannot hard-fail
            Ok(transcriber.refine_text(&raw, key).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::MockCaptionSource;
    use crate::config::Concurrency;
    use crate::keys::FixedKeys;
    use crate::media::{MediaFormat, MediaPayload};
    use crate::resolver::{MockMetadataSource, VideoMetadata};
    use crate::store::MemoryStorage;
    use crate::transcribe::MockTranscriber;

    fn payload(name: &str) -> MediaPayload {
        MediaPayload {
            bytes: Arc::from(vec![1u8, 2, 3, 4]),
            format: MediaFormat::Mp3,
            file_name: name.to_string(),
        }
    }

    fn fixed_keys(key: &str) -> Arc<FixedKeys> {
        Arc::new(FixedKeys {
            transcription: key.to_string(),
            caption: None,
        })
    }

    fn queue(
        captions: MockCaptionSource,
        transcriber: MockTranscriber,
        metadata: MockMetadataSource,
        key: &str,
        concurrency: Concurrency,
    ) -> JobQueue {
        JobQueue::new(
            Arc::new(captions),
            Arc::new(transcriber),
            Arc::new(metadata),
            fixed_keys(key),
            Library::open(Arc::new(MemoryStorage::new())).unwrap(),
            concurrency,
        )
    }

    #[tokio::test]
    async fn admission_is_bounded_by_the_concurrency_limit() {
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe_media()
            .returning(|_, _, _| Ok("text".to_string()));
        let mut queue = queue(
            MockCaptionSource::new(),
            transcriber,
            MockMetadataSource::new(),
            "key",
            Concurrency::Fixed(2),
        );

        for i in 0..5 {
            queue.enqueue_file(payload(&format!("clip-{i}.mp3")));
        }
        queue.schedule();

        assert_eq!(queue.active_count(), 2);
        let statuses: Vec<JobStatus> = queue.jobs().iter().map(|j| j.status).collect();
        assert_eq!(
            statuses,
            [
                JobStatus::Uploading,
                JobStatus::Uploading,
                JobStatus::Idle,
                JobStatus::Idle,
                JobStatus::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn repeated_passes_never_admit_a_job_twice() {
        let mut transcriber = MockTranscriber::new();
        // The whole test hinges on this expectation: one job, one call
        transcriber
            .expect_transcribe_media()
            .times(1)
            .returning(|_, _, _| Ok("text".to_string()));
        let mut queue = queue(
            MockCaptionSource::new(),
            transcriber,
            MockMetadataSource::new(),
            "key",
            Concurrency::Fixed(5),
        );

        queue.enqueue_file(payload("clip.mp3"));
        queue.schedule();
        queue.schedule();
        queue.schedule();
        assert_eq!(queue.active_count(), 1);

        queue.run_until_drained(|_| {}).await;
        assert_eq!(queue.jobs()[0].status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn file_job_runs_to_completion_and_lands_in_the_library() {
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe_media()
            .returning(|_, _, _| Ok("hello from the recording".to_string()));
        let mut queue = queue(
            MockCaptionSource::new(),
            transcriber,
            MockMetadataSource::new(),
            "key",
            Concurrency::Auto,
        );

        let id = queue.enqueue_file(payload("interview.mp3"));
        assert_eq!(queue.job(id).unwrap().status, JobStatus::Idle);

        let mut seen = Vec::new();
        queue
            .run_until_drained(|jobs| {
                if let Some(job) = jobs.first() {
                    if seen.last() != Some(&job.status) {
                        seen.push(job.status);
                    }
                }
            })
            .await;

        let job = queue.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.transcript.as_deref(), Some("hello from the recording"));
        assert_eq!(job.error, None);
        assert_eq!(job.progress, 100);
        assert_eq!(
            seen,
            [JobStatus::Uploading, JobStatus::Processing, JobStatus::Completed]
        );

        let items = queue.library().items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file_name, "interview.mp3");
        assert_eq!(items[0].source, "file");
        assert_eq!(items[0].file_size, 4);
        assert_eq!(items[0].transcript, "hello from the recording");
    }

    #[tokio::test]
    async fn youtube_job_refines_the_acquired_captions() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_fetch_transcript()
            .returning(|_, _| Ok("raw caption text".to_string()));
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_refine_text()
            .returning(|_, _| "Raw caption text, refined.".to_string());
        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_metadata()
            .returning(|_| Ok(VideoMetadata::synthetic("dQw4w9WgXcQ")));

        let mut queue = queue(captions, transcriber, metadata, "key", Concurrency::Auto);
        let id = queue.enqueue_url("https://youtu.be/dQw4w9WgXcQ".to_string());
        queue.run_until_drained(|_| {}).await;

        let job = queue.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.transcript.as_deref(), Some("Raw caption text, refined."));
        assert_eq!(queue.library().items().len(), 1);
        assert_eq!(
            queue.library().items()[0].source_url.as_deref(),
            Some("https://youtu.be/dQw4w9WgXcQ")
        );
    }

    #[tokio::test]
    async fn exhausted_caption_sources_fail_the_job_without_a_library_entry() {
        let mut captions = MockCaptionSource::new();
        captions.expect_fetch_transcript().returning(|_, _| {
            Err(ScribeError::AllSourcesFailed {
                last: "network down".to_string(),
            }
            .into())
        });
        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_metadata()
            .returning(|_| Ok(VideoMetadata::synthetic("dQw4w9WgXcQ")));

        let mut queue = queue(
            captions,
            MockTranscriber::new(),
            metadata,
            "key",
            Concurrency::Auto,
        );
        let id = queue.enqueue_url("https://youtu.be/dQw4w9WgXcQ".to_string());
        queue.run_until_drained(|_| {}).await;

        let job = queue.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 0);
        assert_eq!(job.transcript, None);
        let message = job.error.as_deref().unwrap();
        assert!(message.contains("network down"), "got: {message}");
        assert!(queue.library().items().is_empty());
    }

    #[tokio::test]
    async fn missing_key_fails_the_job_and_pauses_the_queue() {
        let mut queue = queue(
            MockCaptionSource::new(),
            MockTranscriber::new(),
            MockMetadataSource::new(),
            "",
            Concurrency::Auto,
        );
        let first = queue.enqueue_file(payload("a.mp3"));
        let second = queue.enqueue_file(payload("b.mp3"));

        queue.run_until_drained(|_| {}).await;

        assert!(queue.is_paused());
        let first = queue.job(first).unwrap();
        assert_eq!(first.status, JobStatus::Error);
        assert!(first.error.as_deref().unwrap().contains("no transcription API key"));
        // The pause keeps the rest of the queue from failing the same way
        assert_eq!(queue.job(second).unwrap().status, JobStatus::Idle);
    }

    #[tokio::test]
    async fn retry_resets_the_job_and_resumes_the_queue() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_fetch_transcript()
            .returning(|_, _| Err(anyhow::anyhow!("instance unreachable")));
        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_metadata()
            .returning(|_| Ok(VideoMetadata::synthetic("dQw4w9WgXcQ")));

        let mut queue = queue(
            captions,
            MockTranscriber::new(),
            metadata,
            "key",
            Concurrency::Auto,
        );
        let id = queue.enqueue_url("https://youtu.be/dQw4w9WgXcQ".to_string());
        queue.run_until_drained(|_| {}).await;
        assert_eq!(queue.job(id).unwrap().status, JobStatus::Error);

        queue.pause();
        queue.retry(id);

        let job = queue.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Idle);
        assert_eq!(job.error, None);
        assert_eq!(job.transcript, None);
        assert_eq!(job.progress, 0);
        assert!(!queue.is_paused());
    }

    #[tokio::test]
    async fn retry_ignores_jobs_that_did_not_fail() {
        let mut queue = queue(
            MockCaptionSource::new(),
            MockTranscriber::new(),
            MockMetadataSource::new(),
            "key",
            Concurrency::Auto,
        );
        let id = queue.enqueue_file(payload("a.mp3"));
        queue.pause();
        queue.retry(id);
        assert_eq!(queue.job(id).unwrap().status, JobStatus::Idle);
        // Nothing was retried, so the explicit pause stands
        assert!(queue.is_paused());
    }

    #[tokio::test]
    async fn late_title_arrival_is_reflected_in_the_library_entry() {
        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_metadata()
            .returning(|_| Ok(VideoMetadata::synthetic("dQw4w9WgXcQ")));
        let mut queue = queue(
            MockCaptionSource::new(),
            MockTranscriber::new(),
            metadata,
            "key",
            Concurrency::Auto,
        );
        let id = queue.enqueue_url("https://youtu.be/dQw4w9WgXcQ".to_string());
        assert_eq!(queue.job(id).unwrap().display_name, "https://youtu.be/dQw4w9WgXcQ");

        queue.apply_event(JobEvent::Metadata {
            id,
            title: "Never Gonna Give You Up".to_string(),
            thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string()),
        });
        queue.apply_event(JobEvent::Finished {
            id,
            outcome: Ok("refined text".to_string()),
        });

        assert_eq!(queue.job(id).unwrap().display_name, "Never Gonna Give You Up");
        assert_eq!(queue.library().items()[0].file_name, "Never Gonna Give You Up");
    }

    #[tokio::test]
    async fn results_for_removed_jobs_are_discarded() {
        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_metadata()
            .returning(|_| Ok(VideoMetadata::synthetic("dQw4w9WgXcQ")));
        let mut queue = queue(
            MockCaptionSource::new(),
            MockTranscriber::new(),
            metadata,
            "key",
            Concurrency::Auto,
        );
        let id = queue.enqueue_url("https://youtu.be/dQw4w9WgXcQ".to_string());
        queue.remove(id);

        queue.apply_event(JobEvent::Finished {
            id,
            outcome: Ok("too late".to_string()),
        });

        assert!(queue.jobs().is_empty());
        assert!(queue.library().items().is_empty());
    }

    #[tokio::test]
    async fn paused_queue_admits_nothing() {
        let mut queue = queue(
            MockCaptionSource::new(),
            MockTranscriber::new(),
            MockMetadataSource::new(),
            "key",
            Concurrency::Auto,
        );
        queue.enqueue_file(payload("a.mp3"));
        queue.pause();
        queue.schedule();
        assert_eq!(queue.active_count(), 0);

        queue.run_until_drained(|_| {}).await;
        assert_eq!(queue.jobs()[0].status, JobStatus::Idle);
    }
}
