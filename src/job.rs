//! Jobs and the job registry.
//!
//! A [`Job`] threads one video through upload, indexing, analysis and export.
//! Its mutable state sits behind a single [`RwLock`]: pollers take read
//! locks, and upload finalization and analysis workers take brief write
//! locks.
//!
//! The [`JobRegistry`] owns every job. It is an explicit value held by the
//! [`Pipeline`](crate::Pipeline) rather than a process-wide global.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::Serialize;

use crate::{
    analysis::{AnalysisStatus, FrameCandidate},
    error::FramePickError,
    metadata::VideoMetadata,
    progress::CancellationToken,
    upload::UploadSession,
    video::FrameSource,
};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Chunks are still arriving.
    Uploading,
    /// The video is indexed and can be previewed, analyzed and exported.
    Ready,
    /// An analysis run is in progress.
    Analyzing,
    /// The last analysis run finished.
    Analyzed,
    /// The upload or the last analysis run failed.
    Error,
}

struct JobInner {
    state: JobState,
    video_path: Option<PathBuf>,
    video: Option<Arc<dyn FrameSource>>,
    generation: u64,
    cancel: Option<CancellationToken>,
    progress: (u64, u64),
    ranked_frames: Vec<FrameCandidate>,
    error: Option<String>,
}

/// One video's journey through the pipeline.
pub struct Job {
    id: String,
    upload: Option<UploadSession>,
    owned_directory: Option<PathBuf>,
    inner: RwLock<JobInner>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("video_path", &inner.video_path)
            .field("generation", &inner.generation)
            .finish_non_exhaustive()
    }
}

/// A started analysis run as seen from the job.
pub(crate) struct RunStart {
    pub(crate) generation: u64,
    pub(crate) token: CancellationToken,
    pub(crate) source: Arc<dyn FrameSource>,
    pub(crate) video_path: PathBuf,
}

impl Job {
    /// A job receiving a chunked upload into `directory`.
    pub(crate) fn uploading(id: String, upload: UploadSession, directory: PathBuf) -> Self {
        Self {
            id,
            upload: Some(upload),
            owned_directory: Some(directory),
            inner: RwLock::new(JobInner::new(JobState::Uploading, None, None)),
        }
    }

    /// A job for a video that is already on disk and indexed.
    pub(crate) fn ready(id: String, video_path: PathBuf, video: Arc<dyn FrameSource>) -> Self {
        Self {
            id,
            upload: None,
            owned_directory: None,
            inner: RwLock::new(JobInner::new(JobState::Ready, Some(video_path), Some(video))),
        }
    }

    /// The job identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.inner.read().state
    }

    /// The upload session, for jobs created through a chunked upload.
    pub(crate) fn upload(&self) -> Option<&UploadSession> {
        self.upload.as_ref()
    }

    /// Directory the job created and removes with itself.
    pub(crate) fn owned_directory(&self) -> Option<&Path> {
        self.owned_directory.as_deref()
    }

    /// The indexed video.
    ///
    /// # Errors
    ///
    /// [`FramePickError::VideoNotReady`] while uploading or after a failed
    /// upload.
    pub fn video(&self) -> Result<Arc<dyn FrameSource>, FramePickError> {
        self.inner
            .read()
            .video
            .clone()
            .ok_or_else(|| FramePickError::VideoNotReady(self.id.clone()))
    }

    /// Metadata of the indexed video.
    pub fn metadata(&self) -> Result<VideoMetadata, FramePickError> {
        Ok(self.video()?.metadata().clone())
    }

    /// Path of the finalized video, once known.
    pub fn video_path(&self) -> Option<PathBuf> {
        self.inner.read().video_path.clone()
    }

    /// The failure recorded when the job is in [`JobState::Error`].
    pub fn error(&self) -> Option<String> {
        self.inner.read().error.clone()
    }

    /// Analysis status for pollers.
    pub fn analysis_status(&self) -> AnalysisStatus {
        let inner = self.inner.read();
        match inner.state {
            JobState::Analyzing => AnalysisStatus::Analyzing {
                progress: inner.progress.0,
                total: inner.progress.1,
            },
            JobState::Analyzed => AnalysisStatus::Analyzed {
                frames: inner.ranked_frames.clone(),
            },
            JobState::Error => AnalysisStatus::Error {
                error: inner.error.clone().unwrap_or_default(),
            },
            JobState::Uploading | JobState::Ready => AnalysisStatus::Idle,
        }
    }

    /// Record a finished upload.
    pub(crate) fn mark_ready(&self, video_path: PathBuf, video: Arc<dyn FrameSource>) {
        let mut inner = self.inner.write();
        inner.state = JobState::Ready;
        inner.video_path = Some(video_path);
        inner.video = Some(video);
        inner.error = None;
    }

    /// Record a failed upload.
    pub(crate) fn mark_failed(&self, message: String) {
        let mut inner = self.inner.write();
        inner.state = JobState::Error;
        inner.error = Some(message);
    }

    /// Supersede any running analysis and start a new run.
    pub(crate) fn begin_analysis(&self) -> Result<RunStart, FramePickError> {
        let mut inner = self.inner.write();
        let (Some(source), Some(video_path)) = (inner.video.clone(), inner.video_path.clone()) else {
            return Err(FramePickError::VideoNotReady(self.id.clone()));
        };

        if let Some(previous) = inner.cancel.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        inner.generation += 1;
        inner.cancel = Some(token.clone());
        inner.state = JobState::Analyzing;
        inner.progress = (0, 0);
        inner.ranked_frames.clear();
        inner.error = None;

        Ok(RunStart {
            generation: inner.generation,
            token,
            source,
            video_path,
        })
    }

    /// Store progress of run `generation`. Returns `false` if the run has
    /// been superseded.
    pub(crate) fn record_progress(&self, generation: u64, processed: u64, total: u64) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.progress = (processed.max(inner.progress.0).min(total), total);
        true
    }

    /// Store the result of run `generation`. Returns `false` if the run has
    /// been superseded.
    pub(crate) fn complete_analysis(&self, generation: u64, frames: Vec<FrameCandidate>) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.state = JobState::Analyzed;
        inner.ranked_frames = frames;
        inner.cancel = None;
        true
    }

    /// Store the failure of run `generation`. Returns `false` if the run has
    /// been superseded.
    pub(crate) fn fail_analysis(&self, generation: u64, message: String) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.state = JobState::Error;
        inner.error = Some(message);
        inner.cancel = None;
        true
    }

    /// Cancel any running analysis and prevent its writes.
    pub(crate) fn shut_down(&self) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
    }
}

impl JobInner {
    fn new(state: JobState, video_path: Option<PathBuf>, video: Option<Arc<dyn FrameSource>>) -> Self {
        Self {
            state,
            video_path,
            video,
            generation: 0,
            cancel: None,
            progress: (0, 0),
            ranked_frames: Vec::new(),
            error: None,
        }
    }
}

/// Concurrent map of job id to job.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<Job>>>,
}

impl JobRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh UUID v4 job identifier.
    pub(crate) fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub(crate) fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        self.jobs.write().insert(job.id.clone(), Arc::clone(&job));
        job
    }

    /// Look up a job.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnknownJob`] if no job has this id.
    pub fn get(&self, id: &str) -> Result<Arc<Job>, FramePickError> {
        self.jobs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| FramePickError::UnknownJob(id.to_string()))
    }

    pub(crate) fn remove(&self, id: &str) -> Option<Arc<Job>> {
        self.jobs.write().remove(id)
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Whether no jobs are registered.
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Ids of all registered jobs, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
