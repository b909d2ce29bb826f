//! The pipeline facade.
//!
//! [`Pipeline`] owns the job registry and the collaborators (video opener,
//! face detector, profile table) and exposes every operation a transport
//! layer needs: chunked upload, metadata, preview, analysis and export.
//!
//! # Example
//!
//! ```no_run
//! use framepick::{AnalysisRequest, AnalysisStatus, ExportRequest, FramePickError, Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::new("/tmp/framepick"));
//! let job_id = pipeline.register_video("episode_12.mp4")?;
//!
//! let run = pipeline.start_analysis(&job_id, &AnalysisRequest::new(5, "podcast"))?;
//! run.wait();
//!
//! if let AnalysisStatus::Analyzed { frames } = pipeline.analysis_status(&job_id)? {
//!     let selection = frames.iter().map(|frame| frame.frame_number).collect();
//!     let archive = pipeline.export(&job_id, &ExportRequest::new(selection).with_format("jpg"))?;
//!     std::fs::write("stills.zip", archive)?;
//! }
//! # Ok::<(), FramePickError>(())
//! ```

use std::{
    fs,
    io::ErrorKind,
    path::Path,
    sync::Arc,
    thread::JoinHandle,
};

use image::RgbImage;

use crate::{
    analysis::{AnalysisRequest, AnalysisRun, AnalysisStatus, FrameCandidate, score_single_frame, spawn_analysis},
    configuration::PipelineOptions,
    encode::ImageFormat,
    error::FramePickError,
    export::{ExportRequest, export_frames},
    ffmpeg::FfmpegOpener,
    job::{Job, JobRegistry, JobState},
    metadata::VideoInfo,
    profile::{ProfileTable, ProjectProfile},
    progress::{NoOpProgress, ProgressCallback},
    scoring::FaceDetector,
    upload::{ChunkAck, UploadManager, UploadStatus, UploadTicket},
    video::{VideoOpener, render_preview},
};

/// A started analysis run.
#[derive(Debug)]
pub struct AnalysisHandle {
    job_id: String,
    handle: JoinHandle<()>,
}

impl AnalysisHandle {
    /// The job being analyzed.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Block until the worker thread exits.
    ///
    /// The outcome is read through
    /// [`Pipeline::analysis_status`]; a superseded run exits without
    /// recording anything.
    pub fn wait(self) {
        if self.handle.join().is_err() {
            log::warn!("Analysis worker for job {} panicked", self.job_id);
        }
    }
}

/// Entry point of the frame-selection pipeline.
pub struct Pipeline {
    options: PipelineOptions,
    registry: JobRegistry,
    uploads: UploadManager,
    opener: Arc<dyn VideoOpener>,
    detector: Option<Arc<dyn FaceDetector>>,
    profiles: ProfileTable,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("jobs", &self.registry.len())
            .field("face_detector", &self.detector.is_some())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// A pipeline decoding with FFmpeg, without face detection, using the
    /// built-in profiles.
    pub fn new(options: PipelineOptions) -> Self {
        let opener: Arc<dyn VideoOpener> = Arc::new(FfmpegOpener);
        let uploads = UploadManager::new(
            options.upload_root.clone(),
            options.chunk_size,
            options.max_upload_size,
            Arc::clone(&opener),
        );
        Self {
            options,
            registry: JobRegistry::new(),
            uploads,
            opener,
            detector: None,
            profiles: ProfileTable::builtin(),
        }
    }

    /// Replace the video opener.
    #[must_use]
    pub fn with_video_opener(mut self, opener: Arc<dyn VideoOpener>) -> Self {
        self.uploads.set_opener(Arc::clone(&opener));
        self.opener = opener;
        self
    }

    /// Use `detector` for the face sub-score.
    #[must_use]
    pub fn with_face_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Replace the profile table.
    #[must_use]
    pub fn with_profiles(mut self, profiles: ProfileTable) -> Self {
        self.profiles = profiles;
        self
    }

    /// The configuration this pipeline was built with.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The job registry.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    // ── Upload ─────────────────────────────────────────────────────────

    /// Start a chunked upload.
    pub fn init_upload(&self, filename: &str, total_size: i64) -> Result<UploadTicket, FramePickError> {
        self.uploads.init(&self.registry, filename, total_size)
    }

    /// Deliver one chunk.
    pub fn put_chunk(
        &self,
        job_id: &str,
        chunk_index: u64,
        total_chunks: u64,
        data: &[u8],
    ) -> Result<ChunkAck, FramePickError> {
        self.uploads.put_chunk(&self.registry, job_id, chunk_index, total_chunks, data)
    }

    /// Upload progress, `None` for local jobs.
    pub fn upload_status(&self, job_id: &str) -> Result<Option<UploadStatus>, FramePickError> {
        self.uploads.status(&self.registry, job_id)
    }

    /// Register a video that is already on disk as a ready job.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnreadableVideo`] if the file cannot be opened as
    /// a video.
    pub fn register_video<P: AsRef<Path>>(&self, path: P) -> Result<String, FramePickError> {
        let path = path.as_ref().to_path_buf();
        let video = self.opener.open(&path)?;
        let job_id = JobRegistry::new_id();
        log::info!("Registered {} as job {}", path.display(), job_id);
        self.registry.insert(Job::ready(job_id.clone(), path, video));
        Ok(job_id)
    }

    // ── Video ──────────────────────────────────────────────────────────

    /// Metadata of the job's video.
    pub fn video_info(&self, job_id: &str) -> Result<VideoInfo, FramePickError> {
        let job = self.registry.get(job_id)?;
        Ok(VideoInfo::from(&job.metadata()?))
    }

    /// Decode one frame at full resolution.
    pub fn frame(&self, job_id: &str, frame_number: u64) -> Result<RgbImage, FramePickError> {
        self.registry.get(job_id)?.video()?.frame(frame_number)
    }

    /// A JPEG preview of one frame, at most
    /// [`preview_width`](PipelineOptions::with_preview_width) pixels wide.
    pub fn preview(&self, job_id: &str, frame_number: u64) -> Result<Vec<u8>, FramePickError> {
        let video = self.registry.get(job_id)?.video()?;
        render_preview(
            video.as_ref(),
            frame_number,
            self.options.preview_width,
            self.options.preview_quality,
        )
    }

    // ── Analysis ───────────────────────────────────────────────────────

    /// Start an analysis run in the background, superseding any run in
    /// progress for the same job.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnknownJob`], [`FramePickError::VideoNotReady`],
    /// [`FramePickError::InvalidFrameCount`] for `num_frames == 0`.
    pub fn start_analysis(&self, job_id: &str, request: &AnalysisRequest) -> Result<AnalysisHandle, FramePickError> {
        self.start_analysis_with_progress(job_id, request, Arc::new(NoOpProgress))
    }

    /// [`start_analysis`](Pipeline::start_analysis) with a progress observer.
    pub fn start_analysis_with_progress(
        &self,
        job_id: &str,
        request: &AnalysisRequest,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<AnalysisHandle, FramePickError> {
        let job = self.registry.get(job_id)?;
        if request.num_frames == 0 {
            return Err(FramePickError::InvalidFrameCount);
        }
        let profile = self.profiles.resolve(&request.project_type).clone();
        let start = job.begin_analysis()?;
        log::info!(
            "Starting analysis run {} of job {} ({} frames, profile '{}')",
            start.generation,
            job_id,
            request.num_frames,
            profile.id
        );

        let run = AnalysisRun {
            generation: start.generation,
            token: start.token,
            source: start.source,
            video_path: start.video_path,
            profile,
            num_frames: request.num_frames,
            options: self.options.analysis.clone(),
            detector: self.detector.clone(),
            progress,
        };
        let generation = run.generation;
        let handle = spawn_analysis(Arc::clone(&job), run).inspect_err(|error| {
            job.fail_analysis(generation, error.to_string());
        })?;

        Ok(AnalysisHandle {
            job_id: job_id.to_string(),
            handle,
        })
    }

    /// Score a frame the client picked while scrubbing.
    ///
    /// Runs synchronously on the caller's thread and leaves the job's
    /// analysis state untouched. The result has `is_manual` set.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnknownJob`], [`FramePickError::VideoNotReady`],
    /// [`FramePickError::FrameOutOfRange`].
    pub fn score_frame(&self, job_id: &str, frame_number: u64, project_type: &str) -> Result<FrameCandidate, FramePickError> {
        let video = self.registry.get(job_id)?.video()?;
        let profile = self.profiles.resolve(project_type);
        score_single_frame(
            video.as_ref(),
            frame_number,
            profile,
            &self.options.analysis,
            self.detector.as_deref(),
        )
    }

    /// Non-blocking analysis status.
    pub fn analysis_status(&self, job_id: &str) -> Result<AnalysisStatus, FramePickError> {
        Ok(self.registry.get(job_id)?.analysis_status())
    }

    // ── Export ─────────────────────────────────────────────────────────

    /// Render the requested frames into a ZIP archive.
    pub fn export(&self, job_id: &str, request: &ExportRequest) -> Result<Vec<u8>, FramePickError> {
        self.export_with_progress(job_id, request, Arc::new(NoOpProgress))
    }

    /// [`export`](Pipeline::export) with a progress observer.
    pub fn export_with_progress(
        &self,
        job_id: &str,
        request: &ExportRequest,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<Vec<u8>, FramePickError> {
        let video = self.registry.get(job_id)?.video()?;
        export_frames(video.as_ref(), request, progress)
    }

    // ── Jobs ───────────────────────────────────────────────────────────

    /// Lifecycle state of a job.
    pub fn job_state(&self, job_id: &str) -> Result<JobState, FramePickError> {
        Ok(self.registry.get(job_id)?.state())
    }

    /// Remove a job, stopping its analysis and deleting the upload directory
    /// it created. Local files passed to
    /// [`register_video`](Pipeline::register_video) are left alone.
    pub fn remove_job(&self, job_id: &str) -> Result<(), FramePickError> {
        let job = self
            .registry
            .remove(job_id)
            .ok_or_else(|| FramePickError::UnknownJob(job_id.to_string()))?;
        job.shut_down();
        if let Some(directory) = job.owned_directory() {
            match fs::remove_dir_all(directory) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }
        log::info!("Removed job {job_id}");
        Ok(())
    }

    /// Available project profiles.
    pub fn profiles(&self) -> &[ProjectProfile] {
        self.profiles.profiles()
    }

    /// Supported export formats.
    pub fn formats(&self) -> &'static [ImageFormat] {
        &ImageFormat::ALL
    }
}

#[cfg(feature = "async")]
impl Pipeline {
    /// [`export`](Pipeline::export) on tokio's blocking pool.
    pub async fn export_async(self: &Arc<Self>, job_id: &str, request: ExportRequest) -> Result<Vec<u8>, FramePickError> {
        let pipeline = Arc::clone(self);
        let job_id = job_id.to_string();
        join_blocking(tokio::task::spawn_blocking(move || pipeline.export(&job_id, &request))).await
    }

    /// [`preview`](Pipeline::preview) on tokio's blocking pool.
    pub async fn preview_async(self: &Arc<Self>, job_id: &str, frame_number: u64) -> Result<Vec<u8>, FramePickError> {
        let pipeline = Arc::clone(self);
        let job_id = job_id.to_string();
        join_blocking(tokio::task::spawn_blocking(move || pipeline.preview(&job_id, frame_number))).await
    }
}

#[cfg(feature = "async")]
async fn join_blocking<T>(
    handle: tokio::task::JoinHandle<Result<T, FramePickError>>,
) -> Result<T, FramePickError> {
    match handle.await {
        Ok(result) => result,
        Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
        Err(_) => Err(FramePickError::Cancelled),
    }
}
