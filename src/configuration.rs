//! Pipeline configuration.
//!
//! [`PipelineOptions`] carries the operational settings of a
//! [`Pipeline`](crate::Pipeline): where uploads are reassembled, how large
//! chunks and uploads may be, how previews are rendered, and the
//! [`AnalysisOptions`] that tune frame sampling and selection.
//!
//! # Example
//!
//! ```no_run
//! use framepick::{AnalysisOptions, PipelineOptions};
//!
//! let options = PipelineOptions::new("/var/lib/framepick/uploads")
//!     .with_chunk_size(8 * 1024 * 1024)
//!     .with_preview_width(640)
//!     .with_analysis(AnalysisOptions::new().with_min_spacing(120));
//! ```

use std::path::{Path, PathBuf};

/// Default size of one upload chunk (5 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Default upper bound for a single upload (10 GiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Target sample counts keyed by the longest video duration (seconds) they
/// apply to. Videos longer than the last bound use [`DEFAULT_LONG_VIDEO_SAMPLES`].
pub const DEFAULT_SAMPLE_SCHEDULE: [(f64, u64); 4] =
    [(300.0, 500), (1800.0, 400), (7200.0, 300), (14400.0, 250)];

/// Target sample count for videos beyond the sample schedule.
pub const DEFAULT_LONG_VIDEO_SAMPLES: u64 = 200;

/// Settings for the frame quality analyzer.
///
/// The defaults bound analysis of a multi-hour video to a few hundred
/// decoded frames while sampling every frame of short clips.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Width (pixels) frames are downscaled to before scoring.
    pub analysis_width: u32,
    /// `(max_duration_seconds, target_samples)` pairs, ascending by duration.
    pub sample_schedule: Vec<(f64, u64)>,
    /// Target sample count for videos longer than every schedule entry.
    pub long_video_samples: u64,
    /// Seconds skipped at the start and end of videos that are at least
    /// [`edge_margin_min_duration`](AnalysisOptions::edge_margin_min_duration)
    /// long.
    pub edge_margin_seconds: f64,
    /// Shortest video (seconds) for which the edge margin applies.
    pub edge_margin_min_duration: f64,
    /// Fixed minimum distance (frames) between selected frames. `None`
    /// derives it from the frame count and the number of frames requested.
    pub min_spacing_frames: Option<u64>,
    /// Lower bound (seconds) for the derived spacing between selected frames.
    /// Ignored when [`min_spacing_frames`](AnalysisOptions::min_spacing_frames)
    /// is set.
    pub min_spacing_seconds: f64,
    /// Lower bound (seconds) for the stride between sampled frames.
    pub min_sample_interval_seconds: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analysis_width: 320,
            sample_schedule: DEFAULT_SAMPLE_SCHEDULE.to_vec(),
            long_video_samples: DEFAULT_LONG_VIDEO_SAMPLES,
            edge_margin_seconds: 5.0,
            edge_margin_min_duration: 60.0,
            min_spacing_frames: None,
            min_spacing_seconds: 0.0,
            min_sample_interval_seconds: 0.0,
        }
    }
}

impl AnalysisOptions {
    /// Create analysis options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the width frames are downscaled to before scoring.
    ///
    /// Clamped to a minimum of 16 pixels.
    #[must_use]
    pub fn with_analysis_width(mut self, width: u32) -> Self {
        self.analysis_width = width.max(16);
        self
    }

    /// Replace the duration-based sample schedule.
    #[must_use]
    pub fn with_sample_schedule(mut self, schedule: Vec<(f64, u64)>, long_video_samples: u64) -> Self {
        self.sample_schedule = schedule;
        self.long_video_samples = long_video_samples.max(1);
        self
    }

    /// Set the intro/outro margin skipped during sampling.
    #[must_use]
    pub fn with_edge_margin(mut self, seconds: f64) -> Self {
        self.edge_margin_seconds = seconds.max(0.0);
        self
    }

    /// Use a fixed minimum spacing (in frames) between selected frames.
    #[must_use]
    pub fn with_min_spacing(mut self, frames: u64) -> Self {
        self.min_spacing_frames = Some(frames);
        self
    }

    /// Keep derived spacing between selected frames at least `seconds` long.
    #[must_use]
    pub fn with_min_spacing_seconds(mut self, seconds: f64) -> Self {
        self.min_spacing_seconds = seconds.max(0.0);
        self
    }

    /// Never sample frames closer than `seconds` apart.
    #[must_use]
    pub fn with_min_sample_interval(mut self, seconds: f64) -> Self {
        self.min_sample_interval_seconds = seconds.max(0.0);
        self
    }

    /// Minimum spacing (frames) between selected frames of a video.
    pub(crate) fn selection_spacing(&self, frame_count: u64, fps: f64, num_frames: usize) -> u64 {
        self.min_spacing_frames.unwrap_or_else(|| {
            let floor = (self.min_spacing_seconds * fps).round() as u64;
            crate::analysis::default_spacing(frame_count, num_frames).max(floor)
        })
    }

    /// Target number of samples for a video of the given duration.
    pub(crate) fn target_samples(&self, duration_seconds: f64) -> u64 {
        self.sample_schedule
            .iter()
            .find(|(max_duration, _)| duration_seconds <= *max_duration)
            .map(|(_, samples)| *samples)
            .unwrap_or(self.long_video_samples)
            .max(1)
    }
}

/// Configuration for a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory under which each job gets its own upload directory.
    pub(crate) upload_root: PathBuf,
    /// Size of one upload chunk in bytes.
    pub(crate) chunk_size: u64,
    /// Largest upload accepted by [`init_upload`](crate::Pipeline::init_upload).
    pub(crate) max_upload_size: u64,
    /// Maximum width of preview frames.
    pub(crate) preview_width: u32,
    /// JPEG quality of preview frames.
    pub(crate) preview_quality: u8,
    /// Frame analysis settings.
    pub(crate) analysis: AnalysisOptions,
}

impl PipelineOptions {
    /// Create options that reassemble uploads under `upload_root`.
    ///
    /// Defaults: 5 MiB chunks, 10 GiB maximum upload, 800 px previews at JPEG
    /// quality 85, default [`AnalysisOptions`].
    pub fn new<P: AsRef<Path>>(upload_root: P) -> Self {
        Self {
            upload_root: upload_root.as_ref().to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            preview_width: 800,
            preview_quality: 85,
            analysis: AnalysisOptions::default(),
        }
    }

    /// Set the upload chunk size. Clamped to a minimum of 1 byte.
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Set the largest accepted upload.
    #[must_use]
    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    /// Set the maximum preview width. Clamped to a minimum of 1 pixel.
    #[must_use]
    pub fn with_preview_width(mut self, width: u32) -> Self {
        self.preview_width = width.max(1);
        self
    }

    /// Set the preview JPEG quality. Clamped to `1..=100`.
    #[must_use]
    pub fn with_preview_quality(mut self, quality: u8) -> Self {
        self.preview_quality = quality.clamp(1, 100);
        self
    }

    /// Set the frame analysis settings.
    #[must_use]
    pub fn with_analysis(mut self, analysis: AnalysisOptions) -> Self {
        self.analysis = analysis;
        self
    }

    /// The configured upload root.
    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    /// The configured chunk size.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// The configured analysis settings.
    pub fn analysis(&self) -> &AnalysisOptions {
        &self.analysis
    }
}
