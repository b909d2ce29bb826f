//! Frame quality analysis.
//!
//! An analysis run samples frames across the video, measures each sample
//! (faces, sharpness, frame-to-frame stability), combines the measurements
//! under a [`ProjectProfile`], and keeps the best frames that are at least a
//! minimum distance apart.
//!
//! Runs execute on a dedicated worker thread. Every write the worker makes to
//! its job goes through a generation check, so a superseded run can finish
//! decoding in the background without ever touching the job again.

use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Path, PathBuf},
    sync::Arc,
    thread::JoinHandle,
};

use serde::{Deserialize, Serialize};

use crate::{
    configuration::AnalysisOptions,
    conversion::frame_number_to_seconds,
    error::FramePickError,
    job::Job,
    metadata::VideoMetadata,
    profile::ProjectProfile,
    progress::{CancellationToken, OperationType, ProgressCallback, ProgressTracker},
    scoring::{
        FaceDetector, SampleMeasurement, absolute_sharpness, measure_frame, prepare_gray, stability_from_difference,
    },
    video::FrameSource,
};

/// Number of frames selected when a request does not say.
pub const DEFAULT_NUM_FRAMES: usize = 5;

fn default_num_frames() -> usize {
    DEFAULT_NUM_FRAMES
}

fn default_project_type() -> String {
    "podcast".to_string()
}

/// Parameters of an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// How many frames to select.
    #[serde(default = "default_num_frames")]
    pub num_frames: usize,
    /// Profile id, e.g. `"interview"`.
    #[serde(default = "default_project_type")]
    pub project_type: String,
}

impl AnalysisRequest {
    /// Select `num_frames` frames under `project_type`.
    pub fn new(num_frames: usize, project_type: impl Into<String>) -> Self {
        Self {
            num_frames,
            project_type: project_type.into(),
        }
    }
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_FRAMES, default_project_type())
    }
}

/// A scored frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameCandidate {
    /// 0-based frame number.
    pub frame_number: u64,
    /// Offset of the frame in seconds.
    pub timestamp_seconds: f64,
    /// Composite score.
    pub score: f64,
    /// Face sub-score in `[0, 1]`.
    pub face_score: f64,
    /// Sharpness normalized across the sampled set, `[0, 1]`.
    pub sharpness_score: f64,
    /// Stability relative to neighbouring samples, `[0, 1]`.
    pub stability_score: f64,
    /// Scored on request for a frame the client picked, rather than by an
    /// analysis run.
    pub is_manual: bool,
}

/// What a poller sees of a job's analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// No analysis has been started.
    Idle,
    /// A run is in progress.
    Analyzing {
        /// Samples processed so far.
        progress: u64,
        /// Samples planned. Zero until the plan is known.
        total: u64,
    },
    /// The last run finished.
    Analyzed {
        /// Selected frames, best first.
        frames: Vec<FrameCandidate>,
    },
    /// The last run failed.
    Error {
        /// Failure message.
        error: String,
    },
}

/// The frames a run will sample, in ascending order.
///
/// Videos of at least
/// [`edge_margin_min_duration`](AnalysisOptions::edge_margin_min_duration)
/// seconds skip the configured margin at both ends. Within the remaining
/// range every frame is sampled if there are no more than the target count,
/// otherwise frames are taken at a fixed stride, never shorter than
/// [`min_sample_interval_seconds`](AnalysisOptions::min_sample_interval_seconds).
pub fn sample_plan(metadata: &VideoMetadata, options: &AnalysisOptions) -> Vec<u64> {
    let frame_count = metadata.frame_count;
    let duration = metadata.duration_seconds();

    let (start, end) = if duration >= options.edge_margin_min_duration && options.edge_margin_seconds > 0.0 {
        let margin = (options.edge_margin_seconds * metadata.fps).round() as u64;
        if margin.saturating_mul(2) < frame_count {
            (margin, frame_count - margin)
        } else {
            (0, frame_count)
        }
    } else {
        (0, frame_count)
    };

    let span = end - start;
    let target = options.target_samples(duration);
    let interval_floor = (options.min_sample_interval_seconds * metadata.fps).round() as u64;
    if span <= target && interval_floor <= 1 {
        return (start..end).collect();
    }
    let stride = (span / target).max(interval_floor).max(1);
    (0..target).map(|index| start + index * stride).filter(|frame| *frame < end).collect()
}

/// Default minimum distance between selected frames.
pub fn default_spacing(frame_count: u64, num_frames: usize) -> u64 {
    let divisor = (num_frames as u64).saturating_mul(2).max(1);
    (frame_count / divisor).max(1)
}

/// Turn raw measurements into ranked candidates.
///
/// Sharpness is min–max normalized across all measurements, so scores are
/// relative to the rest of the video. The result is sorted by descending
/// score with ties broken by ascending frame number.
pub(crate) fn score_measurements(
    measurements: &[SampleMeasurement],
    fps: f64,
    profile: &ProjectProfile,
    detector_available: bool,
) -> Vec<FrameCandidate> {
    let (min_raw, max_raw) = measurements.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), m| {
        (low.min(m.raw_sharpness), high.max(m.raw_sharpness))
    });
    let range = max_raw - min_raw;

    let mut candidates: Vec<(FrameCandidate, bool)> = measurements
        .iter()
        .enumerate()
        .map(|(index, measurement)| {
            let sharpness_score = if range > f64::EPSILON {
                (measurement.raw_sharpness - min_raw) / range
            } else if max_raw > 0.0 {
                1.0
            } else {
                0.0
            };

            let mut neighbours = Vec::with_capacity(2);
            if let Some(difference) = measurement.difference_to_previous {
                neighbours.push(stability_from_difference(difference));
            }
            if let Some(difference) = measurements.get(index + 1).and_then(|next| next.difference_to_previous) {
                neighbours.push(stability_from_difference(difference));
            }
            let stability_score = if neighbours.is_empty() {
                1.0
            } else {
                neighbours.iter().sum::<f64>() / neighbours.len() as f64
            };

            let score = composite_score(
                profile,
                measurement.face_score,
                sharpness_score,
                stability_score,
                detector_available && !measurement.faces_found,
            );

            let candidate = FrameCandidate {
                frame_number: measurement.frame_number,
                timestamp_seconds: frame_number_to_seconds(measurement.frame_number, fps),
                score,
                face_score: measurement.face_score,
                sharpness_score,
                stability_score,
                is_manual: false,
            };
            let sharp_enough = sharpness_score >= profile.min_sharpness;
            (candidate, sharp_enough)
        })
        .collect();

    if candidates.iter().any(|(_, sharp_enough)| *sharp_enough) {
        candidates.retain(|(_, sharp_enough)| *sharp_enough);
    }

    let mut ranked: Vec<FrameCandidate> = candidates.into_iter().map(|(candidate, _)| candidate).collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.frame_number.cmp(&b.frame_number)));
    ranked
}

/// Weighted sum of the sub-scores, halved when `profile` requires faces and
/// a detector found none.
fn composite_score(profile: &ProjectProfile, face: f64, sharpness: f64, stability: f64, faceless: bool) -> f64 {
    let (face_weight, sharpness_weight, stability_weight) = profile.normalized_weights();
    let score = face * face_weight + sharpness * sharpness_weight + stability * stability_weight;
    if profile.require_faces && faceless {
        score * 0.5
    } else {
        score
    }
}

/// Score a single frame picked by the client.
///
/// Sharpness uses the absolute scale of [`absolute_sharpness`] since there
/// is no sampled set to normalize against. Stability compares the frame with
/// the next one (the previous one for the last frame) and is 1.0 when no
/// neighbour can be decoded.
///
/// # Errors
///
/// [`FramePickError::FrameOutOfRange`] and decode errors of the frame itself.
pub(crate) fn score_single_frame(
    source: &dyn FrameSource,
    frame_number: u64,
    profile: &ProjectProfile,
    options: &AnalysisOptions,
    detector: Option<&dyn FaceDetector>,
) -> Result<FrameCandidate, FramePickError> {
    let frame = source.frame(frame_number)?;
    let metadata = source.metadata();
    let neighbour_number = if frame_number + 1 < metadata.frame_count {
        Some(frame_number + 1)
    } else {
        frame_number.checked_sub(1)
    };
    let neighbour = neighbour_number.and_then(|number| source.frame(number).ok());
    let neighbour_gray = neighbour.map(|neighbour| prepare_gray(&neighbour, options.analysis_width));

    let (measurement, _) =
        measure_frame(frame_number, &frame, options.analysis_width, detector, neighbour_gray.as_ref());
    let sharpness_score = absolute_sharpness(measurement.raw_sharpness);
    let stability_score = measurement.difference_to_previous.map_or(1.0, stability_from_difference);
    let score = composite_score(
        profile,
        measurement.face_score,
        sharpness_score,
        stability_score,
        detector.is_some() && !measurement.faces_found,
    );
    log::debug!("Scored frame {frame_number} on request: {score:.3}");

    Ok(FrameCandidate {
        frame_number,
        timestamp_seconds: frame_number_to_seconds(frame_number, metadata.fps),
        score,
        face_score: measurement.face_score,
        sharpness_score,
        stability_score,
        is_manual: true,
    })
}

/// Greedily keep the best candidates that are at least `min_spacing` frames
/// from every candidate already kept.
pub fn select_frames(ranked: &[FrameCandidate], num_frames: usize, min_spacing: u64) -> Vec<FrameCandidate> {
    let mut selected: Vec<FrameCandidate> = Vec::with_capacity(num_frames.min(ranked.len()));
    for candidate in ranked {
        if selected.len() >= num_frames {
            break;
        }
        let far_enough = selected
            .iter()
            .all(|kept| kept.frame_number.abs_diff(candidate.frame_number) >= min_spacing);
        if far_enough {
            selected.push(candidate.clone());
        }
    }
    selected
}

/// Everything one run needs, captured when it starts.
pub(crate) struct AnalysisRun {
    pub(crate) generation: u64,
    pub(crate) token: CancellationToken,
    pub(crate) source: Arc<dyn FrameSource>,
    pub(crate) video_path: PathBuf,
    pub(crate) profile: ProjectProfile,
    pub(crate) num_frames: usize,
    pub(crate) options: AnalysisOptions,
    pub(crate) detector: Option<Arc<dyn FaceDetector>>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

/// Sample, score and select frames.
///
/// `on_progress(processed, total, frame_number)` is called once before the
/// first sample and after every sample. Frames that fail to decode are
/// skipped.
///
/// # Errors
///
/// [`FramePickError::Cancelled`] when `token` is cancelled, and
/// [`FramePickError::UnreadableVideo`] when no sample could be decoded.
#[allow(clippy::too_many_arguments)]
pub(crate) fn analyze<F>(
    source: &dyn FrameSource,
    video_path: &Path,
    profile: &ProjectProfile,
    num_frames: usize,
    options: &AnalysisOptions,
    detector: Option<&dyn FaceDetector>,
    token: &CancellationToken,
    mut on_progress: F,
) -> Result<Vec<FrameCandidate>, FramePickError>
where
    F: FnMut(u64, u64, u64),
{
    if num_frames == 0 {
        return Err(FramePickError::InvalidFrameCount);
    }
    let metadata = source.metadata();
    let plan = sample_plan(metadata, options);
    let total = plan.len() as u64;
    log::debug!(
        "Sampling {} of {} frames for '{}' ({} requested)",
        total,
        metadata.frame_count,
        profile.id,
        num_frames
    );
    on_progress(0, total, 0);

    let mut measurements = Vec::with_capacity(plan.len());
    let mut previous_gray = None;
    for (index, frame_number) in plan.iter().copied().enumerate() {
        if token.is_cancelled() {
            return Err(FramePickError::Cancelled);
        }
        match source.frame(frame_number) {
            Ok(frame) => {
                let (measurement, gray) =
                    measure_frame(frame_number, &frame, options.analysis_width, detector, previous_gray.as_ref());
                measurements.push(measurement);
                previous_gray = Some(gray);
            }
            Err(error) => log::warn!("Skipping frame {frame_number}: {error}"),
        }
        on_progress(index as u64 + 1, total, frame_number);
    }

    if measurements.is_empty() {
        return Err(FramePickError::UnreadableVideo {
            path: video_path.to_path_buf(),
            reason: "no sampled frame could be decoded".to_string(),
        });
    }

    let ranked = score_measurements(&measurements, metadata.fps, profile, detector.is_some());
    let spacing = options.selection_spacing(metadata.frame_count, metadata.fps, num_frames);
    Ok(select_frames(&ranked, num_frames, spacing))
}

/// Run `run` on a named worker thread, reporting into `job`.
pub(crate) fn spawn_analysis(job: Arc<Job>, run: AnalysisRun) -> Result<JoinHandle<()>, FramePickError> {
    let short_id: String = job.id().chars().take(8).collect();
    let name = format!("framepick-analysis-{short_id}-{}", run.generation);
    let handle = std::thread::Builder::new().name(name).spawn(move || {
        let AnalysisRun {
            generation,
            token,
            source,
            video_path,
            profile,
            num_frames,
            options,
            detector,
            progress,
        } = run;

        let mut tracker: Option<ProgressTracker> = None;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            analyze(
                source.as_ref(),
                &video_path,
                &profile,
                num_frames,
                &options,
                detector.as_deref(),
                &token,
                |processed, total, frame_number| {
                    if !job.record_progress(generation, processed, total) {
                        return;
                    }
                    match tracker.as_mut() {
                        Some(tracker) => tracker.advance(Some(frame_number)),
                        None => tracker = Some(ProgressTracker::new(progress.clone(), OperationType::Analysis, total)),
                    }
                },
            )
        }));
        let result = outcome
            .unwrap_or_else(|payload| Err(FramePickError::WorkerPanicked(panic_message(payload.as_ref()).to_string())));

        match result {
            Ok(frames) => {
                let count = frames.len();
                if job.complete_analysis(generation, frames) {
                    log::info!("Analysis of job {} finished: {} frames selected", job.id(), count);
                }
            }
            Err(FramePickError::Cancelled) => {
                log::warn!("Analysis run {} of job {} was superseded", generation, job.id());
            }
            Err(error) => {
                if job.fail_analysis(generation, error.to_string()) {
                    log::warn!("Analysis of job {} failed: {}", job.id(), error);
                }
            }
        }
    })?;
    Ok(handle)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
