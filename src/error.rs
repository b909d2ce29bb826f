//! Error types for the `framepick` crate.
//!
//! [`FramePickError`] is the single error type returned by every fallible
//! operation in the pipeline. Each variant maps to a stable
//! [`kind`](FramePickError::kind) string so a driving client can render an
//! actionable message instead of a generic failure.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde::Serialize;
use thiserror::Error;
use zip::result::ZipError;

/// The unified error type for all `framepick` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramePickError {
    /// An upload was initialised with a size of zero or above the configured
    /// maximum.
    #[error("Invalid upload size {size} (must be between 1 and {max} bytes)")]
    InvalidSize {
        /// The requested total size.
        size: i64,
        /// The largest accepted upload.
        max: u64,
    },

    /// No job is registered under the given identifier.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// A chunk index was at or beyond the declared chunk count.
    #[error("Chunk {chunk_index} is out of range (upload has {total_chunks} chunks)")]
    ChunkOutOfRange {
        /// The chunk index that was submitted.
        chunk_index: u64,
        /// The number of chunks the upload consists of.
        total_chunks: u64,
    },

    /// A chunk disagreed with the session's geometry.
    #[error("Invalid chunk {chunk_index}: {reason}")]
    InvalidChunk {
        /// The chunk index that was submitted.
        chunk_index: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// The video container could not be parsed or contains no frames.
    #[error("Unreadable video at {path}: {reason}")]
    UnreadableVideo {
        /// The path that was opened.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The requested frame number is outside `[0, frame_count)`.
    #[error("Frame {frame_number} is out of range (video has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the video.
        total_frames: u64,
    },

    /// A frame could not be decoded even though it is in range.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The job has no finalized video yet (still uploading, or failed).
    #[error("Video for job {0} is not ready")]
    VideoNotReady(String),

    /// A `.cube` LUT could not be parsed.
    #[error("Malformed LUT: {0}")]
    MalformedLut(String),

    /// An export was requested with an empty frame selection.
    #[error("No frames selected for export")]
    NoFramesSelected,

    /// The requested export format is not supported.
    #[error("Invalid export format: {0}")]
    InvalidFormat(String),

    /// A lossy export quality outside `1..=100`.
    #[error("Invalid quality {0} (must be between 1 and 100)")]
    InvalidQuality(u32),

    /// A profile table was empty, inconsistent, or not valid JSON.
    #[error("Invalid profile table: {0}")]
    InvalidProfileTable(String),

    /// An analysis was requested for zero frames.
    #[error("Number of frames to select must be greater than zero")]
    InvalidFrameCount,

    /// A background worker panicked before recording its result.
    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding or converting a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The export archive could not be written.
    #[error("Archive error: {0}")]
    ArchiveError(#[from] ZipError),
}

impl From<FfmpegError> for FramePickError {
    fn from(error: FfmpegError) -> Self {
        FramePickError::FfmpegError(error.to_string())
    }
}

impl FramePickError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FramePickError::InvalidSize { .. } => "invalid_size",
            FramePickError::UnknownJob(_) => "unknown_job",
            FramePickError::ChunkOutOfRange { .. } => "chunk_out_of_range",
            FramePickError::InvalidChunk { .. } => "invalid_chunk",
            FramePickError::UnreadableVideo { .. } => "unreadable_video",
            FramePickError::FrameOutOfRange { .. } => "frame_out_of_range",
            FramePickError::VideoDecodeError(_) => "video_decode_error",
            FramePickError::VideoNotReady(_) => "video_not_ready",
            FramePickError::MalformedLut(_) => "malformed_lut",
            FramePickError::NoFramesSelected => "no_frames_selected",
            FramePickError::InvalidFormat(_) => "invalid_format",
            FramePickError::InvalidQuality(_) => "invalid_quality",
            FramePickError::InvalidProfileTable(_) => "invalid_profile_table",
            FramePickError::InvalidFrameCount => "invalid_frame_count",
            FramePickError::WorkerPanicked(_) => "worker_panicked",
            FramePickError::Cancelled => "cancelled",
            FramePickError::FfmpegError(_) => "ffmpeg_error",
            FramePickError::IoError(_) => "io_error",
            FramePickError::ImageError(_) => "image_error",
            FramePickError::ArchiveError(_) => "archive_error",
        }
    }

    /// Whether the failure was caused by the request rather than the server.
    ///
    /// Transport layers use this to pick between a client-error and a
    /// server-error status.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            FramePickError::VideoDecodeError(_)
                | FramePickError::FfmpegError(_)
                | FramePickError::IoError(_)
                | FramePickError::ImageError(_)
                | FramePickError::ArchiveError(_)
                | FramePickError::WorkerPanicked(_)
                | FramePickError::Cancelled
        )
    }
}

/// The `{error, kind}` body a transport layer returns for a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Stable error kind, see [`FramePickError::kind`].
    pub kind: &'static str,
}

impl From<&FramePickError> for ErrorBody {
    fn from(error: &FramePickError) -> Self {
        Self {
            error: error.to_string(),
            kind: error.kind(),
        }
    }
}
