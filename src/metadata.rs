//! Video metadata types.
//!
//! [`VideoMetadata`] is extracted once when a finalized video is opened and
//! stays immutable for the lifetime of its job.

use serde::Serialize;

use crate::conversion::format_timestamp;

/// Metadata for the indexed video stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (approximate for variable-frame-rate content).
    pub fps: f64,
    /// Number of addressable frames. Always greater than zero.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"prores"`).
    pub codec: String,
}

impl VideoMetadata {
    /// Duration in seconds, `frame_count / fps`.
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Whether `frame_number` addresses a frame of this video.
    pub fn contains(&self, frame_number: u64) -> bool {
        frame_number < self.frame_count
    }
}

/// The metadata answer returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
    /// Number of frames.
    pub frame_count: u64,
    /// Duration in seconds.
    pub duration: f64,
    /// Duration as `MM:SS.cc` / `HH:MM:SS.cc`.
    pub duration_formatted: String,
    /// Codec name.
    pub codec: String,
}

impl From<&VideoMetadata> for VideoInfo {
    fn from(metadata: &VideoMetadata) -> Self {
        let duration = metadata.duration_seconds();
        Self {
            width: metadata.width,
            height: metadata.height,
            fps: metadata.fps,
            frame_count: metadata.frame_count,
            duration,
            duration_formatted: format_timestamp(duration),
            codec: metadata.codec.clone(),
        }
    }
}
