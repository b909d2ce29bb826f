//! Random-access frame retrieval.
//!
//! A finalized video is opened through a [`VideoOpener`], which yields a
//! shareable [`FrameSource`]. Frame sources are `Send + Sync`: preview,
//! export, and a running analysis may decode frames from the same source at
//! the same time.
//!
//! The crate ships an FFmpeg-backed opener,
//! [`FfmpegOpener`](crate::ffmpeg::FfmpegOpener). Other decoders plug in by
//! implementing these two traits.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use framepick::{FfmpegOpener, FramePickError, VideoOpener};
//!
//! let video = FfmpegOpener.open(Path::new("interview.mp4"))?;
//! let frame = video.frame(120)?;
//! frame.save("frame_120.png")?;
//! # Ok::<(), FramePickError>(())
//! ```

use std::{path::Path, sync::Arc};

use image::{RgbImage, imageops::FilterType};

use crate::{
    encode::{ImageFormat, encode_image},
    error::FramePickError,
    metadata::VideoMetadata,
};

/// An opened video that can decode arbitrary frames.
pub trait FrameSource: Send + Sync {
    /// Metadata extracted when the video was opened.
    fn metadata(&self) -> &VideoMetadata;

    /// Decode a frame that is known to be in range.
    ///
    /// Callers go through [`frame`](FrameSource::frame), which performs the
    /// range check.
    fn decode_frame(&self, frame_number: u64) -> Result<RgbImage, FramePickError>;

    /// Decode frame `frame_number` (0-indexed) as an RGB raster.
    ///
    /// # Errors
    ///
    /// [`FramePickError::FrameOutOfRange`] when `frame_number` is not in
    /// `[0, frame_count)`; decode errors otherwise.
    fn frame(&self, frame_number: u64) -> Result<RgbImage, FramePickError> {
        let total_frames = self.metadata().frame_count;
        if frame_number >= total_frames {
            return Err(FramePickError::FrameOutOfRange {
                frame_number,
                total_frames,
            });
        }
        self.decode_frame(frame_number)
    }
}

/// Opens finalized video files.
pub trait VideoOpener: Send + Sync {
    /// Open `path` and extract its metadata.
    ///
    /// # Errors
    ///
    /// [`FramePickError::UnreadableVideo`] if the container cannot be parsed,
    /// has no video stream, or has zero frames.
    fn open(&self, path: &Path) -> Result<Arc<dyn FrameSource>, FramePickError>;
}

/// Decode a frame, fit it within `max_width`, and encode it as JPEG.
pub(crate) fn render_preview(
    source: &dyn FrameSource,
    frame_number: u64,
    max_width: u32,
    quality: u8,
) -> Result<Vec<u8>, FramePickError> {
    let frame = source.frame(frame_number)?;
    let frame = fit_width(frame, max_width);
    log::debug!(
        "Rendering preview for frame {} at {}x{}",
        frame_number,
        frame.width(),
        frame.height()
    );
    encode_image(&frame, ImageFormat::Jpg, u32::from(quality))
}

/// Downscale `image` to `max_width`, preserving aspect ratio. Images already
/// narrow enough are returned untouched.
pub(crate) fn fit_width(image: RgbImage, max_width: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width <= max_width || width == 0 {
        return image;
    }
    let scale = max_width as f64 / width as f64;
    let new_height = ((height as f64) * scale).round().max(1.0) as u32;
    image::imageops::resize(&image, max_width, new_height, FilterType::Triangle)
}
